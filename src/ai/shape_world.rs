//! In-memory ray-cast world built from avian colliders.
//!
//! Stands in for the physics engine in headless runs and tests. Each shape is
//! an avian [`Collider`] at a fixed translation, so intersections share the
//! geometry of the live [`SpatialQuery`](avian2d::prelude::SpatialQuery)
//! adapter. Hits are reported in insertion order with the usual clip
//! semantics of [`RayCastWorld`].

use avian2d::prelude::*;
use bevy::prelude::*;

use super::world::{BodyId, BodyType, Fixture, ObstacleTag, RAY_TERMINATE, RayCastWorld, RayHit};

#[derive(Debug, Clone)]
struct Shape {
    fixture: Fixture,
    collider: Collider,
    center: Vec2,
}

#[derive(Debug, Clone, Default)]
pub struct ShapeWorld {
    shapes: Vec<Shape>,
}

impl ShapeWorld {
    pub fn add_circle(&mut self, body: BodyId, body_type: BodyType, center: Vec2, radius: f32) {
        self.push(body, body_type, ObstacleTag::None, Collider::circle(radius), center);
    }

    pub fn add_box(&mut self, body: BodyId, body_type: BodyType, center: Vec2, half_extents: Vec2) {
        self.add_tagged_box(body, body_type, ObstacleTag::None, center, half_extents);
    }

    pub fn add_tagged_box(
        &mut self,
        body: BodyId,
        body_type: BodyType,
        tag: ObstacleTag,
        center: Vec2,
        half_extents: Vec2,
    ) {
        let size = half_extents * 2.0;
        self.push(body, body_type, tag, Collider::rectangle(size.x, size.y), center);
    }

    fn push(
        &mut self,
        body: BodyId,
        body_type: BodyType,
        tag: ObstacleTag,
        collider: Collider,
        center: Vec2,
    ) {
        self.shapes.push(Shape {
            fixture: Fixture {
                body,
                body_type,
                tag,
            },
            collider,
            center,
        });
    }

    /// Re-center every shape of `body`.
    pub fn move_body(&mut self, body: BodyId, to: Vec2) {
        for shape in self.shapes.iter_mut().filter(|s| s.fixture.body == body) {
            shape.center = to;
        }
    }

    pub fn remove_body(&mut self, body: BodyId) {
        self.shapes.retain(|s| s.fixture.body != body);
    }

    /// Solid tiles of a level as static unit boxes.
    pub fn add_solid_tiles(&mut self, tiles: impl IntoIterator<Item = (BodyId, Vec2)>) {
        for (body, center) in tiles {
            self.add_box(body, BodyType::Static, center, Vec2::splat(0.5));
        }
    }
}

impl RayCastWorld for ShapeWorld {
    fn ray_cast(&self, from: Vec2, to: Vec2, callback: &mut dyn FnMut(&Fixture, &RayHit) -> f32) {
        let length = from.distance(to);
        let Ok(direction) = Dir2::new(to - from) else {
            return;
        };

        let mut max_fraction = 1.0f32;
        for shape in &self.shapes {
            let Some((distance, normal)) = shape.collider.cast_ray(
                Position(shape.center),
                Rotation::default(),
                from,
                *direction,
                length,
                true,
            ) else {
                continue;
            };
            let fraction = distance / length;
            if fraction > max_fraction {
                continue;
            }
            let hit = RayHit {
                point: from + *direction * distance,
                normal,
                fraction,
            };
            let reply = callback(&shape.fixture, &hit);
            if reply == RAY_TERMINATE {
                return;
            }
            if reply > 0.0 {
                max_fraction = max_fraction.min(reply);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::world::{RAY_CONTINUE, RAY_IGNORE};

    fn hits(world: &ShapeWorld, from: Vec2, to: Vec2, reply: f32) -> Vec<(BodyId, f32)> {
        let mut out = Vec::new();
        world.ray_cast(from, to, &mut |fixture: &Fixture, hit: &RayHit| {
            out.push((fixture.body, hit.fraction));
            reply
        });
        out
    }

    #[test]
    fn reports_every_crossed_shape_when_continuing() {
        let mut world = ShapeWorld::default();
        world.add_circle(BodyId(1), BodyType::Dynamic, Vec2::new(2.0, 0.0), 0.5);
        world.add_box(BodyId(2), BodyType::Static, Vec2::new(5.0, 0.0), Vec2::splat(0.5));
        world.add_circle(BodyId(3), BodyType::Dynamic, Vec2::new(2.0, 5.0), 0.5);

        let out = hits(&world, Vec2::ZERO, Vec2::new(10.0, 0.0), RAY_CONTINUE);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, BodyId(1));
        assert!((out[0].1 - 0.15).abs() < 1e-4);
        assert!((out[1].1 - 0.45).abs() < 1e-4);
    }

    #[test]
    fn returning_fraction_clips_later_hits() {
        let mut world = ShapeWorld::default();
        world.add_box(BodyId(2), BodyType::Static, Vec2::new(2.0, 0.0), Vec2::splat(0.5));
        world.add_circle(BodyId(1), BodyType::Dynamic, Vec2::new(5.0, 0.0), 0.5);

        let mut seen = Vec::new();
        world.ray_cast(Vec2::ZERO, Vec2::new(10.0, 0.0), &mut |fixture: &Fixture, hit: &RayHit| {
            seen.push(fixture.body);
            hit.fraction
        });
        assert_eq!(seen, vec![BodyId(2)]);

        let ignored = hits(&world, Vec2::ZERO, Vec2::new(10.0, 0.0), RAY_IGNORE);
        assert_eq!(ignored.len(), 2);
    }

    #[test]
    fn origin_inside_shape_hits_at_zero() {
        let mut world = ShapeWorld::default();
        world.add_box(BodyId(2), BodyType::Static, Vec2::ZERO, Vec2::splat(1.0));
        let out = hits(&world, Vec2::ZERO, Vec2::new(3.0, 0.0), RAY_CONTINUE);
        assert_eq!(out, vec![(BodyId(2), 0.0)]);
    }

    #[test]
    fn hit_normal_faces_the_ray() {
        let mut world = ShapeWorld::default();
        world.add_box(BodyId(2), BodyType::Static, Vec2::new(3.0, 0.0), Vec2::splat(0.5));
        let mut normal = Vec2::ZERO;
        world.ray_cast(Vec2::ZERO, Vec2::new(6.0, 0.0), &mut |_: &Fixture, hit: &RayHit| {
            normal = hit.normal;
            RAY_CONTINUE
        });
        assert!((normal - Vec2::NEG_X).length() < 1e-4, "normal {normal:?}");
    }

    #[test]
    fn move_and_remove() {
        let mut world = ShapeWorld::default();
        world.add_circle(BodyId(1), BodyType::Dynamic, Vec2::new(2.0, 0.0), 0.5);
        world.move_body(BodyId(1), Vec2::new(0.0, 4.0));
        assert!(hits(&world, Vec2::ZERO, Vec2::new(5.0, 0.0), RAY_CONTINUE).is_empty());
        assert_eq!(hits(&world, Vec2::ZERO, Vec2::new(0.0, 5.0), RAY_CONTINUE).len(), 1);
        world.remove_body(BodyId(1));
        assert!(hits(&world, Vec2::ZERO, Vec2::new(0.0, 5.0), RAY_CONTINUE).is_empty());
    }
}
