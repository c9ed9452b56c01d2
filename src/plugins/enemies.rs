//! Enemy AI dispatch: builds the level's [`Simulation`], keeps it in sync
//! with enemy entities and runs one AI tick per frame.
//!
//! Physics stays outside the AI. Rays go through [`AvianRayWorld`] and the
//! per-enemy result lands in a [`MotionIntent`] component for the movement
//! layer to apply.

use std::collections::HashMap;
use std::time::Instant;

use avian2d::prelude::*;
use bevy::prelude::*;
use micromegas_tracing::prelude::{debug, error, fmetric, info, span_scope, warn};

use crate::ai::simulation::Simulation;
use crate::ai::state_machine::EnemyState;
use crate::ai::tile_graph::Gravity;
use crate::ai::world::{
    BodyId, BodyType, EnemyBody, Fixture, MotionIntent, ObstacleTag, RAY_TERMINATE, RayCastWorld,
    RayHit, TargetBody,
};
use crate::app_state::AppState;
use crate::components::*;
use crate::events::{BackupRequested, EnemyStateChanged, FlipRequested};
use crate::plugins::level::TileLayer;
use crate::resources::AiTuning;

/// Upper bound on fixtures reported along one ray.
const MAX_RAY_HITS: u32 = 32;

pub struct EnemyAiPlugin;

impl Plugin for EnemyAiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AiTuning>();
        app.add_systems(OnEnter(AppState::InGame), build_simulation);
        app.add_systems(
            Update,
            (register_enemies, unregister_enemies, enemy_ai)
                .chain()
                .run_if(in_state(AppState::InGame)),
        );
        app.add_systems(OnExit(AppState::InGame), teardown_simulation);
        app.add_observer(on_flip_requested);
    }
}

/// Mirror of the controller's externally visible status.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiStatus {
    pub state: EnemyState,
    pub immune: bool,
    pub can_flip: bool,
}

// ---------------------------------------------------------------------------
// Ray-cast adapter
// ---------------------------------------------------------------------------

/// [`RayCastWorld`] over avian's spatial query.
///
/// Colliders without a rigid body count as static level geometry.
pub struct AvianRayWorld<'a, 'w, 's> {
    spatial: &'a SpatialQuery<'w, 's>,
    fixtures: &'a HashMap<Entity, Fixture>,
}

impl<'a, 'w, 's> AvianRayWorld<'a, 'w, 's> {
    pub fn new(spatial: &'a SpatialQuery<'w, 's>, fixtures: &'a HashMap<Entity, Fixture>) -> Self {
        Self { spatial, fixtures }
    }
}

/// Fixture description for a collider entity.
pub fn fixture_for(entity: Entity, body: Option<&RigidBody>, tag: Option<&ObstacleTag>) -> Fixture {
    let body_type = match body {
        Some(RigidBody::Dynamic) => BodyType::Dynamic,
        Some(RigidBody::Kinematic) => BodyType::Kinematic,
        Some(RigidBody::Static) | None => BodyType::Static,
    };
    Fixture {
        body: BodyId::from(entity),
        body_type,
        tag: tag.copied().unwrap_or_default(),
    }
}

impl RayCastWorld for AvianRayWorld<'_, '_, '_> {
    fn ray_cast(&self, from: Vec2, to: Vec2, callback: &mut dyn FnMut(&Fixture, &RayHit) -> f32) {
        let length = from.distance(to);
        let Ok(direction) = Dir2::new(to - from) else {
            return;
        };

        let mut hits = self.spatial.ray_hits(
            from,
            direction,
            length,
            MAX_RAY_HITS,
            true,
            &SpatialQueryFilter::default(),
        );
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let mut max_fraction = 1.0f32;
        for data in hits {
            let fraction = data.distance / length;
            if fraction > max_fraction {
                break;
            }
            let Some(fixture) = self.fixtures.get(&data.entity) else {
                continue;
            };
            let hit = RayHit {
                point: from + *direction * data.distance,
                normal: data.normal,
                fraction,
            };
            let reply = callback(fixture, &hit);
            if reply == RAY_TERMINATE {
                return;
            }
            if reply > 0.0 {
                max_fraction = max_fraction.min(reply);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

fn build_simulation(mut commands: Commands, layer: Option<Res<TileLayer>>, tuning: Res<AiTuning>) {
    span_scope!("build_simulation");
    let Some(layer) = layer else {
        warn!("entered game without a tile layer; enemy AI disabled");
        return;
    };
    commands.insert_resource(Simulation::new(&*layer, tuning.clone()));
}

fn teardown_simulation(mut commands: Commands) {
    commands.remove_resource::<Simulation>();
}

/// Give every enemy that has no controller yet a fresh one.
fn register_enemies(
    mut commands: Commands,
    simulation: Option<ResMut<Simulation>>,
    query: Query<(Entity, &EnemyKind, Option<&Facing>), (With<Enemy>, Without<AiStatus>)>,
) {
    let Some(mut simulation) = simulation else {
        return;
    };
    for (entity, kind, facing) in &query {
        let facing = facing.copied().unwrap_or_default();
        let id = BodyId::from(entity);
        simulation.spawn(id, kind.spec(), facing);
        let Some(controller) = simulation.controller(id) else {
            continue;
        };
        commands.entity(entity).insert((
            facing,
            MotionIntent::default(),
            AiStatus {
                state: controller.state(),
                immune: controller.is_immune(),
                can_flip: controller.can_flip(),
            },
        ));
        info!("enemy {:?} registered as {:?}", entity, kind);
    }
}

fn unregister_enemies(
    simulation: Option<ResMut<Simulation>>,
    mut removed: RemovedComponents<Enemy>,
) {
    let Some(mut simulation) = simulation else {
        return;
    };
    for entity in removed.read() {
        simulation.despawn(BodyId::from(entity));
    }
}

/// Toggle [`GravityFlipped`] unless the enemy's attack refuses the flip.
fn on_flip_requested(
    request: On<FlipRequested>,
    mut commands: Commands,
    simulation: Option<Res<Simulation>>,
    enemies: Query<Has<GravityFlipped>, With<Enemy>>,
) {
    let entity = request.enemy;
    let Ok(flipped) = enemies.get(entity) else {
        return;
    };
    let allowed = simulation
        .as_ref()
        .is_none_or(|sim| sim.request_flip(BodyId::from(entity)));
    if !allowed {
        debug!("flip of {:?} refused", entity);
        return;
    }
    if flipped {
        commands.entity(entity).remove::<GravityFlipped>();
    } else {
        commands.entity(entity).insert(GravityFlipped);
    }
}

/// One AI tick for every registered enemy.
#[allow(clippy::type_complexity)]
fn enemy_ai(
    mut commands: Commands,
    simulation: Option<ResMut<Simulation>>,
    spatial: SpatialQuery,
    colliders: Query<(Entity, Option<&RigidBody>, Option<&ObstacleTag>), With<Collider>>,
    target: Query<(Entity, &Transform, Has<GlobalAlert>), With<Target>>,
    enemies: Query<(Entity, &Transform, Has<Stuck>, Has<GravityFlipped>), (With<Enemy>, With<AiStatus>)>,
) {
    span_scope!("enemy_ai");
    let Some(mut simulation) = simulation else {
        return;
    };
    let Ok((target_entity, target_transform, alert)) = target.single() else {
        return;
    };
    let started = Instant::now();

    let fixtures: HashMap<Entity, Fixture> = colliders
        .iter()
        .map(|(entity, body, tag)| (entity, fixture_for(entity, body, tag)))
        .collect();
    let world = AvianRayWorld::new(&spatial, &fixtures);

    let target = TargetBody {
        id: BodyId::from(target_entity),
        position: target_transform.translation.truncate(),
        global_alert: alert,
    };
    let mut entities = HashMap::new();
    let bodies: Vec<EnemyBody> = enemies
        .iter()
        .map(|(entity, transform, stuck, flipped)| {
            let id = BodyId::from(entity);
            entities.insert(id, entity);
            EnemyBody {
                id,
                position: transform.translation.truncate(),
                gravity: if flipped {
                    Gravity::Flipped
                } else {
                    Gravity::Normal
                },
                stuck,
            }
        })
        .collect();

    let mut intents = Vec::new();
    let report = match simulation.tick(&world, &bodies, &target, &mut intents) {
        Ok(report) => report,
        Err(e) => {
            error!("enemy AI tick failed: {}", e);
            panic!("enemy AI tick failed: {e}");
        }
    };

    for (id, intent) in intents {
        let (Some(entity), Some(controller)) = (entities.get(&id), simulation.controller(id)) else {
            continue;
        };
        commands.entity(*entity).insert((
            intent,
            controller.facing(),
            AiStatus {
                state: controller.state(),
                immune: controller.is_immune(),
                can_flip: controller.can_flip(),
            },
        ));
    }

    for transition in report.transitions {
        if let Some(entity) = entities.get(&transition.enemy) {
            commands.trigger(EnemyStateChanged {
                enemy: *entity,
                from: transition.from,
                to: transition.to,
            });
        }
    }
    for telegram in report.telegrams {
        if let (Some(entity), Some(position)) = (entities.get(&telegram.sender), telegram.position()) {
            commands.trigger(BackupRequested {
                enemy: *entity,
                position,
            });
        }
    }

    fmetric!("ai_tick_ms", "ms", started.elapsed().as_secs_f64() * 1000.0);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
