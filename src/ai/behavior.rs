//! Enemy capability sets and the attack sub-states layered on ATTACK.
//!
//! Kinds are composed rather than derived: an [`EnemySpec`] says which attack
//! an enemy carries, whether it is shielded and whether it can move. The
//! shared states consult it where behavior differs.

use bevy::prelude::*;

use super::action::Action;
use super::state_machine::EnemyState;
use super::world::{BeamHit, BodyId, Fixture, RAY_CONTINUE, RayCastWorld, RayHit, TargetBody};
use crate::components::{EnemyKind, Facing};
use crate::resources::AiTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackKind {
    /// Plain projectile on cooldown.
    Basic,
    /// Fixed-duration dash toward the faced side.
    Rolling,
    /// Charge, then a locked beam.
    Laser,
}

impl AttackKind {
    /// Ranged attackers back off when the target crowds them.
    pub fn is_ranged(&self) -> bool {
        matches!(self, AttackKind::Basic | AttackKind::Laser)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnemySpec {
    pub attack: AttackKind,
    pub shielded: bool,
    pub stationary: bool,
}

impl EnemySpec {
    pub fn for_kind(kind: EnemyKind) -> Self {
        let (attack, shielded, stationary) = match kind {
            EnemyKind::Walker => (AttackKind::Basic, false, false),
            EnemyKind::Roller => (AttackKind::Rolling, false, false),
            EnemyKind::ShieldedRoller => (AttackKind::Rolling, true, false),
            EnemyKind::Laser => (AttackKind::Laser, false, false),
            EnemyKind::ShieldedLaser => (AttackKind::Laser, true, false),
            EnemyKind::Guard => (AttackKind::Basic, false, true),
        };
        Self {
            attack,
            shielded,
            stationary,
        }
    }

    /// Initial current state and global overlay.
    pub fn initial_states(&self) -> (EnemyState, Option<EnemyState>) {
        if self.stationary {
            (EnemyState::Guard, None)
        } else {
            (EnemyState::Spawn, Some(EnemyState::Perceive))
        }
    }

    /// Only mobile enemies can answer a call for backup.
    pub fn answers_backup(&self) -> bool {
        !self.stationary
    }
}

/// Whether a shielded enemy is immune while in `state`.
pub fn shield_asserted(state: EnemyState) -> bool {
    match state {
        EnemyState::Spawn
        | EnemyState::Wander
        | EnemyState::Chase
        | EnemyState::Perceive
        | EnemyState::Helping
        | EnemyState::Retreat
        | EnemyState::Guard => true,
        EnemyState::Attack | EnemyState::Pursue | EnemyState::Stuck => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RollPhase {
    Idle,
    Rolling { ticks_left: u32 },
    Recovering { ticks_left: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaserPhase {
    Idle,
    /// Tracking the target; `aim` follows it every tick.
    Charging { ticks: u32, origin: Vec2, aim: Vec2 },
    /// Aim locked toward `reach`; the beam ends at the first non-target
    /// obstacle.
    Firing {
        ticks_left: u32,
        origin: Vec2,
        reach: Vec2,
        beam_end: Vec2,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamWidth {
    Thin,
    Thick,
}

/// Beam segment for whoever draws it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beam {
    pub from: Vec2,
    pub to: Vec2,
    pub width: BeamWidth,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackState {
    Basic,
    Rolling(RollPhase),
    Laser(LaserPhase),
}

/// What the attack sub-state needs to know this tick.
pub struct AttackInputs<'a> {
    pub world: &'a dyn RayCastWorld,
    pub origin: Vec2,
    pub owner: BodyId,
    pub target: &'a TargetBody,
    pub facing: Facing,
    pub in_range: bool,
    pub ready: bool,
    pub tuning: &'a AiTuning,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttackOutcome {
    pub action: Action,
    pub beam_hit: Option<BeamHit>,
    /// The attack went off; the fire cooldown starts.
    pub fired: bool,
    /// The sub-state owns this tick's movement.
    pub engaged: bool,
}

impl AttackState {
    pub fn new(kind: AttackKind) -> Self {
        match kind {
            AttackKind::Basic => AttackState::Basic,
            AttackKind::Rolling => AttackState::Rolling(RollPhase::Idle),
            AttackKind::Laser => AttackState::Laser(LaserPhase::Idle),
        }
    }

    pub fn reset(&mut self) {
        match self {
            AttackState::Basic => {}
            AttackState::Rolling(phase) => *phase = RollPhase::Idle,
            AttackState::Laser(phase) => *phase = LaserPhase::Idle,
        }
    }

    /// Mid-roll or mid-laser; ATTACK does not give up while this holds.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AttackState::Rolling(RollPhase::Rolling { .. })
                | AttackState::Laser(LaserPhase::Charging { .. } | LaserPhase::Firing { .. })
        )
    }

    /// Gravity flips are refused while a laser is charging or firing.
    pub fn blocks_flip(&self) -> bool {
        matches!(
            self,
            AttackState::Laser(LaserPhase::Charging { .. } | LaserPhase::Firing { .. })
        )
    }

    /// Shield forced off: rolling, or the laser fully charged and firing.
    pub fn overrides_shield(&self) -> bool {
        matches!(
            self,
            AttackState::Rolling(RollPhase::Rolling { .. })
                | AttackState::Laser(LaserPhase::Firing { .. })
        )
    }

    pub fn beam(&self) -> Option<Beam> {
        match self {
            AttackState::Laser(LaserPhase::Charging { origin, aim, .. }) => Some(Beam {
                from: *origin,
                to: *aim,
                width: BeamWidth::Thin,
            }),
            AttackState::Laser(LaserPhase::Firing {
                origin, beam_end, ..
            }) => Some(Beam {
                from: *origin,
                to: *beam_end,
                width: BeamWidth::Thick,
            }),
            _ => None,
        }
    }

    pub fn step(&mut self, inputs: &AttackInputs) -> AttackOutcome {
        match self {
            AttackState::Basic => basic_step(inputs),
            AttackState::Rolling(phase) => roll_step(phase, inputs),
            AttackState::Laser(phase) => laser_step(phase, inputs),
        }
    }
}

fn basic_step(inputs: &AttackInputs) -> AttackOutcome {
    if inputs.in_range && inputs.ready {
        return AttackOutcome {
            action: Action::FIRE,
            fired: true,
            ..default()
        };
    }
    AttackOutcome::default()
}

fn roll_step(phase: &mut RollPhase, inputs: &AttackInputs) -> AttackOutcome {
    let dash = AttackOutcome {
        action: Action::DASH | Action::from(inputs.facing),
        engaged: true,
        ..default()
    };
    match *phase {
        RollPhase::Idle => {
            if inputs.in_range && inputs.ready {
                *phase = RollPhase::Rolling {
                    ticks_left: inputs.tuning.roll_ticks.saturating_sub(1),
                };
                return dash;
            }
            AttackOutcome::default()
        }
        RollPhase::Rolling { ticks_left } => {
            *phase = match ticks_left {
                0 => RollPhase::Recovering {
                    ticks_left: inputs.tuning.roll_recovery_ticks,
                },
                n => RollPhase::Rolling { ticks_left: n - 1 },
            };
            if ticks_left == 0 {
                return AttackOutcome::default();
            }
            dash
        }
        RollPhase::Recovering { ticks_left } => {
            *phase = match ticks_left {
                0 | 1 => RollPhase::Idle,
                n => RollPhase::Recovering { ticks_left: n - 1 },
            };
            AttackOutcome::default()
        }
    }
}

fn laser_step(phase: &mut LaserPhase, inputs: &AttackInputs) -> AttackOutcome {
    let tuning = inputs.tuning;
    match *phase {
        LaserPhase::Idle => {
            if inputs.in_range && inputs.ready {
                *phase = LaserPhase::Charging {
                    ticks: 0,
                    origin: inputs.origin,
                    aim: inputs.target.position,
                };
                return engaged();
            }
            AttackOutcome::default()
        }
        LaserPhase::Charging { ticks, .. } => {
            let aim = inputs.target.position;
            let ticks = ticks + 1;
            *phase = if ticks >= tuning.laser_charge_ticks {
                let fallback = Vec2::new(inputs.facing.angle_degrees().to_radians().cos(), 0.0);
                let direction = (aim - inputs.origin).normalize_or(fallback);
                let reach = inputs.origin + direction * tuning.laser_range;
                LaserPhase::Firing {
                    ticks_left: tuning.laser_fire_ticks,
                    origin: inputs.origin,
                    reach,
                    beam_end: reach,
                }
            } else {
                LaserPhase::Charging {
                    ticks,
                    origin: inputs.origin,
                    aim,
                }
            };
            engaged()
        }
        LaserPhase::Firing {
            ticks_left,
            origin,
            reach,
            ..
        } => {
            let (beam_end, hit) = cast_beam(inputs, origin, reach);
            let ticks_left = ticks_left.saturating_sub(1);
            let fired = ticks_left == 0;
            *phase = if fired {
                LaserPhase::Idle
            } else {
                LaserPhase::Firing {
                    ticks_left,
                    origin,
                    reach,
                    beam_end,
                }
            };
            AttackOutcome {
                action: Action::FIRE,
                beam_hit: hit.then_some(BeamHit {
                    body: inputs.target.id,
                    damage: tuning.laser_damage,
                }),
                fired,
                engaged: true,
            }
        }
    }
}

fn engaged() -> AttackOutcome {
    AttackOutcome {
        engaged: true,
        ..default()
    }
}

/// Cast the locked beam. Returns where it stops and whether the target is
/// crossed before the first other obstacle.
fn cast_beam(inputs: &AttackInputs, from: Vec2, to: Vec2) -> (Vec2, bool) {
    let mut obstacle = 1.0f32;
    let mut target_at: Option<f32> = None;
    inputs
        .world
        .ray_cast(from, to, &mut |fixture: &Fixture, hit: &RayHit| {
            if fixture.body == inputs.owner {
                return RAY_CONTINUE;
            }
            if fixture.body == inputs.target.id {
                target_at = Some(target_at.map_or(hit.fraction, |t| t.min(hit.fraction)));
                return RAY_CONTINUE;
            }
            obstacle = obstacle.min(hit.fraction);
            hit.fraction
        });
    let end = from + (to - from) * obstacle;
    (end, target_at.is_some_and(|t| t < obstacle))
}
