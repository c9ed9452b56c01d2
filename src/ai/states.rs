//! Per-state behavior: enter / exit / step / message handlers.
//!
//! Every handler receives the owning controller and a read-only view of the
//! world for this tick. A step never mutates the state machine directly; it
//! returns the next state and the controller performs the switch.

use bevy::prelude::*;
use micromegas_tracing::prelude::debug;

use super::action::Action;
use super::behavior::AttackInputs;
use super::controller::EnemyController;
use super::messages::{MessageKind, Payload, Telegram};
use super::pathfinder::{manhattan, next_step_toward, step_away_from};
use super::state_machine::{EnemyState, StateRole};
use super::tile_graph::TileGraph;
use super::world::{BeamHit, EnemyBody, RayCastWorld, TargetBody};
use crate::components::{Facing, TilePos};
use crate::error::AiError;
use crate::resources::AiTuning;

/// What a state sees of the world during one tick.
pub(crate) struct Context<'a> {
    pub graph: &'a TileGraph,
    pub world: &'a dyn RayCastWorld,
    pub enemy: &'a EnemyBody,
    pub target: &'a TargetBody,
    pub tuning: &'a AiTuning,
}

impl Context<'_> {
    fn tile(&self) -> TilePos {
        TilePos::from_world(self.enemy.position)
    }

    fn target_tile(&self) -> TilePos {
        TilePos::from_world(self.target.position)
    }

    fn target_distance(&self) -> u32 {
        manhattan(&self.tile(), &self.target_tile())
    }

    fn face_target(&self) -> Option<Facing> {
        Facing::toward(self.enemy.position.x, self.target.position.x)
    }

    fn toward_target(&self) -> Action {
        next_step_toward(self.graph, self.tile(), self.target_tile()).unwrap_or_default()
    }
}

/// Result of one state step.
#[derive(Debug, Default)]
pub(crate) struct Step {
    pub next: Option<EnemyState>,
    pub action: Action,
    pub beam_hit: Option<BeamHit>,
    /// New facing, when the state turns the enemy.
    pub facing: Option<Facing>,
    pub outbox: Vec<Telegram>,
}

impl Step {
    fn to(next: EnemyState) -> Self {
        Self {
            next: Some(next),
            ..default()
        }
    }

    /// Move, turning toward the horizontal component of the move.
    fn walk(action: Action) -> Self {
        Self {
            action,
            facing: action.horizontal(),
            ..default()
        }
    }
}

pub(crate) enum MessageOutcome {
    Unhandled,
    Handled(Option<EnemyState>),
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run `state` as the current state.
pub(crate) fn step(
    state: EnemyState,
    enemy: &mut EnemyController,
    ctx: &Context,
) -> Result<Step, AiError> {
    let step = match state {
        EnemyState::Spawn => spawn(enemy, ctx),
        EnemyState::Wander => wander(enemy, ctx),
        EnemyState::Chase => chase(enemy, ctx),
        EnemyState::Attack => attack(enemy, ctx),
        EnemyState::Retreat => retreat(enemy, ctx),
        EnemyState::Pursue => pursue(enemy, ctx),
        EnemyState::Helping => helping(enemy, ctx),
        EnemyState::Stuck => stuck(enemy, ctx),
        EnemyState::Guard => guard(enemy, ctx),
        EnemyState::Perceive => {
            return Err(AiError::InvalidState {
                state,
                role: StateRole::Current,
            });
        }
    };
    Ok(step)
}

/// Run `state` as the global overlay.
pub(crate) fn global_step(
    state: EnemyState,
    enemy: &mut EnemyController,
    ctx: &Context,
) -> Result<Option<EnemyState>, AiError> {
    match state {
        EnemyState::Spawn => Ok(None),
        EnemyState::Perceive => Ok(perceive(enemy, ctx)),
        _ => Err(AiError::InvalidState {
            state,
            role: StateRole::Global,
        }),
    }
}

pub(crate) fn enter(state: EnemyState, enemy: &mut EnemyController) {
    if state == EnemyState::Stuck {
        debug!("enemy {:?} pinned", enemy.id());
    }
}

pub(crate) fn exit(state: EnemyState, enemy: &mut EnemyController) {
    match state {
        EnemyState::Attack | EnemyState::Pursue => enemy.attack.reset(),
        EnemyState::Helping => enemy.helping_target = None,
        _ => {}
    }
}

pub(crate) fn on_message(
    state: EnemyState,
    role: StateRole,
    enemy: &mut EnemyController,
    telegram: &Telegram,
) -> MessageOutcome {
    let Some(position) = telegram.position() else {
        return MessageOutcome::Unhandled;
    };
    match (state, role, telegram.kind) {
        (EnemyState::Wander, StateRole::Current, MessageKind::BackupRequest) => {
            enemy.helping_target = Some(position);
            MessageOutcome::Handled(Some(EnemyState::Helping))
        }
        (EnemyState::Perceive, StateRole::Global, MessageKind::BackupRequest)
            if enemy.state() == EnemyState::Helping =>
        {
            enemy.helping_target = Some(position);
            MessageOutcome::Handled(None)
        }
        _ => MessageOutcome::Unhandled,
    }
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

fn spawn(enemy: &EnemyController, ctx: &Context) -> Step {
    if enemy.machine.ticks_in_state() > ctx.tuning.spawn_ticks {
        return Step::to(EnemyState::Wander);
    }
    Step::default()
}

fn wander(enemy: &EnemyController, ctx: &Context) -> Step {
    let senses = enemy.senses();
    if senses.sees || senses.hears {
        return Step::to(EnemyState::Chase);
    }

    let tile = ctx.tile();
    let ahead = enemy.facing();
    if ctx.graph.can_step(tile, ahead.direction()) && !senses.hazard_ahead {
        return Step::walk(Action::from(ahead));
    }
    let back = ahead.opposite();
    if ctx.graph.can_step(tile, back.direction()) {
        return Step::walk(Action::from(back));
    }
    Step::default()
}

fn chase(enemy: &EnemyController, ctx: &Context) -> Step {
    let senses = enemy.senses();
    if senses.in_range {
        return Step::to(EnemyState::Attack);
    }
    if !senses.hears {
        return Step::to(EnemyState::Wander);
    }
    Step {
        action: ctx.toward_target(),
        facing: ctx.face_target(),
        ..default()
    }
}

fn attack(enemy: &mut EnemyController, ctx: &Context) -> Step {
    let mid_attack = enemy.attack.is_active();
    if !mid_attack && !enemy.senses().hears {
        return Step::to(EnemyState::Wander);
    }
    if !mid_attack
        && enemy.spec().attack.is_ranged()
        && enemy.is_cooling()
        && ctx.target_distance() < ctx.tuning.retreat_distance
    {
        return Step::to(EnemyState::Retreat);
    }
    engage(enemy, ctx)
}

/// Run the attack sub-state against the target, closing in when it does
/// not own the move.
fn engage(enemy: &mut EnemyController, ctx: &Context) -> Step {
    let mid_attack = enemy.attack.is_active();
    // Rolls keep their heading
    let facing = if mid_attack { None } else { ctx.face_target() };
    let inputs = AttackInputs {
        world: ctx.world,
        origin: ctx.enemy.position,
        owner: enemy.id(),
        target: ctx.target,
        facing: facing.unwrap_or(enemy.facing()),
        in_range: enemy.senses().in_range,
        ready: enemy.ready(),
        tuning: ctx.tuning,
    };
    let outcome = enemy.attack.step(&inputs);
    if outcome.fired {
        enemy.start_cooldown(ctx.tuning);
    }

    let action = if outcome.engaged || outcome.action.fires() {
        outcome.action
    } else {
        ctx.toward_target()
    };
    Step {
        action,
        beam_hit: outcome.beam_hit,
        facing,
        ..default()
    }
}

fn retreat(enemy: &EnemyController, ctx: &Context) -> Step {
    if !enemy.senses().hears {
        return Step::to(EnemyState::Wander);
    }
    if ctx.target_distance() >= ctx.tuning.retreat_distance {
        return Step::to(EnemyState::Chase);
    }
    let action = step_away_from(ctx.graph, ctx.tile(), ctx.target_tile()).unwrap_or_default();
    Step::walk(action)
}

fn pursue(enemy: &mut EnemyController, ctx: &Context) -> Step {
    if !ctx.target.global_alert {
        return Step::to(EnemyState::Wander);
    }
    engage(enemy, ctx)
}

fn helping(enemy: &EnemyController, ctx: &Context) -> Step {
    let senses = enemy.senses();
    if senses.sees || senses.hears {
        return Step::to(EnemyState::Chase);
    }
    let Some(goal) = enemy.helping_target() else {
        return Step::to(EnemyState::Wander);
    };
    let goal = TilePos::from_world(goal);
    if ctx.tile() == goal {
        return Step::to(EnemyState::Wander);
    }
    match next_step_toward(ctx.graph, ctx.tile(), goal) {
        Some(action) => Step::walk(action),
        None => Step::to(EnemyState::Wander),
    }
}

fn stuck(enemy: &EnemyController, ctx: &Context) -> Step {
    let ticks = enemy.machine.ticks_in_state();
    let mut step = Step::default();
    if ticks > 0 && ticks % ctx.tuning.backup_interval == 0 {
        debug!("enemy {:?} calls for backup", enemy.id());
        step.outbox.push(Telegram::broadcast(
            MessageKind::BackupRequest,
            enemy.id(),
            Payload::Position(ctx.enemy.position),
        ));
    }
    step
}

fn guard(enemy: &mut EnemyController, ctx: &Context) -> Step {
    let senses = enemy.senses();
    let mut step = Step::default();
    if senses.sees || senses.hears {
        step.facing = ctx.face_target();
    }
    if senses.in_range && enemy.ready() {
        step.action = Action::FIRE;
        enemy.start_cooldown(ctx.tuning);
    }
    step
}

fn perceive(enemy: &EnemyController, ctx: &Context) -> Option<EnemyState> {
    let busy = enemy.machine.is_in(EnemyState::Stuck) || enemy.machine.is_in(EnemyState::Pursue);
    (ctx.target.global_alert && !busy).then_some(EnemyState::Pursue)
}
