//! One enemy's brain: state machine, perception, facing, cooldown and the
//! per-tick update that ties them together.

use bevy::prelude::*;
use micromegas_tracing::prelude::*;
use micromegas_tracing::prelude::{debug, error};

use super::behavior::{AttackState, Beam, EnemySpec, shield_asserted};
use super::messages::Telegram;
use super::perception::Perception;
use super::state_machine::{EnemyState, StateMachine, StateRole};
use super::states::{self, Context, MessageOutcome, Step};
use super::tile_graph::GravityGraphs;
use super::world::{BodyId, EnemyBody, MotionIntent, RayCastWorld, TargetBody};
use crate::components::Facing;
use crate::error::AiError;
use crate::resources::AiTuning;

/// What the perception units reported about the target this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Senses {
    pub sees: bool,
    pub hears: bool,
    pub in_range: bool,
    pub hazard_ahead: bool,
}

impl Senses {
    fn read(perception: &Perception, target: BodyId) -> Self {
        Self {
            sees: perception.vision.can_see(target),
            hears: perception.sensing.can_see(target),
            in_range: perception.attack.can_see(target),
            hazard_ahead: perception.hazard_ahead(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub enemy: BodyId,
    pub from: EnemyState,
    pub to: EnemyState,
}

/// Output of one controller update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutput {
    pub intent: MotionIntent,
    /// Telegrams to post on the bus.
    pub outbox: Vec<Telegram>,
}

#[derive(Debug, Clone)]
pub struct EnemyController {
    id: BodyId,
    spec: EnemySpec,
    pub(crate) machine: StateMachine,
    perception: Perception,
    facing: Facing,
    senses: Senses,
    pub(crate) attack: AttackState,
    pub(crate) helping_target: Option<Vec2>,
    fire_cooldown: u32,
    cooling: bool,
    ticks: u64,
    immune: bool,
    transitions: Vec<Transition>,
}

impl EnemyController {
    pub fn new(id: BodyId, spec: EnemySpec, facing: Facing, tuning: &AiTuning) -> Self {
        let (initial, global) = spec.initial_states();
        let mut controller = Self {
            id,
            spec,
            machine: StateMachine::new(initial, global),
            perception: Perception::new(&tuning.perception, id),
            facing,
            senses: Senses::default(),
            attack: AttackState::new(spec.attack),
            helping_target: None,
            fire_cooldown: 0,
            cooling: false,
            ticks: 0,
            immune: false,
            transitions: Vec::new(),
        };
        states::enter(initial, &mut controller);
        controller.refresh_shield();
        controller
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn spec(&self) -> EnemySpec {
        self.spec
    }

    pub fn state(&self) -> EnemyState {
        self.machine.current()
    }

    pub fn previous_state(&self) -> Option<EnemyState> {
        self.machine.previous()
    }

    pub fn global_state(&self) -> Option<EnemyState> {
        self.machine.global()
    }

    pub fn set_global_state(&mut self, global: Option<EnemyState>) {
        self.machine.set_global(global);
    }

    pub fn ticks_in_state(&self) -> u32 {
        self.machine.ticks_in_state()
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn senses(&self) -> Senses {
        self.senses
    }

    pub fn perception(&self) -> &Perception {
        &self.perception
    }

    pub fn helping_target(&self) -> Option<Vec2> {
        self.helping_target
    }

    pub fn fire_cooldown(&self) -> u32 {
        self.fire_cooldown
    }

    pub fn is_cooling(&self) -> bool {
        self.cooling
    }

    /// Ticks this controller has been updated.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_immune(&self) -> bool {
        self.immune
    }

    /// Whether the enemy may have its gravity flipped right now.
    pub fn can_flip(&self) -> bool {
        !self.attack.blocks_flip()
    }

    /// Ask to flip this enemy's gravity. Refused while the laser is charging
    /// or firing.
    pub fn request_flip(&self) -> bool {
        if self.attack.blocks_flip() {
            debug!("enemy {:?}: gravity flip refused mid-laser", self.id);
            return false;
        }
        true
    }

    /// Laser telegraph or beam, while one is active.
    pub fn beam(&self) -> Option<Beam> {
        self.attack.beam()
    }

    pub fn ready(&self) -> bool {
        self.fire_cooldown == 0
    }

    pub(crate) fn start_cooldown(&mut self, tuning: &AiTuning) {
        self.fire_cooldown = tuning.fire_cooldown;
        self.cooling = self.fire_cooldown > 0;
    }

    fn tick_cooldown(&mut self) {
        if self.cooling && self.fire_cooldown > 0 {
            self.fire_cooldown -= 1;
        }
        if self.fire_cooldown == 0 {
            self.cooling = false;
        }
    }

    fn refresh_shield(&mut self) {
        self.immune = self.spec.shielded
            && shield_asserted(self.machine.current())
            && !self.attack.overrides_shield();
    }

    /// Exit the current state, switch, enter `next`.
    pub fn change_state(&mut self, next: EnemyState) {
        let current = self.machine.current();
        states::exit(current, self);
        let from = self.machine.switch(next);
        states::enter(next, self);
        debug!("enemy {:?}: {:?} -> {:?}", self.id, from, next);
        self.transitions.push(Transition {
            enemy: self.id,
            from,
            to: next,
        });
    }

    /// Switch back to the previous state, if there is one.
    pub fn revert_to_previous(&mut self) {
        if let Some(previous) = self.machine.previous() {
            self.change_state(previous);
        }
    }

    /// Transitions since the last call, oldest first.
    pub fn take_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.transitions)
    }

    /// Offer a telegram to the current state, then to the global state.
    /// Returns whether either handled it.
    pub fn handle_message(&mut self, telegram: &Telegram) -> bool {
        let current = self.machine.current();
        if let MessageOutcome::Handled(next) =
            states::on_message(current, StateRole::Current, self, telegram)
        {
            if let Some(next) = next {
                self.change_state(next);
            }
            return true;
        }

        let Some(global) = self.machine.global() else {
            return false;
        };
        match states::on_message(global, StateRole::Global, self, telegram) {
            MessageOutcome::Handled(next) => {
                if let Some(next) = next {
                    self.change_state(next);
                }
                true
            }
            MessageOutcome::Unhandled => false,
        }
    }

    /// Advance one tick.
    #[span_fn]
    pub fn update(
        &mut self,
        graphs: &GravityGraphs,
        world: &dyn RayCastWorld,
        enemy: &EnemyBody,
        target: &TargetBody,
        tuning: &AiTuning,
    ) -> Result<TickOutput, AiError> {
        self.ticks += 1;
        self.machine.tick();
        self.tick_cooldown();

        self.perception
            .refresh(world, enemy.position, self.facing.angle_degrees());
        self.senses = Senses::read(&self.perception, target.id);

        if enemy.stuck && !self.machine.is_in(EnemyState::Stuck) {
            self.change_state(EnemyState::Stuck);
        } else if !enemy.stuck && self.machine.is_in(EnemyState::Stuck) {
            self.revert_to_previous();
        }

        let ctx = Context {
            graph: graphs.for_gravity(enemy.gravity),
            world,
            enemy,
            target,
            tuning,
        };

        if let Some(global) = self.machine.global() {
            let next = states::global_step(global, self, &ctx).inspect_err(|e| self.log_invalid(e))?;
            if let Some(next) = next {
                self.change_state(next);
            }
        }

        let mut step = self.run_current(&ctx)?;
        if let Some(next) = step.next.take() {
            self.change_state(next);
            // One current-state transition per tick; a second request is
            // re-evaluated next tick.
            let again = self.run_current(&ctx)?;
            step = Step {
                outbox: [step.outbox, again.outbox].concat(),
                ..again
            };
        }

        if let Some(facing) = step.facing {
            self.facing = facing;
        }
        self.refresh_shield();

        Ok(TickOutput {
            intent: MotionIntent {
                action: step.action,
                beam_hit: step.beam_hit,
            },
            outbox: step.outbox,
        })
    }

    fn run_current(&mut self, ctx: &Context) -> Result<Step, AiError> {
        let current = self.machine.current();
        states::step(current, self, ctx).inspect_err(|e| self.log_invalid(e))
    }

    fn log_invalid(&self, err: &AiError) {
        error!("enemy {:?}: {}", self.id, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::behavior::LaserPhase;
    use crate::ai::messages::{MessageKind, Payload};
    use crate::components::EnemyKind;

    fn controller(kind: EnemyKind) -> EnemyController {
        EnemyController::new(BodyId(10), kind.spec(), Facing::Right, &AiTuning::default())
    }

    fn backup_from(sender: u64, at: Vec2) -> Telegram {
        Telegram::broadcast(MessageKind::BackupRequest, BodyId(sender), Payload::Position(at))
    }

    #[test]
    fn initial_states_by_kind() {
        let walker = controller(EnemyKind::Walker);
        assert_eq!(walker.state(), EnemyState::Spawn);
        assert_eq!(walker.global_state(), Some(EnemyState::Perceive));
        assert!(walker.ready());

        let guard = controller(EnemyKind::Guard);
        assert_eq!(guard.state(), EnemyState::Guard);
        assert_eq!(guard.global_state(), None);
    }

    #[test]
    fn change_state_records_transitions() {
        let mut c = controller(EnemyKind::Walker);
        c.change_state(EnemyState::Wander);
        c.change_state(EnemyState::Chase);
        assert_eq!(c.previous_state(), Some(EnemyState::Wander));

        let transitions = c.take_transitions();
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].from, EnemyState::Spawn);
        assert_eq!(transitions[1].to, EnemyState::Chase);
        assert!(c.take_transitions().is_empty());
    }

    #[test]
    fn revert_returns_to_previous_state() {
        let mut c = controller(EnemyKind::Walker);
        c.change_state(EnemyState::Wander);
        c.change_state(EnemyState::Stuck);
        c.revert_to_previous();
        assert_eq!(c.state(), EnemyState::Wander);
        assert_eq!(c.previous_state(), Some(EnemyState::Stuck));
    }

    #[test]
    fn wandering_enemy_answers_backup() {
        let mut c = controller(EnemyKind::Walker);
        c.change_state(EnemyState::Wander);
        assert!(c.handle_message(&backup_from(11, Vec2::new(4.0, 0.0))));
        assert_eq!(c.state(), EnemyState::Helping);
        assert_eq!(c.helping_target(), Some(Vec2::new(4.0, 0.0)));
    }

    #[test]
    fn helping_enemy_retargets_through_global_state() {
        let mut c = controller(EnemyKind::Walker);
        c.change_state(EnemyState::Wander);
        c.handle_message(&backup_from(11, Vec2::new(4.0, 0.0)));
        c.take_transitions();

        assert!(c.handle_message(&backup_from(12, Vec2::new(7.0, 0.0))));
        assert_eq!(c.state(), EnemyState::Helping);
        assert_eq!(c.helping_target(), Some(Vec2::new(7.0, 0.0)));
        assert!(c.take_transitions().is_empty());
    }

    #[test]
    fn messages_without_a_handler_are_unhandled() {
        let mut c = controller(EnemyKind::Walker);
        c.change_state(EnemyState::Chase);
        assert!(!c.handle_message(&backup_from(11, Vec2::ZERO)));
        assert_eq!(c.state(), EnemyState::Chase);

        let mut guard = controller(EnemyKind::Guard);
        assert!(!guard.handle_message(&backup_from(11, Vec2::ZERO)));

        let mut wander = controller(EnemyKind::Walker);
        wander.change_state(EnemyState::Wander);
        let bare = Telegram::broadcast(MessageKind::BackupRequest, BodyId(11), Payload::None);
        assert!(!wander.handle_message(&bare));
    }

    #[test]
    fn flip_refused_while_laser_is_busy() {
        let mut c = controller(EnemyKind::Laser);
        assert!(c.request_flip());

        c.attack = AttackState::Laser(LaserPhase::Charging {
            ticks: 1,
            origin: Vec2::ZERO,
            aim: Vec2::X,
        });
        assert!(!c.request_flip());
        assert!(!c.can_flip());

        c.attack.reset();
        assert!(c.request_flip());
    }

    #[test]
    fn cooldown_ticks_down_to_ready() {
        let tuning = AiTuning {
            fire_cooldown: 2,
            ..AiTuning::default()
        };
        let mut c = controller(EnemyKind::Walker);
        c.start_cooldown(&tuning);
        assert!(c.is_cooling());
        c.tick_cooldown();
        assert_eq!(c.fire_cooldown(), 1);
        c.tick_cooldown();
        assert!(c.ready());
        assert!(!c.is_cooling());
        c.tick_cooldown();
        assert_eq!(c.fire_cooldown(), 0);
    }
}
