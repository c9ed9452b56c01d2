//! Current / previous / global state bookkeeping for one enemy.
//!
//! There is no transition table: each state's update decides when to leave.
//! The controller owns the machine and runs the enter/exit hooks around
//! every change, so this type only records what is active and for how long.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnemyState {
    Spawn,
    Wander,
    Chase,
    Attack,
    Perceive,
    Stuck,
    Retreat,
    Pursue,
    Helping,
    Guard,
}

/// Slot a state is dispatched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateRole {
    Current,
    Global,
}

impl EnemyState {
    /// Whether this state has behavior when run from `role`.
    pub fn runs_as(&self, role: StateRole) -> bool {
        match role {
            StateRole::Current => !matches!(self, EnemyState::Perceive),
            StateRole::Global => matches!(self, EnemyState::Spawn | EnemyState::Perceive),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateMachine {
    current: EnemyState,
    previous: Option<EnemyState>,
    global: Option<EnemyState>,
    ticks_in_state: u32,
}

impl StateMachine {
    pub fn new(initial: EnemyState, global: Option<EnemyState>) -> Self {
        Self {
            current: initial,
            previous: None,
            global,
            ticks_in_state: 0,
        }
    }

    pub fn current(&self) -> EnemyState {
        self.current
    }

    pub fn previous(&self) -> Option<EnemyState> {
        self.previous
    }

    pub fn global(&self) -> Option<EnemyState> {
        self.global
    }

    pub fn set_global(&mut self, global: Option<EnemyState>) {
        self.global = global;
    }

    pub fn is_in(&self, state: EnemyState) -> bool {
        self.current == state
    }

    pub fn ticks_in_state(&self) -> u32 {
        self.ticks_in_state
    }

    pub(crate) fn tick(&mut self) {
        self.ticks_in_state = self.ticks_in_state.saturating_add(1);
    }

    /// Record a switch to `next`. Returns the state that was left.
    pub(crate) fn switch(&mut self, next: EnemyState) -> EnemyState {
        let left = self.current;
        self.previous = Some(left);
        self.current = next;
        self.ticks_in_state = 0;
        left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_records_previous_and_resets_ticks() {
        let mut machine = StateMachine::new(EnemyState::Spawn, Some(EnemyState::Perceive));
        machine.tick();
        machine.tick();
        assert_eq!(machine.ticks_in_state(), 2);

        let left = machine.switch(EnemyState::Wander);
        assert_eq!(left, EnemyState::Spawn);
        assert_eq!(machine.previous(), Some(EnemyState::Spawn));
        assert!(machine.is_in(EnemyState::Wander));
        assert_eq!(machine.ticks_in_state(), 0);
        assert_eq!(machine.global(), Some(EnemyState::Perceive));
    }

    #[test]
    fn roles() {
        assert!(EnemyState::Perceive.runs_as(StateRole::Global));
        assert!(!EnemyState::Perceive.runs_as(StateRole::Current));
        assert!(EnemyState::Spawn.runs_as(StateRole::Global));
        assert!(EnemyState::Spawn.runs_as(StateRole::Current));
        assert!(!EnemyState::Chase.runs_as(StateRole::Global));
    }
}
