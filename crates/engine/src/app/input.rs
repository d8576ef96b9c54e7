#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    Up,
    Down,
    Left,
    Right,
    Action,
    Cancel,
    Menu,
    DebugOverlay,
}

const ACTION_COUNT: usize = 8;

impl InputAction {
    pub const DIRECTIONS: [InputAction; 4] = [
        InputAction::Up,
        InputAction::Down,
        InputAction::Left,
        InputAction::Right,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::Up => 0,
            InputAction::Down => 1,
            InputAction::Left => 2,
            InputAction::Right => 3,
            InputAction::Action => 4,
            InputAction::Cancel => 5,
            InputAction::Menu => 6,
            InputAction::DebugOverlay => 7,
        }
    }

    pub fn is_direction(self) -> bool {
        Self::DIRECTIONS.contains(&self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn merged(mut self, other: ActionStates) -> Self {
        for (down, other_down) in self.down.iter_mut().zip(other.down) {
            *down |= other_down;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Idle,
    NewlyPressed,
    HeldDown,
    JustReleased,
}

impl ButtonState {
    pub fn from_transition(was_down: bool, is_down: bool) -> Self {
        match (was_down, is_down) {
            (false, false) => ButtonState::Idle,
            (false, true) => ButtonState::NewlyPressed,
            (true, true) => ButtonState::HeldDown,
            (true, false) => ButtonState::JustReleased,
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, ButtonState::NewlyPressed | ButtonState::HeldDown)
    }
}

/// Logical button state for one simulation tick, compared against the tick before.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    quit_requested: bool,
    previous: ActionStates,
    current: ActionStates,
    movement_frozen: bool,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(previous: ActionStates, current: ActionStates, quit_requested: bool) -> Self {
        Self {
            quit_requested,
            previous,
            current,
            movement_frozen: false,
        }
    }

    /// Held since the previous tick as well as now.
    pub fn with_action_held(mut self, action: InputAction) -> Self {
        self.previous.set(action, true);
        self.current.set(action, true);
        self
    }

    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.previous.set(action, false);
        self.current.set(action, true);
        self
    }

    /// Directions report inactive while frozen; other buttons are unaffected.
    pub fn with_movement_frozen(mut self) -> Self {
        self.movement_frozen = true;
        self
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn button_state(&self, action: InputAction) -> ButtonState {
        if self.movement_frozen && action.is_direction() {
            return ButtonState::Idle;
        }
        ButtonState::from_transition(self.previous.is_down(action), self.current.is_down(action))
    }

    pub fn is_active(&self, action: InputAction) -> bool {
        self.button_state(action).is_active()
    }

    pub fn newly_pressed(&self, action: InputAction) -> bool {
        self.button_state(action) == ButtonState::NewlyPressed
    }

    pub fn any_direction_active(&self) -> bool {
        InputAction::DIRECTIONS
            .iter()
            .any(|action| self.is_active(*action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_cover_all_four_states() {
        assert_eq!(ButtonState::from_transition(false, false), ButtonState::Idle);
        assert_eq!(ButtonState::from_transition(false, true), ButtonState::NewlyPressed);
        assert_eq!(ButtonState::from_transition(true, true), ButtonState::HeldDown);
        assert_eq!(ButtonState::from_transition(true, false), ButtonState::JustReleased);
    }

    #[test]
    fn active_includes_new_presses_and_holds_only() {
        let snapshot = InputSnapshot::empty()
            .with_action_pressed(InputAction::Up)
            .with_action_held(InputAction::Action);

        assert!(snapshot.is_active(InputAction::Up));
        assert!(snapshot.newly_pressed(InputAction::Up));
        assert!(snapshot.is_active(InputAction::Action));
        assert!(!snapshot.newly_pressed(InputAction::Action));

        let mut previous = ActionStates::default();
        previous.set(InputAction::Cancel, true);
        let released = InputSnapshot::new(previous, ActionStates::default(), false);
        assert_eq!(
            released.button_state(InputAction::Cancel),
            ButtonState::JustReleased
        );
        assert!(!released.is_active(InputAction::Cancel));
    }

    #[test]
    fn frozen_movement_hides_directions_but_not_buttons() {
        let snapshot = InputSnapshot::empty()
            .with_action_held(InputAction::Left)
            .with_action_pressed(InputAction::Menu)
            .with_movement_frozen();

        assert!(!snapshot.is_active(InputAction::Left));
        assert!(!snapshot.any_direction_active());
        assert!(snapshot.newly_pressed(InputAction::Menu));
    }
}
