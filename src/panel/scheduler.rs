//! picks the next command for an idle link
//! priority, first match wins:
//! 1. identity not read yet
//! 2. relays differ from the confirmed relays
//! 3. digital outputs differ from the confirmed outputs
//! 4. channel poll, skipped when no channel is configured
//! relay and dout reads are never picked here
//! once shutdown is requested only outstanding actuator writes are picked

use super::control_state::ControlState;
use super::entity::{Command, FunctionMode};

/// actuator write still owed to the board
fn pending_write(state: &ControlState) -> Option<Command> {
    if state.relays_desired != state.relays_confirmed {
        Some(Command::SetRelays)
    } else if state.douts_desired != state.douts_confirmed {
        Some(Command::SetDigitalOutputs)
    } else {
        None
    }
}

pub fn next_command(state: &ControlState) -> Option<Command> {
    if state.shutdown_requested {
        return pending_write(state);
    }
    if state.want_info {
        return Some(Command::GetIdentity);
    }
    match state.function_mode {
        FunctionMode::PanelElectric => pending_write(state).or_else(|| {
            // a zero register read is not a legal request
            (state.channel_count() > 0).then_some(Command::GetChannels)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_state() -> ControlState {
        let mut state = ControlState::new(1, 2);
        state.want_info = false;
        state
    }

    #[test]
    fn test_identity_first() {
        let mut state = ControlState::new(1, 2);
        state.relays_desired = 0x05;
        state.douts_desired = 0x01;
        assert_eq!(next_command(&state), Some(Command::GetIdentity));
    }

    #[test]
    fn test_relays_before_douts() {
        let mut state = ready_state();
        state.relays_desired = 0x05;
        state.douts_desired = 0x01;
        assert_eq!(next_command(&state), Some(Command::SetRelays));

        state.relays_confirmed = 0x05;
        assert_eq!(next_command(&state), Some(Command::SetDigitalOutputs));

        state.douts_confirmed = 0x01;
        assert_eq!(next_command(&state), Some(Command::GetChannels));
    }

    #[test]
    fn test_default_poll() {
        assert_eq!(next_command(&ready_state()), Some(Command::GetChannels));
    }

    #[test]
    fn test_shutdown() {
        let mut state = ControlState::new(1, 2);
        state.shutdown_requested = true;
        assert_eq!(next_command(&state), None);
    }

    #[test]
    fn test_shutdown_drains_writes() {
        // identity still unread, it is not fetched any more
        let mut state = ControlState::new(1, 2);
        state.shutdown_requested = true;
        state.relays_desired = 0x02;
        state.douts_desired = 0x01;
        assert_eq!(next_command(&state), Some(Command::SetRelays));

        state.relays_confirmed = 0x02;
        assert_eq!(next_command(&state), Some(Command::SetDigitalOutputs));

        state.douts_confirmed = 0x01;
        assert_eq!(next_command(&state), None);
    }

    #[test]
    fn test_no_channels_no_poll() {
        let mut state = ControlState::new(1, 0);
        state.want_info = false;
        assert_eq!(next_command(&state), None);

        state.relays_desired = 0x01;
        assert_eq!(next_command(&state), Some(Command::SetRelays));
    }

    #[test]
    fn test_does_not_mutate() {
        let mut state = ready_state();
        state.relays_desired = 3;
        let before = state.clone();
        let _ = next_command(&state);
        assert_eq!(state, before);
    }
}
