//! per tick driver of the link
//! 1. master housekeeping, every tick
//! 2. idle: schedule and dispatch the next command
//! 3. pending: poll the status; busy waits, error records the status, ok decodes
//! confirmed values only change in the ok branch

use super::control_state::{ControlState, SharedControlState};
use super::dispatcher::{DispatchOutcome, RequestDispatcher};
use super::entity::{ChannelKind, ChannelReading, Command, LinkState};
use super::prelude::*;
use super::scheduler;
use crate::common::error::DriverError;
use crate::driver::modbus::entity::{CommStatus, MasterStatus};
use crate::driver::modbus::prelude::*;
use crate::driver::modbus::traits::ModbusMaster;
use crate::{debug, error, info, trace, warn};

const LOG_TAG: &str = "collector";

/// what a tick did, mostly for tests and tracing
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    // nothing to schedule
    Idle,
    Dispatched(Command),
    SendFailed(Command),
    Waiting(Command),
    Completed(Command),
    Failed(Command, CommStatus),
}

pub struct ResponseCollector {
    dispatcher: RequestDispatcher,
    state: SharedControlState,
}

impl ResponseCollector {
    pub fn new(master: Box<dyn ModbusMaster + Send>, state: SharedControlState) -> Self {
        ResponseCollector {
            dispatcher: RequestDispatcher::new(master),
            state,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.dispatcher.is_pending()
    }

    pub fn shutdown_requested(&self) -> bool {
        self.state.is_shutdown_requested()
    }

    /// no request outstanding and nothing left to schedule
    pub fn is_drained(&self) -> bool {
        !self.dispatcher.is_pending() && scheduler::next_command(&self.state.lock()).is_none()
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.dispatcher.master_mut().process();

        let mut state = self.state.lock();

        if !self.dispatcher.is_pending() {
            let Some(command) = scheduler::next_command(&state) else {
                return TickOutcome::Idle;
            };
            return match self.dispatcher.dispatch(command, &state) {
                Ok(DispatchOutcome::Sent) => TickOutcome::Dispatched(command),
                Ok(DispatchOutcome::Dropped) => TickOutcome::Waiting(command),
                // retried by the scheduler on a later tick
                Err(_) => TickOutcome::SendFailed(command),
            };
        }

        match self.dispatcher.master_mut().read_status() {
            MasterStatus::Busy => {
                let LinkState::Pending(command) = self.dispatcher.link_state() else {
                    return TickOutcome::Idle;
                };
                trace!(LOG_TAG, "{:?} busy", command);
                TickOutcome::Waiting(command)
            }
            MasterStatus::Error(status) => {
                state.comm_status = status;
                let Some(command) = self.dispatcher.complete() else {
                    return TickOutcome::Idle;
                };
                warn!(LOG_TAG, "{:?} failed, status {}", command, status);
                TickOutcome::Failed(command, status)
            }
            MasterStatus::Ok(registers) => {
                state.comm_status = CommStatus::Ok;
                let written = self.dispatcher.written_value();
                let Some(command) = self.dispatcher.complete() else {
                    return TickOutcome::Idle;
                };
                match decode_response(command, written, &registers, &mut state) {
                    Ok(()) => TickOutcome::Completed(command),
                    Err(e) => {
                        error!(LOG_TAG, "{}", e);
                        state.comm_status = CommStatus::MalformedResponse;
                        TickOutcome::Failed(command, CommStatus::MalformedResponse)
                    }
                }
            }
        }
    }

    /// release the transport, a pending answer is abandoned
    pub fn close(&mut self) {
        if self.dispatcher.is_pending() {
            warn!(LOG_TAG, "closing with {:?} outstanding", self.dispatcher.link_state());
        }
        self.dispatcher.close();
    }
}

fn expected_registers(command: Command, state: &ControlState) -> usize {
    match command {
        Command::GetIdentity => IDENTITY_REGS as usize,
        Command::GetDigitalOutputs | Command::GetRelays => 1,
        Command::GetChannels => state.channel_count() * REGS_PER_CHANNEL as usize,
        Command::SetDigitalOutputs | Command::SetRelays => 0,
    }
}

/// ascii text packed low byte first, nul bytes dropped
fn ascii_from_registers(registers: &[ModbusValueSize]) -> String {
    registers
        .iter()
        .flat_map(|register| [(register & 0xFF) as u8, (register >> 8) as u8])
        .filter(|byte| *byte != 0)
        .map(char::from)
        .collect()
}

/// apply a successful answer for `command` to the control record
/// `written` is the value a write carried, writes confirm that value
pub fn decode_response(
    command: Command,
    written: Option<ModbusValueSize>,
    registers: &[ModbusValueSize],
    state: &mut ControlState,
) -> Result<(), DriverError> {
    let expected = expected_registers(command, state);
    if registers.len() < expected {
        return Err(DriverError(format!(
            "{:?} answer too short, expected {} registers, got {}",
            command, expected, registers.len()
        )));
    }

    match command {
        Command::GetIdentity => {
            state.device_model = ascii_from_registers(&registers[0..2]);
            state.device_firmware = ascii_from_registers(&registers[2..3]);
            state.want_info = false;
            info!(LOG_TAG, "resource handler model {} firmware {}", state.device_model, state.device_firmware);
        }
        Command::SetRelays => {
            state.relays_confirmed = written.unwrap_or(state.relays_desired);
            debug!(LOG_TAG, "relays set 0x{:x}", state.relays_confirmed);
        }
        Command::SetDigitalOutputs => {
            state.douts_confirmed = written.unwrap_or(state.douts_desired);
            debug!(LOG_TAG, "douts set 0x{:x}", state.douts_confirmed);
        }
        Command::GetRelays => {
            state.relays_desired = registers[0];
            state.relays_confirmed = registers[0];
            debug!(LOG_TAG, "relays get 0x{:x}", state.relays_confirmed);
        }
        Command::GetDigitalOutputs => {
            state.douts_desired = registers[0];
            state.douts_confirmed = registers[0];
            debug!(LOG_TAG, "douts get 0x{:x}", state.douts_confirmed);
        }
        Command::GetChannels => {
            let channel_count = state.channel_count();
            for (i, regs) in registers.chunks_exact(REGS_PER_CHANNEL as usize).take(channel_count).enumerate() {
                let reading = ChannelReading {
                    comm_status: (regs[0] & 0xFF) as u8,
                    kind: ChannelKind::from_bit(regs[1] >> 4),
                    state_flags: (regs[1] & 0xF) as u8,
                    value: ((regs[2] as u32) | ((regs[3] as u32) << 16)) as i32,
                };
                trace!(LOG_TAG, "multimeter[{}] {:?}", i, reading);
                state.channels[i] = reading;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::modbus::dummy_master::{pack_ascii, DummyMaster};
    use crate::driver::modbus::entity::{ExceptionCode, ModbusRequestBo};
    use crate::panel::entity::LinkState;

    fn ready_state(channel_count: usize) -> SharedControlState {
        let mut state = ControlState::new(1, channel_count);
        state.want_info = false;
        SharedControlState::new(state)
    }

    #[test]
    fn test_set_relays_scenario() {
        let master = DummyMaster::new(2);
        let shared = ready_state(2);
        shared.set_relays_desired(0x05);
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());

        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::SetRelays));
        assert_eq!(
            master.requests()[0],
            ModbusRequestBo::WriteRegister { unit: 1, address: 0x300, value: 0x05 }
        );
        assert_eq!(shared.snapshot().relays_confirmed, 0x00);

        assert_eq!(collector.tick(), TickOutcome::Completed(Command::SetRelays));
        let snapshot = shared.snapshot();
        assert_eq!(snapshot.relays_confirmed, 0x05);
        assert_eq!(snapshot.comm_status, CommStatus::Ok);

        // relays settled, back to polling the channels
        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::GetChannels));
    }

    #[test]
    fn test_busy_keeps_pending() {
        let master = DummyMaster::new(2);
        master.set_busy_polls(2);
        let shared = ready_state(2);
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());

        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::GetChannels));
        assert_eq!(collector.tick(), TickOutcome::Waiting(Command::GetChannels));
        assert_eq!(collector.tick(), TickOutcome::Waiting(Command::GetChannels));
        assert!(collector.is_pending());
        assert_eq!(collector.tick(), TickOutcome::Completed(Command::GetChannels));
        assert_eq!(master.request_count(), 1);
    }

    #[test]
    fn test_single_outstanding_request() {
        let master = DummyMaster::new(2);
        master.set_busy_polls(1);
        let shared = ready_state(2);
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());

        for i in 0..30u16 {
            // desired state keeps changing under the worker
            shared.set_relays_desired(i % 3);
            shared.set_douts_desired(i % 2);
            let outcome = collector.tick();
            // the dummy refuses a submission while one is in flight
            assert!(!matches!(outcome, TickOutcome::SendFailed(_)));
            assert_eq!(collector.is_pending(), master.has_in_flight());
        }
        assert!(master.request_count() > 1);
    }

    #[test]
    fn test_exception_scenario() {
        let master = DummyMaster::new(2);
        let shared = ready_state(2);
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());

        // GetRelays is never scheduled, dispatch it by hand
        {
            let state = shared.snapshot();
            collector.dispatcher.dispatch(Command::GetRelays, &state).unwrap();
        }
        master.fail_next(CommStatus::Exception(ExceptionCode::IllegalDataAddress));
        {
            let mut state = shared.lock();
            state.relays_desired = 0x03;
            state.relays_confirmed = 0x03;
        }

        let outcome = collector.tick();
        let status = CommStatus::Exception(ExceptionCode::IllegalDataAddress);
        assert_eq!(outcome, TickOutcome::Failed(Command::GetRelays, status));
        let snapshot = shared.snapshot();
        assert_eq!(snapshot.comm_status, status);
        assert_eq!(snapshot.comm_status.code(), 2);
        assert_eq!(snapshot.relays_confirmed, 0x03);
        assert_eq!(collector.dispatcher.link_state(), LinkState::Idle);

        // loop keeps going
        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::GetChannels));
    }

    #[test]
    fn test_failed_write_is_retried() {
        let master = DummyMaster::new(2);
        let shared = ready_state(2);
        shared.set_relays_desired(0x01);
        master.fail_next(CommStatus::Exception(ExceptionCode::SlaveDeviceFailure));
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());

        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::SetRelays));
        assert!(matches!(collector.tick(), TickOutcome::Failed(Command::SetRelays, _)));
        assert_eq!(shared.snapshot().relays_confirmed, 0);

        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::SetRelays));
        assert_eq!(collector.tick(), TickOutcome::Completed(Command::SetRelays));
        assert_eq!(shared.snapshot().relays_confirmed, 0x01);
    }

    #[test]
    fn test_desired_changed_in_flight() {
        let master = DummyMaster::new(2);
        let shared = ready_state(2);
        shared.set_relays_desired(0x01);
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());

        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::SetRelays));
        shared.set_relays_desired(0x02);
        assert_eq!(collector.tick(), TickOutcome::Completed(Command::SetRelays));
        // only what reached the board is confirmed
        assert_eq!(shared.snapshot().relays_confirmed, 0x01);

        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::SetRelays));
        assert_eq!(collector.tick(), TickOutcome::Completed(Command::SetRelays));
        assert_eq!(shared.snapshot().relays_confirmed, 0x02);
        assert_eq!(master.register(0x300), Some(0x02));
    }

    #[test]
    fn test_send_failure_is_transient() {
        let master = DummyMaster::new(2);
        master.refuse_next_sends(2);
        let shared = ready_state(2);
        shared.set_douts_desired(0x02);
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());

        assert_eq!(collector.tick(), TickOutcome::SendFailed(Command::SetDigitalOutputs));
        assert_eq!(collector.tick(), TickOutcome::SendFailed(Command::SetDigitalOutputs));
        assert_eq!(shared.snapshot().comm_status, CommStatus::Idle);
        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::SetDigitalOutputs));
        assert_eq!(collector.tick(), TickOutcome::Completed(Command::SetDigitalOutputs));
        assert_eq!(shared.snapshot().douts_confirmed, 0x02);
    }

    #[test]
    fn test_identity_clears_want_info_once() {
        let master = DummyMaster::new(2);
        let shared = SharedControlState::new(ControlState::new(1, 2));
        shared.set_relays_desired(0x04);
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());

        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::GetIdentity));
        assert_eq!(collector.tick(), TickOutcome::Completed(Command::GetIdentity));
        let snapshot = shared.snapshot();
        assert!(!snapshot.want_info);
        assert_eq!(snapshot.device_model, "RH10");
        assert_eq!(snapshot.device_firmware, "12");

        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::SetRelays));
    }

    #[test]
    fn test_identity_round_trip() {
        let mut state = ControlState::new(1, 0);
        let registers = [pack_ascii(b'P', b'N'), pack_ascii(b'L', b'4'), pack_ascii(b'0', b'3')];
        decode_response(Command::GetIdentity, None, &registers, &mut state).unwrap();
        assert_eq!(state.device_model, "PNL4");
        assert_eq!(state.device_firmware, "03");
        assert!(!state.want_info);
    }

    #[test]
    fn test_identity_low_byte_first() {
        let mut state = ControlState::new(1, 0);
        // 0x4241 holds 'A' in the low byte
        decode_response(Command::GetIdentity, None, &[0x4241, 0x4443, 0x0031], &mut state).unwrap();
        assert_eq!(state.device_model, "ABCD");
        assert_eq!(state.device_firmware, "1");
    }

    #[test]
    fn test_channel_decode() {
        let mut state = ControlState::new(1, 1);
        decode_response(Command::GetChannels, None, &[0x01, 0x10, 0x0005, 0x0000], &mut state).unwrap();
        let channel = state.channels[0];
        assert_eq!(channel.comm_status, 0x01);
        assert_eq!(channel.kind, ChannelKind::Amperemeter);
        assert_eq!(channel.state_flags, 0x0);
        assert_eq!(channel.value, 5);
    }

    #[test]
    fn test_channel_decode_wide_values() {
        let mut state = ControlState::new(1, 2);
        let registers = [
            0x1FF, 0x0F, 0x5678, 0x1234,
            0x00, 0x13, 0xFFFF, 0xFFFF,
        ];
        decode_response(Command::GetChannels, None, &registers, &mut state).unwrap();
        assert_eq!(state.channels[0].comm_status, 0xFF);
        assert_eq!(state.channels[0].kind, ChannelKind::Voltmeter);
        assert_eq!(state.channels[0].state_flags, 0x0F);
        assert_eq!(state.channels[0].value, 0x1234_5678);
        assert_eq!(state.channels[1].kind, ChannelKind::Amperemeter);
        assert_eq!(state.channels[1].state_flags, 0x03);
        assert_eq!(state.channels[1].value, -1);
    }

    #[test]
    fn test_read_decodes_sync_desired() {
        let mut state = ControlState::new(1, 0);
        state.relays_desired = 0x01;
        decode_response(Command::GetRelays, None, &[0x81], &mut state).unwrap();
        assert_eq!(state.relays_desired, 0x81);
        assert_eq!(state.relays_confirmed, 0x81);

        decode_response(Command::GetDigitalOutputs, None, &[0x06], &mut state).unwrap();
        assert_eq!(state.douts_desired, 0x06);
        assert_eq!(state.douts_confirmed, 0x06);
    }

    #[test]
    fn test_short_answer() {
        let mut state = ControlState::new(1, 2);
        let before = state.clone();
        let result = decode_response(Command::GetChannels, None, &[0x01, 0x10, 0x05, 0x00], &mut state);
        assert!(result.is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_short_answer_marks_malformed() {
        let master = DummyMaster::new(2);
        let shared = ready_state(2);
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());
        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::GetChannels));
        // channel count grew while the read was in flight
        shared.lock().set_channel_count(3);
        assert_eq!(
            collector.tick(),
            TickOutcome::Failed(Command::GetChannels, CommStatus::MalformedResponse)
        );
        assert_eq!(shared.snapshot().comm_status, CommStatus::MalformedResponse);
    }

    #[test]
    fn test_shutdown_schedules_nothing() {
        let master = DummyMaster::new(2);
        let shared = ready_state(2);
        shared.request_shutdown();
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());
        assert_eq!(collector.tick(), TickOutcome::Idle);
        assert_eq!(master.request_count(), 0);
        // housekeeping still ran
        assert_eq!(master.process_calls(), 1);
        assert!(collector.is_drained());
    }

    #[test]
    fn test_no_channels_sends_no_poll() {
        let master = DummyMaster::new(0);
        let shared = ready_state(0);
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());
        for _ in 0..5 {
            assert_eq!(collector.tick(), TickOutcome::Idle);
        }
        assert_eq!(master.request_count(), 0);

        // actuator writes still go out
        shared.set_relays_desired(0x01);
        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::SetRelays));
    }

    #[test]
    fn test_shutdown_still_writes_relays() {
        let master = DummyMaster::new(2);
        let shared = ready_state(2);
        shared.set_relays_desired(0x05);
        shared.request_shutdown();
        let mut collector = ResponseCollector::new(Box::new(master.clone()), shared.clone());

        assert!(!collector.is_drained());
        assert_eq!(collector.tick(), TickOutcome::Dispatched(Command::SetRelays));
        assert!(!collector.is_drained());
        assert_eq!(collector.tick(), TickOutcome::Completed(Command::SetRelays));
        assert!(collector.is_drained());
        assert_eq!(master.register(0x300), Some(0x05));
    }
}
