//! turns a command into one modbus request and submits it
//!
//! | command           | dir   | addr  | count           | value          |
//! |-------------------|-------|-------|-----------------|----------------|
//! | GetIdentity       | read  | 0x000 | 3               |                |
//! | GetDigitalOutputs | read  | 0x200 | 1               |                |
//! | SetDigitalOutputs | write | 0x200 | 1               | douts_desired  |
//! | GetRelays         | read  | 0x300 | 1               |                |
//! | SetRelays         | write | 0x300 | 1               | relays_desired |
//! | GetChannels       | read  | 0x400 | channel_count*4 |                |
//!
//! only one request may be outstanding, a dispatch while pending is dropped

use super::control_state::ControlState;
use super::entity::{Command, LinkState};
use super::prelude::*;
use crate::common::error::DriverError;
use crate::driver::modbus::entity::ModbusRequestBo;
use crate::driver::modbus::prelude::*;
use crate::driver::modbus::traits::ModbusMaster;
use crate::{debug, trace, warn};

const LOG_TAG: &str = "dispatcher";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    // submitted, link is pending
    Sent,
    // a request was already outstanding, nothing done
    Dropped,
}

/// request for a command, values taken from the desired state
pub fn build_request(command: Command, state: &ControlState) -> ModbusRequestBo {
    let unit = state.slave_id;
    match command {
        Command::GetIdentity => ModbusRequestBo::ReadRegisters { unit, address: ADDR_IDENTITY, count: IDENTITY_REGS },
        Command::GetDigitalOutputs => ModbusRequestBo::ReadRegisters { unit, address: ADDR_DOUTS, count: 1 },
        Command::SetDigitalOutputs => ModbusRequestBo::WriteRegister { unit, address: ADDR_DOUTS, value: state.douts_desired },
        Command::GetRelays => ModbusRequestBo::ReadRegisters { unit, address: ADDR_RELAYS, count: 1 },
        Command::SetRelays => ModbusRequestBo::WriteRegister { unit, address: ADDR_RELAYS, value: state.relays_desired },
        Command::GetChannels => ModbusRequestBo::ReadRegisters {
            unit,
            address: ADDR_CHANNELS,
            count: state.channel_count() as ModbusAddrSize * REGS_PER_CHANNEL,
        },
    }
}

pub struct RequestDispatcher {
    master: Box<dyn ModbusMaster + Send>,
    link: LinkState,
    // value carried by the outstanding write
    written: Option<ModbusValueSize>,
}

impl RequestDispatcher {
    pub fn new(master: Box<dyn ModbusMaster + Send>) -> Self {
        RequestDispatcher { master, link: LinkState::Idle, written: None }
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.link, LinkState::Pending(_))
    }

    /// value sent by the outstanding write, None for reads
    pub fn written_value(&self) -> Option<ModbusValueSize> {
        self.written
    }

    pub fn master_mut(&mut self) -> &mut (dyn ModbusMaster + Send) {
        self.master.as_mut()
    }

    /// submit `command`, or drop it when a request is outstanding
    /// on a send failure the link stays idle and the error is returned
    pub fn dispatch(&mut self, command: Command, state: &ControlState) -> Result<DispatchOutcome, DriverError> {
        if let LinkState::Pending(pending) = self.link {
            trace!(LOG_TAG, "{:?} dropped, {:?} still outstanding", command, pending);
            return Ok(DispatchOutcome::Dropped);
        }

        let request = build_request(command, state);
        debug!(LOG_TAG, "{:?} -> {:?}", command, request);

        match self.master.send_request(&request) {
            Ok(()) => {
                self.link = LinkState::Pending(command);
                self.written = match request {
                    ModbusRequestBo::WriteRegister { value, .. } => Some(value),
                    _ => None,
                };
                Ok(DispatchOutcome::Sent)
            }
            Err(e) => {
                warn!(LOG_TAG, "cannot send {:?}, slave {}, exception: {}", command, state.slave_id, e);
                Err(e)
            }
        }
    }

    /// pending -> idle, returns the command that was outstanding
    pub fn complete(&mut self) -> Option<Command> {
        self.written = None;
        match std::mem::replace(&mut self.link, LinkState::Idle) {
            LinkState::Pending(command) => Some(command),
            LinkState::Idle => None,
        }
    }

    pub fn close(&mut self) {
        self.master.close();
        self.link = LinkState::Idle;
        self.written = None;
    }
}
