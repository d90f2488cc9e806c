//! panel entities
use serde_derive::Serialize;

/// commands the worker can send to the resource handler
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    // model and firmware
    GetIdentity,
    GetDigitalOutputs,
    SetDigitalOutputs,
    GetRelays,
    SetRelays,
    // multimeter readings, the default poll
    GetChannels,
}

/// behaviour this instance drives on the resource handler
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum FunctionMode {
    PanelElectric,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ChannelKind {
    Voltmeter,
    Amperemeter,
}

impl ChannelKind {
    /// kind bit of the channel flags register
    pub fn from_bit(bit: u16) -> Self {
        if bit & 0x1 == 1 {
            ChannelKind::Amperemeter
        } else {
            ChannelKind::Voltmeter
        }
    }
}

/// one multimeter channel as last decoded
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReading {
    // status byte reported by the multimeter itself
    pub comm_status: u8,
    pub kind: ChannelKind,
    // non zero means the channel is active
    pub state_flags: u8,
    pub value: i32,
}

impl ChannelReading {
    pub fn is_active(&self) -> bool {
        self.state_flags != 0
    }
}

impl Default for ChannelReading {
    fn default() -> Self {
        ChannelReading {
            comm_status: 0,
            kind: ChannelKind::Voltmeter,
            state_flags: 0,
            value: 0,
        }
    }
}

/// request correlation state of the worker
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Pending(Command),
}
