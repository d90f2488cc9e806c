//! multimeter readings handed to the host

use serde_derive::Serialize;
use crate::panel::control_state::ControlState;
use crate::panel::entity::ChannelKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelValuesDto {
    // readings of amperemeter channels, in channel order
    pub amperemeter: Vec<i32>,
    // readings of voltmeter channels, in channel order
    pub voltmeter: Vec<i32>,
}

impl PanelValuesDto {
    /// inactive channels read as 0
    pub fn from_state(state: &ControlState) -> Self {
        let mut amperemeter = Vec::new();
        let mut voltmeter = Vec::new();
        for channel in state.active_channels() {
            let value = if channel.is_active() { channel.value } else { 0 };
            match channel.kind {
                ChannelKind::Amperemeter => amperemeter.push(value),
                ChannelKind::Voltmeter => voltmeter.push(value),
            }
        }
        PanelValuesDto { amperemeter, voltmeter }
    }
}
