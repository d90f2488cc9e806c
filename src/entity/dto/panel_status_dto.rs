//! link and actuator status handed to the host

use serde_derive::Serialize;
use crate::panel::control_state::ControlState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelStatusDto {
    pub model: String,
    pub firmware: String,
    pub comm_status: i16,
    pub relays: u16,
    pub douts: u16,
    // desired actuator state not yet confirmed by the board
    pub syncing: bool,
}

impl PanelStatusDto {
    pub fn from_state(state: &ControlState) -> Self {
        PanelStatusDto {
            model: state.device_model.clone(),
            firmware: state.device_firmware.clone(),
            comm_status: state.comm_status.code(),
            relays: state.relays_confirmed,
            douts: state.douts_confirmed,
            syncing: state.relays_desired != state.relays_confirmed
                || state.douts_desired != state.douts_confirmed,
        }
    }
}
