//! shared control record
//! - desired relays/douts are written by the host through `SharedControlState`
//! - confirmed values, identity, channels and comm status are written by the worker only
//! - the host reads consistent snapshots, never the live record

use std::sync::{Arc, Mutex, MutexGuard};
use serde_derive::Serialize;

use super::entity::{ChannelReading, FunctionMode};
use super::prelude::*;
use crate::driver::modbus::entity::CommStatus;
use crate::driver::modbus::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    pub function_mode: FunctionMode,
    pub slave_id: ModbusUnitSize,
    // true until the identity block was read once
    pub want_info: bool,
    pub relays_desired: ModbusValueSize,
    pub relays_confirmed: ModbusValueSize,
    pub douts_desired: ModbusValueSize,
    pub douts_confirmed: ModbusValueSize,
    channel_count: usize,
    pub comm_status: CommStatus,
    pub device_model: String,
    pub device_firmware: String,
    pub channels: [ChannelReading; MAX_CHANNELS],
    pub shutdown_requested: bool,
}

impl ControlState {
    /// `channel_count` is clamped to `MAX_CHANNELS`
    pub fn new(slave_id: ModbusUnitSize, channel_count: usize) -> Self {
        ControlState {
            function_mode: FunctionMode::PanelElectric,
            slave_id,
            want_info: true,
            relays_desired: 0,
            relays_confirmed: 0,
            douts_desired: 0,
            douts_confirmed: 0,
            channel_count: channel_count.min(MAX_CHANNELS),
            comm_status: CommStatus::Idle,
            device_model: String::new(),
            device_firmware: String::new(),
            channels: [ChannelReading::default(); MAX_CHANNELS],
            shutdown_requested: false,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn set_channel_count(&mut self, channel_count: usize) {
        self.channel_count = channel_count.min(MAX_CHANNELS);
    }

    /// the channels currently polled
    pub fn active_channels(&self) -> &[ChannelReading] {
        &self.channels[..self.channel_count]
    }
}

impl Default for ControlState {
    fn default() -> Self {
        ControlState::new(1, MAX_CHANNELS)
    }
}

/// control record shared between the worker and the host
#[derive(Debug, Clone, Default)]
pub struct SharedControlState {
    inner: Arc<Mutex<ControlState>>,
}

impl SharedControlState {
    pub fn new(state: ControlState) -> Self {
        SharedControlState { inner: Arc::new(Mutex::new(state)) }
    }

    /// worker side access to the live record
    pub(crate) fn lock(&self) -> MutexGuard<'_, ControlState> {
        // the record stays usable even if a holder panicked
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> ControlState {
        self.lock().clone()
    }

    /// back to creation defaults, keeps nothing from a previous run
    pub fn reset(&self, slave_id: ModbusUnitSize, channel_count: usize) {
        *self.lock() = ControlState::new(slave_id, channel_count);
    }

    pub fn set_relays_desired(&self, relays: ModbusValueSize) {
        self.lock().relays_desired = relays;
    }

    pub fn set_douts_desired(&self, douts: ModbusValueSize) {
        self.lock().douts_desired = douts;
    }

    /// fetch the identity block again on the next free tick
    pub fn request_info(&self) {
        self.lock().want_info = true;
    }

    pub fn request_shutdown(&self) {
        self.lock().shutdown_requested = true;
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.lock().shutdown_requested
    }
}
