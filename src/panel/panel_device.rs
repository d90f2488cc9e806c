//! panel facade used by the host
//! lifecycle: setup (open the bus) -> run (start the worker) -> update / get_values -> exit
//! the host never touches confirmed values, it writes desired relays and reads snapshots

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::control_state::{ControlState, SharedControlState};
use super::collector::ResponseCollector;
use super::panel_thread;
use super::prelude::*;
use crate::common::error::{ErrorCode, PanelError};
use crate::common::setting::{Panel as PanelSettings, Serial as SerialSettings, Settings};
use crate::driver::modbus::dummy_master::DummyMaster;
use crate::driver::modbus::entity::CommStatus;
use crate::driver::modbus::prelude::*;
use crate::driver::modbus::rtu_master::RtuMaster;
use crate::driver::modbus::traits::ModbusMaster;
use crate::entity::dto::panel_status_dto::PanelStatusDto;
use crate::entity::dto::panel_values_dto::PanelValuesDto;
use crate::{error, info, warn};

const LOG_TAG: &str = "panel_device";
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct Panel {
    serial: SerialSettings,
    panel: PanelSettings,
    state: SharedControlState,
    // opened by setup, moved into the worker by run
    master: Option<Box<dyn ModbusMaster + Send>>,
    worker: Option<JoinHandle<()>>,
}

fn check_relays(relays: i64) -> Result<ModbusValueSize, PanelError> {
    if !(0..=MAX_RELAY_MASK).contains(&relays) {
        return Err(PanelError::new(
            ErrorCode::ValueOutOfRange,
            &format!("relay mask {} outside 0..={}", relays, MAX_RELAY_MASK),
        ));
    }
    Ok(relays as ModbusValueSize)
}

impl Panel {
    pub fn new(serial: SerialSettings, panel: PanelSettings) -> Self {
        let state = SharedControlState::new(ControlState::new(panel.slave_id, panel.channel_count));
        Panel {
            serial,
            panel,
            state,
            master: None,
            worker: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Panel::new(settings.serial.clone(), settings.panel.clone())
    }

    /// use an already opened master, setup then has nothing left to open
    pub fn with_master(serial: SerialSettings, panel: PanelSettings, master: Box<dyn ModbusMaster + Send>) -> Self {
        let mut this = Panel::new(serial, panel);
        this.master = Some(master);
        this
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// open the transport and the modbus master
    /// fails only when the serial port cannot be opened
    pub fn setup(&mut self) -> Result<(), PanelError> {
        if self.is_running() {
            return Err(PanelError::new(ErrorCode::InvalidLifecycle, "setup called while the worker is running"));
        }
        if self.master.is_some() {
            return Ok(());
        }

        if self.panel.is_dummy() {
            info!(LOG_TAG, "dummy mode, serial port {} will not be opened", self.serial.port);
            self.master = Some(Box::new(DummyMaster::new(self.panel.channel_count)));
            return Ok(());
        }

        let master = RtuMaster::open(&self.serial.port, self.serial.baudrate, self.serial.timeout_ms).map_err(|e| {
            error!(LOG_TAG, "{}", e);
            PanelError::new(ErrorCode::TransportOpenFailure, &e.0)
        })?;
        self.master = Some(Box::new(master));
        Ok(())
    }

    /// reset the control record and start the worker
    pub fn run(&mut self) -> Result<(), PanelError> {
        if self.is_running() {
            return Err(PanelError::new(ErrorCode::InvalidLifecycle, "worker already running"));
        }
        let master = self.master.take().ok_or(PanelError::new(
            ErrorCode::InvalidLifecycle,
            "run called before setup",
        ))?;

        self.state.reset(self.panel.slave_id, self.panel.channel_count);
        let collector = ResponseCollector::new(master, self.state.clone());
        let handle = panel_thread::spawn(
            collector,
            Duration::from_millis(self.panel.tick_interval_ms),
            self.panel.shutdown_grace_ticks,
        )?;
        self.worker = Some(handle);
        info!(LOG_TAG, "panel running, slave {}, {} channels", self.panel.slave_id, self.panel.channel_count);
        Ok(())
    }

    /// new relay mask, accepted range 0..=256
    pub fn update(&self, relays: i64) -> Result<(), PanelError> {
        let relays = check_relays(relays)?;
        self.state.set_relays_desired(relays);
        Ok(())
    }

    pub fn set_digital_outputs(&self, douts: ModbusValueSize) {
        self.state.set_douts_desired(douts);
    }

    /// fetch model and firmware again
    pub fn refresh_identity(&self) {
        self.state.request_info();
    }

    /// write the final relay mask, wait up to the exit grace for the board to
    /// confirm it, then stop
    /// the worker keeps draining the write for its shutdown grace ticks if the
    /// confirmation has not arrived yet
    pub fn exit(&mut self, final_relays: i64) -> Result<(), PanelError> {
        let relays = check_relays(final_relays)?;
        self.state.set_relays_desired(relays);
        info!(LOG_TAG, "exit, final relays 0x{:x}", relays);

        if self.is_running() {
            let deadline = Instant::now() + Duration::from_millis(self.panel.exit_grace_ms);
            while self.state.snapshot().relays_confirmed != relays && Instant::now() < deadline {
                thread::sleep(EXIT_POLL_INTERVAL);
            }
        }
        self.stop()
    }

    fn stop(&mut self) -> Result<(), PanelError> {
        self.state.request_shutdown();
        if let Some(handle) = self.worker.take() {
            handle.join().map_err(|_| PanelError::new(ErrorCode::WorkerFailure, "panel worker panicked"))?;
        }
        // opened but never run
        if let Some(mut master) = self.master.take() {
            master.close();
        }
        Ok(())
    }

    pub fn get_values(&self) -> PanelValuesDto {
        PanelValuesDto::from_state(&self.state.snapshot())
    }

    pub fn get_status(&self) -> PanelStatusDto {
        PanelStatusDto::from_state(&self.state.snapshot())
    }

    pub fn comm_status(&self) -> CommStatus {
        self.state.snapshot().comm_status
    }

    pub fn snapshot(&self) -> ControlState {
        self.state.snapshot()
    }
}

impl Drop for Panel {
    fn drop(&mut self) {
        if self.worker.is_some() || self.master.is_some() {
            if let Err(e) = self.stop() {
                warn!(LOG_TAG, "panel dropped without clean stop, {}", e);
            }
        }
    }
}
