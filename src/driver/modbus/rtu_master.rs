//! Modbus RTU master over a serial port
//! - owns a small tokio runtime, each request runs as a task on it
//! - the worker loop never blocks on the bus: submit, then poll `read_status` every tick
//! - the modbus context travels into the task and comes back with the answer

use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

use super::entity::{CommStatus, MasterStatus, ModbusRequestBo};
use super::prelude::*;
use super::traits::ModbusMaster;
use crate::common::error::DriverError;
use crate::driver::serial::serial_transport;
use crate::{debug, error, info, warn};

const LOG_TAG: &str = "rtu_master";

type InFlight = oneshot::Receiver<(Context, MasterStatus)>;

pub struct RtuMaster {
    serial_port: String,
    runtime: Runtime,
    // None while a request owns it, or after close
    context: Option<Context>,
    timeout: Duration,
    in_flight: Option<InFlight>,
    status: MasterStatus,
}

impl RtuMaster {
    /// opens the port, fails when the port cannot be opened
    pub fn open(serial_port: &str, baudrate: u32, timeout_ms: u64) -> Result<Self, DriverError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("rtu-master")
            .enable_all()
            .build()
            .map_err(|e| DriverError(format!("cannot start rtu master runtime, exception: {}", e)))?;

        let context = {
            let _guard = runtime.enter();
            let port = serial_transport::open(serial_port, baudrate)?;
            rtu::attach_slave(port, Slave::broadcast())
        };

        info!(LOG_TAG, "rtu master ready on {}, response timeout {} ms", serial_port, timeout_ms);

        Ok(RtuMaster {
            serial_port: serial_port.to_string(),
            runtime,
            context: Some(context),
            timeout: Duration::from_millis(timeout_ms),
            in_flight: None,
            status: MasterStatus::Error(CommStatus::Idle),
        })
    }

    /// hand the request to the runtime
    fn submit(&mut self, request: ModbusRequestBo) -> Result<(), DriverError> {
        if self.in_flight.is_some() {
            return Err(DriverError(format!("rtu master {}, a request is already in flight", self.serial_port)));
        }
        let mut context = self.context.take().ok_or(DriverError(format!(
            "rtu master {}, transport is closed", self.serial_port
        )))?;

        debug!(LOG_TAG, "submit {:?}", request);

        let (tx, rx) = oneshot::channel();
        let timeout = self.timeout;
        self.runtime.spawn(async move {
            let status = match tokio::time::timeout(timeout, execute(&mut context, &request)).await {
                Err(_) => MasterStatus::Error(CommStatus::Timeout),
                Ok(Err(e)) => {
                    error!(LOG_TAG, "request {:?} failed on transport, exception: {}", request, e);
                    MasterStatus::Error(CommStatus::Transport)
                }
                Ok(Ok(Err(exception))) => MasterStatus::Error(CommStatus::Exception(exception.into())),
                Ok(Ok(Ok(registers))) => MasterStatus::Ok(registers),
            };
            // the receiver is gone only after close
            let _ = tx.send((context, status));
        });

        self.in_flight = Some(rx);
        self.status = MasterStatus::Busy;
        Ok(())
    }
}

async fn execute(context: &mut Context, request: &ModbusRequestBo) -> tokio_modbus::Result<Vec<ModbusValueSize>> {
    match request {
        ModbusRequestBo::ReadRegisters { unit, address, count } => {
            context.set_slave(Slave(*unit));
            context.read_holding_registers(*address, *count).await
        }
        ModbusRequestBo::WriteRegister { unit, address, value } => {
            context.set_slave(Slave(*unit));
            context
                .write_single_register(*address, *value)
                .await
                .map(|result| result.map(|_| Vec::new()))
        }
        ModbusRequestBo::WriteRegisters { unit, start_address, values } => {
            context.set_slave(Slave(*unit));
            context
                .write_multiple_registers(*start_address, values)
                .await
                .map(|result| result.map(|_| Vec::new()))
        }
    }
}

impl ModbusMaster for RtuMaster {
    fn process(&mut self) {
        let Some(rx) = self.in_flight.as_mut() else {
            return;
        };
        match rx.try_recv() {
            Ok((context, status)) => {
                self.context = Some(context);
                self.status = status;
                self.in_flight = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Closed) => {
                // the task died and took the context with it
                error!(LOG_TAG, "rtu master {}, request task lost, transport unusable", self.serial_port);
                self.status = MasterStatus::Error(CommStatus::Transport);
                self.in_flight = None;
            }
        }
    }

    fn read_registers(&mut self, unit: ModbusUnitSize, address: ModbusAddrSize, count: ModbusAddrSize) -> Result<(), DriverError> {
        self.submit(ModbusRequestBo::ReadRegisters { unit, address, count })
    }

    fn write_register(&mut self, unit: ModbusUnitSize, address: ModbusAddrSize, value: ModbusValueSize) -> Result<(), DriverError> {
        self.submit(ModbusRequestBo::WriteRegister { unit, address, value })
    }

    fn write_registers(&mut self, unit: ModbusUnitSize, start_address: ModbusAddrSize, values: &[ModbusValueSize]) -> Result<(), DriverError> {
        self.submit(ModbusRequestBo::WriteRegisters { unit, start_address, values: values.to_vec() })
    }

    fn read_status(&mut self) -> MasterStatus {
        self.status.clone()
    }

    fn close(&mut self) {
        if self.in_flight.take().is_some() {
            warn!(LOG_TAG, "rtu master {}, closing with a request in flight, answer dropped", self.serial_port);
        }
        if let Some(mut context) = self.context.take() {
            if let Err(e) = self.runtime.block_on(context.disconnect()) {
                warn!(LOG_TAG, "rtu master {}, disconnect failed, exception: {}", self.serial_port, e);
            }
        }
        info!(LOG_TAG, "rtu master {} closed", self.serial_port);
    }
}
