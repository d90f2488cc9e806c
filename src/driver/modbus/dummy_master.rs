//! simulated resource handler, used when running with mode=dummy and in tests
//! - keeps a register map of the panel board
//! - answers one `process` call after submission, or later when busy polls are set
//! - errors and refused sends can be injected
//! cloning gives another handle to the same simulated device

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::entity::{CommStatus, ExceptionCode, MasterStatus, ModbusRequestBo};
use super::prelude::*;
use super::traits::ModbusMaster;
use crate::common::error::DriverError;
use crate::{info, trace};

const LOG_TAG: &str = "dummy_master";

const DUMMY_MODEL: [u8; 4] = *b"RH10";
const DUMMY_FIRMWARE: [u8; 2] = *b"12";
// submitted requests kept for inspection, older ones are dropped
pub const RECENT_REQUESTS: usize = 64;

#[derive(Debug)]
struct DummyDevice {
    registers: HashMap<ModbusAddrSize, ModbusValueSize>,
    requests: VecDeque<ModbusRequestBo>,
    request_count: usize,
    busy_polls: u32,
    injected: VecDeque<CommStatus>,
    refused_sends: u32,
    // request and the polls left before it resolves
    in_flight: Option<(ModbusRequestBo, u32)>,
    status: MasterStatus,
    process_calls: u64,
    closed: bool,
}

#[derive(Debug, Clone)]
pub struct DummyMaster {
    device: Arc<Mutex<DummyDevice>>,
}

/// two ascii bytes in one register, low byte first
pub fn pack_ascii(low: u8, high: u8) -> ModbusValueSize {
    (low as ModbusValueSize) | ((high as ModbusValueSize) << 8)
}

impl DummyMaster {
    /// a board with identity, relays, douts and `channel_count` multimeter channels
    pub fn new(channel_count: usize) -> Self {
        let mut registers = HashMap::new();
        registers.insert(0x000, pack_ascii(DUMMY_MODEL[0], DUMMY_MODEL[1]));
        registers.insert(0x001, pack_ascii(DUMMY_MODEL[2], DUMMY_MODEL[3]));
        registers.insert(0x002, pack_ascii(DUMMY_FIRMWARE[0], DUMMY_FIRMWARE[1]));
        registers.insert(0x200, 0);
        registers.insert(0x300, 0);

        // even channels are voltmeters, odd ones amperemeters, all active
        for i in 0..channel_count {
            let base = 0x400 + (i as ModbusAddrSize) * 4;
            let value = 1000 * (i as u32 + 1);
            registers.insert(base, 0x01);
            registers.insert(base + 1, (((i % 2) as ModbusValueSize) << 4) | 0x01);
            registers.insert(base + 2, (value & 0xFFFF) as ModbusValueSize);
            registers.insert(base + 3, (value >> 16) as ModbusValueSize);
        }

        DummyMaster {
            device: Arc::new(Mutex::new(DummyDevice {
                registers,
                requests: VecDeque::with_capacity(RECENT_REQUESTS),
                request_count: 0,
                busy_polls: 0,
                injected: VecDeque::new(),
                refused_sends: 0,
                in_flight: None,
                status: MasterStatus::Error(CommStatus::Idle),
                process_calls: 0,
                closed: false,
            })),
        }
    }

    fn device(&self) -> MutexGuard<'_, DummyDevice> {
        // a panicking test thread must not hide the device from the others
        self.device.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_register(&self, address: ModbusAddrSize, value: ModbusValueSize) {
        self.device().registers.insert(address, value);
    }

    pub fn register(&self, address: ModbusAddrSize) -> Option<ModbusValueSize> {
        self.device().registers.get(&address).copied()
    }

    /// number of `process` calls a request stays busy
    pub fn set_busy_polls(&self, polls: u32) {
        self.device().busy_polls = polls;
    }

    /// the next request resolves with this error instead of touching the registers
    pub fn fail_next(&self, status: CommStatus) {
        self.device().injected.push_back(status);
    }

    /// refuse the next `count` submissions as if the port could not send
    pub fn refuse_next_sends(&self, count: u32) {
        self.device().refused_sends = count;
    }

    /// the last `RECENT_REQUESTS` submissions, oldest first
    pub fn requests(&self) -> Vec<ModbusRequestBo> {
        self.device().requests.iter().cloned().collect()
    }

    /// all submissions since creation
    pub fn request_count(&self) -> usize {
        self.device().request_count
    }

    pub fn process_calls(&self) -> u64 {
        self.device().process_calls
    }

    pub fn has_in_flight(&self) -> bool {
        self.device().in_flight.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.device().closed
    }

    fn submit(&mut self, request: ModbusRequestBo) -> Result<(), DriverError> {
        let mut device = self.device();
        if device.closed {
            return Err(DriverError("dummy master is closed".to_string()));
        }
        if device.refused_sends > 0 {
            device.refused_sends -= 1;
            return Err(DriverError(format!("dummy master, simulated send failure for {:?}", request)));
        }
        if device.in_flight.is_some() {
            return Err(DriverError("dummy master, a request is already in flight".to_string()));
        }
        trace!(LOG_TAG, "simulated submit {:?}", request);
        let busy_polls = device.busy_polls;
        if device.requests.len() == RECENT_REQUESTS {
            device.requests.pop_front();
        }
        device.requests.push_back(request.clone());
        device.request_count += 1;
        device.in_flight = Some((request, busy_polls));
        device.status = MasterStatus::Busy;
        Ok(())
    }
}

impl DummyDevice {
    fn execute(&mut self, request: &ModbusRequestBo) -> MasterStatus {
        if let Some(status) = self.injected.pop_front() {
            return MasterStatus::Error(status);
        }
        let illegal_address = MasterStatus::Error(CommStatus::Exception(ExceptionCode::IllegalDataAddress));
        match request {
            ModbusRequestBo::ReadRegisters { address, count, .. } => {
                let mut values = Vec::with_capacity(*count as usize);
                for offset in 0..*count {
                    match self.registers.get(&(address + offset)) {
                        Some(value) => values.push(*value),
                        None => return illegal_address,
                    }
                }
                MasterStatus::Ok(values)
            }
            ModbusRequestBo::WriteRegister { address, value, .. } => {
                if !self.registers.contains_key(address) {
                    return illegal_address;
                }
                self.registers.insert(*address, *value);
                MasterStatus::Ok(Vec::new())
            }
            ModbusRequestBo::WriteRegisters { start_address, values, .. } => {
                let in_map = (0..values.len() as ModbusAddrSize)
                    .all(|offset| self.registers.contains_key(&(start_address + offset)));
                if !in_map {
                    return illegal_address;
                }
                for (offset, value) in values.iter().enumerate() {
                    self.registers.insert(start_address + offset as ModbusAddrSize, *value);
                }
                MasterStatus::Ok(Vec::new())
            }
        }
    }
}

impl ModbusMaster for DummyMaster {
    fn process(&mut self) {
        let mut device = self.device();
        device.process_calls += 1;
        let Some((request, polls_left)) = device.in_flight.take() else {
            return;
        };
        if polls_left > 0 {
            device.in_flight = Some((request, polls_left - 1));
            return;
        }
        let status = device.execute(&request);
        trace!(LOG_TAG, "simulated answer {:?} for {:?}", status, request);
        device.status = status;
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
        self.device().status.clone()
    }

    fn close(&mut self) {
        let mut device = self.device();
        device.closed = true;
        device.in_flight = None;
        info!(LOG_TAG, "dummy master closed after {} requests", device.request_count);
    }
}
