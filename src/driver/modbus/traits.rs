use super::entity::{MasterStatus, ModbusRequestBo};
use super::prelude::*;
use crate::common::error::DriverError;

/// a modbus master that keeps at most one request in flight
/// - submitting returns as soon as the request is handed to the bus
/// - completion is observed later through `read_status`
pub trait ModbusMaster {
    /// housekeeping, must be called once per loop iteration
    fn process(&mut self);

    /// read holding registers (fc 0x03)
    fn read_registers(
        &mut self,
        unit: ModbusUnitSize,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<(), DriverError>;

    /// write single register (fc 0x06)
    fn write_register(
        &mut self,
        unit: ModbusUnitSize,
        address: ModbusAddrSize,
        value: ModbusValueSize,
    ) -> Result<(), DriverError>;

    /// write multiple registers (fc 0x10)
    fn write_registers(
        &mut self,
        unit: ModbusUnitSize,
        start_address: ModbusAddrSize,
        values: &[ModbusValueSize],
    ) -> Result<(), DriverError>;

    /// submit a prepared request through the matching function code
    fn send_request(&mut self, request: &ModbusRequestBo) -> Result<(), DriverError> {
        match request {
            ModbusRequestBo::ReadRegisters { unit, address, count } => self.read_registers(*unit, *address, *count),
            ModbusRequestBo::WriteRegister { unit, address, value } => self.write_register(*unit, *address, *value),
            ModbusRequestBo::WriteRegisters { unit, start_address, values } => {
                self.write_registers(*unit, *start_address, values)
            }
        }
    }

    /// non blocking status of the last submitted request
    fn read_status(&mut self) -> MasterStatus;

    /// release the underlying transport
    fn close(&mut self);
}
