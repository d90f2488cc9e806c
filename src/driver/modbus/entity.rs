//! modbus entities shared between the masters and the panel worker
use std::fmt::{Display, Formatter};
use std::fmt;
use serde_derive::Serialize;
use super::prelude::*;

/// modbus exception codes returned by the slave
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    SlaveDeviceFailure,
    Acknowledge,
    SlaveDeviceBusy,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetDevice,
    Other(u8),
}

impl ExceptionCode {
    pub fn code(&self) -> u8 {
        match self {
            ExceptionCode::IllegalFunction => 0x01,
            ExceptionCode::IllegalDataAddress => 0x02,
            ExceptionCode::IllegalDataValue => 0x03,
            ExceptionCode::SlaveDeviceFailure => 0x04,
            ExceptionCode::Acknowledge => 0x05,
            ExceptionCode::SlaveDeviceBusy => 0x06,
            ExceptionCode::MemoryParityError => 0x08,
            ExceptionCode::GatewayPathUnavailable => 0x0A,
            ExceptionCode::GatewayTargetDevice => 0x0B,
            ExceptionCode::Other(code) => *code,
        }
    }
}

impl From<tokio_modbus::ExceptionCode> for ExceptionCode {
    #[allow(unreachable_patterns)]
    fn from(code: tokio_modbus::ExceptionCode) -> Self {
        use tokio_modbus::ExceptionCode as Ex;
        match code {
            Ex::IllegalFunction => ExceptionCode::IllegalFunction,
            Ex::IllegalDataAddress => ExceptionCode::IllegalDataAddress,
            Ex::IllegalDataValue => ExceptionCode::IllegalDataValue,
            Ex::ServerDeviceFailure => ExceptionCode::SlaveDeviceFailure,
            Ex::Acknowledge => ExceptionCode::Acknowledge,
            Ex::ServerDeviceBusy => ExceptionCode::SlaveDeviceBusy,
            Ex::MemoryParityError => ExceptionCode::MemoryParityError,
            Ex::GatewayPathUnavailable => ExceptionCode::GatewayPathUnavailable,
            Ex::GatewayTargetDevice => ExceptionCode::GatewayTargetDevice,
            Ex::Custom(code) => ExceptionCode::Other(code),
            _ => ExceptionCode::Other(0xFF),
        }
    }
}

/// status of the last exchange with the resource handler
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum CommStatus {
    // nothing exchanged yet
    Idle,
    // last request completed
    Ok,
    // slave answered with an exception frame
    Exception(ExceptionCode),
    // no answer within the response timeout
    Timeout,
    // serial port or framing failure
    Transport,
    // answer with fewer registers than requested
    MalformedResponse,
}

impl CommStatus {
    /// numeric form reported to the host, 5 marks a good exchange
    pub fn code(&self) -> i16 {
        match self {
            CommStatus::Idle => 0,
            CommStatus::Ok => 5,
            CommStatus::Exception(ex) => ex.code() as i16,
            CommStatus::Timeout => -1,
            CommStatus::Transport => -2,
            CommStatus::MalformedResponse => -3,
        }
    }
}

impl Default for CommStatus {
    fn default() -> Self {
        CommStatus::Idle
    }
}

impl Display for CommStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CommStatus::Exception(ex) => write!(f, "{:?}({})", ex, self.code()),
            _ => write!(f, "{:?}({})", self, self.code()),
        }
    }
}

/// result of polling the outstanding request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterStatus {
    Busy,
    // registers read back, empty for writes
    Ok(Vec<ModbusValueSize>),
    Error(CommStatus),
}

/// one request as submitted to a master
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModbusRequestBo {
    ReadRegisters {
        unit: ModbusUnitSize,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    },
    WriteRegister {
        unit: ModbusUnitSize,
        address: ModbusAddrSize,
        value: ModbusValueSize,
    },
    WriteRegisters {
        unit: ModbusUnitSize,
        start_address: ModbusAddrSize,
        values: Vec<ModbusValueSize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comm_status_code() {
        assert_eq!(CommStatus::default().code(), 0);
        assert_eq!(CommStatus::Ok.code(), 5);
        assert_eq!(CommStatus::Exception(ExceptionCode::IllegalDataAddress).code(), 2);
        assert_eq!(CommStatus::Exception(ExceptionCode::Other(0x42)).code(), 0x42);
        assert_eq!(CommStatus::Timeout.code(), -1);
    }

    #[test]
    fn test_from_tokio_modbus() {
        let code: ExceptionCode = tokio_modbus::ExceptionCode::ServerDeviceFailure.into();
        assert_eq!(code, ExceptionCode::SlaveDeviceFailure);
        assert_eq!(code.code(), 4);
    }

    #[test]
    fn test_display() {
        let status = CommStatus::Exception(ExceptionCode::IllegalFunction);
        assert_eq!(status.to_string(), "IllegalFunction(1)");
        assert_eq!(CommStatus::Ok.to_string(), "Ok(5)");
    }
}
