//! serial port transport used by the modbus rtu master

pub mod serial_transport;
