pub mod modbus;
pub mod serial;
