//! modbus master drivers
//! - one request in flight at a time, status polled without blocking
//! - `RtuMaster` talks to the real bus through tokio-modbus
//! - `DummyMaster` simulates the resource handler when running with mode=dummy

pub mod prelude;
pub mod entity;
pub mod traits;
pub mod rtu_master;
pub mod dummy_master;
