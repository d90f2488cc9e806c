//! panel device engine
//! polls the panel electric resource handler over modbus rtu and keeps a
//! shared control record of desired and confirmed actuator state

pub mod common;
pub mod driver;
pub mod entity;
pub mod panel;
