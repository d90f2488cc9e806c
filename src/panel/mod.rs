//! panel electric experiment
//! polls one resource handler over modbus, keeps desired and confirmed
//! actuator state in a shared control record

pub mod prelude;
pub mod entity;
pub mod control_state;
pub mod scheduler;
pub mod dispatcher;
pub mod collector;
pub mod panel_thread;
pub mod panel_device;
