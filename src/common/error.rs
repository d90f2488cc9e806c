use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    // unknown error
    UnknownError = 1000,
    // serial port could not be opened, fatal at setup
    TransportOpenFailure = 1001,
    // actuator value outside the accepted range
    ValueOutOfRange = 1002,
    // operation called in the wrong lifecycle phase
    InvalidLifecycle = 1003,
    // worker thread could not be started or joined
    WorkerFailure = 1004,
    // config file could not be parsed
    ConfigError = 1005,
}

/// error returned by the panel facade
#[derive(Debug)]
pub struct PanelError {
    pub code: ErrorCode,
    pub msg: String,
}

impl PanelError {
    pub fn new(code: ErrorCode, msg: &str) -> Self {
        PanelError { code, msg: msg.to_string() }
    }
}

impl Display for PanelError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "panel error code: {}, msg: {}", self.code as u16, self.msg)
    }
}

impl Error for PanelError {}

impl From<DriverError> for PanelError {
    fn from(e: DriverError) -> Self {
        PanelError { code: ErrorCode::UnknownError, msg: e.0 }
    }
}

// device driver error
#[derive(Debug)]
pub struct DriverError(pub String);

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "driver error msg: {}", self.0)
    }
}

impl Error for DriverError {}
