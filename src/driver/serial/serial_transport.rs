//! serial port transport
//! 8 data bits, no parity, 1 stop bit
//! must be called inside a tokio runtime context, the stream registers with its reactor

use tokio_serial::{ClearBuffer, DataBits, Parity, SerialPort, SerialStream, StopBits};
use crate::common::error::DriverError;
use crate::{info, warn};

const LOG_TAG: &str = "serial_transport";

/// open the port and drop anything left in its buffers
pub fn open(serial_port: &str, baudrate: u32) -> Result<SerialStream, DriverError> {
    let builder = tokio_serial::new(serial_port, baudrate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One);

    let port = SerialStream::open(&builder).map_err(|e| {
        DriverError(format!(
            "cannot open serial port {} at {} bps, check that no other program uses it and that the user may access it (chmod a+rw {}), exception: {}",
            serial_port, baudrate, serial_port, e
        ))
    })?;

    if let Err(e) = port.clear(ClearBuffer::All) {
        warn!(LOG_TAG, "cannot clear buffers of {}, exception: {}", serial_port, e);
    }

    info!(LOG_TAG, "serial port {} opened at {} bps", serial_port, baudrate);
    Ok(port)
}
