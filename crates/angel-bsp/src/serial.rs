use std::time::Duration;

use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::debug;

use crate::SensorError;

/// Opens a serial device 8N1 with no flow control, then discards whatever
/// the device queued before we attached.
pub fn open_8n1(dev: &str, baud: u32) -> Result<SerialStream, SensorError> {
    let port = tokio_serial::new(dev, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(100))
        .open_native_async()
        .map_err(|e| SensorError::Open { device: dev.to_string(), reason: e.to_string() })?;

    port.clear(ClearBuffer::Input)
        .map_err(|e| SensorError::Configure { device: dev.to_string(), reason: e.to_string() })?;

    debug!("serial: opened {} @ {} 8N1", dev, baud);
    Ok(port)
}
