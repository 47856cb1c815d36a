use thiserror::Error;

/// Failure causes reported by the sensor drivers.
///
/// Callers above the driver layer treat every variant the same way; the
/// distinct [`SensorError::code`] values only exist so logs can tell causes apart.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("open {device}: {reason}")]
    Open { device: String, reason: String },

    #[error("configure {device}: {reason}")]
    Configure { device: String, reason: String },

    #[error("no usable fix within {0}s")]
    InitTimeout(u64),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    #[error("device disconnected")]
    Disconnected,

    #[error("read timed out after {0} ms")]
    ReadTimeout(u64),

    #[error("no valid frame after {0} attempts")]
    NoFrame(u8),

    #[error("malformed data: {0}")]
    Malformed(String),

    #[error("unexpected device id {0:#06x}")]
    DeviceId(u16),
}

impl SensorError {
    /// Small negative result code, one per cause. Zero is reserved for success.
    pub fn code(&self) -> i8 {
        match self {
            SensorError::Open { .. } => -1,
            SensorError::Configure { .. } => -2,
            SensorError::InitTimeout(_) => -3,
            SensorError::Io(_) => -4,
            SensorError::ShortWrite { .. } => -5,
            SensorError::Disconnected => -6,
            SensorError::ReadTimeout(_) => -7,
            SensorError::NoFrame(_) => -8,
            SensorError::Malformed(_) => -9,
            SensorError::DeviceId(_) => -10,
        }
    }
}
