//! OPS FMCW radar wire protocol: ASCII commands terminated with CRLF, and
//! FFT frames delivered as `{"FFT":[<comma separated magnitudes>]}` lines.

use std::fmt;

use crate::SensorError;

/// FFT bins the radar reports per frame (the 1024-point FFT is symmetric,
/// so only the upper half is sent).
pub const FFT_SIZE: usize = 512;

/// Integer digits a magnitude is assumed to need when sizing the buffer.
pub const MAGNITUDE_DIGITS: usize = 4;

/// Room for `FFT_SIZE` values shaped like `1234.56,` at `F2` precision.
/// Finer precision or larger magnitudes cost the tail bins, see
/// [`bins_that_fit`].
pub const WAVEFORM_CAPACITY: usize = 8 * FFT_SIZE;

/// Worst-case bins that survive in a [`WaveformSample`] when the radar
/// reports `precision` decimals.
pub fn bins_that_fit(precision: u8) -> usize {
    let decimals = precision as usize;
    let point = usize::from(decimals > 0);
    WAVEFORM_CAPACITY / (MAGNITUDE_DIGITS + point + decimals + 1)
}

pub const FRAME_OPEN: &str = "{\"FFT\":[";
pub const FRAME_CLOSE: &str = "]}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadarCommand {
    /// Only report targets beyond 15 m, which throttles the output stream.
    QuietStream,
    FftOutputOn,
    FftOutputOff,
    AdcOutputOn,
    AdcOutputOff,
    Identify,
    JsonOutput,
    Precision(u8),
    UnitsMeters,
    SampleBuffer128,
    ZeroPad8,
    LedOn,
    LedOff,
}

impl fmt::Display for RadarCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadarCommand::QuietStream => f.write_str("r>15"),
            RadarCommand::FftOutputOn => f.write_str("oF"),
            RadarCommand::FftOutputOff => f.write_str("of"),
            RadarCommand::AdcOutputOn => f.write_str("oR"),
            RadarCommand::AdcOutputOff => f.write_str("or"),
            RadarCommand::Identify => f.write_str("??"),
            RadarCommand::JsonOutput => f.write_str("OJ"),
            RadarCommand::Precision(n) => write!(f, "F{}", n),
            RadarCommand::UnitsMeters => f.write_str("uM"),
            RadarCommand::SampleBuffer128 => f.write_str("S("),
            RadarCommand::ZeroPad8 => f.write_str("x8"),
            RadarCommand::LedOn => f.write_str("OL"),
            RadarCommand::LedOff => f.write_str("Ol"),
        }
    }
}

impl RadarCommand {
    /// Bytes as they go on the wire, CRLF included.
    pub fn wire(&self) -> Vec<u8> {
        format!("{}\r\n", self).into_bytes()
    }
}

/// Streaming is quieted and the ADC/FFT outputs are cycled before the
/// settle delay.
pub const RESET_SEQUENCE: [RadarCommand; 5] = [
    RadarCommand::QuietStream,
    RadarCommand::FftOutputOn,
    RadarCommand::FftOutputOff,
    RadarCommand::AdcOutputOn,
    RadarCommand::AdcOutputOff,
];

/// Persistent configuration applied after the identity query.
pub fn configure_sequence(precision: u8) -> [RadarCommand; 5] {
    [
        RadarCommand::JsonOutput,
        RadarCommand::Precision(precision),
        RadarCommand::UnitsMeters,
        RadarCommand::SampleBuffer128,
        RadarCommand::ZeroPad8,
    ]
}

/// Payload between the frame markers, or `None` if either marker is missing.
pub fn extract_fft_payload(line: &str) -> Option<&str> {
    let start = line.find(FRAME_OPEN)? + FRAME_OPEN.len();
    let len = line[start..].find(FRAME_CLOSE)?;
    Some(&line[start..start + len])
}

/// One FFT frame as received, held in a buffer sized once for the configured
/// FFT resolution. Longer payloads are cut at the capacity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WaveformSample {
    text: heapless::String<WAVEFORM_CAPACITY>,
}

impl WaveformSample {
    pub fn from_payload(payload: &str) -> Result<Self, SensorError> {
        if let Some(bad) = payload.chars().find(|c| !(c.is_ascii_digit() || *c == ',' || *c == '.')) {
            return Err(SensorError::Malformed(format!("unexpected {:?} in FFT payload", bad)));
        }
        let n = payload.len().min(WAVEFORM_CAPACITY);
        let mut text = heapless::String::new();
        text.push_str(&payload[..n])
            .map_err(|_| SensorError::Malformed("FFT payload over capacity".into()))?;
        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    pub fn bins(&self) -> usize {
        if self.text.is_empty() { 0 } else { self.text.matches(',').count() + 1 }
    }
}
