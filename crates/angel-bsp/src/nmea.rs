//! NMEA 0183 framing and GGA parsing.
//!
//! Serial bytes are assembled into lines by [`NmeaFramer`]; only lines that
//! start with the configured GGA header come out as sentences.
//!
//! Example GGA sentence:
//!
//! ```text
//! $GNGGA,012422.000,4515.9532,N,07543.7486,W,2,14,0.89,97.1,M,-34.2,M,,*77
//! ```

use crate::{GpsFix, SensorError};

/// Longest sentence we will buffer. NMEA caps sentences at 82 bytes, so this
/// leaves plenty of room for vendor extensions.
pub const LINE_BUF_SIZE: usize = 256;

pub const DEFAULT_GGA_HEADER: &str = "$GNGGA";

const GGA_LATITUDE: usize = 2;
const GGA_NS: usize = 3;
const GGA_LONGITUDE: usize = 4;
const GGA_EW: usize = 5;
const GGA_FIX_QUALITY: usize = 6;

const NO_FIX: &str = "0";

/// Byte-at-a-time line assembler.
///
/// Overflowing the buffer before a newline silently restarts the line: that
/// line's bytes are dropped and framing carries on with the next byte.
pub struct NmeaFramer {
    header: String,
    buf: [u8; LINE_BUF_SIZE],
    idx: usize,
}

impl NmeaFramer {
    pub fn new(header: &str) -> Self {
        Self { header: header.to_string(), buf: [0; LINE_BUF_SIZE], idx: 0 }
    }

    /// Feed one byte. Returns a sentence when a newline completes a line that
    /// carries the expected header.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        match byte {
            b'\n' => {
                let mut line = &self.buf[..self.idx];
                self.idx = 0;
                if let [rest @ .., b'\r'] = line { line = rest; }
                let line = String::from_utf8_lossy(line);
                if line.starts_with(&self.header) { Some(line.into_owned()) } else { None }
            }
            _ if self.idx < LINE_BUF_SIZE - 1 => {
                self.buf[self.idx] = byte;
                self.idx += 1;
                None
            }
            _ => {
                self.idx = 0;
                None
            }
        }
    }
}

/// Fields of a GGA sentence the board cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct GgaSentence {
    pub fix: GpsFix,
    pub fix_quality: String,
}

impl GgaSentence {
    pub fn has_fix(&self) -> bool {
        !self.fix_quality.is_empty() && self.fix_quality != NO_FIX
    }
}

pub fn split_fields(sentence: &str) -> Vec<&str> {
    sentence.split(',').collect()
}

pub fn parse_gga(sentence: &str) -> Result<GgaSentence, SensorError> {
    let fields = split_fields(sentence);
    if fields.len() <= GGA_FIX_QUALITY {
        return Err(SensorError::Malformed(format!("GGA with {} fields", fields.len())));
    }
    let lat = coordinate_to_degrees(fields[GGA_LATITUDE], fields[GGA_NS])?;
    let lon = coordinate_to_degrees(fields[GGA_LONGITUDE], fields[GGA_EW])?;
    Ok(GgaSentence {
        fix: GpsFix { lat, lon },
        fix_quality: fields[GGA_FIX_QUALITY].to_string(),
    })
}

/// `DDMM.MMMM` / `DDDMM.MMMM` plus hemisphere letter to signed decimal
/// degrees. An empty field is 0.0.
pub fn coordinate_to_degrees(v: &str, hemi: &str) -> Result<f64, SensorError> {
    if v.is_empty() { return Ok(0.0); }
    let raw: f64 = v.parse().map_err(|_| SensorError::Malformed(format!("coordinate {:?}", v)))?;
    let deg = (raw / 100.0).trunc();
    let min = raw - deg * 100.0;
    let out = deg + min / 60.0;
    Ok(if hemi == "S" || hemi == "W" { -out } else { out })
}
