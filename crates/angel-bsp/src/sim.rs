//! Bench drivers that stand in for the hardware: recorded FFT frames, a
//! fixed temperature and a replayed NMEA log.

use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::gps::{GpsConfig, NmeaGps};
use crate::ops_proto::extract_fft_payload;
use crate::{FmcwRadar, SensorError, TemperatureReading, TemperatureSensor, WaveformSample};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub enable: bool,
    /// One FFT frame per line, bare or wrapped in `{"FFT":[...]}`.
    pub radar_fft_path: String,
    pub temperature_c: f64,
    /// NMEA log replayed in place of the receiver; the real GPS is used when unset.
    pub nmea_path: Option<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            enable: false,
            radar_fft_path: "sim/radar_ice_fft_data.sim".into(),
            temperature_c: -12.4,
            nmea_path: None,
        }
    }
}

/// Radar that plays back FFT frames from a file, wrapping at the end.
pub struct FileRadar {
    path: PathBuf,
    frames: Vec<String>,
    next: usize,
}

impl FileRadar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), frames: Vec::new(), next: 0 }
    }
}

#[async_trait]
impl FmcwRadar for FileRadar {
    async fn init(&mut self) -> Result<(), SensorError> {
        let text = fs::read_to_string(&self.path)
            .map_err(|e| SensorError::Open { device: self.path.display().to_string(), reason: e.to_string() })?;
        self.frames = text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
        if self.frames.is_empty() {
            return Err(SensorError::Malformed(format!("{} holds no frames", self.path.display())));
        }
        self.next = 0;
        info!("sim: radar replaying {} frames from {}", self.frames.len(), self.path.display());
        Ok(())
    }

    async fn start_tx(&mut self) -> Result<(), SensorError> {
        debug!("sim: radar tx on");
        Ok(())
    }

    async fn read_rx(&mut self) -> Result<WaveformSample, SensorError> {
        if self.frames.is_empty() {
            return Err(SensorError::Disconnected);
        }
        let line = &self.frames[self.next % self.frames.len()];
        self.next += 1;
        WaveformSample::from_payload(extract_fft_payload(line).unwrap_or(line.as_str()))
    }

    async fn stop_tx(&mut self) -> Result<(), SensorError> {
        debug!("sim: radar tx off");
        Ok(())
    }
}

pub struct FixedTemperature {
    celsius: f64,
}

impl FixedTemperature {
    pub fn new(celsius: f64) -> Self {
        Self { celsius }
    }
}

#[async_trait]
impl TemperatureSensor for FixedTemperature {
    async fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    async fn read(&mut self) -> Result<TemperatureReading, SensorError> {
        Ok(TemperatureReading { celsius: self.celsius })
    }
}

/// GPS fed from a recorded NMEA log. The log is read whole when `init` opens
/// it; reaching its end reads as a disconnected receiver.
pub fn nmea_replay(cfg: GpsConfig, path: impl Into<PathBuf>) -> NmeaGps<Cursor<Vec<u8>>> {
    let path = path.into();
    NmeaGps::with_opener(
        cfg,
        Box::new(move || {
            fs::read(&path)
                .map(Cursor::new)
                .map_err(|e| SensorError::Open { device: path.display().to_string(), reason: e.to_string() })
        }),
    )
}
