//! NMEA GPS receiver on a serial line (Adafruit Ultimate GPS / PA1616D).

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{sleep, timeout_at, Instant};
use tokio_serial::SerialStream;
use tracing::{debug, info, warn};

use crate::nmea::{parse_gga, NmeaFramer, DEFAULT_GGA_HEADER};
use crate::{serial, Gps, GpsFix, SensorError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub device: String,
    pub baud: u32,
    /// Six-character sentence header, talker id included (`$GNGGA`, `$GPGGA`).
    pub sentence_header: String,
    pub byte_timeout_ms: u64,
    pub init_timeout_s: u64,
    pub init_poll_ms: u64,
    /// Upper bound on one steady-state read.
    pub read_timeout_s: u64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            device: "/dev/serial0".into(),
            baud: 9600,
            sentence_header: DEFAULT_GGA_HEADER.into(),
            byte_timeout_ms: 100,
            init_timeout_s: 60,
            init_poll_ms: 1000,
            read_timeout_s: 10,
        }
    }
}

pub type PortOpener<P> = Box<dyn FnMut() -> Result<P, SensorError> + Send>;

pub struct NmeaGps<P> {
    cfg: GpsConfig,
    opener: PortOpener<P>,
    port: Option<P>,
    framer: NmeaFramer,
}

impl NmeaGps<SerialStream> {
    pub fn serial(cfg: GpsConfig) -> Self {
        let (dev, baud) = (cfg.device.clone(), cfg.baud);
        Self::with_opener(cfg, Box::new(move || serial::open_8n1(&dev, baud)))
    }
}

impl<P: AsyncRead + Unpin + Send> NmeaGps<P> {
    pub fn with_opener(cfg: GpsConfig, opener: PortOpener<P>) -> Self {
        let framer = NmeaFramer::new(&cfg.sentence_header);
        Self { cfg, opener, port: None, framer }
    }

    /// Reads bytes until a GGA sentence completes. `Ok(None)` means the line
    /// went quiet for longer than the per-byte timeout, or `deadline` passed
    /// while bytes were still arriving without a matching sentence.
    async fn read_sentence(&mut self, deadline: Instant) -> Result<Option<String>, SensorError> {
        let port = self.port.as_mut().ok_or(SensorError::Disconnected)?;
        let byte_timeout = Duration::from_millis(self.cfg.byte_timeout_ms);
        loop {
            let until = (Instant::now() + byte_timeout).min(deadline);
            let byte = match timeout_at(until, port.read_u8()).await {
                Err(_) => return Ok(None),
                Ok(Ok(b)) => b,
                Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => return Err(SensorError::Disconnected),
                Ok(Err(e)) => return Err(e.into()),
            };
            if let Some(sentence) = self.framer.push(byte) {
                return Ok(Some(sentence));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }
}

#[async_trait]
impl<P: AsyncRead + Unpin + Send> Gps for NmeaGps<P> {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.port = Some((self.opener)()?);

        // The receiver can take a while to acquire satellites after power-up.
        let deadline = Instant::now() + Duration::from_secs(self.cfg.init_timeout_s);
        loop {
            if let Some(sentence) = self.read_sentence(deadline).await? {
                match parse_gga(&sentence) {
                    Ok(gga) if gga.has_fix() => {
                        info!("gps: fix acquired (quality {})", gga.fix_quality);
                        return Ok(());
                    }
                    Ok(_) => debug!("gps: waiting for fix"),
                    Err(e) => warn!("gps: ignoring sentence: {}", e),
                }
            }
            if Instant::now() >= deadline {
                return Err(SensorError::InitTimeout(self.cfg.init_timeout_s));
            }
            sleep(Duration::from_millis(self.cfg.init_poll_ms)).await;
        }
    }

    async fn read(&mut self) -> Result<GpsFix, SensorError> {
        let deadline = Instant::now() + Duration::from_secs(self.cfg.read_timeout_s);
        loop {
            if let Some(sentence) = self.read_sentence(deadline).await? {
                match parse_gga(&sentence) {
                    Ok(gga) => return Ok(gga.fix),
                    Err(e) => warn!("gps: ignoring sentence: {}", e),
                }
            }
            if Instant::now() >= deadline {
                return Err(SensorError::ReadTimeout(self.cfg.read_timeout_s * 1000));
            }
        }
    }
}
