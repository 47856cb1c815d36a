//! OmniPreSense OPS FMCW radar on a USB serial link.

use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep, timeout};
use tokio_serial::SerialStream;
use tracing::{debug, info};

use crate::gps::PortOpener;
use crate::ops_proto::{
    configure_sequence, extract_fft_payload, RadarCommand, RESET_SEQUENCE, WAVEFORM_CAPACITY,
};
use crate::{serial, FmcwRadar, SensorError, WaveformSample};

/// Lines longer than this are cut short; a frame at full capacity is well under it.
const MAX_LINE_LEN: usize = 4 * WAVEFORM_CAPACITY;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub device: String,
    pub baud: u32,
    pub byte_timeout_ms: u64,
    pub settle_ms: u64,
    /// Lines the `??` query answers with.
    pub identity_lines: usize,
    pub precision: u8,
    pub max_frame_attempts: u8,
    pub led: bool,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyACM0".into(),
            baud: 57600,
            byte_timeout_ms: 1000,
            settle_ms: 500,
            identity_lines: 12,
            precision: 2,
            max_frame_attempts: 10,
            led: false,
        }
    }
}

pub struct OpsFmcw<P> {
    cfg: RadarConfig,
    opener: PortOpener<P>,
    port: Option<P>,
    identity: Vec<String>,
}

impl OpsFmcw<SerialStream> {
    pub fn serial(cfg: RadarConfig) -> Self {
        let (dev, baud) = (cfg.device.clone(), cfg.baud);
        Self::with_opener(cfg, Box::new(move || serial::open_8n1(&dev, baud)))
    }
}

impl<P: AsyncRead + AsyncWrite + Unpin + Send> OpsFmcw<P> {
    pub fn with_opener(cfg: RadarConfig, opener: PortOpener<P>) -> Self {
        Self { cfg, opener, port: None, identity: Vec::new() }
    }

    /// What the radar said about itself during `init`.
    pub fn identity(&self) -> &[String] {
        &self.identity
    }

    async fn send(&mut self, cmd: RadarCommand) -> Result<(), SensorError> {
        let port = self.port.as_mut().ok_or(SensorError::Disconnected)?;
        let bytes = cmd.wire();
        let written = port.write(&bytes).await?;
        if written != bytes.len() {
            return Err(SensorError::ShortWrite { written, expected: bytes.len() });
        }
        port.flush().await?;
        debug!("radar: -> {}", cmd);
        Ok(())
    }

    /// One CR/LF-terminated line. A per-byte timeout or EOF ends the line
    /// early with whatever had arrived.
    async fn read_line(&mut self) -> Result<String, SensorError> {
        let port = self.port.as_mut().ok_or(SensorError::Disconnected)?;
        let byte_timeout = Duration::from_millis(self.cfg.byte_timeout_ms);
        let mut line = Vec::new();
        while line.len() < MAX_LINE_LEN {
            match timeout(byte_timeout, port.read_u8()).await {
                Err(_) => break,
                Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok(b'\r' | b'\n')) if line.is_empty() => continue,
                Ok(Ok(b'\r' | b'\n')) => break,
                Ok(Ok(b)) => line.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

#[async_trait]
impl<P: AsyncRead + AsyncWrite + Unpin + Send> FmcwRadar for OpsFmcw<P> {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.port = Some((self.opener)()?);

        for cmd in RESET_SEQUENCE {
            self.send(cmd).await?;
        }
        sleep(Duration::from_millis(self.cfg.settle_ms)).await;

        self.send(RadarCommand::Identify).await?;
        self.identity.clear();
        for _ in 0..self.cfg.identity_lines {
            let line = self.read_line().await?;
            if !line.is_empty() {
                self.identity.push(line);
            }
        }

        for cmd in configure_sequence(self.cfg.precision) {
            self.send(cmd).await?;
        }
        let led = if self.cfg.led { RadarCommand::LedOn } else { RadarCommand::LedOff };
        self.send(led).await?;

        info!("radar: configured ({} identity lines)", self.identity.len());
        Ok(())
    }

    async fn start_tx(&mut self) -> Result<(), SensorError> {
        self.send(RadarCommand::FftOutputOn).await
    }

    async fn read_rx(&mut self) -> Result<WaveformSample, SensorError> {
        let attempts = self.cfg.max_frame_attempts;
        for attempt in 1..=attempts {
            let line = self.read_line().await?;
            match extract_fft_payload(&line).map(WaveformSample::from_payload) {
                Some(Ok(sample)) => return Ok(sample),
                Some(Err(e)) => debug!("radar: bad frame (attempt {}/{}): {}", attempt, attempts, e),
                None => debug!("radar: no frame in line (attempt {}/{})", attempt, attempts),
            }
        }
        Err(SensorError::NoFrame(attempts))
    }

    async fn stop_tx(&mut self) -> Result<(), SensorError> {
        self.send(RadarCommand::FftOutputOff).await
    }
}
