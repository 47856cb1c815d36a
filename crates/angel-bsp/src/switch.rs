//! Start switch drivers.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{SensorError, StartSwitch, SwitchPosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchKind {
    /// No switch fitted: the board always reads START.
    Always,
    Sysfs,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    pub kind: SwitchKind,
    pub gpio: u32,
    pub active_high: bool,
    pub sysfs_root: String,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self { kind: SwitchKind::Always, gpio: 17, active_high: true, sysfs_root: "/sys/class/gpio".into() }
    }
}

pub fn from_config(cfg: &SwitchConfig) -> Box<dyn StartSwitch> {
    match cfg.kind {
        SwitchKind::Always => Box::new(AlwaysStart),
        SwitchKind::Sysfs => Box::new(SysfsSwitch::new(cfg)),
    }
}

pub struct AlwaysStart;

#[async_trait]
impl StartSwitch for AlwaysStart {
    async fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    async fn read(&mut self) -> Result<SwitchPosition, SensorError> {
        Ok(SwitchPosition::Start)
    }
}

/// Switch wired to a GPIO line exposed through `/sys/class/gpio`.
pub struct SysfsSwitch {
    root: PathBuf,
    gpio: u32,
    active_high: bool,
}

impl SysfsSwitch {
    pub fn new(cfg: &SwitchConfig) -> Self {
        Self { root: PathBuf::from(&cfg.sysfs_root), gpio: cfg.gpio, active_high: cfg.active_high }
    }

    fn line_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.gpio))
    }

    fn configure_err(&self, e: std::io::Error) -> SensorError {
        SensorError::Configure { device: self.line_dir().display().to_string(), reason: e.to_string() }
    }
}

#[async_trait]
impl StartSwitch for SysfsSwitch {
    async fn init(&mut self) -> Result<(), SensorError> {
        let dir = self.line_dir();
        if !dir.join("value").exists() {
            debug!("switch: exporting gpio{}", self.gpio);
            fs::write(self.root.join("export"), self.gpio.to_string()).map_err(|e| SensorError::Open {
                device: dir.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        fs::write(dir.join("direction"), "in").map_err(|e| self.configure_err(e))?;
        info!("switch: gpio{} ready", self.gpio);
        Ok(())
    }

    async fn read(&mut self) -> Result<SwitchPosition, SensorError> {
        let raw = fs::read_to_string(self.line_dir().join("value"))?;
        let level = match raw.trim() {
            "1" => true,
            "0" => false,
            other => return Err(SensorError::Malformed(format!("gpio value {:?}", other))),
        };
        Ok(if level == self.active_high { SwitchPosition::Start } else { SwitchPosition::Stop })
    }
}
