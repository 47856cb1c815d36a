//! TI TMP117 digital temperature sensor over I2C.
//!
//! Register reads are a pointer-byte write followed by a two-byte big-endian
//! read. The temperature result is a signed 16-bit value at 1/128 °C per LSB.

use std::io;

use async_trait::async_trait;
use i2cdev::core::I2CDevice;
#[cfg(any(target_os = "linux", target_os = "android"))]
use i2cdev::linux::LinuxI2CDevice;
use serde::Deserialize;
use tracing::info;

use crate::{SensorError, TemperatureReading, TemperatureSensor};

const REG_TEMP_RESULT: u8 = 0x00;
const REG_DEVICE_ID: u8 = 0x0F;

const DEVICE_ID: u16 = 0x0117;
const DEVICE_ID_MASK: u16 = 0x0FFF;

const CELSIUS_PER_LSB: f64 = 1.0 / 128.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub bus: String,
    pub address: u8,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self { bus: "/dev/i2c-1".into(), address: 0x48 }
    }
}

pub type DeviceOpener<D> = Box<dyn FnMut() -> Result<D, SensorError> + Send>;

pub struct Tmp117<D> {
    opener: DeviceOpener<D>,
    dev: Option<D>,
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl Tmp117<LinuxI2CDevice> {
    pub fn linux(cfg: TemperatureConfig) -> Self {
        Self::with_opener(Box::new(move || {
            LinuxI2CDevice::new(&cfg.bus, u16::from(cfg.address))
                .map_err(|e| SensorError::Open { device: cfg.bus.clone(), reason: e.to_string() })
        }))
    }
}

impl<D: I2CDevice + Send> Tmp117<D> {
    pub fn with_opener(opener: DeviceOpener<D>) -> Self {
        Self { opener, dev: None }
    }

    fn read_register(&mut self, reg: u8) -> Result<u16, SensorError> {
        let dev = self.dev.as_mut().ok_or(SensorError::Disconnected)?;
        dev.write(&[reg]).map_err(bus_error)?;
        let mut buf = [0u8; 2];
        dev.read(&mut buf).map_err(bus_error)?;
        Ok(u16::from_be_bytes(buf))
    }
}

fn bus_error<E: std::fmt::Display>(e: E) -> SensorError {
    SensorError::Io(io::Error::other(e.to_string()))
}

pub fn raw_to_celsius(raw: u16) -> f64 {
    f64::from(raw as i16) * CELSIUS_PER_LSB
}

#[async_trait]
impl<D: I2CDevice + Send> TemperatureSensor for Tmp117<D> {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.dev = Some((self.opener)()?);
        let id = self.read_register(REG_DEVICE_ID)?;
        if id & DEVICE_ID_MASK != DEVICE_ID {
            return Err(SensorError::DeviceId(id));
        }
        info!("tmp117: device id {:#06x}", id);
        Ok(())
    }

    async fn read(&mut self) -> Result<TemperatureReading, SensorError> {
        let raw = self.read_register(REG_TEMP_RESULT)?;
        Ok(TemperatureReading { celsius: raw_to_celsius(raw) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use i2cdev::mock::MockI2CDevice;

    fn sensor(id: [u8; 2], temp: [u8; 2]) -> Tmp117<MockI2CDevice> {
        let mut dev = MockI2CDevice::new();
        dev.regmap.write_regs(REG_DEVICE_ID as usize, &id);
        dev.regmap.write_regs(REG_TEMP_RESULT as usize, &temp);
        let mut dev = Some(dev);
        Tmp117::with_opener(Box::new(move || dev.take().ok_or(SensorError::Disconnected)))
    }

    #[test]
    fn scales_twos_complement() {
        assert_eq!(raw_to_celsius(0x0C80), 25.0);
        assert_eq!(raw_to_celsius(0xFF00), -2.0);
        assert_eq!(raw_to_celsius(0x0001), 0.0078125);
        assert_eq!(raw_to_celsius(0xF9C0), -12.5);
    }

    #[tokio::test]
    async fn reads_temperature_after_identity_check() {
        let mut s = sensor([0x01, 0x17], [0xF9, 0xC0]);
        s.init().await.unwrap();
        assert_eq!(s.read().await.unwrap().celsius, -12.5);
    }

    #[tokio::test]
    async fn wrong_device_id_fails_init() {
        let mut s = sensor([0x01, 0x19], [0, 0]);
        let err = s.init().await.unwrap_err();
        assert!(matches!(err, SensorError::DeviceId(0x0119)));
        assert_eq!(err.code(), -10);
    }

    #[tokio::test]
    async fn read_before_init_fails() {
        let mut s = sensor([0x01, 0x17], [0, 0]);
        assert!(s.read().await.is_err());
    }
}
