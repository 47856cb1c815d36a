//! Board support for the ice-profiling payload: the four capability
//! interfaces the board FSM drives, and the drivers behind them.
//!
//! The traits expose only `init` and the domain operations. Nothing about
//! ports, registers or wire protocols leaks through them.

pub mod error;
pub mod gps;
pub mod nmea;
pub mod ops_proto;
pub mod radar;
pub mod serial;
pub mod sim;
pub mod switch;
pub mod tmp117;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use async_trait::async_trait;

pub use error::SensorError;
pub use ops_proto::WaveformSample;

/// Position in signed decimal degrees (south and west negative).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
}

/// Temperature in degrees Celsius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    pub celsius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPosition {
    Start,
    Stop,
}

#[async_trait]
pub trait TemperatureSensor: Send {
    async fn init(&mut self) -> Result<(), SensorError>;
    async fn read(&mut self) -> Result<TemperatureReading, SensorError>;
}

#[async_trait]
pub trait FmcwRadar: Send {
    async fn init(&mut self) -> Result<(), SensorError>;
    async fn start_tx(&mut self) -> Result<(), SensorError>;
    async fn read_rx(&mut self) -> Result<WaveformSample, SensorError>;
    async fn stop_tx(&mut self) -> Result<(), SensorError>;
}

#[async_trait]
pub trait Gps: Send {
    async fn init(&mut self) -> Result<(), SensorError>;
    async fn read(&mut self) -> Result<GpsFix, SensorError>;
}

#[async_trait]
pub trait StartSwitch: Send {
    async fn init(&mut self) -> Result<(), SensorError>;
    async fn read(&mut self) -> Result<SwitchPosition, SensorError>;
}
