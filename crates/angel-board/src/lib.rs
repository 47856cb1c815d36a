pub mod doctor;
pub mod flight;
pub mod fsm;
pub mod sink;
pub mod state;

use serde::Deserialize;

pub use fsm::{run, Board, Sensors};
pub use state::BoardState;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Hold in IDLE after INIT until the start switch reads START.
    pub wait_for_start_switch: bool,
    /// Sleep between FSM steps; keeps the loop from spinning.
    pub loop_backoff_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self { wait_for_start_switch: false, loop_backoff_ms: 15 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub poll_interval_ms: u64,
    /// Cumulative movement below this counts as a quiet read.
    pub stationary_threshold_m: f64,
    pub stationary_reads_required: u32,
    /// One poll-to-poll step above this means the platform is flying again.
    pub resume_threshold_m: f64,
    pub stabilize_ms: u64,
    pub acquisition_cycles: u32,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            stationary_threshold_m: 0.5,
            stationary_reads_required: 5,
            resume_threshold_m: 2.0,
            stabilize_ms: 3000,
            acquisition_cycles: 10,
        }
    }
}
