//! Board state machine.
//!
//! INIT brings every handle up in a fixed order, FLYING watches GPS for the
//! platform coming to rest, STATIONARY runs one acquisition burst and then
//! waits for the platform to move off. Any failure goes through FAULT and
//! CLEANUP, which release every handle before DONE.

use std::time::Duration;

use angel_bsp::{FmcwRadar, Gps, GpsFix, SensorError, StartSwitch, SwitchPosition, TemperatureSensor};
use angel_proto::measurement::MeasurementRow;
use anyhow::{anyhow, Context, Result};
use time::OffsetDateTime;
use tokio::time::{interval, sleep, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::flight::FlightPhaseDetector;
use crate::sink::MeasurementSink;
use crate::{BoardConfig, BoardState, FlightConfig};

/// Handles the board takes ownership of.
pub struct Sensors {
    pub switch: Box<dyn StartSwitch>,
    pub temperature: Box<dyn TemperatureSensor>,
    pub radar: Box<dyn FmcwRadar>,
    pub gps: Box<dyn Gps>,
    pub sink: Box<dyn MeasurementSink>,
}

pub struct Board {
    cfg: BoardConfig,
    flight: FlightConfig,
    switch: Option<Box<dyn StartSwitch>>,
    temperature: Option<Box<dyn TemperatureSensor>>,
    radar: Option<Box<dyn FmcwRadar>>,
    gps: Option<Box<dyn Gps>>,
    sink: Option<Box<dyn MeasurementSink>>,
    detector: FlightPhaseDetector,
    burst_done: bool,
    /// Set between a successful `start_tx` and `stop_tx`.
    transmitting: bool,
    poll: Option<Interval>,
}

fn handle<'a, T: ?Sized>(slot: &'a mut Option<Box<T>>, what: &str) -> Result<&'a mut T> {
    slot.as_deref_mut().with_context(|| format!("{} already released", what))
}

fn coded(what: &'static str) -> impl FnOnce(SensorError) -> anyhow::Error {
    move |e| anyhow!("{} failed (err {}): {}", what, e.code(), e)
}

impl Board {
    pub fn new(cfg: BoardConfig, flight: FlightConfig, sensors: Sensors) -> Self {
        let detector = FlightPhaseDetector::new(&flight);
        Self {
            cfg,
            flight,
            switch: Some(sensors.switch),
            temperature: Some(sensors.temperature),
            radar: Some(sensors.radar),
            gps: Some(sensors.gps),
            sink: Some(sensors.sink),
            detector,
            burst_done: false,
            transmitting: false,
            poll: None,
        }
    }

    /// True while any sensor handle or the sink is still held.
    pub fn holds_handles(&self) -> bool {
        self.switch.is_some()
            || self.temperature.is_some()
            || self.radar.is_some()
            || self.gps.is_some()
            || self.sink.is_some()
    }

    /// Execute one state's behavior and return the next state.
    pub async fn step(&mut self, state: BoardState) -> BoardState {
        match state {
            BoardState::Init => self.init().await,
            BoardState::Idle => self.idle().await,
            BoardState::Flying => self.flying().await,
            BoardState::Stationary => self.stationary().await,
            BoardState::Fault => {
                warn!("board: fault, releasing sensors");
                BoardState::Cleanup
            }
            BoardState::Cleanup => self.cleanup().await,
            BoardState::Done => BoardState::Done,
        }
    }

    async fn init(&mut self) -> BoardState {
        match self.init_handles().await {
            Ok(()) if self.cfg.wait_for_start_switch => BoardState::Idle,
            Ok(()) => BoardState::Flying,
            Err(e) => {
                error!("board: init: {:#}", e);
                BoardState::Fault
            }
        }
    }

    async fn init_handles(&mut self) -> Result<()> {
        handle(&mut self.switch, "start switch")?.init().await.map_err(coded("start switch init"))?;
        handle(&mut self.temperature, "temperature sensor")?
            .init()
            .await
            .map_err(coded("temperature sensor init"))?;
        handle(&mut self.radar, "radar")?.init().await.map_err(coded("radar init"))?;
        handle(&mut self.gps, "gps")?.init().await.map_err(coded("gps init"))?;
        handle(&mut self.sink, "measurement sink")?.open().context("measurement sink open")?;
        info!("board: all sensors up");
        Ok(())
    }

    async fn idle(&mut self) -> BoardState {
        let position = match handle(&mut self.switch, "start switch") {
            Ok(sw) => sw.read().await.map_err(coded("start switch read")),
            Err(e) => Err(e),
        };
        match position {
            Ok(SwitchPosition::Start) => {
                info!("board: start switch engaged");
                BoardState::Flying
            }
            Ok(SwitchPosition::Stop) => {
                self.tick().await;
                BoardState::Idle
            }
            Err(e) => {
                error!("board: idle: {:#}", e);
                BoardState::Fault
            }
        }
    }

    async fn flying(&mut self) -> BoardState {
        self.tick().await;
        let fix = match self.read_gps().await {
            Ok(fix) => fix,
            Err(e) => {
                error!("board: flying: {:#}", e);
                return BoardState::Fault;
            }
        };
        debug!("board: fix {:.6},{:.6}", fix.lat, fix.lon);
        if self.detector.observe_flying(fix) {
            info!("board: platform at rest at {:.6},{:.6}", fix.lat, fix.lon);
            self.burst_done = false;
            return BoardState::Stationary;
        }
        BoardState::Flying
    }

    async fn stationary(&mut self) -> BoardState {
        if !self.burst_done {
            return match self.acquire().await {
                Ok(()) => {
                    self.burst_done = true;
                    BoardState::Stationary
                }
                Err(e) => {
                    error!("board: acquisition: {:#}", e);
                    BoardState::Fault
                }
            };
        }

        self.tick().await;
        let fix = match self.read_gps().await {
            Ok(fix) => fix,
            Err(e) => {
                error!("board: stationary: {:#}", e);
                return BoardState::Fault;
            }
        };
        if self.detector.observe_stationary(fix) {
            info!("board: platform moving again at {:.6},{:.6}", fix.lat, fix.lon);
            self.burst_done = false;
            return BoardState::Flying;
        }
        BoardState::Stationary
    }

    /// One burst: settle, transmit, then `acquisition_cycles` rows of
    /// position, temperature and FFT frame.
    async fn acquire(&mut self) -> Result<()> {
        sleep(Duration::from_millis(self.flight.stabilize_ms)).await;
        handle(&mut self.radar, "radar")?.start_tx().await.map_err(coded("radar start"))?;
        self.transmitting = true;

        let cycles = self.flight.acquisition_cycles;
        for cycle in 1..=cycles {
            let fix = self.read_gps().await?;
            let temp = handle(&mut self.temperature, "temperature sensor")?
                .read()
                .await
                .map_err(coded("temperature read"))?;
            let wave = handle(&mut self.radar, "radar")?.read_rx().await.map_err(coded("radar read"))?;

            let row = MeasurementRow {
                ts: OffsetDateTime::now_utc(),
                lat: fix.lat,
                lon: fix.lon,
                temperature_c: temp.celsius,
                waveform: wave.as_str().to_string(),
            };
            handle(&mut self.sink, "measurement sink")?.append(&row).context("measurement sink append")?;
            info!("board: sample {}/{} stored ({} bins, {:.2} C)", cycle, cycles, wave.bins(), temp.celsius);
        }

        handle(&mut self.radar, "radar")?.stop_tx().await.map_err(coded("radar stop"))?;
        self.transmitting = false;
        Ok(())
    }

    async fn read_gps(&mut self) -> Result<GpsFix> {
        handle(&mut self.gps, "gps")?.read().await.map_err(coded("gps read"))
    }

    async fn tick(&mut self) {
        let period = Duration::from_millis(self.flight.poll_interval_ms.max(1));
        let poll = self.poll.get_or_insert_with(|| {
            let mut i = interval(period);
            i.set_missed_tick_behavior(MissedTickBehavior::Delay);
            i
        });
        poll.tick().await;
    }

    async fn cleanup(&mut self) -> BoardState {
        // a burst cut short leaves FFT output streaming
        if self.transmitting {
            if let Some(radar) = self.radar.as_deref_mut() {
                match radar.stop_tx().await {
                    Ok(()) => info!("board: radar tx stopped"),
                    Err(e) => warn!("board: radar stop during cleanup failed (err {}): {}", e.code(), e),
                }
            }
            self.transmitting = false;
        }
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                warn!("board: sink close: {:#}", e);
            }
        }
        drop(self.radar.take());
        drop(self.gps.take());
        drop(self.temperature.take());
        drop(self.switch.take());
        info!("board: sensors released");
        BoardState::Done
    }
}

/// Drive the board from INIT until DONE, logging every transition.
pub async fn run(board: &mut Board) -> BoardState {
    let backoff = Duration::from_millis(board.cfg.loop_backoff_ms);
    let mut state = BoardState::Init;
    info!("board: starting in {}", state);
    loop {
        let next = board.step(state).await;
        if next != state {
            info!("board: {} -> {}", state, next);
            state = next;
        }
        if state == BoardState::Done {
            return state;
        }
        sleep(backoff).await;
    }
}
