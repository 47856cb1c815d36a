use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use angel_board::sink::MeasurementSink;
use angel_board::{run, Board, BoardConfig, BoardState, FlightConfig, Sensors};
use angel_bsp::gps::{GpsConfig, NmeaGps};
use angel_bsp::mock::MockPort;
use angel_bsp::sim::{nmea_replay, FileRadar};
use angel_bsp::{
    FmcwRadar, Gps, GpsFix, SensorError, StartSwitch, SwitchPosition, TemperatureReading, TemperatureSensor,
    WaveformSample,
};
use angel_proto::measurement::MeasurementRow;
use async_trait::async_trait;

const HOME: GpsFix = GpsFix { lat: 45.265887, lon: -75.729143 };
const FAR: GpsFix = GpsFix { lat: 45.266887, lon: -75.729143 };
const FIX: &str = "$GNGGA,012422.000,4515.9532,N,07543.7486,W,2,14,0.89,97.1,M,-34.2,M,,*77\r\n";

/// Flips to true when the owning mock is dropped.
#[derive(Clone, Default)]
struct Released(Arc<AtomicBool>);

impl Released {
    fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct DropFlag(Released);

impl Drop for DropFlag {
    fn drop(&mut self) {
        (self.0).0.store(true, Ordering::SeqCst);
    }
}

/// Any real driver, with its drop made observable.
struct Watched<G> {
    inner: G,
    _flag: DropFlag,
}

#[async_trait]
impl<G: Gps + ?Sized> Gps for Watched<Box<G>> {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.inner.init().await
    }

    async fn read(&mut self) -> Result<GpsFix, SensorError> {
        self.inner.read().await
    }
}

#[async_trait]
impl<R: FmcwRadar + ?Sized> FmcwRadar for Watched<Box<R>> {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.inner.init().await
    }

    async fn start_tx(&mut self) -> Result<(), SensorError> {
        self.inner.start_tx().await
    }

    async fn read_rx(&mut self) -> Result<WaveformSample, SensorError> {
        self.inner.read_rx().await
    }

    async fn stop_tx(&mut self) -> Result<(), SensorError> {
        self.inner.stop_tx().await
    }
}

struct ScriptedGps {
    script: VecDeque<Result<GpsFix, SensorError>>,
    fallback: GpsFix,
    _flag: DropFlag,
}

#[async_trait]
impl Gps for ScriptedGps {
    async fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    async fn read(&mut self) -> Result<GpsFix, SensorError> {
        self.script.pop_front().unwrap_or(Ok(self.fallback))
    }
}

struct FakeRadar {
    fail_init: bool,
    calls: Arc<Mutex<Vec<&'static str>>>,
    _flag: DropFlag,
}

#[async_trait]
impl FmcwRadar for FakeRadar {
    async fn init(&mut self) -> Result<(), SensorError> {
        self.calls.lock().unwrap().push("init");
        if self.fail_init {
            return Err(SensorError::InitTimeout(1));
        }
        Ok(())
    }

    async fn start_tx(&mut self) -> Result<(), SensorError> {
        self.calls.lock().unwrap().push("start");
        Ok(())
    }

    async fn read_rx(&mut self) -> Result<WaveformSample, SensorError> {
        WaveformSample::from_payload("12.40,14.50,21.40")
    }

    async fn stop_tx(&mut self) -> Result<(), SensorError> {
        self.calls.lock().unwrap().push("stop");
        Ok(())
    }
}

struct FakeThermometer {
    reads: u32,
    fail_on: Option<u32>,
    _flag: DropFlag,
}

#[async_trait]
impl TemperatureSensor for FakeThermometer {
    async fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    async fn read(&mut self) -> Result<TemperatureReading, SensorError> {
        self.reads += 1;
        if self.fail_on == Some(self.reads) {
            return Err(SensorError::Io(std::io::Error::other("i2c nak")));
        }
        Ok(TemperatureReading { celsius: -5.25 })
    }
}

struct ScriptedSwitch {
    script: VecDeque<SwitchPosition>,
    _flag: DropFlag,
}

#[async_trait]
impl StartSwitch for ScriptedSwitch {
    async fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    async fn read(&mut self) -> Result<SwitchPosition, SensorError> {
        Ok(self.script.pop_front().unwrap_or(SwitchPosition::Start))
    }
}

struct MemorySink {
    rows: Arc<Mutex<Vec<MeasurementRow>>>,
    closed: Arc<AtomicBool>,
    _flag: DropFlag,
}

impl MeasurementSink for MemorySink {
    fn open(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn append(&mut self, row: &MeasurementRow) -> anyhow::Result<()> {
        self.rows.lock().unwrap().push(row.clone());
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct Rig {
    gps_script: Vec<Result<GpsFix, SensorError>>,
    switch_script: Vec<SwitchPosition>,
    fail_radar_init: bool,
    fail_temp_on: Option<u32>,
    wait_for_start_switch: bool,
    gps: Option<Box<dyn Gps>>,
    radar: Option<Box<dyn FmcwRadar>>,
}

struct Witness {
    released: [Released; 5],
    radar_calls: Arc<Mutex<Vec<&'static str>>>,
    rows: Arc<Mutex<Vec<MeasurementRow>>>,
    closed: Arc<AtomicBool>,
}

impl Witness {
    fn all_released(&self) -> bool {
        self.released.iter().all(Released::get)
    }
}

impl Rig {
    fn build(self) -> (Board, Witness) {
        let released: [Released; 5] = Default::default();
        let radar_calls = Arc::new(Mutex::new(Vec::new()));
        let rows = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let gps: Box<dyn Gps> = match self.gps {
            Some(gps) => Box::new(Watched { inner: gps, _flag: DropFlag(released[0].clone()) }),
            None => Box::new(ScriptedGps {
                script: self.gps_script.into(),
                fallback: FAR,
                _flag: DropFlag(released[0].clone()),
            }),
        };
        let radar: Box<dyn FmcwRadar> = match self.radar {
            Some(radar) => Box::new(Watched { inner: radar, _flag: DropFlag(released[1].clone()) }),
            None => Box::new(FakeRadar {
                fail_init: self.fail_radar_init,
                calls: radar_calls.clone(),
                _flag: DropFlag(released[1].clone()),
            }),
        };
        let sensors = Sensors {
            gps,
            radar,
            temperature: Box::new(FakeThermometer {
                reads: 0,
                fail_on: self.fail_temp_on,
                _flag: DropFlag(released[2].clone()),
            }),
            switch: Box::new(ScriptedSwitch {
                script: self.switch_script.into(),
                _flag: DropFlag(released[3].clone()),
            }),
            sink: Box::new(MemorySink {
                rows: rows.clone(),
                closed: closed.clone(),
                _flag: DropFlag(released[4].clone()),
            }),
        };
        let cfg = BoardConfig { wait_for_start_switch: self.wait_for_start_switch, ..BoardConfig::default() };
        let board = Board::new(cfg, FlightConfig::default(), sensors);
        (board, Witness { released, radar_calls, rows, closed })
    }
}

async fn walk(board: &mut Board, from: BoardState, steps: usize) -> Vec<BoardState> {
    let mut state = from;
    let mut seen = Vec::with_capacity(steps);
    for _ in 0..steps {
        state = board.step(state).await;
        seen.push(state);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn radar_init_failure_releases_everything() {
    let (mut board, seen_by) = Rig { fail_radar_init: true, ..Rig::default() }.build();

    let seen = walk(&mut board, BoardState::Init, 3).await;
    assert_eq!(seen, vec![BoardState::Fault, BoardState::Cleanup, BoardState::Done]);
    assert!(!board.holds_handles());
    assert!(seen_by.all_released());
    assert!(seen_by.closed.load(Ordering::SeqCst));
    assert!(seen_by.rows.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn burst_then_resume() {
    let (mut board, seen_by) = Rig { gps_script: (0..16).map(|_| Ok(HOME)).collect(), ..Rig::default() }.build();

    assert_eq!(board.step(BoardState::Init).await, BoardState::Flying);
    let seen = walk(&mut board, BoardState::Flying, 5).await;
    assert_eq!(&seen[..4], &[BoardState::Flying; 4]);
    assert_eq!(seen[4], BoardState::Stationary);

    assert_eq!(board.step(BoardState::Stationary).await, BoardState::Stationary);
    {
        let rows = seen_by.rows.lock().unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].waveform, "12.40,14.50,21.40");
        assert_eq!(rows[0].temperature_c, -5.25);
        assert_eq!((rows[9].lat, rows[9].lon), (HOME.lat, HOME.lon));
    }
    assert_eq!(*seen_by.radar_calls.lock().unwrap(), vec!["init", "start", "stop"]);

    // first poll after the burst only seeds the position
    assert_eq!(board.step(BoardState::Stationary).await, BoardState::Stationary);
    assert_eq!(board.step(BoardState::Stationary).await, BoardState::Flying);
    assert_eq!(seen_by.rows.lock().unwrap().len(), 10);
    assert!(board.holds_handles());
}

#[tokio::test(start_paused = true)]
async fn sensor_failure_mid_burst_faults() {
    let (mut board, seen_by) = Rig {
        gps_script: (0..16).map(|_| Ok(HOME)).collect(),
        fail_temp_on: Some(3),
        ..Rig::default()
    }
    .build();

    let seen = walk(&mut board, BoardState::Init, 7).await;
    assert_eq!(seen[5], BoardState::Stationary);
    assert_eq!(seen[6], BoardState::Fault);
    assert_eq!(seen_by.rows.lock().unwrap().len(), 2);
    assert_eq!(*seen_by.radar_calls.lock().unwrap(), vec!["init", "start"]);

    let seen = walk(&mut board, BoardState::Fault, 2).await;
    assert_eq!(seen, vec![BoardState::Cleanup, BoardState::Done]);
    // the interrupted burst is switched off before the radar is released
    assert_eq!(*seen_by.radar_calls.lock().unwrap(), vec!["init", "start", "stop"]);
    assert!(seen_by.all_released());
}

#[tokio::test(start_paused = true)]
async fn gps_loss_while_flying_faults() {
    let (mut board, _seen_by) =
        Rig { gps_script: vec![Ok(HOME), Err(SensorError::Disconnected)], ..Rig::default() }.build();

    let seen = walk(&mut board, BoardState::Init, 3).await;
    assert_eq!(seen, vec![BoardState::Flying, BoardState::Flying, BoardState::Fault]);
}

#[tokio::test(start_paused = true)]
async fn idle_waits_for_start_switch() {
    let (mut board, _seen_by) = Rig {
        wait_for_start_switch: true,
        switch_script: vec![SwitchPosition::Stop, SwitchPosition::Stop],
        ..Rig::default()
    }
    .build();

    let seen = walk(&mut board, BoardState::Init, 4).await;
    assert_eq!(seen, vec![BoardState::Idle, BoardState::Idle, BoardState::Idle, BoardState::Flying]);
}

#[tokio::test(start_paused = true)]
async fn run_over_nmea_until_the_receiver_goes_away() {
    // one sentence for init, five to come to rest, ten for the burst
    let feed = FIX.repeat(16);
    let mut port = Some(MockPort::with_rx(feed.as_bytes()));
    let gps = NmeaGps::with_opener(
        GpsConfig::default(),
        Box::new(move || port.take().ok_or(SensorError::Disconnected)),
    );
    let (mut board, seen_by) = Rig { gps: Some(Box::new(gps)), ..Rig::default() }.build();

    assert_eq!(run(&mut board).await, BoardState::Done);
    assert_eq!(seen_by.rows.lock().unwrap().len(), 10);
    assert!(seen_by.closed.load(Ordering::SeqCst));
    assert!(seen_by.all_released());
    assert!(!board.holds_handles());
}

#[tokio::test(start_paused = true)]
async fn bench_replay_of_a_recorded_hover() {
    let sim = concat!(env!("CARGO_MANIFEST_DIR"), "/../../sim");
    let gps = nmea_replay(GpsConfig::default(), format!("{}/flight.nmea", sim));
    let radar = FileRadar::new(format!("{}/radar_ice_fft_data.sim", sim));
    let (mut board, seen_by) =
        Rig { gps: Some(Box::new(gps)), radar: Some(Box::new(radar)), ..Rig::default() }.build();

    // approach, hover long enough for one burst, fly off, log ends
    assert_eq!(run(&mut board).await, BoardState::Done);
    let rows = seen_by.rows.lock().unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0].waveform.split(',').count(), 512);
    assert!(rows.iter().all(|r| r.lat == rows[0].lat && r.lon == rows[0].lon));
    assert!(seen_by.all_released());
}
