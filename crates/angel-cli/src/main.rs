use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use angel_board::sink::CsvSink;
use angel_board::{doctor as board_doctor, run as run_board, Board, BoardConfig, FlightConfig, Sensors};
use angel_bsp::gps::{GpsConfig, NmeaGps};
use angel_bsp::radar::{OpsFmcw, RadarConfig};
use angel_bsp::sim::{self, FileRadar, FixedTemperature, SimConfig};
use angel_bsp::switch::{self, SwitchConfig};
use angel_bsp::tmp117::TemperatureConfig;
use angel_bsp::{FmcwRadar, Gps, TemperatureSensor};

#[derive(Debug, Parser)]
#[command(name = "snowangel", version, about = "SnowAngel-UAV ice profiling payload")]
struct Cli {
    #[arg(long, default_value = "snowangel.toml")]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the board state machine until it shuts down.
    Run,
    /// Sanity-check the config and look for the device nodes.
    Doctor,
    Gps { #[command(subcommand)] cmd: GpsCmd },
    Radar { #[command(subcommand)] cmd: RadarCmd },
}

#[derive(Debug, Subcommand)]
enum GpsCmd {
    /// Wait for a fix and print one position.
    Fix,
}

#[derive(Debug, Subcommand)]
enum RadarCmd {
    /// Configure the radar and print what it reports about itself.
    Info,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    board: BoardConfig,
    flight: FlightConfig,
    gps: GpsConfig,
    radar: RadarConfig,
    temperature: TemperatureConfig,
    switch: SwitchConfig,
    storage: StorageCfg,
    logging: LoggingCfg,
    sim: SimConfig,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
struct StorageCfg {
    csv_path: String,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self { csv_path: "measurements.csv".into() }
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct LoggingCfg {
    file: Option<String>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

fn init_logging(cfg: &LoggingCfg) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &cfg.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    init_logging(&cfg.logging)?;

    match cli.cmd {
        Command::Run => run(cfg).await?,
        Command::Doctor => doctor(&cfg)?,
        Command::Gps { cmd } => gps_cmd(&cfg, cmd).await?,
        Command::Radar { cmd } => radar_cmd(&cfg, cmd).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    board_doctor::check_flight(&cfg.flight)?;
    board_doctor::check_gps(&cfg.gps)?;
    board_doctor::check_radar(&cfg.radar)?;
    if let Some(msg) = board_doctor::radar_capacity_warning(&cfg.radar) {
        warn!("doctor: {}", msg);
    }
    board_doctor::check_temperature(&cfg.temperature)?;
    board_doctor::check_switch(&cfg.switch, cfg.board.wait_for_start_switch)?;
    board_doctor::check_storage(&cfg.storage.csv_path)?;

    // Missing nodes usually mean the sensor is unplugged, not a bad config.
    let nodes = [
        ("gps.device", &cfg.gps.device),
        ("radar.device", &cfg.radar.device),
        ("temperature.bus", &cfg.temperature.bus),
    ];
    for (label, path) in nodes {
        if let Err(e) = board_doctor::check_device(label, path) {
            warn!("doctor: {:#}", e);
        }
    }

    info!("doctor: OK");
    Ok(())
}

async fn gps_cmd(cfg: &Config, cmd: GpsCmd) -> Result<()> {
    match cmd {
        GpsCmd::Fix => {
            let mut gps = NmeaGps::serial(cfg.gps.clone());
            gps.init().await.map_err(|e| anyhow::anyhow!("gps init failed (err {}): {}", e.code(), e))?;
            let fix = gps.read().await.map_err(|e| anyhow::anyhow!("gps read failed (err {}): {}", e.code(), e))?;
            println!("FIX: {:.6},{:.6}", fix.lat, fix.lon);
            Ok(())
        }
    }
}

async fn radar_cmd(cfg: &Config, cmd: RadarCmd) -> Result<()> {
    match cmd {
        RadarCmd::Info => {
            let mut radar = OpsFmcw::serial(cfg.radar.clone());
            radar.init().await.map_err(|e| anyhow::anyhow!("radar init failed (err {}): {}", e.code(), e))?;
            if radar.identity().is_empty() {
                println!("radar: no identity reported");
            }
            for line in radar.identity() {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn temperature_sensor(cfg: &TemperatureConfig) -> Result<Box<dyn TemperatureSensor>> {
    Ok(Box::new(angel_bsp::tmp117::Tmp117::linux(cfg.clone())))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn temperature_sensor(_cfg: &TemperatureConfig) -> Result<Box<dyn TemperatureSensor>> {
    anyhow::bail!("TMP117 over i2c-dev is only supported on Linux")
}

async fn run(cfg: Config) -> Result<()> {
    info!("run: starting");

    if cfg.sim.enable {
        warn!("run: simulation mode, radar frames from {}", cfg.sim.radar_fft_path);
    }
    let radar: Box<dyn FmcwRadar> = if cfg.sim.enable {
        Box::new(FileRadar::new(&cfg.sim.radar_fft_path))
    } else {
        Box::new(OpsFmcw::serial(cfg.radar.clone()))
    };
    let temperature: Box<dyn TemperatureSensor> = if cfg.sim.enable {
        Box::new(FixedTemperature::new(cfg.sim.temperature_c))
    } else {
        temperature_sensor(&cfg.temperature)?
    };
    let gps: Box<dyn Gps> = match cfg.sim.nmea_path.as_ref().filter(|_| cfg.sim.enable) {
        Some(path) => {
            info!("run: replaying NMEA log {}", path);
            Box::new(sim::nmea_replay(cfg.gps.clone(), path))
        }
        None => Box::new(NmeaGps::serial(cfg.gps.clone())),
    };
    let sensors = Sensors {
        switch: switch::from_config(&cfg.switch),
        temperature,
        radar,
        gps,
        sink: Box::new(CsvSink::new(&cfg.storage.csv_path)),
    };

    let mut board = Board::new(cfg.board, cfg.flight, sensors);
    let last = run_board(&mut board).await;
    info!("run: board stopped in {}", last);
    Ok(())
}
