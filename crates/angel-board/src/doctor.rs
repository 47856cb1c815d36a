use std::path::Path;

use angel_bsp::gps::GpsConfig;
use angel_bsp::ops_proto::{bins_that_fit, FFT_SIZE};
use angel_bsp::radar::RadarConfig;
use angel_bsp::switch::{SwitchConfig, SwitchKind};
use angel_bsp::tmp117::TemperatureConfig;
use anyhow::Result;

use crate::FlightConfig;

pub fn check_flight(f: &FlightConfig) -> Result<()> {
    anyhow::ensure!(f.poll_interval_ms >= 100, "flight.poll_interval_ms too small; GPS updates at ~1 Hz");
    anyhow::ensure!(f.stationary_threshold_m > 0.0, "flight.stationary_threshold_m must be > 0");
    anyhow::ensure!(f.stationary_reads_required >= 1, "flight.stationary_reads_required must be >= 1");
    anyhow::ensure!(
        f.resume_threshold_m > f.stationary_threshold_m,
        "flight.resume_threshold_m must exceed flight.stationary_threshold_m"
    );
    anyhow::ensure!(f.acquisition_cycles >= 1, "flight.acquisition_cycles must be >= 1");
    Ok(())
}

pub fn check_gps(g: &GpsConfig) -> Result<()> {
    anyhow::ensure!(!g.device.is_empty(), "gps.device missing");
    anyhow::ensure!(g.baud > 0, "gps.baud invalid");
    anyhow::ensure!(
        g.sentence_header.len() == 6 && g.sentence_header.starts_with('$') && g.sentence_header.ends_with("GGA"),
        "gps.sentence_header should look like $GNGGA"
    );
    anyhow::ensure!(g.init_timeout_s >= 1, "gps.init_timeout_s must be >= 1");
    anyhow::ensure!(g.read_timeout_s >= 1, "gps.read_timeout_s must be >= 1");
    Ok(())
}

pub fn check_radar(r: &RadarConfig) -> Result<()> {
    anyhow::ensure!(!r.device.is_empty(), "radar.device missing");
    anyhow::ensure!(r.baud > 0, "radar.baud invalid");
    anyhow::ensure!(r.precision <= 5, "radar.precision should be 0..5");
    anyhow::ensure!(r.max_frame_attempts >= 1, "radar.max_frame_attempts must be >= 1");
    Ok(())
}

/// Not an error: the board still runs, but frames lose their upper bins.
pub fn radar_capacity_warning(r: &RadarConfig) -> Option<String> {
    let fit = bins_that_fit(r.precision);
    (fit < FFT_SIZE).then(|| {
        format!("radar.precision {} can cut frames to {} of {} bins", r.precision, fit, FFT_SIZE)
    })
}

pub fn check_temperature(t: &TemperatureConfig) -> Result<()> {
    anyhow::ensure!(!t.bus.is_empty(), "temperature.bus missing");
    // TMP117 straps ADD0 to one of four addresses
    anyhow::ensure!((0x48..=0x4B).contains(&t.address), "temperature.address should be 0x48..0x4B");
    Ok(())
}

pub fn check_switch(s: &SwitchConfig, wait_for_start_switch: bool) -> Result<()> {
    if wait_for_start_switch {
        anyhow::ensure!(
            s.kind != SwitchKind::Always,
            "board.wait_for_start_switch=true needs a real switch (switch.kind)"
        );
    }
    if s.kind == SwitchKind::Sysfs {
        anyhow::ensure!(Path::new(&s.sysfs_root).is_dir(), "switch.sysfs_root not found: {}", s.sysfs_root);
    }
    Ok(())
}

pub fn check_storage(csv_path: &str) -> Result<()> {
    anyhow::ensure!(!csv_path.is_empty(), "storage.csv_path missing");
    let p = Path::new(csv_path);
    if p.exists() {
        anyhow::ensure!(p.is_file(), "storage.csv_path is not a file: {}", csv_path);
    }
    if let Some(dir) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
        if dir.exists() {
            anyhow::ensure!(dir.is_dir(), "storage.csv_path parent is not a dir: {}", dir.display());
        }
    }
    Ok(())
}

/// Device nodes that should exist on the target before `run`.
pub fn check_device(label: &str, path: &str) -> Result<()> {
    anyhow::ensure!(Path::new(path).exists(), "{} not found: {}", label, path);
    Ok(())
}
