use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use angel_proto::measurement::MeasurementRow;
use anyhow::{Context, Result};
use tracing::info;

/// Where acquisition rows go. Opened during INIT, closed during CLEANUP.
pub trait MeasurementSink: Send {
    fn open(&mut self) -> Result<()>;
    fn append(&mut self, row: &MeasurementRow) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Appends one CSV line per row, no header. Every row is written straight
/// through so a power cut loses at most the row in flight.
pub struct CsvSink {
    path: PathBuf,
    file: Option<File>,
    rows: u64,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), file: None, rows: 0 }
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl MeasurementSink for CsvSink {
    fn open(&mut self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        info!("sink: appending to {}", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    fn append(&mut self, row: &MeasurementRow) -> Result<()> {
        let file = self.file.as_mut().context("csv sink is not open")?;
        writeln!(file, "{}", row.to_csv_line()).with_context(|| format!("write {}", self.path.display()))?;
        file.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all().with_context(|| format!("sync {}", self.path.display()))?;
            info!("sink: closed {} after {} rows", self.path.display(), self.rows);
        }
        Ok(())
    }
}
