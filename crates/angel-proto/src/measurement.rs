use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::OffsetDateTime;

/// One acquisition cycle as persisted: where, how cold, and the raw FFT
/// frame the radar returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRow {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub lat: f64,
    pub lon: f64,
    pub temperature_c: f64,
    /// Comma-separated FFT magnitudes, exactly as received.
    pub waveform: String,
}

impl MeasurementRow {
    /// `YYYY-MM-DD HH:MM:SS,lat,lon,temp,<payload>`; the payload keeps its
    /// own commas so every FFT bin lands in its own column.
    pub fn to_csv_line(&self) -> String {
        let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        let ts = self.ts.format(&fmt).unwrap_or_else(|_| self.ts.unix_timestamp().to_string());
        format!("{},{:.6},{:.6},{:.2},{}", ts, self.lat, self.lon, self.temperature_c, self.waveform)
    }
}
