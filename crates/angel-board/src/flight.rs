//! Flight-phase detection from successive GPS fixes.

use angel_bsp::GpsFix;

use crate::FlightConfig;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres between two points in decimal degrees.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

pub fn distance_m(a: GpsFix, b: GpsFix) -> f64 {
    haversine_m(a.lat, a.lon, b.lat, b.lon)
}

/// Running motion state between polls.
#[derive(Debug, Clone, Default)]
pub struct MotionAccumulator {
    pub previous: Option<GpsFix>,
    pub distance_m: f64,
    pub quiet_reads: u32,
}

impl MotionAccumulator {
    /// Displacement since the previous fix; the first fix seeds the
    /// accumulator and counts as zero movement.
    fn advance(&mut self, fix: GpsFix) -> f64 {
        let step = self.previous.map(|p| distance_m(p, fix)).unwrap_or(0.0);
        self.previous = Some(fix);
        step
    }
}

/// Decides when the platform has come to rest (FLYING -> STATIONARY) and
/// when it has left again (STATIONARY -> FLYING).
#[derive(Debug, Clone)]
pub struct FlightPhaseDetector {
    stationary_threshold_m: f64,
    reads_required: u32,
    resume_threshold_m: f64,
    acc: MotionAccumulator,
}

impl FlightPhaseDetector {
    pub fn new(cfg: &FlightConfig) -> Self {
        Self {
            stationary_threshold_m: cfg.stationary_threshold_m,
            reads_required: cfg.stationary_reads_required.max(1),
            resume_threshold_m: cfg.resume_threshold_m,
            acc: MotionAccumulator::default(),
        }
    }

    pub fn accumulator(&self) -> &MotionAccumulator {
        &self.acc
    }

    pub fn reset(&mut self) {
        self.acc = MotionAccumulator::default();
    }

    /// Feed one fix while FLYING. Returns true on the read that completes the
    /// required run of quiet reads; the accumulator is cleared at that point.
    pub fn observe_flying(&mut self, fix: GpsFix) -> bool {
        let step = self.acc.advance(fix);
        self.acc.distance_m += step;
        if self.acc.distance_m < self.stationary_threshold_m {
            self.acc.quiet_reads += 1;
        } else {
            self.acc.quiet_reads = 0;
            self.acc.distance_m = 0.0;
        }

        if self.acc.quiet_reads >= self.reads_required {
            self.reset();
            return true;
        }
        false
    }

    /// Feed one fix while STATIONARY after the burst. Returns true when a
    /// single poll-to-poll step exceeds the resume threshold.
    pub fn observe_stationary(&mut self, fix: GpsFix) -> bool {
        let step = self.acc.advance(fix);
        if step > self.resume_threshold_m {
            self.reset();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: GpsFix = GpsFix { lat: 45.265887, lon: -75.729143 };

    fn north_of(fix: GpsFix, metres: f64) -> GpsFix {
        GpsFix { lat: fix.lat + (metres / EARTH_RADIUS_M).to_degrees(), lon: fix.lon }
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 111_195.0 * 0.005, "got {}", d);
        assert_eq!(haversine_m(45.0, -75.0, 45.0, -75.0), 0.0);
    }

    #[test]
    fn stops_on_the_nth_quiet_read() {
        let mut det = FlightPhaseDetector::new(&FlightConfig::default());
        for i in 1..5 {
            assert!(!det.observe_flying(HOME), "fired early on read {}", i);
        }
        assert!(det.observe_flying(HOME));
        assert!(det.accumulator().previous.is_none());
        assert_eq!(det.accumulator().quiet_reads, 0);
    }

    #[test]
    fn a_jump_resets_the_count() {
        let mut det = FlightPhaseDetector::new(&FlightConfig::default());
        for _ in 0..4 {
            assert!(!det.observe_flying(HOME));
        }
        let moved = north_of(HOME, 10.0);
        assert!(!det.observe_flying(moved));
        assert_eq!(det.accumulator().quiet_reads, 0);
        for _ in 0..4 {
            assert!(!det.observe_flying(moved));
        }
        assert!(det.observe_flying(moved));
    }

    #[test]
    fn drift_accumulates_across_reads() {
        let mut det = FlightPhaseDetector::new(&FlightConfig::default());
        let mut fix = HOME;
        assert!(!det.observe_flying(fix));
        for _ in 0..3 {
            fix = north_of(fix, 0.2);
            det.observe_flying(fix);
        }
        // 0.6 m total breaks the threshold on the third drift step
        assert_eq!(det.accumulator().quiet_reads, 0);
    }

    #[test]
    fn resumes_only_on_a_large_step() {
        let mut det = FlightPhaseDetector::new(&FlightConfig::default());
        assert!(!det.observe_stationary(HOME));
        assert!(!det.observe_stationary(north_of(HOME, 1.0)));
        assert!(det.observe_stationary(north_of(HOME, 5.0)));
        assert!(det.accumulator().previous.is_none());
    }
}
