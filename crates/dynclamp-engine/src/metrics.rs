//! Per-trial timing metrics.
//!
//! [`TickMetrics`] accumulates how long each tick's compute phase took and
//! how late each paced wake-up was. It is updated once per tick by the
//! engine and handed back in the [`TrialReport`](crate::TrialReport).

use std::time::Duration;

/// Timing summary of the ticks executed in one trial.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickMetrics {
    /// Ticks whose compute phase was recorded.
    pub ticks: u64,
    /// Total time spent in event dispatch, input read and step.
    pub total_compute: Duration,
    /// Longest single compute phase.
    pub max_compute: Duration,
    /// Longest wake-up lateness reported by the pacer.
    pub max_lateness: Duration,
    /// Ticks whose compute phase alone exceeded the tick duration.
    pub overruns: u64,
}

impl TickMetrics {
    /// Record one tick's compute time against the tick budget `dt`.
    pub fn record_compute(&mut self, compute: Duration, dt: Duration) {
        self.ticks += 1;
        self.total_compute += compute;
        self.max_compute = self.max_compute.max(compute);
        if compute > dt {
            self.overruns += 1;
        }
    }

    /// Record one pacer wake-up lateness.
    pub fn record_lateness(&mut self, lateness: Duration) {
        self.max_lateness = self.max_lateness.max(lateness);
    }

    /// Mean compute time per tick, zero when nothing was recorded.
    pub fn mean_compute(&self) -> Duration {
        match u32::try_from(self.ticks) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_compute / n,
            Err(_) => Duration::from_secs_f64(self.total_compute.as_secs_f64() / self.ticks as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = TickMetrics::default();
        assert_eq!(m.ticks, 0);
        assert_eq!(m.mean_compute(), Duration::ZERO);
        assert_eq!(m.max_lateness, Duration::ZERO);
        assert_eq!(m.overruns, 0);
    }

    #[test]
    fn records_max_mean_and_overruns() {
        let dt = Duration::from_micros(100);
        let mut m = TickMetrics::default();
        m.record_compute(Duration::from_micros(20), dt);
        m.record_compute(Duration::from_micros(40), dt);
        m.record_compute(Duration::from_micros(150), dt);
        m.record_lateness(Duration::from_micros(5));
        m.record_lateness(Duration::from_micros(3));
        assert_eq!(m.ticks, 3);
        assert_eq!(m.max_compute, Duration::from_micros(150));
        assert_eq!(m.mean_compute(), Duration::from_micros(70));
        assert_eq!(m.max_lateness, Duration::from_micros(5));
        assert_eq!(m.overruns, 1);
    }
}
