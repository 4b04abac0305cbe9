pub mod priority;
pub mod round_robin;

use average::Estimate;
use std::fmt;
use std::time::Duration;

use crate::core::JobInfo;
use crate::error::ArgError;
pub use priority::{IntakeQueue, PriorityScheduler, PriorityService};
pub use round_robin::{RoundRobinReport, RoundRobinScheduler};

pub const DEFAULT_QUANTUM: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A strictly positive time slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantum(Duration);

impl Quantum {
    pub fn new(slice: Duration) -> Option<Self> {
        (!slice.is_zero()).then_some(Self(slice))
    }

    /// Parse a quantum given in (possibly fractional) seconds.
    pub fn parse_secs(value: &str) -> Result<Self, ArgError> {
        let secs: f64 = value.parse().map_err(|_| ArgError::InvalidNumber {
            what: "quantum",
            value: value.to_string(),
        })?;
        let out_of_range = || ArgError::OutOfRange {
            what: "quantum",
            value: value.to_string(),
        };
        if !secs.is_finite() || secs <= 0.0 {
            return Err(out_of_range());
        }
        let slice = Duration::try_from_secs_f64(secs).map_err(|_| out_of_range())?;
        Self::new(slice).ok_or_else(out_of_range)
    }

    pub fn get(self) -> Duration {
        self.0
    }
}

impl Default for Quantum {
    fn default() -> Self {
        Self(DEFAULT_QUANTUM)
    }
}

/// Mean turnaround, waiting and response time over retired jobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageMetrics {
    pub jobs: usize,
    pub turnaround: f64,
    pub waiting: f64,
    pub response: f64,
}

impl AverageMetrics {
    pub fn from_jobs(jobs: &[JobInfo]) -> Option<Self> {
        let metrics: Vec<_> = jobs.iter().filter_map(JobInfo::metrics).collect();
        if metrics.is_empty() {
            return None;
        }
        Some(Self {
            jobs: metrics.len(),
            turnaround: avg(metrics.iter().map(|m| m.turnaround.as_secs_f64())),
            waiting: avg(metrics.iter().map(|m| m.waiting.as_secs_f64())),
            response: avg(metrics.iter().map(|m| m.response.as_secs_f64())),
        })
    }
}

fn avg(iter: impl Iterator<Item = f64>) -> f64 {
    iter.collect::<average::Mean>().estimate()
}

/// Per-job metric lines followed by averages.
pub struct MetricsTable<'a>(pub &'a [JobInfo]);

impl fmt::Display for MetricsTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for job in self.0 {
            writeln!(f, "Job {} ({}):", job.id, job.command_line)?;
            match job.metrics() {
                Some(m) => {
                    writeln!(f, "  Turnaround time: {:.2}s", m.turnaround.as_secs_f64())?;
                    writeln!(f, "  Waiting    time: {:.2}s", m.waiting.as_secs_f64())?;
                    writeln!(f, "  Response   time: {:.2}s", m.response.as_secs_f64())?;
                }
                None => writeln!(f, "  n/a")?,
            }
        }
        if let Some(avg) = AverageMetrics::from_jobs(self.0) {
            writeln!(f, "Averages over {} jobs:", avg.jobs)?;
            writeln!(f, "  Turnaround time: {:.2}s", avg.turnaround)?;
            writeln!(f, "  Waiting    time: {:.2}s", avg.waiting)?;
            write!(f, "  Response   time: {:.2}s", avg.response)?;
        }
        Ok(())
    }
}
