use std::fmt;
use std::time::{Duration, Instant};

use super::process::ProcessHandle;

/// Monotonic job identifier, starting at 1 and never reused.
pub type JobId = u64;

/// Job priority; larger values are more urgent.
pub type Priority = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
    Done,
    Killed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Killed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Done => "Done",
            Self::Killed => "Killed",
        };
        f.write_str(name)
    }
}

/// One launched OS process plus its scheduling metadata.
///
/// Owned by the [`Registry`](super::Registry); everything outside the
/// registry sees [`JobInfo`] snapshots instead.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub process: ProcessHandle,
    pub command_line: String,
    pub status: JobStatus,
    pub priority: Option<Priority>,
    pub created_at: Instant,
    pub first_scheduled_at: Option<Instant>,
    pub accumulated_run_time: Duration,
    pub completed_at: Option<Instant>,
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        process: ProcessHandle,
        command_line: String,
        priority: Option<Priority>,
    ) -> Self {
        Self {
            id,
            process,
            command_line,
            status: JobStatus::Running,
            priority,
            created_at: Instant::now(),
            first_scheduled_at: None,
            accumulated_run_time: Duration::ZERO,
            completed_at: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.process.pid()
    }

    /// Record a dispatch: stamps `first_scheduled_at` once and marks the job running.
    pub fn mark_dispatched(&mut self, now: Instant) {
        debug_assert!(
            !self.status.is_terminal(),
            "job {} dispatched after reaching {}",
            self.id,
            self.status
        );
        self.first_scheduled_at.get_or_insert(now);
        self.status = JobStatus::Running;
    }

    pub fn mark_stopped(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Stopped;
        }
    }

    /// Credit run time from a slice. Terminal jobs are frozen.
    pub fn add_run_time(&mut self, ran: Duration) {
        if self.status.is_terminal() {
            return;
        }
        self.accumulated_run_time = self.accumulated_run_time.saturating_add(ran);
    }

    /// Retire the job as `Done`. A `Killed` job keeps its status and timestamp.
    pub fn mark_completed(&mut self, now: Instant) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Done;
        self.completed_at = Some(self.clamp_completion(now));
    }

    pub fn mark_killed(&mut self, now: Instant) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Killed;
        self.completed_at = Some(self.clamp_completion(now));
    }

    // Keeps first_scheduled_at <= completed_at.
    fn clamp_completion(&self, now: Instant) -> Instant {
        match self.first_scheduled_at {
            Some(first) if first > now => first,
            _ => now,
        }
    }

    pub fn info(&self) -> JobInfo {
        JobInfo {
            id: self.id,
            pid: self.pid(),
            command_line: self.command_line.clone(),
            status: self.status,
            priority: self.priority,
            created_at: self.created_at,
            first_scheduled_at: self.first_scheduled_at,
            accumulated_run_time: self.accumulated_run_time,
            completed_at: self.completed_at,
        }
    }
}

/// Read-only snapshot of a [`Job`] taken under the registry lock.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub id: JobId,
    pub pid: u32,
    pub command_line: String,
    pub status: JobStatus,
    pub priority: Option<Priority>,
    pub created_at: Instant,
    pub first_scheduled_at: Option<Instant>,
    pub accumulated_run_time: Duration,
    pub completed_at: Option<Instant>,
}

impl JobInfo {
    /// Derived timing metrics; `None` until the job was both dispatched and retired.
    pub fn metrics(&self) -> Option<JobMetrics> {
        let first = self.first_scheduled_at?;
        let completed = self.completed_at?;
        let turnaround = completed.saturating_duration_since(self.created_at);
        Some(JobMetrics {
            turnaround,
            waiting: turnaround.saturating_sub(self.accumulated_run_time),
            response: first.saturating_duration_since(self.created_at),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobMetrics {
    pub turnaround: Duration,
    pub waiting: Duration,
    pub response: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(created: Instant) -> JobInfo {
        JobInfo {
            id: 1,
            pid: 42,
            command_line: "sleep 1".into(),
            status: JobStatus::Done,
            priority: None,
            created_at: created,
            first_scheduled_at: None,
            accumulated_run_time: Duration::ZERO,
            completed_at: None,
        }
    }

    #[test]
    fn metrics_need_dispatch_and_completion() {
        let created = Instant::now();
        let mut job = info(created);
        assert!(job.metrics().is_none());

        job.first_scheduled_at = Some(created + Duration::from_millis(100));
        assert!(job.metrics().is_none());

        job.completed_at = Some(created + Duration::from_millis(1000));
        job.accumulated_run_time = Duration::from_millis(600);
        let m = job.metrics().unwrap();
        assert_eq!(m.turnaround, Duration::from_millis(1000));
        assert_eq!(m.waiting, Duration::from_millis(400));
        assert_eq!(m.response, Duration::from_millis(100));
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Killed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Stopped.is_terminal());
        assert_eq!(JobStatus::Stopped.to_string(), "Stopped");
    }
}
