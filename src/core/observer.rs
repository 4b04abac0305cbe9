use super::job::{JobInfo, JobStatus};

/// Debug-build invariant checks over registry snapshots.
#[derive(Debug, Default)]
pub struct Observer {
    step: u64,
}

impl Observer {
    pub fn new() -> Self {
        Self { step: 0 }
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn observe(&mut self, jobs: &[JobInfo]) {
        self.step += 1;

        for job in jobs {
            let id = job.id;
            if let (Some(first), Some(done)) = (job.first_scheduled_at, job.completed_at) {
                debug_assert!(
                    first <= done,
                    "job {id} completed before it was first scheduled"
                );
            }
            if let Some(done) = job.completed_at {
                debug_assert!(
                    job.status.is_terminal(),
                    "job {id} has a completion time but status {}",
                    job.status
                );
                debug_assert!(
                    job.accumulated_run_time <= done.saturating_duration_since(job.created_at),
                    "job {id} ran longer than its turnaround"
                );
            }
            if job.status.is_terminal() {
                debug_assert!(
                    job.completed_at.is_some(),
                    "terminal job {id} missing completion time"
                );
            }
        }
    }

    /// Whether at most one job of a managed set is `Running`.
    ///
    /// Not asserted: a user can `fg` a job the priority service is holding.
    pub fn observe_exclusive(&mut self, managed: &[JobInfo]) -> bool {
        self.observe(managed);
        managed
            .iter()
            .filter(|job| job.status == JobStatus::Running)
            .count()
            <= 1
    }
}
