use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use super::job::{Job, JobId, JobInfo, JobStatus, Priority};
use super::process::ProcessHandle;
use crate::error::JobError;

/// Thread-safe, insertion-ordered collection of jobs.
///
/// The single source of truth for job existence and status. Every operation
/// runs under one lock, so readers never see a half-updated job.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    jobs: Vec<Job>,
    // JobId --> jobs[index]
    index: FxHashMap<JobId, usize>,
    // Last id handed out; ids start at 1
    last_id: JobId,
}

impl Inner {
    fn job_mut(&mut self, id: JobId) -> Result<&mut Job, JobError> {
        let slot = *self.index.get(&id).ok_or(JobError::NotFound(id))?;
        Ok(&mut self.jobs[slot])
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a freshly launched process as a `Running` job.
    pub fn create(
        &self,
        process: ProcessHandle,
        command_line: impl Into<String>,
        priority: Option<Priority>,
    ) -> JobInfo {
        let mut inner = self.lock();
        inner.last_id += 1;
        let id = inner.last_id;

        let job = Job::new(id, process, command_line.into(), priority);
        let info = job.info();

        let slot = inner.jobs.len();
        inner.jobs.push(job);
        inner.index.insert(id, slot);
        log::debug!("registered job {id} (pid {})", info.pid);
        info
    }

    pub fn get(&self, id: JobId) -> Result<JobInfo, JobError> {
        let mut inner = self.lock();
        inner.job_mut(id).map(|job| job.info())
    }

    /// Snapshot of every job in insertion order.
    pub fn list(&self) -> Vec<JobInfo> {
        self.lock().jobs.iter().map(Job::info).collect()
    }

    pub fn ids(&self) -> Vec<JobId> {
        self.lock().jobs.iter().map(|job| job.id).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set a job's status. Terminal statuses never revert, and reaching one
    /// stamps `completed_at`.
    pub fn update_status(&self, id: JobId, status: JobStatus) -> Result<(), JobError> {
        let mut inner = self.lock();
        let job = inner.job_mut(id)?;
        if job.status.is_terminal() {
            return if job.status == status {
                Ok(())
            } else {
                Err(JobError::AlreadyTerminal(id))
            };
        }
        match status {
            JobStatus::Done => job.mark_completed(Instant::now()),
            JobStatus::Killed => job.mark_killed(Instant::now()),
            JobStatus::Running | JobStatus::Stopped => job.status = status,
        }
        Ok(())
    }

    /// Run `f` against one job while holding the registry lock.
    ///
    /// `f` must not block; it shares the lock with the scheduler loops.
    pub fn with_job<R>(&self, id: JobId, f: impl FnOnce(&mut Job) -> R) -> Result<R, JobError> {
        let mut inner = self.lock();
        inner.job_mut(id).map(f)
    }

    /// Poll every non-terminal job and retire the ones whose process exited.
    /// Returns the ids that were retired by this call.
    pub fn reap(&self) -> Vec<JobId> {
        let mut inner = self.lock();
        let now = Instant::now();
        let mut retired = Vec::new();
        for job in inner.jobs.iter_mut() {
            if job.status.is_terminal() || job.process.poll_alive() {
                continue;
            }
            job.mark_completed(now);
            retired.push(job.id);
        }
        retired
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::core::process::{ProcessControl, SignalControl};

    fn sleeper() -> ProcessHandle {
        ProcessHandle::spawn("sleep", &["5".to_string()]).unwrap()
    }

    fn cleanup(registry: &Registry) {
        for id in registry.ids() {
            let _ = registry.with_job(id, |job| SignalControl.terminate(&mut job.process));
        }
    }

    #[test]
    fn ids_are_monotonic_and_listing_keeps_insertion_order() {
        let registry = Registry::new();
        let a = registry.create(sleeper(), "sleep 5", None);
        let b = registry.create(sleeper(), "sleep 5", Some(3));
        let c = registry.create(sleeper(), "sleep 5", None);
        assert_eq!((a.id, b.id, c.id), (1, 2, 3));
        assert_eq!(a.status, JobStatus::Running);
        assert!(a.first_scheduled_at.is_none());

        let listed: Vec<_> = registry.list().iter().map(|j| j.id).collect();
        assert_eq!(listed, vec![1, 2, 3]);
        assert_eq!(registry.get(2).unwrap().priority, Some(3));
        cleanup(&registry);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let registry = Registry::new();
        assert!(matches!(registry.get(9), Err(JobError::NotFound(9))));
        assert!(matches!(
            registry.update_status(9, JobStatus::Stopped),
            Err(JobError::NotFound(9))
        ));
    }

    #[test]
    fn terminal_status_never_reverts() {
        let registry = Registry::new();
        let job = registry.create(sleeper(), "sleep 5", None);
        registry.update_status(job.id, JobStatus::Stopped).unwrap();
        registry.update_status(job.id, JobStatus::Killed).unwrap();

        let killed = registry.get(job.id).unwrap();
        assert_eq!(killed.status, JobStatus::Killed);
        assert!(killed.completed_at.is_some());

        assert!(matches!(
            registry.update_status(job.id, JobStatus::Running),
            Err(JobError::AlreadyTerminal(_))
        ));
        registry.update_status(job.id, JobStatus::Killed).unwrap();
        cleanup(&registry);
    }

    #[test]
    fn reap_retires_exited_processes() {
        let registry = Registry::new();
        let quick = registry.create(ProcessHandle::spawn("true", &[]).unwrap(), "true", None);
        let slow = registry.create(sleeper(), "sleep 5", None);

        let mut retired = Vec::new();
        for _ in 0..100 {
            retired.extend(registry.reap());
            if !retired.is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(retired, vec![quick.id]);
        assert_eq!(registry.get(quick.id).unwrap().status, JobStatus::Done);
        assert_eq!(registry.get(slow.id).unwrap().status, JobStatus::Running);
        cleanup(&registry);
    }

    #[test]
    fn concurrent_readers_see_whole_jobs() {
        let registry = Arc::new(Registry::new());
        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..5 {
                    registry.create(sleeper(), "sleep 5", Some(1));
                }
            })
        };
        for _ in 0..20 {
            for job in registry.list() {
                assert_eq!(job.priority, Some(1));
                assert_eq!(job.command_line, "sleep 5");
            }
        }
        writer.join().unwrap();
        assert_eq!(registry.len(), 5);
        cleanup(&registry);
    }
}
