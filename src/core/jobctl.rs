use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::job::{JobId, JobInfo, JobStatus};
use super::process::ProcessControl;
use super::registry::Registry;
use crate::error::JobError;

const FOREGROUND_POLL: Duration = Duration::from_millis(50);

/// Registry plus process-control capability, shared by the shell and schedulers.
#[derive(Clone)]
pub struct JobControl {
    registry: Arc<Registry>,
    control: Arc<dyn ProcessControl>,
}

impl JobControl {
    pub fn new(registry: Arc<Registry>, control: Arc<dyn ProcessControl>) -> Self {
        Self { registry, control }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn control(&self) -> &Arc<dyn ProcessControl> {
        &self.control
    }

    /// Suspend a running job. Fails if it is already stopped or terminal.
    pub fn pause(&self, id: JobId) -> Result<JobInfo, JobError> {
        self.registry.with_job(id, |job| {
            match job.status {
                JobStatus::Stopped => return Err(JobError::AlreadyStopped(id)),
                status if status.is_terminal() => return Err(JobError::AlreadyTerminal(id)),
                _ => {}
            }
            self.control
                .suspend(&mut job.process)
                .map_err(|source| JobError::Control { id, source })?;
            job.mark_stopped();
            Ok(job.info())
        })?
    }

    /// Continue a job in the background. Resuming a running job is a no-op.
    pub fn resume(&self, id: JobId) -> Result<JobInfo, JobError> {
        self.registry.with_job(id, |job| {
            if job.status.is_terminal() {
                return Err(JobError::AlreadyTerminal(id));
            }
            self.control
                .resume(&mut job.process)
                .map_err(|source| JobError::Control { id, source })?;
            job.status = JobStatus::Running;
            Ok(job.info())
        })?
    }

    /// Terminate a job's process and mark it `Killed`.
    pub fn kill(&self, id: JobId) -> Result<JobInfo, JobError> {
        self.registry.with_job(id, |job| {
            if job.status.is_terminal() {
                return Err(JobError::AlreadyTerminal(id));
            }
            self.control
                .terminate(&mut job.process)
                .map_err(|source| JobError::Control { id, source })?;
            job.mark_killed(Instant::now());
            Ok(job.info())
        })?
    }

    /// Resume a job and block until its process exits.
    ///
    /// Polls instead of waiting on the child so the registry lock is only
    /// held briefly and the priority service keeps running.
    pub fn foreground(&self, id: JobId) -> Result<JobInfo, JobError> {
        self.resume(id)?;
        loop {
            let finished = self.registry.with_job(id, |job| {
                if self.control.is_alive(&mut job.process) {
                    None
                } else {
                    job.mark_completed(Instant::now());
                    Some(job.info())
                }
            })?;
            if let Some(info) = finished {
                return Ok(info);
            }
            thread::sleep(FOREGROUND_POLL);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::process::{ProcessHandle, SignalControl};

    fn setup() -> JobControl {
        JobControl::new(Arc::new(Registry::new()), Arc::new(SignalControl))
    }

    fn launch(ctl: &JobControl, args: &[&str]) -> JobId {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let process = ProcessHandle::spawn("sleep", &args).unwrap();
        ctl.registry().create(process, format!("sleep {}", args.join(" ")), None).id
    }

    #[test]
    fn pause_then_resume() {
        let ctl = setup();
        let id = launch(&ctl, &["5"]);

        assert_eq!(ctl.pause(id).unwrap().status, JobStatus::Stopped);
        assert!(matches!(ctl.pause(id), Err(JobError::AlreadyStopped(_))));
        assert_eq!(ctl.resume(id).unwrap().status, JobStatus::Running);
        assert_eq!(ctl.resume(id).unwrap().status, JobStatus::Running);

        assert_eq!(ctl.kill(id).unwrap().status, JobStatus::Killed);
    }

    #[test]
    fn kill_twice_fails_without_touching_others() {
        let ctl = setup();
        let victim = launch(&ctl, &["5"]);
        let bystander = launch(&ctl, &["5"]);
        ctl.pause(bystander).unwrap();

        ctl.kill(victim).unwrap();
        assert!(matches!(ctl.kill(victim), Err(JobError::AlreadyTerminal(_))));
        assert_eq!(ctl.registry().get(bystander).unwrap().status, JobStatus::Stopped);

        ctl.kill(bystander).unwrap();
    }

    #[test]
    fn kill_of_exited_process_reports_failure() {
        let ctl = setup();
        let id = launch(&ctl, &["0"]);
        thread::sleep(Duration::from_millis(200));

        let err = ctl.kill(id).unwrap_err();
        assert!(matches!(err, JobError::Control { .. }));
        assert_eq!(ctl.registry().get(id).unwrap().status, JobStatus::Running);
    }

    #[test]
    fn unknown_ids_mutate_nothing() {
        let ctl = setup();
        let id = launch(&ctl, &["5"]);
        let before = ctl.registry().get(id).unwrap().status;

        assert!(matches!(ctl.pause(99), Err(JobError::NotFound(99))));
        assert!(matches!(ctl.resume(99), Err(JobError::NotFound(99))));
        assert!(matches!(ctl.foreground(99), Err(JobError::NotFound(99))));
        assert_eq!(ctl.registry().get(id).unwrap().status, before);

        ctl.kill(id).unwrap();
    }

    #[test]
    fn foreground_waits_for_exit() {
        let ctl = setup();
        let id = launch(&ctl, &["0.2"]);
        ctl.pause(id).unwrap();

        let info = ctl.foreground(id).unwrap();
        assert_eq!(info.status, JobStatus::Done);
        assert!(info.completed_at.is_some());
    }
}
