use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::{MetricsTable, Quantum};
use crate::core::{JobId, JobInfo, Observer, ProcessControl, Registry, SchedEvent};

/// Drives a fixed cohort of jobs through equal time slices until all exit.
///
/// Runs synchronously on the caller's thread. The cohort is the registry's
/// contents at the start of [`run`](Self::run); later jobs are not picked up.
pub struct RoundRobinScheduler {
    registry: Arc<Registry>,
    control: Arc<dyn ProcessControl>,
    quantum: Quantum,
    observer: Observer,
}

/// Outcome of a round-robin run.
#[derive(Debug)]
pub struct RoundRobinReport {
    pub quantum: Quantum,
    pub passes: u64,
    pub events: Vec<SchedEvent>,
    /// Final snapshots of the cohort, in registry order.
    pub jobs: Vec<JobInfo>,
}

impl RoundRobinReport {
    /// Job ids in dispatch order.
    pub fn dispatch_order(&self) -> Vec<JobId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SchedEvent::Dispatched { job } => Some(*job),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for RoundRobinReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Round-Robin scheduling complete ({} passes, quantum {:.2}s)",
            self.passes,
            self.quantum.get().as_secs_f64()
        )?;
        write!(f, "{}", MetricsTable(&self.jobs))
    }
}

impl RoundRobinScheduler {
    pub fn new(registry: Arc<Registry>, control: Arc<dyn ProcessControl>, quantum: Quantum) -> Self {
        Self {
            registry,
            control,
            quantum,
            observer: Observer::new(),
        }
    }

    pub fn run(mut self) -> RoundRobinReport {
        let cohort = self.registry.ids();
        let mut events = Vec::new();
        log::info!(
            "round-robin over {} jobs, quantum {:?}",
            cohort.len(),
            self.quantum.get()
        );

        for &id in &cohort {
            self.park(id);
        }

        let mut passes = 0;
        loop {
            let alive: Vec<JobId> = cohort.iter().copied().filter(|&id| self.alive(id)).collect();
            if alive.is_empty() {
                break;
            }
            passes += 1;
            for id in alive {
                self.run_slice(id, &mut events);
            }
            self.observer.observe(&self.registry.list());
        }

        let jobs = cohort
            .iter()
            .filter_map(|&id| self.registry.get(id).ok())
            .collect();
        RoundRobinReport {
            quantum: self.quantum,
            passes,
            events,
            jobs,
        }
    }

    // Suspend a cohort job before the first pass; retire it if already gone.
    fn park(&self, id: JobId) {
        let control = &self.control;
        let _ = self.registry.with_job(id, |job| {
            if job.status.is_terminal() {
                return;
            }
            if !control.is_alive(&mut job.process) {
                job.mark_completed(Instant::now());
                return;
            }
            match control.suspend(&mut job.process) {
                Ok(()) => job.mark_stopped(),
                Err(err) => log::warn!("job {id}: cannot suspend before scheduling: {err}"),
            }
        });
    }

    fn alive(&self, id: JobId) -> bool {
        let control = &self.control;
        self.registry
            .with_job(id, |job| !job.status.is_terminal() && control.is_alive(&mut job.process))
            .unwrap_or(false)
    }

    fn run_slice(&self, id: JobId, events: &mut Vec<SchedEvent>) {
        let control = &self.control;
        let start = Instant::now();
        let dispatched = self.registry.with_job(id, |job| {
            if job.status.is_terminal() || !control.is_alive(&mut job.process) {
                job.mark_completed(start);
                return false;
            }
            job.mark_dispatched(start);
            if let Err(err) = control.resume(&mut job.process) {
                log::warn!("job {id}: resume failed, treating as complete: {err}");
                job.mark_completed(start);
                return false;
            }
            true
        });
        match dispatched {
            Ok(true) => {
                log::debug!("resuming job {id}");
                events.push(SchedEvent::Dispatched { job: id });
            }
            Ok(false) => {
                events.push(SchedEvent::Completed { job: id });
                return;
            }
            Err(err) => {
                log::warn!("{err}");
                return;
            }
        }

        thread::sleep(self.quantum.get());

        let end = Instant::now();
        let ran = end.saturating_duration_since(start);
        let event = self.registry.with_job(id, |job| {
            job.add_run_time(ran);
            if !control.is_alive(&mut job.process) {
                job.mark_completed(end);
                return SchedEvent::Completed { job: id };
            }
            match control.suspend(&mut job.process) {
                Ok(()) => {
                    job.mark_stopped();
                    SchedEvent::Suspended { job: id, ran }
                }
                Err(err) => {
                    log::warn!("job {id}: suspend failed, treating as complete: {err}");
                    job.mark_completed(end);
                    SchedEvent::Completed { job: id }
                }
            }
        });
        match event {
            Ok(event) => {
                log::debug!("{event:?}");
                if let SchedEvent::Completed { .. } = event {
                    log::info!("job {id} completed");
                }
                events.push(event);
            }
            Err(err) => log::warn!("{err}"),
        }
    }
}
