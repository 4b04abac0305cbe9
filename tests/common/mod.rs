#![allow(dead_code)]

use std::time::Duration;

use jobsim::core::{JobId, Priority, ProcessControl, ProcessHandle, Registry};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(15);

/// Launch the `busy` demo workload as a job.
pub fn busy(registry: &Registry, secs: f64, priority: Option<Priority>) -> JobId {
    let process = ProcessHandle::spawn(env!("CARGO_BIN_EXE_busy"), &[secs.to_string()])
        .expect("spawn busy");
    registry
        .create(process, format!("busy {secs}"), priority)
        .id
}

/// Stop a job the way `runp` does before queueing it.
pub fn hold(registry: &Registry, control: &dyn ProcessControl, id: JobId) {
    registry
        .with_job(id, |job| {
            control.suspend(&mut job.process).expect("suspend");
            job.mark_stopped();
        })
        .expect("job exists");
}

/// Terminate whatever is still alive so tests never leak processes.
pub fn terminate_all(registry: &Registry, control: &dyn ProcessControl) {
    for id in registry.ids() {
        let _ = registry.with_job(id, |job| control.terminate(&mut job.process));
    }
}
