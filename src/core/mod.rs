pub mod event;
pub mod job;
pub mod jobctl;
pub mod observer;
pub mod process;
pub mod registry;

pub use event::SchedEvent;
pub use job::{Job, JobId, JobInfo, JobMetrics, JobStatus, Priority};
pub use jobctl::JobControl;
pub use observer::Observer;
pub use process::{ProcessControl, ProcessHandle, host_control};
pub use registry::Registry;
