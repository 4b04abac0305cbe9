use std::time::Duration;

use crate::core::JobId;

/// Scheduling decisions, in the order a scheduler made them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedEvent {
    Dispatched {
        job: JobId,
    },
    Suspended {
        job: JobId,
        ran: Duration,
    },
    Preempted {
        job: JobId,
        by: JobId,
    },
    Completed {
        job: JobId,
    },
    // Dropped from a queue because its process was already gone
    Discarded {
        job: JobId,
    },
}

impl SchedEvent {
    pub fn job(&self) -> JobId {
        match *self {
            Self::Dispatched { job }
            | Self::Suspended { job, .. }
            | Self::Preempted { job, .. }
            | Self::Completed { job }
            | Self::Discarded { job } => job,
        }
    }
}
