pub mod config;
pub mod core;
pub mod error;
pub mod scheduler;
pub mod shell;
pub mod sim;

pub use config::ShellConfig;
pub use crate::core::{Job, JobId, JobStatus, Registry};
pub use scheduler::{PriorityScheduler, RoundRobinScheduler};
pub use shell::Shell;
pub use sim::MemoryManager;
