use std::fmt;
use std::io;

use crate::core::JobId;
use crate::sim::{MAX_FRAMES, SimPid};

/// Failure to suspend, resume or terminate an OS process.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ControlError {
    /// The process could not be controlled (for example it already exited).
    ProcessControl(String),
    /// No such process.
    ProcessNotFound(u32),
    /// The caller lacks rights over the process.
    PermissionDenied(u32),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessControl(detail) => write!(f, "process control failed: {detail}"),
            Self::ProcessNotFound(pid) => write!(f, "no process found with PID {pid}"),
            Self::PermissionDenied(pid) => write!(f, "permission denied for process {pid}"),
        }
    }
}

impl std::error::Error for ControlError {}

/// Errors from job registry and job-control operations.
#[derive(Debug)]
#[non_exhaustive]
pub enum JobError {
    NotFound(JobId),
    /// The job already reached `Done` or `Killed`.
    AlreadyTerminal(JobId),
    AlreadyStopped(JobId),
    Control { id: JobId, source: ControlError },
    Spawn { command: String, source: io::Error },
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "job {id} not found"),
            Self::AlreadyTerminal(id) => write!(f, "job {id} has already terminated"),
            Self::AlreadyStopped(id) => write!(f, "job {id} is already stopped"),
            Self::Control { id, source } => write!(f, "job {id}: {source}"),
            Self::Spawn { command, source } => write!(f, "failed to execute {command}: {source}"),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Control { source, .. } => Some(source),
            Self::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors from the memory manager.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MemoryError {
    UnknownProcess(SimPid),
    DuplicateProcess(SimPid),
    /// A manager needs at least one frame.
    NoFrames,
    TooManyFrames(usize),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProcess(pid) => write!(f, "process {pid} is not registered"),
            Self::DuplicateProcess(pid) => write!(f, "process {pid} is already registered"),
            Self::NoFrames => f.write_str("frame count must be at least 1"),
            Self::TooManyFrames(n) => {
                write!(f, "frame count {n} exceeds the limit of {MAX_FRAMES}")
            }
        }
    }
}

impl std::error::Error for MemoryError {}

/// Malformed input caught at the shell or config boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArgError {
    /// Wrong arity; carries the usage line.
    Usage(&'static str),
    InvalidNumber { what: &'static str, value: String },
    /// Parsed, but outside the accepted range.
    OutOfRange { what: &'static str, value: String },
    InvalidAlgorithm(String),
    UnknownFlag(String),
}

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(usage) => write!(f, "usage: {usage}"),
            Self::InvalidNumber { what, value } => write!(f, "invalid {what}: '{value}'"),
            Self::OutOfRange { what, value } => write!(f, "{what} out of range: '{value}'"),
            Self::InvalidAlgorithm(name) => {
                write!(f, "unknown algorithm '{name}' (expected FIFO or LRU)")
            }
            Self::UnknownFlag(flag) => write!(f, "unknown flag '{flag}'"),
        }
    }
}

impl std::error::Error for ArgError {}
