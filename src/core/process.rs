//! Process control seam; the backend is picked once by [`host_control`].

use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;

use crate::error::ControlError;

/// Exclusively owned handle to a launched OS process.
///
/// The exit status is cached the first time a poll observes it, so a reaped
/// pid is never signalled again.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    exit: Option<ExitStatus>,
    // Last state requested through a ProcessControl backend
    suspended: bool,
}

impl ProcessHandle {
    /// Launch a job: its own process group, no terminal input.
    pub fn spawn(program: &str, args: &[String]) -> io::Result<Self> {
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command.spawn().map(Self::from_child)
    }

    /// Launch a foreground program that shares the shell's terminal and
    /// process group, so it reads stdin and receives Ctrl-C.
    pub fn spawn_foreground(program: &str, args: &[String]) -> io::Result<Self> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .spawn()
            .map(Self::from_child)
    }

    pub fn from_child(child: Child) -> Self {
        Self {
            child,
            exit: None,
            suspended: false,
        }
    }

    /// Whether the last control request left the process suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Non-blocking liveness poll. Reaps the process if it has exited.
    pub fn poll_alive(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit = Some(status);
                false
            }
            Ok(None) => true,
            Err(err) => {
                log::warn!("liveness poll for pid {} failed: {err}", self.pid());
                false
            }
        }
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    /// Block until the process exits. Ctrl-C is ignored by the shell for the
    /// duration so only the foreground program receives it.
    pub fn wait_foreground(&mut self) -> io::Result<ExitStatus> {
        if let Some(status) = self.exit {
            return Ok(status);
        }
        let status = {
            let _guard = InterruptGuard::ignore();
            self.child.wait()?
        };
        self.exit = Some(status);
        Ok(status)
    }

    #[cfg_attr(unix, allow(dead_code))]
    fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    fn ensure_alive(&mut self) -> Result<(), ControlError> {
        if self.poll_alive() {
            Ok(())
        } else {
            Err(ControlError::ProcessControl(format!(
                "process {} has already exited",
                self.pid()
            )))
        }
    }
}

#[cfg(unix)]
struct InterruptGuard(libc::sighandler_t);

#[cfg(unix)]
impl InterruptGuard {
    fn ignore() -> Self {
        // SAFETY: installs SIG_IGN; no handler code runs in this process.
        Self(unsafe { libc::signal(libc::SIGINT, libc::SIG_IGN) })
    }
}

#[cfg(unix)]
impl Drop for InterruptGuard {
    fn drop(&mut self) {
        // SAFETY: restores the disposition saved by `ignore`.
        unsafe {
            libc::signal(libc::SIGINT, self.0);
        }
    }
}

#[cfg(not(unix))]
struct InterruptGuard;

#[cfg(not(unix))]
impl InterruptGuard {
    fn ignore() -> Self {
        Self
    }
}

/// Suspend/resume/terminate capability over a [`ProcessHandle`].
pub trait ProcessControl: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;

    fn is_alive(&self, process: &mut ProcessHandle) -> bool {
        process.poll_alive()
    }

    /// Stop execution without terminating. A stopped process stays stopped.
    fn suspend(&self, process: &mut ProcessHandle) -> Result<(), ControlError>;

    /// Continue a stopped process. A running process keeps running.
    fn resume(&self, process: &mut ProcessHandle) -> Result<(), ControlError>;

    /// Request process death.
    fn terminate(&self, process: &mut ProcessHandle) -> Result<(), ControlError>;
}

/// Pick the process-control backend this host supports.
pub fn host_control() -> Arc<dyn ProcessControl> {
    #[cfg(unix)]
    {
        Arc::new(SignalControl)
    }
    #[cfg(windows)]
    {
        Arc::new(NativeSuspendControl)
    }
}

#[cfg(unix)]
pub use signal::SignalControl;

#[cfg(unix)]
mod signal {
    use std::io;

    use super::{ControlError, ProcessControl, ProcessHandle};

    /// Job-control signals delivered to the job's process group.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SignalControl;

    fn send(process: &ProcessHandle, signal: libc::c_int) -> Result<(), ControlError> {
        let pid = process.pid();
        let Ok(pgrp) = libc::pid_t::try_from(pid) else {
            return Err(ControlError::ProcessNotFound(pid));
        };
        // SAFETY: killpg has no memory-safety preconditions; the group id
        // is the pid of a child we spawned as a group leader.
        if unsafe { libc::killpg(pgrp, signal) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        Err(match err.raw_os_error() {
            Some(libc::ESRCH) => ControlError::ProcessNotFound(pid),
            Some(libc::EPERM) => ControlError::PermissionDenied(pid),
            _ => ControlError::ProcessControl(format!("signal {signal} to {pid}: {err}")),
        })
    }

    impl ProcessControl for SignalControl {
        fn name(&self) -> &'static str {
            "signals"
        }

        fn suspend(&self, process: &mut ProcessHandle) -> Result<(), ControlError> {
            process.ensure_alive()?;
            send(process, libc::SIGSTOP)?;
            process.suspended = true;
            Ok(())
        }

        fn resume(&self, process: &mut ProcessHandle) -> Result<(), ControlError> {
            process.ensure_alive()?;
            send(process, libc::SIGCONT)?;
            process.suspended = false;
            Ok(())
        }

        fn terminate(&self, process: &mut ProcessHandle) -> Result<(), ControlError> {
            if !process.poll_alive() {
                return Err(ControlError::ProcessNotFound(process.pid()));
            }
            send(process, libc::SIGTERM)?;
            // SIGTERM stays pending on a stopped group until it is continued.
            match send(process, libc::SIGCONT) {
                Ok(()) => process.suspended = false,
                Err(err) => log::debug!("continue after terminate: {err}"),
            }
            Ok(())
        }
    }
}

#[cfg(windows)]
pub use native::NativeSuspendControl;

#[cfg(windows)]
mod native {
    use std::ffi::c_void;
    use std::os::windows::io::AsRawHandle;

    use super::{ControlError, ProcessControl, ProcessHandle};

    #[link(name = "ntdll")]
    unsafe extern "system" {
        fn NtSuspendProcess(process: *mut c_void) -> i32;
        fn NtResumeProcess(process: *mut c_void) -> i32;
    }

    /// Native whole-process suspension for hosts without job-control signals.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NativeSuspendControl;

    fn check(process: &ProcessHandle, op: &str, status: i32) -> Result<(), ControlError> {
        if status >= 0 {
            Ok(())
        } else {
            Err(ControlError::ProcessControl(format!(
                "{op} of {} failed with NTSTATUS {status:#x}",
                process.pid()
            )))
        }
    }

    impl ProcessControl for NativeSuspendControl {
        fn name(&self) -> &'static str {
            "native-suspend"
        }

        // NtSuspendProcess nests: every call bumps each thread's suspend
        // count, so only the first suspend and the matching resume go through.
        fn suspend(&self, process: &mut ProcessHandle) -> Result<(), ControlError> {
            process.ensure_alive()?;
            if process.suspended {
                return Ok(());
            }
            let handle = process.child_mut().as_raw_handle();
            // SAFETY: the handle belongs to a live child we own.
            let status = unsafe { NtSuspendProcess(handle) };
            check(process, "suspend", status)?;
            process.suspended = true;
            Ok(())
        }

        fn resume(&self, process: &mut ProcessHandle) -> Result<(), ControlError> {
            process.ensure_alive()?;
            if !process.suspended {
                return Ok(());
            }
            let handle = process.child_mut().as_raw_handle();
            // SAFETY: as above.
            let status = unsafe { NtResumeProcess(handle) };
            check(process, "resume", status)?;
            process.suspended = false;
            Ok(())
        }

        fn terminate(&self, process: &mut ProcessHandle) -> Result<(), ControlError> {
            if !process.poll_alive() {
                return Err(ControlError::ProcessNotFound(process.pid()));
            }
            let pid = process.pid();
            process.child_mut().kill().map_err(|err| match err.kind() {
                std::io::ErrorKind::PermissionDenied => ControlError::PermissionDenied(pid),
                _ => ControlError::ProcessControl(format!("terminate {pid}: {err}")),
            })
        }
    }
}
