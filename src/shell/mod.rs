//! The command dispatcher: turns input lines into calls on the registry,
//! the schedulers and the memory manager.

pub mod command;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

pub use command::{Command, ReferenceSource};

use crate::config::ShellConfig;
use crate::core::{
    JobControl, JobId, Priority, ProcessControl, ProcessHandle, Registry, host_control,
};
use crate::error::{ArgError, JobError, MemoryError};
use crate::scheduler::{IntakeQueue, PriorityScheduler, PriorityService, RoundRobinScheduler};
use crate::sim::{self, Access, MemoryManager};

/// Whether the read loop should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell {
    config: ShellConfig,
    jobs: JobControl,
    intake: IntakeQueue,
    service: Option<PriorityService>,
    // Owned by the shell thread; exclusive access serializes every call.
    memory: MemoryManager,
}

const HELP: &str = "\
Jobs:
  run <path> [args...]             launch a background job
  runp <priority> <path> [args...] launch and queue for the priority scheduler
  srr [quantum]                    round-robin all jobs until they finish
  spri                             start the priority scheduler service
  jobs | fg <id> | bg <id> | pause <id> | kill <id>
Memory:
  meminit <frames> [FIFO|LRU]      rebuild the memory manager
  memadd <pid> | memrm <pid>       register / remove a simulated process
  memreq <pid> <page>              access a page
  memstats | memstate              summary / frame map
  memsim <frames> <pages...>       compare FIFO and LRU on a reference string
  memsim <frames> --random <len> <max-page> [seed]
Other:
  echo | pwd | help | exit
  <program> [args...] [&]          run an external program";

impl Shell {
    pub fn new(config: ShellConfig) -> Result<Self, MemoryError> {
        Self::with_control(config, host_control())
    }

    pub fn with_control(
        config: ShellConfig,
        control: Arc<dyn ProcessControl>,
    ) -> Result<Self, MemoryError> {
        let memory = MemoryManager::new(config.frames, config.algorithm)?;
        log::info!("process control backend: {}", control.name());
        Ok(Self {
            jobs: JobControl::new(Arc::new(Registry::new()), control),
            intake: IntakeQueue::new(),
            service: None,
            memory,
            config,
        })
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.jobs.registry()
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn intake(&self) -> &IntakeQueue {
        &self.intake
    }

    pub fn priority_service_running(&self) -> bool {
        self.service.as_ref().is_some_and(|s| !s.is_finished())
    }

    /// Execute one line. Failures are reported on `err`; only I/O errors on
    /// the output streams propagate.
    pub fn execute(
        &mut self,
        line: &str,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<Flow> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                writeln!(err, "{}", usage_message(line, &e))?;
                return Ok(Flow::Continue);
            }
        };

        match command {
            Command::Empty => {}
            Command::Exit => return Ok(Flow::Exit),
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Echo(words) => writeln!(out, "{}", words.join(" "))?,
            Command::Pwd => match std::env::current_dir() {
                Ok(dir) => writeln!(out, "{}", dir.display())?,
                Err(e) => writeln!(err, "pwd: {e}")?,
            },
            Command::Run { program, args } => self.run(&program, &args, None, out, err)?,
            Command::RunPriority {
                priority,
                program,
                args,
            } => self.run(&program, &args, Some(priority), out, err)?,
            Command::RoundRobin { quantum } => {
                if self.registry().is_empty() {
                    writeln!(err, "srr: no jobs to schedule")?;
                } else {
                    let quantum = quantum.unwrap_or(self.config.quantum);
                    let scheduler = RoundRobinScheduler::new(
                        Arc::clone(self.registry()),
                        Arc::clone(self.jobs.control()),
                        quantum,
                    );
                    writeln!(out, "{}", scheduler.run())?;
                }
            }
            Command::StartPriority => self.start_priority(out, err)?,
            Command::Jobs => self.list_jobs(out)?,
            Command::Foreground(id) => match self.registry().get(id) {
                Ok(_) => {
                    writeln!(out, "Bringing job {id} to the foreground")?;
                    out.flush()?;
                    report(self.jobs.foreground(id), "fg", err, |job| {
                        writeln!(out, "[{}] {} | {}", job.id, job.status, job.command_line)
                    })?;
                }
                Err(e) => writeln!(err, "fg: {e}")?,
            },
            Command::Background(id) => report(self.jobs.resume(id), "bg", err, |job| {
                writeln!(out, "[{}] {} resumed in background", job.id, job.pid)
            })?,
            Command::Pause(id) => report(self.jobs.pause(id), "pause", err, |job| {
                writeln!(out, "[{}] {} paused", job.id, job.pid)
            })?,
            Command::Kill(id) => report(self.jobs.kill(id), "kill", err, |job| {
                writeln!(out, "Job {} (PID {}) terminated.", job.id, job.pid)
            })?,
            Command::MemInit { frames, algorithm } => {
                match MemoryManager::new(frames, algorithm) {
                    Ok(memory) => {
                        self.memory = memory;
                        writeln!(out, "Memory manager: {frames} frames, {algorithm}")?;
                    }
                    Err(e) => writeln!(err, "meminit: {e}")?,
                }
            }
            Command::MemAdd(pid) => match self.memory.add_process(pid) {
                Ok(()) => writeln!(out, "[+] Process {pid} added to memory manager.")?,
                Err(e) => writeln!(err, "memadd: {e}")?,
            },
            Command::MemRemove(pid) => match self.memory.remove_process(pid) {
                Ok(freed) => writeln!(out, "[-] Process {pid} removed, {freed} frames freed.")?,
                Err(e) => writeln!(err, "memrm: {e}")?,
            },
            Command::MemRequest { pid, page } => match self.memory.access_page(pid, page) {
                Ok(Access::Hit { frame }) => {
                    writeln!(out, "[HIT] PID {pid} page {page} in frame {frame}")?
                }
                Ok(Access::Fault { frame, evicted }) => {
                    write!(out, "[FAULT] PID {pid} page {page} loaded into frame {frame}")?;
                    match evicted {
                        Some(victim) => writeln!(
                            out,
                            " (evicted PID {} page {})",
                            victim.pid, victim.page
                        )?,
                        None => writeln!(out)?,
                    }
                }
                Err(e) => writeln!(err, "memreq: {e}")?,
            },
            Command::MemStats => writeln!(out, "{}", self.memory.stats())?,
            Command::MemState => writeln!(out, "{}", self.memory.state())?,
            Command::MemSim { frames, refs } => {
                let refs = match refs {
                    ReferenceSource::Explicit(pages) => pages,
                    ReferenceSource::Random {
                        len,
                        max_page,
                        seed,
                    } => sim::random_reference_string(len, max_page, seed),
                };
                match sim::compare(frames, &refs) {
                    Ok(outcomes) => {
                        for outcome in outcomes {
                            writeln!(out, "{outcome}")?;
                        }
                    }
                    Err(e) => writeln!(err, "memsim: {e}")?,
                }
            }
            Command::External { argv, background } => self.external(&argv, background, out, err)?,
        }
        Ok(Flow::Continue)
    }

    fn run(
        &mut self,
        path: &str,
        args: &[String],
        priority: Option<Priority>,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<()> {
        let name = if priority.is_some() { "runp" } else { "run" };
        if !Path::new(path).exists() && !path_lookup(path) {
            return writeln!(err, "{name}: file not found: {path}");
        }
        let (program, argv) = interpreter_for(path, args);
        let command_line = std::iter::once(program.as_str())
            .chain(argv.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        let process = match ProcessHandle::spawn(&program, &argv) {
            Ok(process) => process,
            Err(source) => {
                let e = JobError::Spawn {
                    command: command_line,
                    source,
                };
                return writeln!(err, "{name}: {e}");
            }
        };
        let job = self.registry().create(process, command_line, priority);

        match priority {
            None => writeln!(out, "[{}] {}", job.id, job.pid),
            Some(priority) => {
                self.hold_for_admission(job.id);
                self.intake.submit(job.id);
                writeln!(out, "[{}] {} (priority {priority}) queued", job.id, job.pid)
            }
        }
    }

    // A queued job waits stopped until the priority service admits it.
    fn hold_for_admission(&self, id: JobId) {
        let control = self.jobs.control();
        let _ = self.registry().with_job(id, |job| match control.suspend(&mut job.process) {
            Ok(()) => job.mark_stopped(),
            Err(e) => log::warn!("job {id}: cannot hold for admission: {e}"),
        });
    }

    fn start_priority(&mut self, out: &mut dyn Write, err: &mut dyn Write) -> io::Result<()> {
        if self.priority_service_running() {
            return writeln!(out, "Priority scheduler already running");
        }
        let scheduler = PriorityScheduler::new(
            Arc::clone(self.registry()),
            Arc::clone(self.jobs.control()),
            self.intake.receiver(),
            self.config.poll_interval,
        );
        match scheduler.spawn() {
            Ok(service) => {
                self.service = Some(service);
                writeln!(
                    out,
                    "Priority scheduler started ({} queued)",
                    self.intake.pending()
                )
            }
            Err(e) => writeln!(err, "spri: cannot start scheduler thread: {e}"),
        }
    }

    fn list_jobs(&self, out: &mut dyn Write) -> io::Result<()> {
        self.registry().reap();
        let jobs = self.registry().list();
        if jobs.is_empty() {
            return writeln!(out, "No jobs");
        }
        for job in jobs {
            writeln!(out, "[{}] | {} | {}", job.id, job.status, job.command_line)?;
        }
        Ok(())
    }

    fn external(
        &mut self,
        argv: &[String],
        background: bool,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> io::Result<()> {
        let (program, args) = argv.split_first().expect("external command has a name");
        let launched = if background {
            ProcessHandle::spawn(program, args)
        } else {
            ProcessHandle::spawn_foreground(program, args)
        };
        let mut process = match launched {
            Ok(process) => process,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return writeln!(err, "{program}: command not found");
            }
            Err(e) => return writeln!(err, "Error launching '{program}': {e}"),
        };
        if background {
            let job = self.registry().create(process, argv.join(" "), None);
            return writeln!(out, "[{}] {}", job.id, job.pid);
        }
        out.flush()?;
        if let Err(e) = process.wait_foreground() {
            writeln!(err, "{program}: {e}")?;
        }
        Ok(())
    }
}

// `*.py` scripts run under python3; everything else directly.
fn interpreter_for(path: &str, args: &[String]) -> (String, Vec<String>) {
    if path.ends_with(".py") {
        let mut argv = vec![path.to_string()];
        argv.extend_from_slice(args);
        ("python3".to_string(), argv)
    } else {
        (path.to_string(), args.to_vec())
    }
}

// Bare program names are resolved through PATH.
fn path_lookup(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return false;
    }
    std::env::var_os("PATH").is_some_and(|paths| {
        std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
    })
}

fn usage_message(line: &str, e: &ArgError) -> String {
    let name = line.split_whitespace().next().unwrap_or_default();
    format!("{name}: {e}")
}

fn report<T>(
    result: Result<T, JobError>,
    name: &str,
    err: &mut dyn Write,
    on_ok: impl FnOnce(&T) -> io::Result<()>,
) -> io::Result<()> {
    match result {
        Ok(value) => on_ok(&value),
        Err(e) => writeln!(err, "{name}: {e}"),
    }
}
