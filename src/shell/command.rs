//! Line parsing. Every numeric argument is validated here, so a malformed
//! line never reaches the schedulers or the memory manager.

use crate::config::parse_frames;
use crate::core::{JobId, Priority};
use crate::error::ArgError;
use crate::scheduler::Quantum;
use crate::sim::{Algorithm, MAX_REFERENCE_LEN, Page, SimPid};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run {
        program: String,
        args: Vec<String>,
    },
    RunPriority {
        priority: Priority,
        program: String,
        args: Vec<String>,
    },
    RoundRobin {
        quantum: Option<Quantum>,
    },
    StartPriority,
    Jobs,
    Foreground(JobId),
    Background(JobId),
    Pause(JobId),
    Kill(JobId),
    MemInit {
        frames: usize,
        algorithm: Algorithm,
    },
    MemAdd(SimPid),
    MemRemove(SimPid),
    MemRequest {
        pid: SimPid,
        page: Page,
    },
    MemStats,
    MemState,
    MemSim {
        frames: usize,
        refs: ReferenceSource,
    },
    Echo(Vec<String>),
    Pwd,
    Help,
    Exit,
    /// Anything that is not a builtin: launched as an external program.
    External {
        argv: Vec<String>,
        background: bool,
    },
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceSource {
    Explicit(Vec<Page>),
    Random {
        len: usize,
        max_page: Page,
        seed: u64,
    },
}

pub const RUN_USAGE: &str = "run <path> [args...]";
pub const RUNP_USAGE: &str = "runp <priority> <path> [args...]";
pub const SRR_USAGE: &str = "srr [quantum-secs]";
pub const MEMINIT_USAGE: &str = "meminit <frames> [FIFO|LRU]";
pub const MEMSIM_USAGE: &str =
    "memsim <frames> <page> [page...] | memsim <frames> --random <len> <max-page> [seed]";

const DEFAULT_SEED: u64 = 0;

impl Command {
    /// Parse one input line. A trailing `&` marks a background launch.
    pub fn parse(line: &str) -> Result<Self, ArgError> {
        let mut line = line.trim();
        let background = line.ends_with('&');
        if background {
            line = line[..line.len() - 1].trim_end();
        }
        let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        let Some((name, rest)) = tokens.split_first() else {
            return Ok(Self::Empty);
        };

        let command = match name.as_str() {
            "run" => {
                let (program, args) = rest.split_first().ok_or(ArgError::Usage(RUN_USAGE))?;
                Self::Run {
                    program: program.clone(),
                    args: args.to_vec(),
                }
            }
            "runp" => {
                let [priority, program, args @ ..] = rest else {
                    return Err(ArgError::Usage(RUNP_USAGE));
                };
                Self::RunPriority {
                    priority: number(priority, "priority")?,
                    program: program.clone(),
                    args: args.to_vec(),
                }
            }
            "srr" => match rest {
                [] => Self::RoundRobin { quantum: None },
                [q] => Self::RoundRobin {
                    quantum: Some(Quantum::parse_secs(q)?),
                },
                _ => return Err(ArgError::Usage(SRR_USAGE)),
            },
            "spri" => Self::StartPriority,
            "jobs" => Self::Jobs,
            "fg" => Self::Foreground(job_id(rest, "fg <id>")?),
            "bg" => Self::Background(job_id(rest, "bg <id>")?),
            "pause" => Self::Pause(job_id(rest, "pause <id>")?),
            "kill" => Self::Kill(job_id(rest, "kill <id>")?),
            "meminit" => match rest {
                [frames] => Self::MemInit {
                    frames: parse_frames(frames)?,
                    algorithm: Algorithm::Fifo,
                },
                [frames, algorithm] => Self::MemInit {
                    frames: parse_frames(frames)?,
                    algorithm: algorithm.parse()?,
                },
                _ => return Err(ArgError::Usage(MEMINIT_USAGE)),
            },
            "memadd" => Self::MemAdd(single(rest, "memadd <pid>", "pid")?),
            "memrm" => Self::MemRemove(single(rest, "memrm <pid>", "pid")?),
            "memreq" => {
                let [pid, page] = rest else {
                    return Err(ArgError::Usage("memreq <pid> <page>"));
                };
                Self::MemRequest {
                    pid: number(pid, "pid")?,
                    page: number(page, "page")?,
                }
            }
            "memstats" => Self::MemStats,
            "memstate" => Self::MemState,
            "memsim" => parse_memsim(rest)?,
            "echo" => Self::Echo(rest.to_vec()),
            "pwd" => Self::Pwd,
            "help" => Self::Help,
            "exit" => Self::Exit,
            _ => Self::External {
                argv: tokens.clone(),
                background,
            },
        };
        Ok(command)
    }
}

fn number<T: std::str::FromStr>(value: &str, what: &'static str) -> Result<T, ArgError> {
    value.parse().map_err(|_| ArgError::InvalidNumber {
        what,
        value: value.to_string(),
    })
}

fn single<T: std::str::FromStr>(
    rest: &[String],
    usage: &'static str,
    what: &'static str,
) -> Result<T, ArgError> {
    match rest {
        [value] => number(value, what),
        _ => Err(ArgError::Usage(usage)),
    }
}

fn job_id(rest: &[String], usage: &'static str) -> Result<JobId, ArgError> {
    single(rest, usage, "job id")
}

fn parse_memsim(rest: &[String]) -> Result<Command, ArgError> {
    let [frames, tail @ ..] = rest else {
        return Err(ArgError::Usage(MEMSIM_USAGE));
    };
    let frames = parse_frames(frames)?;
    let refs = match tail {
        [] => return Err(ArgError::Usage(MEMSIM_USAGE)),
        [flag, len, max_page, seed @ ..] if flag == "--random" => {
            let seed = match seed {
                [] => DEFAULT_SEED,
                [seed] => number(seed, "seed")?,
                _ => return Err(ArgError::Usage(MEMSIM_USAGE)),
            };
            let len: usize = number(len, "length")?;
            if len > MAX_REFERENCE_LEN {
                return Err(ArgError::OutOfRange {
                    what: "length",
                    value: len.to_string(),
                });
            }
            ReferenceSource::Random {
                len,
                max_page: number(max_page, "max page")?,
                seed,
            }
        }
        pages => ReferenceSource::Explicit(
            pages
                .iter()
                .map(|page| number(page, "page"))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(Command::MemSim { frames, refs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_and_runp() {
        assert_eq!(
            Command::parse("run ./busy 3").unwrap(),
            Command::Run {
                program: "./busy".into(),
                args: vec!["3".into()]
            }
        );
        assert_eq!(
            Command::parse("runp 5 sleep 2 &").unwrap(),
            Command::RunPriority {
                priority: 5,
                program: "sleep".into(),
                args: vec!["2".into()]
            }
        );
        assert_eq!(Command::parse("run"), Err(ArgError::Usage(RUN_USAGE)));
        assert_eq!(
            Command::parse("runp high sleep 1"),
            Err(ArgError::InvalidNumber {
                what: "priority",
                value: "high".into()
            })
        );
    }

    #[test]
    fn job_control_ids() {
        assert_eq!(Command::parse("fg 2").unwrap(), Command::Foreground(2));
        assert_eq!(Command::parse("kill 11").unwrap(), Command::Kill(11));
        assert!(matches!(
            Command::parse("pause x"),
            Err(ArgError::InvalidNumber { .. })
        ));
        assert_eq!(Command::parse("bg"), Err(ArgError::Usage("bg <id>")));
    }

    #[test]
    fn scheduling_commands() {
        assert_eq!(
            Command::parse("srr").unwrap(),
            Command::RoundRobin { quantum: None }
        );
        assert!(matches!(
            Command::parse("srr 0.5").unwrap(),
            Command::RoundRobin { quantum: Some(_) }
        ));
        assert!(Command::parse("srr 0").is_err());
        assert!(Command::parse("srr fast").is_err());
        assert_eq!(Command::parse("spri").unwrap(), Command::StartPriority);
    }

    #[test]
    fn memory_commands() {
        assert_eq!(
            Command::parse("meminit 3").unwrap(),
            Command::MemInit {
                frames: 3,
                algorithm: Algorithm::Fifo
            }
        );
        assert_eq!(
            Command::parse("meminit 3 lru").unwrap(),
            Command::MemInit {
                frames: 3,
                algorithm: Algorithm::Lru
            }
        );
        assert!(Command::parse("meminit 0").is_err());
        assert!(Command::parse("meminit 3 CLOCK").is_err());
        assert_eq!(
            Command::parse("memreq 1 4").unwrap(),
            Command::MemRequest { pid: 1, page: 4 }
        );
        assert!(Command::parse("memreq 1").is_err());
        assert_eq!(
            Command::parse("memsim 3 1 2 3 1").unwrap(),
            Command::MemSim {
                frames: 3,
                refs: ReferenceSource::Explicit(vec![1, 2, 3, 1])
            }
        );
        assert_eq!(
            Command::parse("memsim 4 --random 20 6 9").unwrap(),
            Command::MemSim {
                frames: 4,
                refs: ReferenceSource::Random {
                    len: 20,
                    max_page: 6,
                    seed: 9
                }
            }
        );
        assert!(Command::parse("memsim 3").is_err());
        assert_eq!(
            Command::parse("memsim 2 --random 18446744073709551615 5"),
            Err(ArgError::OutOfRange {
                what: "length",
                value: "18446744073709551615".into()
            })
        );
        assert!(Command::parse("memsim 2 --random 1000000 5").is_ok());
        assert!(matches!(
            Command::parse("meminit 18446744073709551615"),
            Err(ArgError::OutOfRange { .. })
        ));
    }

    #[test]
    fn externals_and_blank_lines() {
        assert_eq!(Command::parse("   ").unwrap(), Command::Empty);
        assert_eq!(
            Command::parse("ls -l &").unwrap(),
            Command::External {
                argv: vec!["ls".into(), "-l".into()],
                background: true
            }
        );
    }
}
