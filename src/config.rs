use std::env;
use std::time::Duration;

use crate::error::ArgError;
use crate::scheduler::{DEFAULT_POLL_INTERVAL, Quantum};
use crate::sim::{Algorithm, MAX_FRAMES};

pub const ENV_QUANTUM: &str = "JOBSIM_QUANTUM";
pub const ENV_POLL_MS: &str = "JOBSIM_POLL_MS";

pub const DEFAULT_FRAMES: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    /// Quantum used by `srr` when none is given.
    pub quantum: Quantum,
    /// How often the priority service re-checks its intake while a job runs.
    pub poll_interval: Duration,
    pub frames: usize,
    pub algorithm: Algorithm,
    pub prompt: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            quantum: Quantum::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            frames: DEFAULT_FRAMES,
            algorithm: Algorithm::Fifo,
            prompt: "jobsim> ".to_string(),
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Run(ShellConfig),
    Help,
}

impl ShellConfig {
    /// Parse flags (without the program name) on top of environment overrides.
    pub fn parse<I, F>(args: I, env_lookup: F) -> Result<Invocation, ArgError>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = env_lookup(ENV_QUANTUM) {
            config.quantum = Quantum::parse_secs(&value)?;
        }
        if let Some(value) = env_lookup(ENV_POLL_MS) {
            config.poll_interval = parse_poll_ms(&value)?;
        }

        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            let mut value = || args.next().ok_or(ArgError::Usage(USAGE));
            match flag.as_str() {
                "-h" | "--help" => return Ok(Invocation::Help),
                "--quantum" => config.quantum = Quantum::parse_secs(&value()?)?,
                "--poll-ms" => config.poll_interval = parse_poll_ms(&value()?)?,
                "--frames" => config.frames = parse_frames(&value()?)?,
                "--algorithm" => config.algorithm = value()?.parse()?,
                "--prompt" => config.prompt = value()?,
                _ => return Err(ArgError::UnknownFlag(flag)),
            }
        }
        Ok(Invocation::Run(config))
    }

    /// Parse the process's own arguments and environment.
    pub fn from_env() -> Result<Invocation, ArgError> {
        Self::parse(env::args().skip(1), |key| env::var(key).ok())
    }
}

pub const USAGE: &str = "jobsim [--quantum <secs>] [--poll-ms <ms>] [--frames <n>] \
                         [--algorithm <FIFO|LRU>] [--prompt <text>]";

fn parse_poll_ms(value: &str) -> Result<Duration, ArgError> {
    let ms: u64 = value.parse().map_err(|_| ArgError::InvalidNumber {
        what: "poll interval",
        value: value.to_string(),
    })?;
    if ms == 0 {
        return Err(ArgError::OutOfRange {
            what: "poll interval",
            value: value.to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}

/// Frame counts must lie in `1..=MAX_FRAMES`.
pub fn parse_frames(value: &str) -> Result<usize, ArgError> {
    let frames: usize = value.parse().map_err(|_| ArgError::InvalidNumber {
        what: "frame count",
        value: value.to_string(),
    })?;
    if frames == 0 || frames > MAX_FRAMES {
        return Err(ArgError::OutOfRange {
            what: "frame count",
            value: value.to_string(),
        });
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults() {
        let Invocation::Run(config) = ShellConfig::parse(args(&[]), no_env).unwrap() else {
            panic!("expected run");
        };
        assert_eq!(config, ShellConfig::default());
        assert_eq!(config.frames, 4);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn flags_override_environment() {
        let env = |key: &str| match key {
            ENV_QUANTUM => Some("2".to_string()),
            ENV_POLL_MS => Some("250".to_string()),
            _ => None,
        };
        let parsed = ShellConfig::parse(
            args(&["--quantum", "0.25", "--frames", "8", "--algorithm", "lru"]),
            env,
        )
        .unwrap();
        let Invocation::Run(config) = parsed else {
            panic!("expected run");
        };
        assert_eq!(config.quantum.get(), Duration::from_millis(250));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.frames, 8);
        assert_eq!(config.algorithm, Algorithm::Lru);
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            ShellConfig::parse(args(&["--frames", "0"]), no_env),
            Err(ArgError::OutOfRange {
                what: "frame count",
                value: "0".into()
            })
        );
        assert_eq!(
            ShellConfig::parse(args(&["--quantum"]), no_env),
            Err(ArgError::Usage(USAGE))
        );
        assert_eq!(
            ShellConfig::parse(args(&["--verbose"]), no_env),
            Err(ArgError::UnknownFlag("--verbose".into()))
        );
        assert!(ShellConfig::parse(args(&["--poll-ms", "0"]), no_env).is_err());
        assert_eq!(
            ShellConfig::parse(args(&["--frames", "65537"]), no_env),
            Err(ArgError::OutOfRange {
                what: "frame count",
                value: "65537".into()
            })
        );
        assert_eq!(
            ShellConfig::parse(args(&["-h"]), no_env),
            Ok(Invocation::Help)
        );
    }
}
