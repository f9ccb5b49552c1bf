//! Shared, immutable runtime configuration, built once at startup and
//! handed to every component behind an `Arc` — the language-appropriate
//! equivalent of `common.h`'s process-wide `struct options`, whose only
//! genuinely mutable pieces (open file handles) get their own
//! synchronization instead of living in a global.

use std::fmt;
use std::str::FromStr;

use crate::domain::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Error,
    Warning,
    Info,
    Debug,
}

impl Verbosity {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Verbosity::Error => log::LevelFilter::Error,
            Verbosity::Warning => log::LevelFilter::Warn,
            Verbosity::Info => log::LevelFilter::Info,
            Verbosity::Debug => log::LevelFilter::Debug,
        }
    }
}

/// Priority inversion-control protocol applied to every resource mutex,
/// mirroring POSIX's `PTHREAD_PRIO_{NONE,INHERIT,PROTECT}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutexProtocol {
    #[default]
    None,
    Inherit,
    Protect,
}

impl FromStr for MutexProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(MutexProtocol::None),
            "inherit" => Ok(MutexProtocol::Inherit),
            "protect" => Ok(MutexProtocol::Protect),
            other => Err(ConfigError::InvalidProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for MutexProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutexProtocol::None => "none",
            MutexProtocol::Inherit => "inherit",
            MutexProtocol::Protect => "protect",
        };
        write!(f, "{s}")
    }
}

/// Where a stream-like option points: `-` means stdin/stdout.
#[derive(Debug, Clone)]
pub enum StreamPath {
    StdStream,
    File(String),
}

impl StreamPath {
    pub fn parse(s: &str) -> Self {
        if s == "-" {
            StreamPath::StdStream
        } else {
            StreamPath::File(s.to_string())
        }
    }
}

/// Immutable, shared runtime configuration. Construct with
/// [`Options::from_cli`] and share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Options {
    pub verbosity: Verbosity,
    pub with_gui: bool,
    pub taskfile_path: StreamPath,
    pub with_trace: bool,
    pub tracefile_path: StreamPath,
    pub tracefile_flush: bool,
    pub log_sync: bool,
    pub mutex_protocol: MutexProtocol,
    pub with_affinity: bool,
    pub idle_yield: bool,
    pub idle_sleep: bool,
    pub idle_rt_sched: bool,
    pub gui_w: u16,
    pub gui_h: u16,
    pub trace_size: usize,
    pub duration_secs: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Info,
            with_gui: true,
            taskfile_path: StreamPath::StdStream,
            with_trace: true,
            tracefile_path: StreamPath::StdStream,
            tracefile_flush: false,
            log_sync: true,
            mutex_protocol: MutexProtocol::None,
            with_affinity: true,
            idle_yield: false,
            idle_sleep: false,
            idle_rt_sched: true,
            gui_w: 120,
            gui_h: 40,
            trace_size: crate::trace::DEFAULT_TRACE_SIZE,
            duration_secs: 0,
        }
    }
}

pub const IDLE_TASK_PRIORITY: u32 = 1;
