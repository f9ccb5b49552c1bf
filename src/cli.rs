//! CLI argument definitions, reproducing `main.c`'s `getopt_long` surface
//! with `clap`'s derive API, the way `hud/src/cli/args.rs` does.

use clap::Parser;
use std::str::FromStr;

use crate::config::{MutexProtocol, Options, StreamPath, Verbosity};
use crate::domain::ConfigError;

#[derive(Parser)]
#[command(
    name = "scheduletrace",
    about = "Trace and visualize a real-time periodic task set",
    after_help = "\
EXAMPLES:
    scheduletrace --taskfile tasks.txt                 Live run with TUI
    scheduletrace -f tasks.txt --no-gui --duration 5    Headless, 5 seconds
    scheduletrace -f - < tasks.txt                      Read tasks from stdin"
)]
pub struct Args {
    /// Task set definition file ('-' for stdin)
    #[arg(short = 'f', long = "taskfile", default_value = "-")]
    pub taskfile: String,

    /// Trace sink file ('-' for stdout)
    #[arg(short = 't', long = "tracefile", default_value = "-")]
    pub tracefile: String,

    /// Disable trace emission entirely
    #[arg(long = "no-trace")]
    pub no_trace: bool,

    /// Flush the trace sink after every event
    #[arg(long = "trace-flush")]
    pub trace_flush: bool,

    /// Don't serialize interleaved log writes from task threads
    #[arg(long = "no-log-sync")]
    pub no_log_sync: bool,

    /// Priority inversion-control protocol: none, inherit, protect
    #[arg(short = 'p', long = "protocol", default_value = "none")]
    pub protocol: String,

    /// Don't pin tasks to a single CPU
    #[arg(long = "no-affinity")]
    pub no_affinity: bool,

    /// Idle body yields the CPU on every iteration
    #[arg(long = "idle-yield")]
    pub idle_yield: bool,

    /// Idle body sleeps ~1ns on every iteration
    #[arg(long = "idle-sleep")]
    pub idle_sleep: bool,

    /// Don't give the idle task a real-time scheduling class
    #[arg(long = "no-idle-rt")]
    pub no_idle_rt: bool,

    /// Run without the TUI
    #[arg(short = 'g', long = "no-gui")]
    pub no_gui: bool,

    /// Visualizer width in terminal columns
    #[arg(short = 'W', long = "width", default_value = "120")]
    pub gui_w: u16,

    /// Visualizer height in terminal rows
    #[arg(short = 'H', long = "height", default_value = "40")]
    pub gui_h: u16,

    /// Bound on the number of trace events kept
    #[arg(long = "trace-size", default_value_t = crate::trace::DEFAULT_TRACE_SIZE)]
    pub trace_size: usize,

    /// Stop after N seconds in headless mode (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Increase verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn into_options(self) -> Result<Options, ConfigError> {
        let verbosity = if self.quiet {
            Verbosity::Error
        } else {
            match self.verbose {
                0 => Verbosity::Info,
                1 => Verbosity::Debug,
                _ => Verbosity::Debug,
            }
        };

        Ok(Options {
            verbosity,
            with_gui: !self.no_gui,
            taskfile_path: StreamPath::parse(&self.taskfile),
            with_trace: !self.no_trace,
            tracefile_path: StreamPath::parse(&self.tracefile),
            tracefile_flush: self.trace_flush,
            log_sync: !self.no_log_sync,
            mutex_protocol: MutexProtocol::from_str(&self.protocol)?,
            with_affinity: !self.no_affinity,
            idle_yield: self.idle_yield,
            idle_sleep: self.idle_sleep,
            idle_rt_sched: !self.no_idle_rt,
            gui_w: self.gui_w,
            gui_h: self.gui_h,
            trace_size: self.trace_size,
            duration_secs: self.duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_options_default() {
        let args = Args::parse_from(["scheduletrace"]);
        let opts = args.into_options().unwrap();
        assert!(opts.with_gui);
        assert_eq!(opts.mutex_protocol, MutexProtocol::None);
        assert_eq!(opts.trace_size, crate::trace::DEFAULT_TRACE_SIZE);
    }

    #[test]
    fn rejects_unknown_protocol() {
        let args = Args::parse_from(["scheduletrace", "--protocol", "bogus"]);
        assert!(args.into_options().is_err());
    }

    #[test]
    fn no_gui_and_duration_parse() {
        let args = Args::parse_from(["scheduletrace", "--no-gui", "--duration", "5"]);
        let opts = args.into_options().unwrap();
        assert!(!opts.with_gui);
        assert_eq!(opts.duration_secs, 5);
    }
}
