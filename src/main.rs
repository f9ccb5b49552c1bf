//! Entry point: parses CLI options, reads and parses the task set, runs
//! it either under the bundled TUI or headless, and shuts down cleanly.
//! Grounded on `hud/src/main.rs`'s layering (library modules return their
//! own `thiserror` enums, `main` adds `anyhow::Context`).

use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use scheduletrace::cli::Args;
use scheduletrace::config::{Options, StreamPath};
use scheduletrace::domain::ConfigError;
use scheduletrace::taskset::TaskSet;
use scheduletrace::trace::Sink;

fn main() -> Result<()> {
    let args = Args::parse();
    let options = Arc::new(args.into_options().context("invalid configuration")?);

    init_logger(&options);

    let source = read_taskfile(&options).context("reading task set")?;
    let sink = open_trace_sink(&options).context("opening trace sink")?;

    let mut taskset = TaskSet::from_source(&source, Arc::clone(&options), sink).context("building task set")?;
    if taskset.tasks().is_empty() {
        return Err(ConfigError::EmptyTaskSet {
            path: path_label(&options.taskfile_path),
        }
        .into());
    }
    taskset.log_summary();

    taskset.create();
    taskset.activate();
    info!("task set activated with {} task(s)", taskset.tasks().len());

    if options.with_gui {
        scheduletrace::tui::run(&taskset)?;
        taskset.quit();
    } else if options.duration_secs > 0 {
        std::thread::sleep(Duration::from_secs(options.duration_secs));
        taskset.quit();
    } else {
        // Headless, unbounded: run until every task reports done (they
        // don't on their own — this mode is meant to be killed/piped).
        while !taskset.all_done() {
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    taskset.join();
    info!("task set stopped");
    Ok(())
}

fn init_logger(options: &Options) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(options.verbosity.to_level_filter());
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    let _ = builder.try_init();
}

fn read_taskfile(options: &Options) -> Result<String, ConfigError> {
    match &options.taskfile_path {
        StreamPath::StdStream => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|source| ConfigError::TaskFileOpen {
                    path: "<stdin>".to_string(),
                    source,
                })?;
            Ok(buf)
        }
        StreamPath::File(path) => fs::read_to_string(path).map_err(|source| ConfigError::TaskFileOpen {
            path: path.clone(),
            source,
        }),
    }
}

fn open_trace_sink(options: &Options) -> Result<Option<Sink>, ConfigError> {
    if !options.with_trace {
        return Ok(None);
    }
    let writer: Box<dyn std::io::Write + Send> = match &options.tracefile_path {
        StreamPath::StdStream => Box::new(std::io::stdout()),
        StreamPath::File(path) => {
            let file = fs::File::create(path).map_err(|source| ConfigError::TraceFileOpen {
                path: path.clone(),
                source,
            })?;
            Box::new(file)
        }
    };
    Ok(Some(Sink::new(writer, options.tracefile_flush, options.log_sync)))
}

fn path_label(path: &StreamPath) -> String {
    match path {
        StreamPath::StdStream => "<stdin>".to_string(),
        StreamPath::File(p) => p.clone(),
    }
}
