//! Error taxonomy for the engine, split by concern: configuration errors
//! are fatal, parse and capacity errors are recoverable warnings, system
//! call errors are local to a single task.

use thiserror::Error;

/// Fatal, CLI/config-level errors. Maps to exit code 1.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't open task file {path}: {source}")]
    TaskFileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't open trace file {path}: {source}")]
    TraceFileOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid mutex protocol {0:?}, expected one of none, inherit, protect")]
    InvalidProtocol(String),

    #[error("task set is empty after parsing {path}")]
    EmptyTaskSet { path: String },
}

/// A single malformed task-definition line. Never fatal: the caller logs
/// a warning naming the line and skips it.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: doesn't match 'T=..,D=..,pr=..,[...]': {text:?}")]
    Malformed { line: usize, text: String },

    #[error("line {line}: section {section:?} doesn't match '(R<id>,avg=<n>,dev=<n>)'")]
    BadSection { line: usize, section: String },

    #[error("line {line}: priority {priority} exceeds maximum {max}")]
    PriorityOutOfRange {
        line: usize,
        priority: u32,
        max: u32,
    },
}

/// Capacity exceeded while building a task set. Logged as a warning; the
/// caller truncates and continues.
#[derive(Debug, Error)]
pub enum TaskSetError {
    #[error("task set already has {max} tasks, dropping line {line}")]
    TooManyTasks { line: usize, max: usize },

    #[error("task {task} already has {max} sections, dropping further sections")]
    TooManySections { task: u32, max: usize },

    #[error("resource id {id} exceeds maximum {max}, dropping section")]
    TooManyResources { id: u32, max: usize },
}

/// A system-call failure local to one task or one resource. The task that
/// hit it may not run correctly; the rest of the task set is unaffected.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("couldn't start {primitive} for task {task}: {source}")]
    ThreadSetup {
        primitive: &'static str,
        task: i32,
        #[source]
        source: std::io::Error,
    },

    #[error("{primitive} failed with errno {errno}")]
    Errno { primitive: &'static str, errno: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_messages() {
        let err = ParseError::Malformed {
            line: 3,
            text: "garbage".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "line 3: doesn't match 'T=..,D=..,pr=..,[...]': \"garbage\""
        );
    }

    #[test]
    fn taskset_error_messages() {
        let err = TaskSetError::TooManyTasks { line: 21, max: 20 };
        assert_eq!(err.to_string(), "task set already has 20 tasks, dropping line 21");
    }
}
