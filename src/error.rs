//! Error taxonomy for a simulation run. Every variant is fatal for the run.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::kernel::ProcessState;

pub type Result<T> = std::result::Result<T, SimError>;

/// Which field of a meta-data record failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaDataField {
    Code,
    Descriptor,
    Cycles,
}

impl std::fmt::Display for MetaDataField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaDataField::Code => write!(f, "code"),
            MetaDataField::Descriptor => write!(f, "descriptor"),
            MetaDataField::Cycles => write!(f, "cycle count"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("meta-data record {record}: {field} {problem}")]
    MetaData {
        record: usize,
        field: MetaDataField,
        problem: String,
    },

    #[error("meta-data format error: {0}")]
    MetaDataFormat(String),

    #[error("meta-data sequence error: {0}")]
    Sequence(String),

    #[error("invalid state transition for process {process}: {from:?} -> {to:?}")]
    InvalidTransition {
        process: usize,
        from: ProcessState,
        to: ProcessState,
    },

    #[error("no {0} units are configured")]
    NoDevice(&'static str),

    #[error("memory allocation exceeded {0:?}; a process likely requires more memory than the system has")]
    MemoryTimeout(Duration),

    #[error("lock table has no {kind} unit {index}")]
    UnitOutOfRange { kind: &'static str, index: usize },

    #[error("could not spawn I/O worker for process {process}: {source}")]
    Spawn {
        process: usize,
        #[source]
        source: io::Error,
    },

    #[error("I/O worker for process {0} panicked")]
    WorkerPanicked(usize),

    #[error("process {process} failed to execute: {source}")]
    ProcessFailed {
        process: usize,
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> SimError {
        SimError::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn record(record: usize, field: MetaDataField, problem: impl Into<String>) -> SimError {
        SimError::MetaData {
            record,
            field,
            problem: problem.into(),
        }
    }
}
