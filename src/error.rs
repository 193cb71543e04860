use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a pipeline run. Per-record and per-file problems are
/// not errors at this level: they are logged and counted in the run report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no readable export under {}", .0.display())]
    NoUsableFiles(PathBuf),

    /// Deliberate stop: events without an activity type must be categorized
    /// by hand before anything downstream uses the dataset.
    #[error(
        "{count} event(s) without activity type; fill in {} and rerun (pending list in {})",
        .taxonomy.display(),
        .pending.display()
    )]
    UncategorizedEvents {
        count: usize,
        taxonomy: PathBuf,
        pending: PathBuf,
    },

    /// Pay-type events that a model may not be trained on yet.
    #[error("{} pay event(s) not ready for training: {}", .events.len(), .events.join(", "))]
    TrainingPrecondition { events: Vec<String> },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl PipelineError {
    /// Terminal validation errors are the circuit breakers, as opposed to
    /// environment failures.
    pub fn is_terminal_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::UncategorizedEvents { .. } | PipelineError::TrainingPrecondition { .. }
        )
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PipelineError::Csv {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
