use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlgtestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid table at line {line}: {reason}")]
    Table { line: usize, reason: String },

    #[error("Invariant violated for row {row} during {stage}")]
    InvariantViolation { row: String, stage: String },

    #[error("Command `{command}` failed: {status}")]
    CommandFailed { command: String, status: ExitStatus },

    #[error("Device {} not found", .0.display())]
    DeviceNotFound(PathBuf),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

pub type Result<T> = std::result::Result<T, AlgtestError>;
