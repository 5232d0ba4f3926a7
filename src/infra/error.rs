use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read `{}`: {source}", .path.display())]
    ReadSource {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn read_source(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadSource {
            path: path.into(),
            source,
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
