//! Error taxonomy for a scan invocation.
//!
//! Every failure that stops the pipeline before a status could be resolved
//! ends up here. Per-entry report defects are never errors: malformed
//! findings are skipped by the report model instead.

use thiserror::Error;

use crate::rules::resolve::ScanStatus;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The assessment never became ready within the attempt budget.
    #[error(
        "Report was not completed after {attempts} retries. Use -R or --retry_count to increase the number of retries"
    )]
    FetchExhausted { attempts: u32 },

    /// The scanning service or registry returned an explicit error payload.
    #[error("APIError: status={0}")]
    RemoteApi(String),

    /// The container runtime could not be reached or refused an operation.
    #[error("container runtime: {0}")]
    Runtime(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse failure bucket, used to pick the log line for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Api,
    RetriesExhausted,
    Unknown,
}

impl ScanError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ScanError::FetchExhausted { .. } => FailureKind::RetriesExhausted,
            ScanError::RemoteApi(_) | ScanError::Runtime(_) => FailureKind::Api,
            _ => FailureKind::Unknown,
        }
    }

    /// Every failure replaces classification entirely.
    pub fn exit_status(&self) -> ScanStatus {
        ScanStatus::ScriptFailure
    }

    pub fn summary(&self) -> &'static str {
        match self.kind() {
            FailureKind::Api => "Unable to scan",
            FailureKind::RetriesExhausted => "Retries exhausted",
            FailureKind::Unknown => "Unknown error",
        }
    }
}
