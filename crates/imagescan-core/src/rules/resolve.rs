//! Exit-status policy.
//!
//! Resolution is first-match-wins in a fixed priority order:
//!
//!   - Secrets present                 → SECRETS_FOUND       (3)
//!   - Else malware present            → MALWARE_FOUND       (2)
//!   - Else score >= threshold         → THRESHOLD_EXCEEDED  (1)
//!   - Else                            → CLEAN               (0)
//!
//! Secrets and malware outrank any vulnerability score. Misconfiguration
//! findings never change the status. Internal failures bypass this policy
//! entirely and map to SCRIPT_FAILURE (10).

use serde::{Deserialize, Serialize};

use crate::rules::classify::Classification;

/// Terminal status of one invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Clean,
    ThresholdExceeded,
    MalwareFound,
    SecretsFound,
    ScriptFailure,
}

impl ScanStatus {
    /// Process exit code. This mapping is a CI contract and must not change.
    pub fn exit_code(self) -> i32 {
        match self {
            ScanStatus::Clean => 0,
            ScanStatus::ThresholdExceeded => 1,
            ScanStatus::MalwareFound => 2,
            ScanStatus::SecretsFound => 3,
            ScanStatus::ScriptFailure => 10,
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScanStatus::Clean => "CLEAN",
            ScanStatus::ThresholdExceeded => "THRESHOLD_EXCEEDED",
            ScanStatus::MalwareFound => "MALWARE_FOUND",
            ScanStatus::SecretsFound => "SECRETS_FOUND",
            ScanStatus::ScriptFailure => "SCRIPT_FAILURE",
        };
        f.write_str(name)
    }
}

/// A resolved status together with the numbers that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub status: ScanStatus,
    pub score: u64,
    pub threshold: i64,
}

/// Applies the priority policy to raw classifier outputs.
pub fn resolve_status(
    score: u64,
    has_secrets: bool,
    has_malware: bool,
    threshold: i64,
) -> ScanStatus {
    if has_secrets {
        ScanStatus::SecretsFound
    } else if has_malware {
        ScanStatus::MalwareFound
    } else if i128::from(score) >= i128::from(threshold) {
        ScanStatus::ThresholdExceeded
    } else {
        ScanStatus::Clean
    }
}

pub fn resolve(classification: &Classification, threshold: i64) -> Resolution {
    Resolution {
        status: resolve_status(
            classification.vulnerability_score,
            classification.secrets,
            classification.malware,
            threshold,
        ),
        score: classification.vulnerability_score,
        threshold,
    }
}
