use crate::report::model::Vulnerability;
use crate::rules::resolve::{Resolution, ScanStatus};

/// One diagnostic line per vulnerability finding.
pub fn finding_line(vuln: &Vulnerability) -> String {
    format!(
        "{:<8} {:<16} Vulnerability detected affecting {}",
        vuln.severity_label(),
        vuln.cve_id(),
        vuln.affected_package()
    )
}

/// Human-readable reason for the resolved exit status.
pub fn decision_line(resolution: &Resolution) -> String {
    match resolution.status {
        ScanStatus::SecretsFound => "Exiting: Secrets found in container image".to_string(),
        ScanStatus::MalwareFound => "Exiting: Malware found in container image".to_string(),
        ScanStatus::ThresholdExceeded => format!(
            "Exiting: Vulnerability score threshold exceeded: '{}' out of '{}'",
            resolution.score, resolution.threshold
        ),
        ScanStatus::Clean => format!(
            "Vulnerability score threshold not met: '{}' out of '{}'",
            resolution.score, resolution.threshold
        ),
        ScanStatus::ScriptFailure => "Exiting: scan did not complete".to_string(),
    }
}
