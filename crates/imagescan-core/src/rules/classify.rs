//! Classification of a scan report.
//!
//! This module turns a `ScanReport` into the raw facts the exit-status policy
//! needs: a cumulative vulnerability score and three detection flags.
//!
//! Responsibilities:
//! - Resolve each finding's severity and sum its points
//! - Report presence of malware, leaked secrets and misconfiguration
//! - Emit one diagnostic log line per finding
//!
//! Non-responsibilities:
//! - Choosing an exit status (handled in `rules::resolve`)
//! - Fetching or parsing reports
//!
//! Every function here is a pure read of the report. Logging is the only
//! side effect and never influences a result.

use log::{error, info, warn};

use crate::report::model::ScanReport;
use crate::report::render;
use crate::rules::catalog::DetectionKind;

/// Facts extracted from one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub vulnerability_score: u64,
    pub malware: bool,
    pub secrets: bool,
    pub misconfiguration: bool,
}

/// Runs every scan over `report`.
pub fn classify(report: &ScanReport) -> Classification {
    Classification {
        vulnerability_score: score_vulnerabilities(report),
        secrets: has_secrets(report),
        malware: has_malware(report),
        misconfiguration: has_misconfig(report),
    }
}

/// Sum of severity points over all findings. Unbounded.
///
/// Low = 20, Medium = 100, High = 500, Critical = 2000, anything else 0.
pub fn score_vulnerabilities(report: &ScanReport) -> u64 {
    info!("Searching for vulnerabilities in scan report...");

    report
        .vulnerabilities()
        .map(|vuln| {
            warn!("{}", render::finding_line(vuln));
            vuln.severity().points()
        })
        .sum()
}

pub fn has_malware(report: &ScanReport) -> bool {
    info!("Searching for malware in scan report...");
    let found = first_detection(report, DetectionKind::Malware);
    if found {
        warn!("Alert: Malware found");
    }
    found
}

pub fn has_secrets(report: &ScanReport) -> bool {
    info!("Searching for leaked secrets in scan report...");
    let found = first_detection(report, DetectionKind::Secret);
    if found {
        error!("Alert: Leaked secrets detected");
    }
    found
}

/// Matches both `misconfiguration` and `cis` detections.
pub fn has_misconfig(report: &ScanReport) -> bool {
    info!("Searching for misconfigurations in scan report...");
    let found = first_detection(report, DetectionKind::Misconfiguration);
    if found {
        warn!("Alert: Misconfiguration found");
    }
    found
}

// Stops at the first match; detections without a type never match.
fn first_detection(report: &ScanReport, kind: DetectionKind) -> bool {
    report
        .detections()
        .filter_map(|d| d.detection_type())
        .any(|t| DetectionKind::parse(t) == Some(kind))
}
