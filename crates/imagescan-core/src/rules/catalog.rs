//! Fixed vocabularies the classifier matches report labels against.

use serde::{Deserialize, Serialize};

/// Qualitative risk label of a vulnerability finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Case-insensitive, exact match. Padded, empty or unrecognised labels
    /// become `Unknown`.
    pub fn parse(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Unknown,
        }
    }

    /// Score contribution of a single finding.
    pub fn points(self) -> u64 {
        match self {
            Severity::Low => 20,
            Severity::Medium => 100,
            Severity::High => 500,
            Severity::Critical => 2000,
            Severity::Unknown => 0,
        }
    }
}

/// Detection types the classifier cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionKind {
    Malware,
    Secret,
    Misconfiguration,
}

impl DetectionKind {
    /// `cis` benchmark findings count as misconfiguration.
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "malware" => Some(DetectionKind::Malware),
            "secret" => Some(DetectionKind::Secret),
            "misconfiguration" | "cis" => Some(DetectionKind::Misconfiguration),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_case_insensitive() {
        assert_eq!(Severity::parse("HIGH"), Severity::High);
        assert_eq!(Severity::parse("High"), Severity::High);
        assert_eq!(Severity::parse("high").points(), 500);
    }

    #[test]
    fn point_table() {
        assert_eq!(Severity::Low.points(), 20);
        assert_eq!(Severity::Medium.points(), 100);
        assert_eq!(Severity::High.points(), 500);
        assert_eq!(Severity::Critical.points(), 2000);
    }

    #[test]
    fn garbage_severity_is_unknown_and_worthless() {
        for label in ["", "moderate", "n/a", "🔥", " high ", "critical\n"] {
            let sev = Severity::parse(label);
            assert_eq!(sev, Severity::Unknown);
            assert_eq!(sev.points(), 0);
        }
    }

    #[test]
    fn detection_vocabulary() {
        assert_eq!(DetectionKind::parse("Malware"), Some(DetectionKind::Malware));
        assert_eq!(DetectionKind::parse("SECRET"), Some(DetectionKind::Secret));
        assert_eq!(
            DetectionKind::parse("cis"),
            Some(DetectionKind::Misconfiguration)
        );
        assert_eq!(
            DetectionKind::parse("Misconfiguration"),
            Some(DetectionKind::Misconfiguration)
        );
        assert_eq!(DetectionKind::parse("secrets"), None);
    }
}
