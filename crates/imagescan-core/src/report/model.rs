use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use crate::rules::catalog::Severity;

/// CVE placeholder used when a finding carries no identifier.
pub const UNKNOWN_CVE: &str = "CVE-unknown";

/// Image assessment returned by the scanning service for one `repo:tag`.
///
/// The typed view only covers what classification reads. The untouched
/// payload is kept alongside it so exports and plugin output are verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    vulnerabilities: Vec<VulnerabilityEntry>,
    detections: Vec<DetectionEntry>,
    raw: Value,
}

#[derive(Debug, Default, Deserialize)]
struct ReportBody {
    #[serde(rename = "Vulnerabilities", default, deserialize_with = "lenient_list")]
    vulnerabilities: Vec<VulnerabilityEntry>,
    #[serde(rename = "Detections", default, deserialize_with = "lenient_list")]
    detections: Vec<DetectionEntry>,
}

impl ScanReport {
    /// Parse a response body.
    ///
    /// Absent or `null` finding lists are read as empty. Entries that do not
    /// even look like objects are dropped. Only a body that is not JSON, or
    /// not a JSON object, is an error.
    pub fn parse(raw_body: &str) -> serde_json::Result<Self> {
        let raw: Value = serde_json::from_str(raw_body)?;
        Self::from_value(raw)
    }

    pub fn from_value(raw: Value) -> serde_json::Result<Self> {
        if !raw.is_object() {
            return Err(serde::de::Error::custom("scan report must be a JSON object"));
        }
        let body = ReportBody::deserialize(&raw)?;
        Ok(Self {
            vulnerabilities: body.vulnerabilities,
            detections: body.detections,
            raw,
        })
    }

    /// Vulnerability records, skipping entries without a `Vulnerability` object.
    pub fn vulnerabilities(&self) -> impl Iterator<Item = &Vulnerability> {
        self.vulnerabilities
            .iter()
            .filter_map(|e| e.vulnerability.as_ref())
    }

    /// Detection records, skipping entries without a `Detection` object.
    pub fn detections(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter_map(|e| e.detection.as_ref())
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Four-space indented JSON of the payload as received.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        let mut out = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        self.raw.serialize(&mut ser)?;
        // serde_json only ever emits valid UTF-8.
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        let json = self.to_pretty_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write JSON report: {}", path.display()))
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct VulnerabilityEntry {
    #[serde(rename = "Vulnerability", default, deserialize_with = "lenient")]
    pub vulnerability: Option<Vulnerability>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Vulnerability {
    #[serde(rename = "CVEID", default, deserialize_with = "lenient")]
    pub cve_id: Option<String>,
    #[serde(rename = "Details", default, deserialize_with = "lenient")]
    pub details: Option<Details>,
    /// Free-form; sometimes a string, sometimes an object with `PackageSource`.
    #[serde(rename = "Product", default)]
    pub product: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Details {
    #[serde(default, deserialize_with = "lenient")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cvss_v3_score: Option<CvssScore>,
    #[serde(default, deserialize_with = "lenient")]
    pub cvss_v2_score: Option<CvssScore>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CvssScore {
    #[serde(default, deserialize_with = "lenient")]
    pub severity: Option<String>,
}

impl Vulnerability {
    pub fn cve_id(&self) -> &str {
        self.cve_id.as_deref().unwrap_or(UNKNOWN_CVE)
    }

    /// Severity label as reported, resolved in order:
    /// `Details.severity`, `Details.cvss_v3_score.severity`,
    /// `Details.cvss_v2_score.severity`. First non-empty wins; `""` if none.
    pub fn severity_label(&self) -> &str {
        let Some(details) = &self.details else {
            return "";
        };
        fn cvss(score: &Option<CvssScore>) -> Option<&str> {
            score.as_ref().and_then(|s| s.severity.as_deref())
        }

        [
            details.severity.as_deref(),
            cvss(&details.cvss_v3_score),
            cvss(&details.cvss_v2_score),
        ]
        .into_iter()
        .flatten()
        .find(|label| !label.is_empty())
        .unwrap_or("")
    }

    pub fn severity(&self) -> Severity {
        Severity::parse(self.severity_label())
    }

    /// Best-effort description of what the finding affects.
    pub fn affected_package(&self) -> String {
        let Some(product) = &self.product else {
            return "unknown".to_string();
        };
        let source = product.get("PackageSource").unwrap_or(product);
        match source {
            Value::String(s) => s.clone(),
            Value::Null => "unknown".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DetectionEntry {
    #[serde(rename = "Detection", default, deserialize_with = "lenient")]
    pub detection: Option<Detection>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Detection {
    #[serde(rename = "Type", default, deserialize_with = "lenient")]
    pub kind: Option<String>,
}

impl Detection {
    pub fn detection_type(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

/// Accept any JSON at this position; keep it only if it has the expected shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// `null`, a non-array, or a missing key all read as an empty list.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vuln(details: Value) -> Vulnerability {
        serde_json::from_value(json!({ "CVEID": "CVE-1", "Details": details })).unwrap()
    }

    #[test]
    fn missing_lists_are_empty() {
        let report = ScanReport::parse("{}").unwrap();
        assert_eq!(report.vulnerabilities().count(), 0);
        assert_eq!(report.detections().count(), 0);

        let report =
            ScanReport::parse(r#"{"Vulnerabilities": null, "Detections": null}"#).unwrap();
        assert_eq!(report.vulnerabilities().count(), 0);
        assert_eq!(report.detections().count(), 0);
    }

    #[test]
    fn non_object_body_is_an_error() {
        assert!(ScanReport::parse("not json").is_err());
        assert!(ScanReport::parse("[1, 2]").is_err());
    }

    #[test]
    fn severity_prefers_direct_field() {
        let v = vuln(json!({
            "severity": "LOW",
            "cvss_v3_score": { "severity": "CRITICAL" }
        }));
        assert_eq!(v.severity_label(), "LOW");
        assert_eq!(v.severity(), Severity::Low);
    }

    #[test]
    fn severity_falls_back_to_cvss_v3_then_v2() {
        let v3 = vuln(json!({ "cvss_v3_score": { "severity": "high" } }));
        assert_eq!(v3.severity(), Severity::High);

        let v2 = vuln(json!({ "cvss_v2_score": { "severity": "Medium" } }));
        assert_eq!(v2.severity(), Severity::Medium);

        let empty_direct = vuln(json!({
            "severity": "",
            "cvss_v2_score": { "severity": "critical" }
        }));
        assert_eq!(empty_direct.severity(), Severity::Critical);
    }

    #[test]
    fn unresolvable_severity_is_unknown() {
        assert_eq!(vuln(json!({})).severity_label(), "");
        assert_eq!(vuln(json!("not-an-object")).severity(), Severity::Unknown);
        assert_eq!(vuln(json!({ "severity": 7 })).severity(), Severity::Unknown);

        let no_details: Vulnerability = serde_json::from_value(json!({})).unwrap();
        assert_eq!(no_details.severity(), Severity::Unknown);
        assert_eq!(no_details.cve_id(), UNKNOWN_CVE);
    }

    #[test]
    fn affected_package_prefers_package_source() {
        let v: Vulnerability = serde_json::from_value(json!({
            "Product": { "PackageSource": "openssl 1.1.1", "Name": "openssl" }
        }))
        .unwrap();
        assert_eq!(v.affected_package(), "openssl 1.1.1");

        let v: Vulnerability =
            serde_json::from_value(json!({ "Product": { "Name": "zlib" } })).unwrap();
        assert_eq!(v.affected_package(), r#"{"Name":"zlib"}"#);

        let v: Vulnerability = serde_json::from_value(json!({})).unwrap();
        assert_eq!(v.affected_package(), "unknown");
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let report = ScanReport::parse(
            r#"{
                "Vulnerabilities": [42, {"Other": 1}, {"Vulnerability": {"CVEID": "CVE-2"}}],
                "Detections": ["x", {"Detection": {}}, {"Detection": {"Type": "cis"}}]
            }"#,
        )
        .unwrap();

        let cves: Vec<_> = report.vulnerabilities().map(|v| v.cve_id()).collect();
        assert_eq!(cves, vec!["CVE-2"]);

        let types: Vec<_> = report
            .detections()
            .map(|d| d.detection_type())
            .collect();
        assert_eq!(types, vec![None, Some("cis")]);
    }

    #[test]
    fn pretty_json_preserves_payload() {
        let body = r#"{"Vulnerabilities":[],"Detections":[],"ImageInfo":{"Tag":"v1"}}"#;
        let report = ScanReport::parse(body).unwrap();
        let pretty = report.to_pretty_json().unwrap();

        assert!(pretty.contains("\n    \"ImageInfo\""));
        let back: Value = serde_json::from_str(&pretty).unwrap();
        assert_eq!(&back, report.raw());
    }
}
