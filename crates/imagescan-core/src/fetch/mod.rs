//! Polling for a finished assessment.
//!
//! The scanning service answers non-200 until the report is ready. The loop
//! sleeps a constant interval before every call and gives up after a fixed
//! number of attempts; there is no backoff and no wall-clock deadline.

pub mod falcon;

use std::time::Duration;

use log::{debug, info};

use crate::error::ScanError;
use crate::report::model::ScanReport;

/// Delay before every assessment request.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Raw answer of the assessment endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub status_code: u16,
    pub body: String,
}

impl Assessment {
    pub fn is_ready(&self) -> bool {
        self.status_code == 200
    }
}

/// Anything that can answer "is the report for `repo:tag` ready?".
pub trait AssessmentSource {
    fn get_assessment(&self, repo: &str, tag: &str) -> Result<Assessment, ScanError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            interval: POLL_INTERVAL,
        }
    }

    pub fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }
}

/// Poll `source` until it returns a ready report.
///
/// Errors from `source` abort polling; a non-200 answer only means "not yet".
pub fn fetch_report(
    source: &dyn AssessmentSource,
    repo: &str,
    tag: &str,
    policy: PollPolicy,
) -> Result<ScanReport, ScanError> {
    info!("Downloading Image Scan Report");

    for attempt in 0..policy.max_attempts {
        std::thread::sleep(policy.interval);
        debug!("retry count {attempt}");

        let assessment = source.get_assessment(repo, tag)?;
        if assessment.is_ready() {
            return Ok(ScanReport::parse(&assessment.body)?);
        }
        info!(
            "Scan report is not ready yet, retrying in {} seconds",
            policy.interval.as_secs()
        );
    }

    Err(ScanError::FetchExhausted {
        attempts: policy.max_attempts,
    })
}
