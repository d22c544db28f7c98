use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::fetch::POLL_INTERVAL;

/// Default score at or above which the scan fails.
pub const DEFAULT_SCORE_THRESHOLD: i64 = 500;

/// Default number of report fetch attempts.
pub const DEFAULT_RETRY_COUNT: u32 = 100;

pub const DEFAULT_USER_AGENT: &str = "container-image-scan";

/// Cloud the scanning service and its registry live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloudRegion {
    #[default]
    Us1,
    Us2,
    Eu1,
    UsGov1,
}

impl CloudRegion {
    pub const ALL: [CloudRegion; 4] = [
        CloudRegion::Us1,
        CloudRegion::Us2,
        CloudRegion::Eu1,
        CloudRegion::UsGov1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CloudRegion::Us1 => "us-1",
            CloudRegion::Us2 => "us-2",
            CloudRegion::Eu1 => "eu-1",
            CloudRegion::UsGov1 => "us-gov-1",
        }
    }

    /// OAuth2 / API endpoint.
    pub fn api_base_url(self) -> &'static str {
        match self {
            CloudRegion::Us1 => "https://api.crowdstrike.com",
            CloudRegion::Us2 => "https://api.us-2.crowdstrike.com",
            CloudRegion::Eu1 => "https://api.eu-1.crowdstrike.com",
            CloudRegion::UsGov1 => "https://api.laggar.gcw.crowdstrike.com",
        }
    }

    /// Host of the image registry, which also serves assessment reports.
    pub fn registry_host(self) -> &'static str {
        match self {
            CloudRegion::Us1 => "container-upload.us-1.crowdstrike.com",
            CloudRegion::Us2 => "container-upload.us-2.crowdstrike.com",
            CloudRegion::Eu1 => "container-upload.eu-1.crowdstrike.com",
            CloudRegion::UsGov1 => "container-upload.laggar.gcw.crowdstrike.com",
        }
    }
}

impl fmt::Display for CloudRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CloudRegion::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown cloud region '{s}' (expected us-1, us-2, eu-1 or us-gov-1)"))
    }
}

/// API credentials. `Debug` never prints the secret.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Fully resolved settings for one scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub credentials: Credentials,
    pub repo: String,
    pub tag: String,
    pub region: CloudRegion,
    pub score_threshold: i64,
    pub json_report: Option<PathBuf>,
    pub retry_count: u32,
    /// Sleep before each report fetch attempt.
    pub poll_interval: Duration,
    pub plugin: bool,
    /// Full user agent, version suffix included.
    pub user_agent: String,
    pub skip_push: bool,
    /// Replaces both the API and the report endpoints when set.
    pub base_url: Option<String>,
}

impl ScanConfig {
    pub fn new(credentials: Credentials, repo: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            credentials,
            repo: repo.into(),
            tag: tag.into(),
            region: CloudRegion::default(),
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            json_report: None,
            retry_count: DEFAULT_RETRY_COUNT,
            poll_interval: POLL_INTERVAL,
            plugin: false,
            user_agent: format!("{DEFAULT_USER_AGENT}/{}", env!("CARGO_PKG_VERSION")),
            skip_push: false,
            base_url: None,
        }
    }

    pub fn local_ref(&self) -> String {
        format!("{}:{}", self.repo, self.tag)
    }

    pub fn remote_repo(&self) -> String {
        format!("{}/{}", self.region.registry_host(), self.repo)
    }

    pub fn remote_ref(&self) -> String {
        format!("{}:{}", self.remote_repo(), self.tag)
    }

    pub fn api_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => self.region.api_base_url().to_string(),
        }
    }

    pub fn report_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.region.registry_host()),
        }
    }
}
