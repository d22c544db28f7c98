use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use imagescan_core::config::{CloudRegion, Credentials, DEFAULT_USER_AGENT, ScanConfig};

pub const CLIENT_SECRET_ENV: &str = "FALCON_CLIENT_SECRET";

#[derive(Debug, Parser)]
#[command(
    name = imagescan_core::TOOL_NAME,
    version,
    about = "Push a container image for assessment and gate CI on the scan report",
    after_help = "Exit codes: 0 clean, 1 vulnerability score threshold exceeded, \
                  2 malware found, 3 secrets found, 10 script failure.\n\
                  The API secret is read from FALCON_CLIENT_SECRET or prompted for."
)]
pub struct Args {
    /// Falcon OAuth2 API ClientID
    #[arg(short = 'u', long = "clientid", env = "FALCON_CLIENT_ID")]
    pub client_id: String,

    /// Container image repository
    #[arg(short = 'r', long, env = "CONTAINER_REPO")]
    pub repo: String,

    /// Container image tag
    #[arg(short = 't', long, env = "CONTAINER_TAG", default_value = "latest")]
    pub tag: String,

    /// CrowdStrike cloud region
    #[arg(
        short = 'c',
        long = "cloud-region",
        env = "FALCON_CLOUD_REGION",
        value_enum,
        default_value = "us-1"
    )]
    pub cloud: CloudArg,

    /// Vulnerability score threshold
    #[arg(
        short = 's',
        long = "score_threshold",
        env = "SCORE",
        default_value_t = 500,
        allow_negative_numbers = true
    )]
    pub score: i64,

    /// Export JSON report to specified file
    #[arg(long = "json-report", env = "JSON_REPORT")]
    pub report: Option<PathBuf>,

    /// Set the logging level
    #[arg(
        long = "log-level",
        env = "LOG_LEVEL",
        value_enum,
        ignore_case = true,
        default_value = "INFO"
    )]
    pub log_level: LogLevel,

    /// Scan report retry count
    #[arg(short = 'R', long = "retry_count", env = "RETRY_COUNT", default_value_t = 100)]
    pub retry_count: u32,

    /// Prints the report as json to stdout
    #[arg(long)]
    pub plugin: bool,

    /// HTTP User agent to use for API calls
    #[arg(long = "user-agent", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Skip image push
    #[arg(long = "skip-push")]
    pub skip_push: bool,

    /// Override the API and report endpoint (proxies, testing)
    #[arg(long = "base-url", env = "FALCON_BASE_URL", hide = true)]
    pub base_url: Option<String>,

    /// Seconds to wait before each report fetch attempt
    #[arg(
        long = "poll-interval",
        env = "IMAGESCAN_POLL_INTERVAL",
        default_value_t = 10,
        hide = true
    )]
    pub poll_interval: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CloudArg {
    #[value(name = "us-1")]
    Us1,
    #[value(name = "us-2")]
    Us2,
    #[value(name = "eu-1")]
    Eu1,
    #[value(name = "us-gov-1")]
    UsGov1,
}

impl From<CloudArg> for CloudRegion {
    fn from(arg: CloudArg) -> Self {
        match arg {
            CloudArg::Us1 => CloudRegion::Us1,
            CloudArg::Us2 => CloudRegion::Us2,
            CloudArg::Eu1 => CloudRegion::Eu1,
            CloudArg::UsGov1 => CloudRegion::UsGov1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING")]
    Warning,
    #[value(name = "ERROR")]
    Error,
    #[value(name = "CRITICAL")]
    Critical,
}

impl Args {
    /// Resolve the typed scan configuration, prompting for the secret if
    /// the environment does not provide one.
    pub fn into_config(self) -> Result<ScanConfig> {
        let client_secret = match std::env::var(CLIENT_SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => secret,
            _ => prompt_secret()?,
        };

        let credentials = Credentials {
            client_id: self.client_id,
            client_secret,
        };

        let mut config = ScanConfig::new(credentials, self.repo, self.tag);
        config.region = self.cloud.into();
        config.score_threshold = self.score;
        config.json_report = self.report;
        config.retry_count = self.retry_count;
        config.poll_interval = Duration::from_secs(self.poll_interval);
        config.plugin = self.plugin;
        config.user_agent = format!("{}/{}", self.user_agent, env!("CARGO_PKG_VERSION"));
        config.skip_push = self.skip_push;
        config.base_url = self.base_url;
        Ok(config)
    }
}

const SECRET_PROMPT: &str = "Please enter your Falcon OAuth2 API Secret";

/// Hidden input on a terminal; a plain line when stdin is piped.
fn prompt_secret() -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        let secret = rpassword::prompt_password(format!("{SECRET_PROMPT}\n"))
            .context("failed to read API secret from terminal")?;
        return non_empty(secret);
    }

    let mut err = std::io::stderr();
    writeln!(err, "{SECRET_PROMPT}")?;
    err.flush()?;
    read_secret_line(&mut stdin.lock())
}

fn read_secret_line(reader: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("failed to read API secret from stdin")?;
    non_empty(line.trim_end_matches(['\r', '\n']).to_string())
}

fn non_empty(secret: String) -> Result<String> {
    if secret.is_empty() {
        bail!("no Falcon OAuth2 API secret provided");
    }
    Ok(secret)
}
