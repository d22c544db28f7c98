//! End-to-end scan of one image.
//!
//! Stages, in order:
//!
//! 1. Publish: pull if missing, tag, log in, push (skipped with `skip_push`)
//! 2. Poll the assessment endpoint until the report is ready
//! 3. Plugin mode: hand back the raw report and stop
//! 4. Optional JSON export
//! 5. Classify and resolve the exit status
//!
//! Any error stops the pipeline; the caller turns it into SCRIPT_FAILURE
//! with `report_failure`.

use log::{error, info};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::fetch::{AssessmentSource, PollPolicy, fetch_report};
use crate::report::render;
use crate::rules::classify::classify;
use crate::rules::resolve::{Resolution, ScanStatus, resolve};
use crate::runtime::ContainerRuntime;
use crate::runtime::push::{RetryBudget, push_image};

/// What the process should do once the pipeline finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Print this JSON to stdout and exit 0.
    Plugin(String),
    Status(Resolution),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Plugin(_) => 0,
            Outcome::Status(resolution) => resolution.status.exit_code(),
        }
    }
}

/// Runs the pipeline with production polling and push retry settings.
///
/// `runtime` may be `None` only when `config.skip_push` is set.
pub fn run(
    config: &ScanConfig,
    runtime: Option<&dyn ContainerRuntime>,
    source: &dyn AssessmentSource,
) -> Result<Outcome, ScanError> {
    run_with(
        config,
        runtime,
        source,
        PollPolicy::new(config.retry_count).with_interval(config.poll_interval),
        RetryBudget::default(),
    )
}

pub fn run_with(
    config: &ScanConfig,
    runtime: Option<&dyn ContainerRuntime>,
    source: &dyn AssessmentSource,
    poll: PollPolicy,
    push_budget: RetryBudget,
) -> Result<Outcome, ScanError> {
    if !config.skip_push {
        let runtime = runtime
            .ok_or_else(|| ScanError::Runtime("no container runtime available".to_string()))?;
        publish_image(config, runtime, push_budget)?;
    }

    let report = fetch_report(source, &config.repo, &config.tag, poll)?;

    if config.plugin {
        return Ok(Outcome::Plugin(report.to_pretty_json()?));
    }

    if let Some(path) = &config.json_report {
        report.export(path)?;
    }

    let resolution = resolve(&classify(&report), config.score_threshold);
    match resolution.status {
        ScanStatus::Clean => info!("{}", render::decision_line(&resolution)),
        _ => error!("{}", render::decision_line(&resolution)),
    }

    Ok(Outcome::Status(resolution))
}

/// Makes `repo:tag` available in the scanning registry.
pub fn publish_image(
    config: &ScanConfig,
    runtime: &dyn ContainerRuntime,
    push_budget: RetryBudget,
) -> Result<(), ScanError> {
    let local_ref = config.local_ref();
    let remote_ref = config.remote_ref();

    if !runtime.image_exists(&local_ref)? {
        info!("Pulling container image: '{local_ref}'");
        runtime.pull(&local_ref)?;
    }

    info!("Tagging '{local_ref}' to '{remote_ref}'");
    runtime.tag(&local_ref, &remote_ref)?;

    info!("Performing login to CrowdStrike Image Assessment Service");
    let status = runtime
        .login(config.region.registry_host(), &config.credentials)
        .inspect_err(|e| error!("{} login failed: {e}", runtime.kind()))?;
    info!("{status}");

    push_image(runtime, &remote_ref, push_budget)
}

/// Logs `err` under its failure bucket and returns the status to exit with.
pub fn report_failure(err: &ScanError) -> ScanStatus {
    error!("{}: {err}", err.summary());
    err.exit_status()
}
