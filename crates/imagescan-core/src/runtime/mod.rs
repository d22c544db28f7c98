//! Container runtime collaborator.
//!
//! The pipeline only needs a handful of operations from Docker or Podman:
//! check for a local image, pull, tag, log in to the scanning registry and
//! push. They sit behind `ContainerRuntime` so the pipeline can be driven by
//! a fake in tests.

pub mod cli;
pub mod push;

use std::fmt;

use crate::config::Credentials;
use crate::error::ScanError;

pub use cli::{CliRuntime, detect_runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    pub fn program(self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Podman => "podman",
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuntimeKind::Docker => "Docker",
            RuntimeKind::Podman => "Podman",
        })
    }
}

/// Receives push output one line at a time. Returning an error aborts the push.
pub type PushLineHandler<'a> = dyn FnMut(&str) -> Result<(), ScanError> + 'a;

pub trait ContainerRuntime {
    fn kind(&self) -> RuntimeKind;

    fn image_exists(&self, reference: &str) -> Result<bool, ScanError>;

    fn pull(&self, reference: &str) -> Result<(), ScanError>;

    fn tag(&self, local_ref: &str, remote_ref: &str) -> Result<(), ScanError>;

    /// Returns the runtime's status message, e.g. `Login Succeeded`.
    fn login(&self, registry: &str, credentials: &Credentials) -> Result<String, ScanError>;

    /// Streams push output into `on_line` synchronously.
    ///
    /// When `on_line` fails the push must stop immediately and that error
    /// is returned.
    fn push(&self, remote_ref: &str, on_line: &mut PushLineHandler<'_>) -> Result<(), ScanError>;
}
