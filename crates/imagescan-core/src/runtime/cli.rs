use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Output, Stdio};
use std::sync::mpsc::{self, Sender};

use log::debug;

use crate::config::Credentials;
use crate::error::ScanError;
use crate::runtime::{ContainerRuntime, PushLineHandler, RuntimeKind};

const PODMAN_SOCKET_HINT: &str = "Could not connect to Docker or Podman. \
    If running rootless, ensure your podman.socket is running (systemctl --user start podman.socket). \
    If running as root, ensure the CONTAINER_HOST environment variable is set correctly \
    (e.g. unix:///var/run/podman/podman.sock).";

/// Drives the `docker` or `podman` executable.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    kind: RuntimeKind,
    program: String,
}

/// Docker first, Podman as fallback. A runtime counts as available when its
/// `version` command can reach the daemon.
pub fn detect_runtime() -> Result<CliRuntime, ScanError> {
    for kind in [RuntimeKind::Docker, RuntimeKind::Podman] {
        let runtime = CliRuntime::new(kind);
        if runtime.is_available() {
            return Ok(runtime);
        }
        debug!("{kind} runtime is not available");
    }
    Err(ScanError::Runtime(PODMAN_SOCKET_HINT.to_string()))
}

impl CliRuntime {
    pub fn new(kind: RuntimeKind) -> Self {
        Self::with_program(kind, kind.program())
    }

    /// Use a specific executable, e.g. a full path or a wrapper script.
    pub fn with_program(kind: RuntimeKind, program: impl Into<String>) -> Self {
        Self {
            kind,
            program: program.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn output(&self, args: &[&str]) -> Result<Output, ScanError> {
        debug!("{} {}", self.program, args.join(" "));
        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| ScanError::Runtime(format!("failed to run {}: {e}", self.program)))
    }

    fn run(&self, args: &[&str]) -> Result<String, ScanError> {
        let out = self.output(args)?;
        if !out.status.success() {
            return Err(ScanError::Runtime(format!(
                "`{} {}` failed: {}",
                self.program,
                args.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

impl ContainerRuntime for CliRuntime {
    fn kind(&self) -> RuntimeKind {
        self.kind
    }

    fn image_exists(&self, reference: &str) -> Result<bool, ScanError> {
        Ok(self.output(&["image", "inspect", reference])?.status.success())
    }

    fn pull(&self, reference: &str) -> Result<(), ScanError> {
        self.run(&["pull", reference]).map(|_| ())
    }

    fn tag(&self, local_ref: &str, remote_ref: &str) -> Result<(), ScanError> {
        self.run(&["tag", local_ref, remote_ref]).map(|_| ())
    }

    fn login(&self, registry: &str, credentials: &Credentials) -> Result<String, ScanError> {
        let mut child = Command::new(&self.program)
            .args([
                "login",
                "--username",
                credentials.client_id.as_str(),
                "--password-stdin",
                registry,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ScanError::Runtime(format!("failed to run {}: {e}", self.program)))?;

        // The child is always reaped, even when it hung up before reading.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(credentials.client_secret.as_bytes()),
            None => Ok(()),
        };

        let out = child.wait_with_output()?;
        if !out.status.success() {
            return Err(ScanError::Runtime(format!(
                "{} login failed: {}",
                self.kind,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        written?;
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }

    fn push(&self, remote_ref: &str, on_line: &mut PushLineHandler<'_>) -> Result<(), ScanError> {
        let mut child = Command::new(&self.program)
            .args(["push", remote_ref])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ScanError::Runtime(format!("failed to run {}: {e}", self.program)))?;

        // Both pipes feed one channel so an error on either stream stops the
        // push as soon as it is printed.
        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx.clone());
        }
        drop(tx);

        for line in rx {
            let handled = line
                .map_err(ScanError::from)
                .and_then(|l| if l.trim().is_empty() { Ok(()) } else { on_line(&l) });
            if let Err(e) = handled {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(ScanError::RemoteApi(format!(
                "container_push {} exited with {status}",
                self.program
            )));
        }
        Ok(())
    }
}

fn forward_lines<R>(pipe: R, tx: Sender<std::io::Result<String>>)
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        for line in BufReader::new(pipe).lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_unavailable() {
        let rt = CliRuntime::with_program(RuntimeKind::Docker, "definitely-not-a-container-runtime");
        assert!(!rt.is_available());
    }

    #[test]
    fn missing_program_surfaces_runtime_error() {
        let rt = CliRuntime::with_program(RuntimeKind::Podman, "definitely-not-a-container-runtime");
        let err = rt.tag("a:b", "c/a:b").unwrap_err();
        assert!(matches!(err, ScanError::Runtime(_)));
        assert!(err.to_string().contains("definitely-not-a-container-runtime"));
    }

    #[cfg(unix)]
    fn fake_engine(dir: &std::path::Path, script: &str) -> CliRuntime {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-engine");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        CliRuntime::with_program(RuntimeKind::Podman, path.to_string_lossy())
    }

    #[cfg(unix)]
    #[test]
    fn stderr_error_aborts_push_while_engine_is_still_running() {
        let dir = tempfile::tempdir().unwrap();
        let rt = fake_engine(
            dir.path(),
            "echo 'Copying blob sha256:abc' >&2\necho 'Error: requested access to the resource is denied' >&2\nexec sleep 5",
        );

        let mut seen = Vec::new();
        let started = std::time::Instant::now();
        let err = rt
            .push("registry/app:v1", &mut |line: &str| {
                seen.push(line.to_string());
                crate::runtime::push::report_push_line(line, RuntimeKind::Podman)
            })
            .unwrap_err();

        assert!(started.elapsed() < std::time::Duration::from_secs(4));
        assert!(matches!(err, ScanError::RemoteApi(_)));
        assert!(err.to_string().contains("denied"));
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with("Copying blob"));
    }

    #[cfg(unix)]
    #[test]
    fn stderr_progress_is_streamed_and_push_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let rt = fake_engine(
            dir.path(),
            "echo 'Copying blob sha256:abc' >&2\necho 'Writing manifest to image destination' >&2\nexit 0",
        );

        let mut seen = Vec::new();
        rt.push("registry/app:v1", &mut |line: &str| {
            seen.push(line.to_string());
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                "Copying blob sha256:abc".to_string(),
                "Writing manifest to image destination".to_string(),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn failed_engine_exit_fails_push() {
        let dir = tempfile::tempdir().unwrap();
        let rt = fake_engine(dir.path(), "exit 125");
        let err = rt.push("registry/app:v1", &mut |_: &str| Ok(())).unwrap_err();
        assert!(matches!(err, ScanError::RemoteApi(_)));
    }

    #[cfg(unix)]
    #[test]
    fn login_rejected_before_reading_secret_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let rt = fake_engine(
            dir.path(),
            "exec 0<&-\necho 'unauthorized: bad credentials' >&2\nexit 1",
        );
        let credentials = Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        };

        let err = rt.login("registry.example", &credentials).unwrap_err();
        assert!(matches!(err, ScanError::Runtime(_)));
        assert!(err.to_string().contains("unauthorized"));
    }
}
