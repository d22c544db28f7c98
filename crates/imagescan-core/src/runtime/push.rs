use std::io::Write;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use serde_json::Value;

use crate::error::ScanError;
use crate::runtime::{ContainerRuntime, RuntimeKind};

/// One line of push output, either an engine JSON message or plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    Progress(String),
    Status(String),
    Error(String),
    Other(String),
}

impl PushEvent {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.starts_with('{') {
            if let Ok(Value::Object(msg)) = serde_json::from_str::<Value>(trimmed) {
                return Self::from_message(&msg, trimmed);
            }
        }
        Self::from_text(trimmed)
    }

    fn from_message(msg: &serde_json::Map<String, Value>, line: &str) -> Self {
        if let Some(err) = msg.get("error") {
            let text = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
            return PushEvent::Error(text);
        }
        match msg.get("status").and_then(Value::as_str) {
            Some("Pushing") => {
                let progress = msg
                    .get("progress")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                PushEvent::Progress(progress.to_string())
            }
            Some(status) => match msg.get("id").and_then(Value::as_str) {
                Some(id) => PushEvent::Status(format!("{id}: {status}")),
                None => PushEvent::Status(status.to_string()),
            },
            None => PushEvent::Other(line.to_string()),
        }
    }

    fn from_text(line: &str) -> Self {
        if line.is_empty() {
            return PushEvent::Other(String::new());
        }
        if line.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("error")) {
            return PushEvent::Error(line.to_string());
        }
        match line.split_once(": Pushing") {
            Some((_, progress)) => PushEvent::Progress(progress.trim().to_string()),
            None => PushEvent::Status(line.to_string()),
        }
    }
}

/// Reports one push line. Error lines abort the push.
pub fn report_push_line(line: &str, kind: RuntimeKind) -> Result<(), ScanError> {
    match PushEvent::parse(line) {
        PushEvent::Error(msg) => Err(ScanError::RemoteApi(format!("container_push {msg}"))),
        PushEvent::Progress(progress) => {
            // Overwritten in place; stdout is reserved for plugin output.
            let mut err = std::io::stderr();
            let _ = write!(err, "Pushing {progress}\r");
            let _ = err.flush();
            Ok(())
        }
        PushEvent::Status(status) => {
            info!("{kind}: {status}");
            Ok(())
        }
        PushEvent::Other(line) => {
            debug!("{line}");
            Ok(())
        }
    }
}

/// Bounds on push retries; whichever is hit first ends the retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub max_elapsed: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_elapsed: Duration::from_secs(5),
        }
    }
}

/// Push `remote_ref`, retrying immediately on failure within `budget`.
pub fn push_image(
    runtime: &dyn ContainerRuntime,
    remote_ref: &str,
    budget: RetryBudget,
) -> Result<(), ScanError> {
    let kind = runtime.kind();
    let started = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        info!("Performing container push to {remote_ref}");

        match runtime.push(remote_ref, &mut |line| report_push_line(line, kind)) {
            Ok(()) => return Ok(()),
            Err(e) => {
                error!("Push failed: {e}");
                if attempts >= budget.max_attempts || started.elapsed() >= budget.max_elapsed {
                    return Err(e);
                }
                debug!(
                    "retrying push (attempt {attempts} of {})",
                    budget.max_attempts
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::runtime::PushLineHandler;
    use std::cell::Cell;

    #[test]
    fn parses_engine_json_messages() {
        assert_eq!(
            PushEvent::parse(r#"{"status":"Pushing","progress":"[==>   ] 1MB/4MB","id":"abc"}"#),
            PushEvent::Progress("[==>   ] 1MB/4MB".into())
        );
        assert_eq!(
            PushEvent::parse(r#"{"status":"Pushed","id":"abc"}"#),
            PushEvent::Status("abc: Pushed".into())
        );
        assert_eq!(
            PushEvent::parse(r#"{"errorDetail":{"message":"denied"},"error":"denied"}"#),
            PushEvent::Error("denied".into())
        );
        assert!(matches!(
            PushEvent::parse(r#"{"aux":{"Digest":"sha256:1"}}"#),
            PushEvent::Other(_)
        ));
    }

    #[test]
    fn parses_plain_text_lines() {
        assert_eq!(
            PushEvent::parse("5f70bf18a086: Pushing [=====>  ] 2.1MB/3MB"),
            PushEvent::Progress("[=====>  ] 2.1MB/3MB".into())
        );
        assert_eq!(
            PushEvent::parse("5f70bf18a086: Layer already exists"),
            PushEvent::Status("5f70bf18a086: Layer already exists".into())
        );
        assert_eq!(
            PushEvent::parse("Error: unauthorized"),
            PushEvent::Error("Error: unauthorized".into())
        );
    }

    #[test]
    fn error_line_becomes_remote_api_error() {
        let err = report_push_line(r#"{"error":"quota exceeded"}"#, RuntimeKind::Docker).unwrap_err();
        assert!(matches!(err, ScanError::RemoteApi(ref m) if m == "container_push quota exceeded"));
        assert!(report_push_line("latest: digest: sha256:00", RuntimeKind::Docker).is_ok());
    }

    /// Emits scripted lines; counts attempts.
    struct ScriptedPush {
        lines: Vec<&'static str>,
        attempts: Cell<u32>,
        fail_first: u32,
    }

    impl ContainerRuntime for ScriptedPush {
        fn kind(&self) -> RuntimeKind {
            RuntimeKind::Podman
        }
        fn image_exists(&self, _: &str) -> Result<bool, ScanError> {
            Ok(true)
        }
        fn pull(&self, _: &str) -> Result<(), ScanError> {
            Ok(())
        }
        fn tag(&self, _: &str, _: &str) -> Result<(), ScanError> {
            Ok(())
        }
        fn login(&self, _: &str, _: &Credentials) -> Result<String, ScanError> {
            Ok("Login Succeeded".into())
        }
        fn push(&self, _: &str, on_line: &mut PushLineHandler<'_>) -> Result<(), ScanError> {
            let n = self.attempts.get() + 1;
            self.attempts.set(n);
            if n <= self.fail_first {
                on_line(r#"{"error":"transient"}"#)?;
            }
            for line in &self.lines {
                on_line(line)?;
            }
            Ok(())
        }
    }

    #[test]
    fn retries_until_success() {
        let rt = ScriptedPush {
            lines: vec![r#"{"status":"Pushed"}"#],
            attempts: Cell::new(0),
            fail_first: 2,
        };
        push_image(&rt, "r/app:1", RetryBudget::default()).unwrap();
        assert_eq!(rt.attempts.get(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let rt = ScriptedPush {
            lines: vec![],
            attempts: Cell::new(0),
            fail_first: u32::MAX,
        };
        let err = push_image(&rt, "r/app:1", RetryBudget::default()).unwrap_err();
        assert!(matches!(err, ScanError::RemoteApi(_)));
        assert_eq!(rt.attempts.get(), 5);
    }

    #[test]
    fn elapsed_budget_stops_retries() {
        let rt = ScriptedPush {
            lines: vec![],
            attempts: Cell::new(0),
            fail_first: u32::MAX,
        };
        let budget = RetryBudget {
            max_attempts: 100,
            max_elapsed: Duration::ZERO,
        };
        assert!(push_image(&rt, "r/app:1", budget).is_err());
        assert_eq!(rt.attempts.get(), 1);
    }

    #[test]
    fn error_line_stops_remaining_lines() {
        let seen = Cell::new(0);
        let rt = ScriptedPush {
            lines: vec!["a: Preparing", r#"{"error":"boom"}"#, "never reached"],
            attempts: Cell::new(0),
            fail_first: 0,
        };
        let result = rt.push("r/app:1", &mut |line| {
            seen.set(seen.get() + 1);
            report_push_line(line, RuntimeKind::Podman)
        });
        assert!(result.is_err());
        assert_eq!(seen.get(), 2);
    }
}
