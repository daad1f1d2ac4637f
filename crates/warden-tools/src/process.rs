//! Bounded subprocess execution shared by the scanner adapters.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{ToolError, ToolResult};

/// Upper bound on any per-call timeout, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Captured result of one process run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Full argv, program first.
    pub command: Vec<String>,
    /// Exit code; `None` when killed by a signal.
    pub returncode: Option<i32>,
    /// Captured stdout, capped.
    pub stdout: String,
    /// Captured stderr, capped.
    pub stderr: String,
    /// Whether either stream was cut at the cap.
    pub truncated: bool,
}

impl ProcessOutput {
    /// Exit code zero.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.returncode == Some(0)
    }

    /// Fields merged into the adapter's output.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "command".into(),
            Value::Array(self.command.into_iter().map(Value::String).collect()),
        );
        fields.insert(
            "returncode".into(),
            self.returncode.map_or(Value::Null, Value::from),
        );
        fields.insert("stdout".into(), self.stdout.into());
        fields.insert("stderr".into(), self.stderr.into());
        if self.truncated {
            fields.insert("output_truncated".into(), true.into());
        }
        fields
    }
}

/// Runs external programs with a timeout and output caps.
///
/// The child is killed if the timeout elapses. No shell is involved.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    timeout_secs: u64,
    max_output_bytes: usize,
}

impl ProcessRunner {
    /// A runner with the given default timeout and per-stream cap.
    #[must_use]
    pub fn new(timeout_secs: u64, max_output_bytes: usize) -> Self {
        Self {
            timeout_secs: timeout_secs.clamp(1, MAX_TIMEOUT_SECS),
            max_output_bytes,
        }
    }

    /// The default timeout.
    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// A copy with a per-call timeout, clamped to [`MAX_TIMEOUT_SECS`].
    #[must_use]
    pub fn with_timeout(self, timeout_secs: Option<u64>) -> Self {
        match timeout_secs {
            Some(secs) => Self::new(secs, self.max_output_bytes),
            None => self,
        }
    }

    /// Run `program` with `args` and capture its output.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started, fails while
    /// running, or exceeds the timeout.
    pub async fn run(&self, program: &Path, args: &[String]) -> ToolResult<ProcessOutput> {
        let mut command = vec![program.display().to_string()];
        command.extend(args.iter().cloned());
        debug!(command = ?command, timeout_secs = self.timeout_secs, "Spawning tool process");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let output = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            warn!(command = ?command, timeout_secs = self.timeout_secs, "Tool process timed out");
            ToolError::Timeout(self.timeout_secs)
        })??;

        let (stdout, out_cut) = capped(&output.stdout, self.max_output_bytes);
        let (stderr, err_cut) = capped(&output.stderr, self.max_output_bytes);
        Ok(ProcessOutput {
            command,
            returncode: output.status.code(),
            stdout,
            stderr,
            truncated: out_cut || err_cut,
        })
    }
}

/// Decode `bytes` lossily and cut at a char boundary within `max_bytes`.
fn capped(bytes: &[u8], max_bytes: usize) -> (String, bool) {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= max_bytes {
        return (text.into_owned(), false);
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    (text[..end].to_string(), true)
}

/// Locate an external binary.
///
/// An explicit path wins; otherwise each candidate name is looked up on
/// `PATH` in order.
///
/// # Errors
///
/// [`ToolError::BinaryNotFound`] when nothing matches.
pub fn locate_binary(explicit: Option<&Path>, candidates: &[&str]) -> ToolResult<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return which::which(path).map_err(|_| {
            ToolError::BinaryNotFound(format!("configured binary {} not found", path.display()))
        });
    }
    candidates
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| {
            let primary = candidates.first().copied().unwrap_or("tool");
            ToolError::BinaryNotFound(format!(
                "{primary} executable not found on PATH; install {primary}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_respects_char_boundary() {
        let (text, cut) = capped("héllo".as_bytes(), 2);
        assert_eq!(text, "h");
        assert!(cut);

        let (text, cut) = capped(b"short", 100);
        assert_eq!(text, "short");
        assert!(!cut);
    }

    #[test]
    fn test_timeout_is_clamped() {
        assert_eq!(ProcessRunner::new(0, 10).timeout_secs(), 1);
        assert_eq!(
            ProcessRunner::new(30, 10).with_timeout(Some(99_999)).timeout_secs(),
            MAX_TIMEOUT_SECS
        );
        assert_eq!(ProcessRunner::new(30, 10).with_timeout(None).timeout_secs(), 30);
    }

    #[test]
    fn test_missing_binary() {
        let err = locate_binary(None, &["definitely-not-a-real-binary-xyz"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "definitely-not-a-real-binary-xyz executable not found on PATH; install definitely-not-a-real-binary-xyz"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_output() {
        let sh = locate_binary(None, &["sh"]).unwrap();
        let out = ProcessRunner::new(10, 1000)
            .run(&sh, &["-c".into(), "echo hi; echo err >&2; exit 3".into()])
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.stderr.trim(), "err");
        assert_eq!(out.returncode, Some(3));
        assert!(!out.succeeded());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let sh = locate_binary(None, &["sh"]).unwrap();
        let err = ProcessRunner::new(1, 1000)
            .run(&sh, &["-c".into(), "sleep 5".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout(1)));
    }
}
