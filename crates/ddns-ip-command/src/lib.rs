// # Command IP Source
//
// Runs an operator-supplied shell command and takes its trimmed stdout as
// the detected address. This is the escape hatch for networks where neither
// DNS nor HTTP echo detection works (e.g. reading the WAN address from a
// router).
//
// The command text comes from configuration and its output is untrusted:
// `IpDetector` validates it like any network answer. The requested record
// type is passed to the command as `RRTYPE` so one script can serve both
// families.

use async_trait::async_trait;
use ddns_core::config::RecordType;
use ddns_core::traits::IpSource;
use ddns_core::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Longest slice of stderr kept in error messages
const MAX_STDERR_IN_ERROR: usize = 200;

/// Command-based IP source
#[derive(Debug, Clone)]
pub struct CommandIpSource {
    command: String,
    timeout: Duration,
}

impl CommandIpSource {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait]
impl IpSource for CommandIpSource {
    async fn detect(&self, record_type: RecordType) -> Result<String> {
        tracing::info!("Running custom IP command: {}", self.command);

        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("RRTYPE", record_type.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::detection(format!("failed to start custom command: {}", e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::detection(format!("custom command timed out after {:?}", self.timeout))
            })?
            .map_err(|e| Error::detection(format!("custom command failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.trim().chars().take(MAX_STDERR_IN_ERROR).collect();
            return Err(Error::detection(format!(
                "custom command exited with {}: {}",
                output.status, stderr
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(Error::detection("custom command returned empty output"));
        }

        Ok(stdout)
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn source(command: &str) -> CommandIpSource {
        CommandIpSource::new(command, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_trimmed_stdout_is_answer() {
        let answer = source("echo '  203.0.113.7  '").detect(RecordType::A).await.unwrap();
        assert_eq!(answer, "203.0.113.7");
    }

    #[tokio::test]
    async fn test_record_type_passed_in_environment() {
        let answer = source("echo $RRTYPE").detect(RecordType::Aaaa).await.unwrap();
        assert_eq!(answer, "AAAA");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_detection_error() {
        let err = source("echo 203.0.113.7; echo boom >&2; exit 3")
            .detect(RecordType::A)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Detection(ref m) if m.contains("boom")));
    }

    #[tokio::test]
    async fn test_empty_output_is_detection_error() {
        let err = source("true").detect(RecordType::A).await.unwrap_err();
        assert!(matches!(err, Error::Detection(ref m) if m.contains("empty")));
    }

    #[tokio::test]
    async fn test_hanging_command_times_out() {
        let err = CommandIpSource::new("sleep 5", Duration::from_millis(100))
            .detect(RecordType::A)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Detection(ref m) if m.contains("timed out")));
    }
}
