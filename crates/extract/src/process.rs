//! Running an external extraction binary over an in-memory artifact.

use std::process::Stdio;
use talkback_core::error::ExtractionError;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Run `bin args..`, feeding `input` on stdin, and return stdout.
///
/// Stdin is written from a separate task so a child that starts writing
/// before it has read everything cannot deadlock against us.
pub(crate) async fn run_with_input(
    backend: &str,
    bin: &str,
    args: &[String],
    input: Vec<u8>,
) -> Result<Vec<u8>, ExtractionError> {
    debug!(backend, bin, bytes = input.len(), "Launching extraction backend");

    let mut child = Command::new(bin)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ExtractionError::BackendError {
            backend: backend.to_string(),
            reason: format!("failed to launch '{bin}': {e}"),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        tokio::spawn(async move {
            // A child that exits early closes the pipe; its exit status tells the story
            let _ = stdin.write_all(&input).await;
            let _ = stdin.shutdown().await;
        });
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ExtractionError::BackendError {
            backend: backend.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(backend, exit_code = code, stderr = %stderr, "Extraction backend failed");
        return Err(ExtractionError::BackendError {
            backend: backend.to_string(),
            reason: format!("exit code {code}: {stderr}"),
        });
    }

    Ok(output.stdout)
}
