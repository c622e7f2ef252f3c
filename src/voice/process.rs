//! External process invocation shared by the engine adapters

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Run a program to completion, optionally feeding `stdin` and bounding the
/// wait by `limit`
///
/// Returns the raw output regardless of exit status. Spawn failures, stdin
/// write failures and timeouts come back as a message.
pub async fn run<I, S>(
    program: &Path,
    args: I,
    stdin: Option<&[u8]>,
    limit: Option<Duration>,
) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn {}: {e}", program.display()))?;

    // Write on a separate task so a chatty child can't fill its output pipe
    // while we are still blocked on its input
    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => {
            let input = input.to_vec();
            Some(tokio::spawn(async move {
                pipe.write_all(&input).await?;
                pipe.shutdown().await
            }))
        }
        _ => None,
    };

    let wait = child.wait_with_output();
    let output = match limit {
        Some(limit) => timeout(limit, wait)
            .await
            .map_err(|_| format!("{} timed out after {limit:?}", program.display()))?,
        None => wait.await,
    }
    .map_err(|e| format!("failed to wait for {}: {e}", program.display()))?;

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(format!("failed to write to {} stdin: {e}", program.display())),
            Err(e) => return Err(format!("stdin task failed: {e}")),
        }
    }

    Ok(output)
}

/// Summarize a failed run: exit code plus trimmed stderr
#[must_use]
pub fn describe_failure(output: &Output) -> String {
    let code = output
        .status
        .code()
        .map_or_else(|| "signal".to_string(), |c| c.to_string());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();

    if stderr.is_empty() {
        format!("exited with code {code}")
    } else {
        format!("exited with code {code}: {stderr}")
    }
}
