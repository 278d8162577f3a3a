//! Streaming uploads over an interactive exec.
//!
//! The payload is written to the client's stdin and the pipe is closed so the
//! remote `cat` sees end-of-input. Process exit races the watchdog to settle
//! the upload; `select!` lets exactly one of them win and drops the other.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::time;
use tracing::{debug, warn};

use podfs_platform::exec::ExecError;

use crate::gateway::collect_stderr;

/// Remote argv that writes stdin to `remote_path`.
///
/// The path travels as `$0` so the shell never interprets it.
pub fn cat_to_file_command(remote_path: &str) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        r#"cat > "$0""#.to_string(),
        remote_path.to_string(),
    ]
}

pub(crate) async fn stream_to_stdin(
    mut cmd: Command,
    program: &str,
    payload: Bytes,
    watchdog: Duration,
) -> Result<(), ExecError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "missing stdin pipe"))?;
    let stderr_task = collect_stderr(child.stderr.take());

    let settled = tokio::select! {
        outcome = feed_and_wait(&mut child, stdin, payload) => Some(outcome),
        _ = time::sleep(watchdog) => None,
    };

    let Some((fed, status)) = settled else {
        warn!("upload did not finish within {:?}, killing {}", watchdog, program);
        let _ = child.kill().await;
        return Err(ExecError::Timeout(watchdog));
    };

    let status = status?;
    let stderr = stderr_task.await.unwrap_or_default();
    if !status.success() {
        return Err(ExecError::Exit {
            code: status.code(),
            stderr,
        });
    }
    // A clean exit after a failed write means the remote side stopped reading early.
    fed?;
    Ok(())
}

async fn feed_and_wait(
    child: &mut Child,
    mut stdin: ChildStdin,
    payload: Bytes,
) -> (io::Result<()>, io::Result<ExitStatus>) {
    let fed = async {
        stdin.write_all(&payload).await?;
        stdin.shutdown().await
    }
    .await;
    if let Err(ref e) = fed {
        debug!("upload stdin closed early: {}", e);
    }
    drop(stdin);

    (fed, child.wait().await)
}
