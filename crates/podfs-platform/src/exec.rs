use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies the container a remote command runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodTarget {
    /// Cluster identifier used to locate the proxy kubeconfig. May be empty.
    #[serde(default)]
    pub cluster_id: String,
    pub namespace: String,
    pub pod: String,
    pub container: String,
}

/// Failure of a single remote invocation.
///
/// `Spawn` means the client never ran, `Exit` means it ran and failed,
/// `Timeout` means it ran too long and was killed.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("command exited with {}: {}", exit_label(.code), .stderr.trim())]
    Exit { code: Option<i32>, stderr: String },
    #[error("command output exceeded {limit} bytes")]
    OutputTooLarge { limit: usize },
    #[error("pipe error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {}", c),
        None => "signal".to_string(),
    }
}

/// Runs commands inside a remote container.
///
/// The production implementation shells out to the cluster client; tests
/// substitute a scripted one.
#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Run a one-shot command and return its raw stdout.
    ///
    /// `timeout` overrides the implementation's default when set.
    async fn exec_bytes(
        &self,
        target: &PodTarget,
        command: &[String],
        timeout: Option<Duration>,
    ) -> Result<Bytes, ExecError>;

    /// Like [`exec_bytes`](Self::exec_bytes), decoded as text. Invalid UTF-8
    /// becomes U+FFFD.
    async fn exec(
        &self,
        target: &PodTarget,
        command: &[String],
        timeout: Option<Duration>,
    ) -> Result<String, ExecError> {
        let out = self.exec_bytes(target, command, timeout).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Stream `payload` into `remote_path`, replacing any existing file.
    async fn write_file(
        &self,
        target: &PodTarget,
        remote_path: &str,
        payload: Bytes,
    ) -> Result<(), ExecError>;
}
