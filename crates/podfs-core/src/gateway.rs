//! One-shot remote commands through the cluster client.

use std::ffi::OsString;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use podfs_platform::exec::{ExecError, PodTarget, RemoteExec};

use crate::config::BridgeConfig;
use crate::credentials::ClientEnv;
use crate::upload;

/// Production `RemoteExec`: `kubectl exec` into the target container.
pub struct KubectlExec {
    config: BridgeConfig,
}

impl KubectlExec {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    fn command(&self, target: &PodTarget, interactive: bool, remote: &[String]) -> Command {
        let env = ClientEnv::for_cluster(&self.config.credential_dir(), &target.cluster_id);
        let args = exec_args(&self.config.client_args, &env, target, interactive, remote);
        debug!("{} {}", self.config.client_path, render_args(&args));

        let mut cmd = Command::new(&self.config.client_path);
        cmd.args(&args).env_clear().envs(&env.vars).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RemoteExec for KubectlExec {
    async fn exec_bytes(
        &self,
        target: &PodTarget,
        command: &[String],
        timeout: Option<Duration>,
    ) -> Result<Bytes, ExecError> {
        let cmd = self.command(target, false, command);
        run_captured(
            cmd,
            &self.config.client_path,
            timeout.unwrap_or_else(|| self.config.exec_timeout()),
            self.config.max_output_bytes,
        )
        .await
    }

    async fn write_file(
        &self,
        target: &PodTarget,
        remote_path: &str,
        payload: Bytes,
    ) -> Result<(), ExecError> {
        let remote = upload::cat_to_file_command(remote_path);
        let cmd = self.command(target, true, &remote);
        upload::stream_to_stdin(
            cmd,
            &self.config.client_path,
            payload,
            self.config.upload_timeout(),
        )
        .await
    }
}

/// Client arguments for an exec into `target`:
/// `[client_args..] [--kubeconfig P] exec [-i] POD -n NS -c C -- REMOTE..`
pub fn exec_args(
    client_args: &[String],
    env: &ClientEnv,
    target: &PodTarget,
    interactive: bool,
    remote: &[String],
) -> Vec<OsString> {
    let mut args: Vec<OsString> = client_args.iter().map(OsString::from).collect();
    args.extend(env.kubeconfig_args());
    args.push("exec".into());
    if interactive {
        args.push("-i".into());
    }
    args.push(target.pod.as_str().into());
    args.push("-n".into());
    args.push(target.namespace.as_str().into());
    args.push("-c".into());
    args.push(target.container.as_str().into());
    args.push("--".into());
    args.extend(remote.iter().map(OsString::from));
    args
}

fn render_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drain a child's stderr in the background so it can never block the child.
pub(crate) fn collect_stderr<R>(stderr: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            if let Err(e) = stderr.read_to_end(&mut buf).await {
                debug!("stderr read ended early: {}", e);
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

enum Collected {
    Done(Vec<u8>, std::process::ExitStatus),
    Overflow,
}

/// Spawn `cmd`, capture at most `limit` bytes of stdout, and kill it after `timeout`.
pub(crate) async fn run_captured(
    mut cmd: Command,
    program: &str,
    timeout: Duration,
    limit: usize,
) -> Result<Bytes, ExecError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "missing stdout pipe"))?;
    let stderr_task = collect_stderr(child.stderr.take());

    let collected = time::timeout(timeout, async {
        let mut out = Vec::new();
        stdout.take(limit as u64 + 1).read_to_end(&mut out).await?;
        if out.len() > limit {
            return Ok(Collected::Overflow);
        }
        let status = child.wait().await?;
        Ok::<_, io::Error>(Collected::Done(out, status))
    })
    .await;

    match collected {
        Err(_) => {
            warn!("{} timed out after {:?}, killing", program, timeout);
            let _ = child.kill().await;
            Err(ExecError::Timeout(timeout))
        }
        Ok(Err(e)) => {
            let _ = child.kill().await;
            Err(ExecError::Io(e))
        }
        Ok(Ok(Collected::Overflow)) => {
            let _ = child.kill().await;
            Err(ExecError::OutputTooLarge { limit })
        }
        Ok(Ok(Collected::Done(out, status))) => {
            let stderr = stderr_task.await.unwrap_or_default();
            if !status.success() {
                return Err(ExecError::Exit {
                    code: status.code(),
                    stderr,
                });
            }
            Ok(Bytes::from(out))
        }
    }
}
