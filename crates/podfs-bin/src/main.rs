use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use base64::Engine;
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use podfs_core::config::BridgeConfig;
use podfs_core::files::FileHandler;
use podfs_core::protocol::{self, OpResult};
use podfs_platform::exec::PodTarget;

#[derive(Parser, Debug)]
#[command(name = "podfs")]
#[command(about = "Browse and edit files inside a running container via kubectl exec")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    target: TargetArgs,

    /// Cluster client binary (overrides the config file)
    #[arg(long, env = "PODFS_KUBECTL", global = true)]
    kubectl: Option<String>,

    /// Timeout for one-shot remote commands in milliseconds
    #[arg(long, env = "PODFS_EXEC_TIMEOUT_MS", global = true)]
    exec_timeout_ms: Option<u64>,

    /// Path to config file
    #[arg(long, env = "PODFS_CONFIG_PATH", global = true)]
    config_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "PODFS_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Cluster identifier used to find the proxy kubeconfig
    #[arg(long, env = "PODFS_CLUSTER", default_value = "", global = true)]
    cluster: String,

    #[arg(long, short = 'n', env = "PODFS_NAMESPACE", default_value = "default", global = true)]
    namespace: String,

    #[arg(long, env = "PODFS_POD", global = true)]
    pod: Option<String>,

    #[arg(long, short = 'c', env = "PODFS_CONTAINER", global = true)]
    container: Option<String>,
}

impl TargetArgs {
    fn resolve(&self) -> Result<PodTarget> {
        let pod = self.pod.clone().context("--pod is required")?;
        let container = self.container.clone().context("--container is required")?;
        Ok(PodTarget {
            cluster_id: self.cluster.clone(),
            namespace: self.namespace.clone(),
            pod,
            container,
        })
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List a directory
    List { path: String },
    /// Read a text file (binary files are detected and not transferred)
    Read {
        path: String,
        /// Truncate content beyond this many bytes
        #[arg(long)]
        max_size: Option<u64>,
    },
    /// Show type, size, mode and modification time
    Stat { path: String },
    /// Fetch a file's full content
    Download {
        path: String,
        /// Write content to this local file instead of printing it
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Remove a file, or a directory recursively with --dir
    Delete {
        path: String,
        #[arg(long)]
        dir: bool,
    },
    /// Write a file from local content
    Upload {
        path: String,
        /// Local file to upload
        #[arg(long, conflicts_with = "base64", required_unless_present = "base64")]
        file: Option<PathBuf>,
        /// Base64-encoded content to upload
        #[arg(long)]
        base64: Option<String>,
    },
    /// Read JSON requests from stdin, one per line, and answer each on stdout
    ServeStdin,
}

#[derive(Debug, Serialize)]
struct SavedDownload {
    path: PathBuf,
    bytes: usize,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON envelopes.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("podfs v{} starting", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    let handler = FileHandler::from_config(config);

    if let Commands::ServeStdin = cli.command {
        serve_stdin(&handler).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let target = cli.target.resolve()?;
    let success = match cli.command {
        Commands::List { path } => emit(handler.list(&target, &path).await)?,
        Commands::Read { path, max_size } => emit(handler.read(&target, &path, max_size).await)?,
        Commands::Stat { path } => emit(handler.stat(&target, &path).await)?,
        Commands::Download { path, output } => match output {
            Some(local) => {
                let result = handler.download_bytes(&target, &path).await;
                emit(save_download(result, local)?)?
            }
            None => emit(handler.download(&target, &path).await)?,
        },
        Commands::Delete { path, dir } => emit(handler.delete(&target, &path, dir).await)?,
        Commands::Upload { path, file, base64 } => {
            let content = match (file, base64) {
                (Some(local), _) => {
                    let data = std::fs::read(&local)
                        .with_context(|| format!("failed to read {}", local.display()))?;
                    base64::engine::general_purpose::STANDARD.encode(data)
                }
                (None, Some(encoded)) => encoded,
                (None, None) => anyhow::bail!("either --file or --base64 is required"),
            };
            emit(handler.upload(&target, &path, &content).await)?
        }
        Commands::ServeStdin => unreachable!("handled above"),
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let config_path = cli
        .config_path
        .clone()
        .unwrap_or_else(BridgeConfig::default_path);

    let mut config = if config_path.exists() {
        debug!("loading config from {}", config_path.display());
        BridgeConfig::load(&config_path)?
    } else {
        BridgeConfig::default()
    };

    // CLI args override config file
    if let Some(ref kubectl) = cli.kubectl {
        config.client_path = kubectl.clone();
    }
    if let Some(ms) = cli.exec_timeout_ms {
        config.exec_timeout_ms = ms;
    }
    Ok(config)
}

/// Print the envelope as one JSON line and report whether it succeeded.
fn emit<T: Serialize>(result: OpResult<T>) -> Result<bool> {
    let success = result.success;
    println!("{}", protocol::encode_line(&result)?);
    Ok(success)
}

/// Write downloaded bytes to `local` unchanged.
fn save_download(result: OpResult<Bytes>, local: PathBuf) -> Result<OpResult<SavedDownload>> {
    let content = match result.into_result() {
        Ok(content) => content,
        Err(error) => return Ok(OpResult::err(error)),
    };
    std::fs::write(&local, &content)
        .with_context(|| format!("failed to write {}", local.display()))?;
    info!("saved {} bytes to {}", content.len(), local.display());
    Ok(OpResult::ok(SavedDownload {
        path: local,
        bytes: content.len(),
    }))
}

async fn serve_stdin(handler: &FileHandler) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let result = match protocol::parse_request(&line) {
            Ok(req) => {
                debug!("request: {}", req.name());
                handler.handle_request(req).await
            }
            Err(e) => OpResult::err(format!("invalid request: {}", e)),
        };
        println!("{}", protocol::encode_line(&result)?);
    }

    info!("stdin closed, exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_read() {
        let cli = Cli::try_parse_from([
            "podfs", "--pod", "web-0", "-c", "app", "-n", "prod", "read", "/etc/hosts",
            "--max-size", "100",
        ])
        .unwrap();
        let target = cli.target.resolve().unwrap();
        assert_eq!(target.namespace, "prod");
        assert_eq!(target.cluster_id, "");
        assert!(matches!(cli.command, Commands::Read { max_size: Some(100), .. }));
    }

    #[test]
    fn test_cli_requires_container_for_ops() {
        let cli = Cli::try_parse_from(["podfs", "--pod", "web-0", "stat", "/"]).unwrap();
        let err = cli.target.resolve().unwrap_err();
        assert!(err.to_string().contains("--container"));
    }

    #[test]
    fn test_upload_needs_a_source() {
        assert!(Cli::try_parse_from(["podfs", "upload", "/tmp/x"]).is_err());
        assert!(Cli::try_parse_from([
            "podfs", "upload", "/tmp/x", "--file", "a", "--base64", "YQ=="
        ])
        .is_err());
    }

    #[test]
    fn test_save_download_writes_bytes_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("app.tar.gz");
        let raw = [0x1f, 0x8b, 0x08, 0x00, 0xff, 0xfe, 0x80, 0x00];

        let saved = save_download(OpResult::ok(Bytes::copy_from_slice(&raw)), local.clone())
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(saved.bytes, raw.len());
        assert_eq!(std::fs::read(&local).unwrap(), raw);
    }

    #[test]
    fn test_save_download_passes_errors_through() {
        let dir = std::env::temp_dir().join("podfs-never-written");
        let saved = save_download(OpResult::err("cat: nope"), dir.clone()).unwrap();
        assert_eq!(saved.error.as_deref(), Some("cat: nope"));
        assert!(!dir.exists());
    }
}
