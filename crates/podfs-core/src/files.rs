use anyhow::{anyhow, Context, Result};
use base64::Engine;
use bytes::Bytes;
use tracing::{error, info, warn};

use podfs_platform::exec::{PodTarget, RemoteExec};
use podfs_platform::filesystem::{FileContent, FileEntry, FileStat, FileType};

use crate::classify;
use crate::config::BridgeConfig;
use crate::gateway::KubectlExec;
use crate::listing;
use crate::protocol::{OpRequest, OpResult};

/// `stat` format for the full stat call: type|size|octal mode|mtime
const STAT_FORMAT: &str = "%F|%s|%a|%y";

/// The six file operations against a remote container.
///
/// Every public operation returns an [`OpResult`]; failures never escape as
/// errors. Nothing is cached between calls.
pub struct FileHandler {
    exec: Box<dyn RemoteExec>,
    max_read_bytes: u64,
    sample_bytes: u64,
}

impl FileHandler {
    pub fn new(exec: Box<dyn RemoteExec>) -> Self {
        let defaults = BridgeConfig::default();
        Self::with_limits(exec, defaults.max_read_bytes, defaults.sample_bytes)
    }

    pub fn with_limits(exec: Box<dyn RemoteExec>, max_read_bytes: u64, sample_bytes: u64) -> Self {
        Self {
            exec,
            max_read_bytes,
            sample_bytes,
        }
    }

    /// Handler backed by the cluster client described by `config`.
    pub fn from_config(config: BridgeConfig) -> Self {
        let (max_read, sample) = (config.max_read_bytes, config.sample_bytes);
        Self::with_limits(Box::new(KubectlExec::new(config)), max_read, sample)
    }

    /// Dispatch a decoded request to the matching operation.
    pub async fn handle_request(&self, req: OpRequest) -> OpResult<serde_json::Value> {
        match req {
            OpRequest::List { target, path } => self.list(&target, &path).await.into_json(),
            OpRequest::Read {
                target,
                path,
                max_size,
            } => self.read(&target, &path, max_size).await.into_json(),
            OpRequest::Stat { target, path } => self.stat(&target, &path).await.into_json(),
            OpRequest::Download { target, path } => {
                self.download(&target, &path).await.into_json()
            }
            OpRequest::Delete {
                target,
                path,
                is_directory,
            } => self.delete(&target, &path, is_directory).await.into_json(),
            OpRequest::Upload {
                target,
                path,
                content,
            } => self.upload(&target, &path, &content).await.into_json(),
        }
    }

    pub async fn list(&self, target: &PodTarget, dir: &str) -> OpResult<Vec<FileEntry>> {
        info!("file list: {}", dir);
        settle("list", dir, self.list_entries(target, dir).await)
    }

    pub async fn read(
        &self,
        target: &PodTarget,
        path: &str,
        max_size: Option<u64>,
    ) -> OpResult<FileContent> {
        info!("file read: {}", path);
        settle("read", path, self.read_content(target, path, max_size).await)
    }

    pub async fn stat(&self, target: &PodTarget, path: &str) -> OpResult<FileStat> {
        info!("file stat: {}", path);
        settle("stat", path, self.stat_path(target, path).await)
    }

    /// Full content as text, with no size cap or binary check.
    ///
    /// Invalid UTF-8 is replaced; [`download_bytes`](Self::download_bytes)
    /// keeps the content intact.
    pub async fn download(&self, target: &PodTarget, path: &str) -> OpResult<String> {
        self.download_bytes(target, path)
            .await
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
    }

    /// Full content, byte for byte.
    pub async fn download_bytes(&self, target: &PodTarget, path: &str) -> OpResult<Bytes> {
        info!("file download: {}", path);
        let result = self
            .run_bytes(target, vec!["cat".to_string(), "--".to_string(), path.to_string()])
            .await
            .with_context(|| format!("failed to download {}", path));
        settle("download", path, result)
    }

    pub async fn delete(&self, target: &PodTarget, path: &str, is_directory: bool) -> OpResult<()> {
        info!("file delete: {} (directory: {})", path, is_directory);
        let flags = if is_directory { "-rf" } else { "-f" };
        let result = self
            .run(
                target,
                vec![
                    "rm".to_string(),
                    flags.to_string(),
                    "--".to_string(),
                    path.to_string(),
                ],
            )
            .await
            .map(|_| ())
            .with_context(|| format!("failed to delete {}", path));
        settle("delete", path, result)
    }

    /// Write base64-encoded `content` to `path`, replacing any existing file.
    pub async fn upload(&self, target: &PodTarget, path: &str, content: &str) -> OpResult<()> {
        let result = async {
            let data = base64::engine::general_purpose::STANDARD
                .decode(content.trim())
                .context("upload content is not valid base64")?;
            info!("file upload: {} ({} bytes)", path, data.len());
            self.exec
                .write_file(target, path, Bytes::from(data))
                .await
                .with_context(|| format!("failed to upload {}", path))
        }
        .await;
        settle("upload", path, result)
    }

    async fn run(&self, target: &PodTarget, command: Vec<String>) -> Result<String> {
        Ok(self.exec.exec(target, &command, None).await?)
    }

    async fn run_bytes(&self, target: &PodTarget, command: Vec<String>) -> Result<Bytes> {
        Ok(self.exec.exec_bytes(target, &command, None).await?)
    }

    async fn list_entries(&self, target: &PodTarget, dir: &str) -> Result<Vec<FileEntry>> {
        let dir = listing::normalize_dir(dir);

        let mut entries = match self.run(target, listing::detailed_command(&dir)).await {
            Ok(output) => listing::parse_long_listing(&output, &dir),
            Err(e) => {
                warn!("detailed listing of {} failed ({:#}), retrying with ls -1ap", dir, e);
                let output = self
                    .run(target, listing::simple_command(&dir))
                    .await
                    .with_context(|| format!("failed to list {}", dir))?;
                listing::parse_simple_listing(&output, &dir)
            }
        };

        listing::sort_entries(&mut entries);
        Ok(entries)
    }

    async fn remote_size(&self, target: &PodTarget, path: &str) -> Result<u64> {
        let output = self
            .run(
                target,
                vec![
                    "stat".to_string(),
                    "-c".to_string(),
                    "%s".to_string(),
                    "--".to_string(),
                    path.to_string(),
                ],
            )
            .await
            .with_context(|| format!("failed to stat {}", path))?;
        output
            .trim()
            .parse::<u64>()
            .with_context(|| format!("unexpected size {:?} for {}", output.trim(), path))
    }

    /// Extension check first, then a NUL scan of the leading bytes.
    /// A failed sample counts as text.
    async fn is_binary(&self, target: &PodTarget, path: &str) -> bool {
        if classify::has_binary_extension(path) {
            return true;
        }
        match self
            .run(target, classify::head_command(path, self.sample_bytes))
            .await
        {
            Ok(sample) => classify::sample_is_binary(&sample),
            Err(e) => {
                warn!("could not sample {}: {:#}", path, e);
                false
            }
        }
    }

    async fn read_content(
        &self,
        target: &PodTarget,
        path: &str,
        max_size: Option<u64>,
    ) -> Result<FileContent> {
        let max = max_size.unwrap_or(self.max_read_bytes);
        let size = self.remote_size(target, path).await?;

        if self.is_binary(target, path).await {
            return Ok(FileContent::binary(size));
        }

        let truncated = size > max;
        let command = if truncated {
            classify::head_command(path, max)
        } else {
            vec!["cat".to_string(), "--".to_string(), path.to_string()]
        };
        let raw = self
            .run_bytes(target, command)
            .await
            .with_context(|| format!("failed to read {}", path))?;
        // A head slice can end inside a multi-byte character.
        let raw = if truncated {
            classify::without_partial_char(&raw)
        } else {
            &raw[..]
        };
        let content = String::from_utf8_lossy(raw).into_owned();

        Ok(FileContent {
            content,
            truncated,
            size,
            is_binary: Some(false),
        })
    }

    async fn stat_path(&self, target: &PodTarget, path: &str) -> Result<FileStat> {
        let output = self
            .run(
                target,
                vec![
                    "stat".to_string(),
                    "-c".to_string(),
                    STAT_FORMAT.to_string(),
                    "--".to_string(),
                    path.to_string(),
                ],
            )
            .await
            .with_context(|| format!("failed to stat {}", path))?;
        parse_stat(&output).with_context(|| format!("failed to stat {}", path))
    }
}

/// Parse one `type|size|mode|mtime` line.
pub fn parse_stat(output: &str) -> Result<FileStat> {
    let line = output.trim_end_matches(['\r', '\n']);
    let mut fields = line.splitn(4, '|');
    let (Some(kind), Some(size), Some(permissions), Some(modified)) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(anyhow!("unexpected stat output: {:?}", line));
    };

    Ok(FileStat {
        file_type: FileType::from_stat_text(kind),
        size: size
            .trim()
            .parse()
            .with_context(|| format!("unexpected size in stat output: {:?}", size))?,
        permissions: permissions.trim().to_string(),
        modified: modified.trim().to_string(),
    })
}

fn settle<T>(op: &str, path: &str, result: Result<T>) -> OpResult<T> {
    if let Err(ref e) = result {
        error!("file {} failed for {}: {:#}", op, path, e);
    }
    OpResult::from(result)
}
