use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Cluster client binary (name on PATH or absolute path)
    #[serde(default = "default_client_path")]
    pub client_path: String,

    /// Leading arguments placed before the generated ones
    /// (e.g. `["kubectl", "--"]` when `client_path` is `minikube`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub client_args: Vec<String>,

    /// Timeout for one-shot remote commands in milliseconds
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout_ms: u64,

    /// Watchdog for streaming uploads in milliseconds
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_ms: u64,

    /// Ceiling on captured stdout of a one-shot command
    #[serde(default = "default_max_output")]
    pub max_output_bytes: usize,

    /// Default cap for `read` before content is truncated
    #[serde(default = "default_max_read")]
    pub max_read_bytes: u64,

    /// Bytes sampled when sniffing for binary content
    #[serde(default = "default_sample_bytes")]
    pub sample_bytes: u64,

    /// Directory searched for per-cluster kubeconfig files (default: OS temp dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_dir: Option<PathBuf>,
}

fn default_client_path() -> String {
    "kubectl".to_string()
}
fn default_exec_timeout() -> u64 {
    10_000
}
fn default_upload_timeout() -> u64 {
    30_000
}
fn default_max_output() -> usize {
    2 * 1024 * 1024
}
fn default_max_read() -> u64 {
    1024 * 1024
}
fn default_sample_bytes() -> u64 {
    512
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            client_path: default_client_path(),
            client_args: Vec::new(),
            exec_timeout_ms: default_exec_timeout(),
            upload_timeout_ms: default_upload_timeout(),
            max_output_bytes: default_max_output(),
            max_read_bytes: default_max_read(),
            sample_bytes: default_sample_bytes(),
            credential_dir: None,
        }
    }
}

impl BridgeConfig {
    /// Default config file path for this platform
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("dev", "podfs", "podfs") {
            dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("podfs-config.json")
        }
    }

    /// Load config from a file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse config JSON")?;
        Ok(config)
    }

    /// Save config to a file path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_millis(self.exec_timeout_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    /// Directory the credential locator scans
    pub fn credential_dir(&self) -> PathBuf {
        self.credential_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.client_path, "kubectl");
        assert!(config.client_args.is_empty());
        assert_eq!(config.exec_timeout(), Duration::from_secs(10));
        assert_eq!(config.upload_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_output_bytes, 2 * 1024 * 1024);
        assert_eq!(config.max_read_bytes, 1_048_576);
        assert_eq!(config.sample_bytes, 512);
        assert_eq!(config.credential_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"client_path":"/usr/local/bin/kubectl","exec_timeout_ms":2500}"#)
                .unwrap();
        assert_eq!(config.client_path, "/usr/local/bin/kubectl");
        assert_eq!(config.exec_timeout(), Duration::from_millis(2500));
        assert_eq!(config.upload_timeout_ms, 30_000);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = BridgeConfig::default();
        config.credential_dir = Some(dir.path().to_path_buf());
        config.max_read_bytes = 4096;
        config.save(&path).unwrap();

        let loaded = BridgeConfig::load(&path).unwrap();
        assert_eq!(loaded.max_read_bytes, 4096);
        assert_eq!(loaded.credential_dir(), dir.path());
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = BridgeConfig::load(Path::new("/nonexistent/podfs.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read config"));
    }
}
