//! Per-cluster kubeconfig discovery and child environment assembly.
//!
//! The host application drops short-lived proxy kubeconfigs named
//! `kubeconfig-<clusterId>...` into a shared directory. Discovery here is a
//! convenience: a miss only means the client runs with its own defaults.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

/// File name prefix of proxy kubeconfig files
pub const KUBECONFIG_PREFIX: &str = "kubeconfig-";

/// Environment variable the cluster client reads its config path from
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Find the kubeconfig for `cluster_id` inside `dir`.
///
/// The exact name `kubeconfig-<cluster_id>` wins; otherwise the first
/// directory entry with the prefix that mentions the id is returned.
pub fn find_kubeconfig(dir: &Path, cluster_id: &str) -> Option<PathBuf> {
    if cluster_id.is_empty() {
        return None;
    }

    let direct = dir.join(format!("{}{}", KUBECONFIG_PREFIX, cluster_id));
    if direct.exists() {
        return Some(direct);
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("credential scan of {} failed: {}", dir.display(), e);
            return None;
        }
    };

    entries.flatten().find_map(|entry| {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(KUBECONFIG_PREFIX) && name.contains(cluster_id) {
            Some(entry.path())
        } else {
            None
        }
    })
}

/// Environment for one client invocation.
#[derive(Debug, Clone)]
pub struct ClientEnv {
    pub vars: HashMap<OsString, OsString>,
    /// Located kubeconfig, also passed as `--kubeconfig`
    pub kubeconfig: Option<PathBuf>,
}

impl ClientEnv {
    /// Inherit the current process environment, pointing `KUBECONFIG` at the
    /// cluster's proxy config when one can be found under `dir`.
    pub fn for_cluster(dir: &Path, cluster_id: &str) -> Self {
        let mut vars: HashMap<OsString, OsString> = std::env::vars_os().collect();
        let kubeconfig = find_kubeconfig(dir, cluster_id);
        if let Some(ref path) = kubeconfig {
            debug!("using kubeconfig {} for cluster {}", path.display(), cluster_id);
            vars.insert(KUBECONFIG_ENV.into(), path.clone().into_os_string());
        }
        Self { vars, kubeconfig }
    }

    /// Leading client arguments (`--kubeconfig <path>`), empty without a config.
    pub fn kubeconfig_args(&self) -> Vec<OsString> {
        match self.kubeconfig {
            Some(ref path) => vec!["--kubeconfig".into(), path.clone().into_os_string()],
            None => Vec::new(),
        }
    }
}
