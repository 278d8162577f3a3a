//! Helpers shared by the unit tests.
//!
//! The "cluster client" here is `sh -c <script>`: the generated
//! `exec POD -n NS -c C --` prefix is stripped and the remote argv runs on
//! the local machine, so listings and uploads hit a temp directory.

use std::path::Path;

use podfs_platform::exec::PodTarget;
use tempfile::TempDir;

use crate::config::BridgeConfig;
use crate::gateway::KubectlExec;

pub(crate) const FAKE_KUBECTL: &str =
    r#"while [ "$#" -gt 0 ] && [ "$1" != "--" ]; do shift; done; shift; exec "$@""#;

pub(crate) fn target() -> PodTarget {
    PodTarget {
        cluster_id: "c1".to_string(),
        namespace: "default".to_string(),
        pod: "web-0".to_string(),
        container: "app".to_string(),
    }
}

/// Config whose client runs `script` with the full client argv as `$1..`.
pub(crate) fn scripted_config(credential_dir: &Path, script: &str) -> BridgeConfig {
    BridgeConfig {
        client_path: "sh".to_string(),
        client_args: vec!["-c".to_string(), script.to_string(), "kubectl".to_string()],
        credential_dir: Some(credential_dir.to_path_buf()),
        ..BridgeConfig::default()
    }
}

pub(crate) fn local_exec() -> (KubectlExec, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let exec = KubectlExec::new(scripted_config(dir.path(), FAKE_KUBECTL));
    (exec, dir)
}
