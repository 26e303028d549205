//! HTTP endpoint handlers for the exporter.
//!
//! - `/`: landing page
//! - metrics path (default `/metrics`): Prometheus metrics endpoint
//! - `/health`: exporter statistics

pub mod health;
pub mod metrics;
pub mod root;

// Re-export handlers
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;

#[cfg(test)]
pub(crate) mod test_support {
    use procgroup_exporter::process::RuleSet;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::config::Config;
    use crate::state::{AppState, SharedState};

    /// State over a fake procfs holding one `sleeper` process.
    pub fn fake_state() -> (TempDir, SharedState) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let root = dir.path();
        fs::write(root.join("stat"), "cpu  1 2 3 4\nbtime 1700000000\n")
            .expect("Failed to write /proc/stat");

        let proc_dir = root.join("42");
        fs::create_dir_all(&proc_dir).expect("Failed to create proc dir");
        fs::write(
            proc_dir.join("stat"),
            "42 (sleeper) S 1 42 42 0 -1 4194304 100 0 0 0 200 100 0 0 20 0 3 0 500 8192 2 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0",
        )
        .expect("Failed to write stat");
        fs::write(proc_dir.join("cmdline"), "/usr/bin/sleeper\0--forever\0")
            .expect("Failed to write cmdline");

        let rules = RuleSet::parse_document(
            "process_names:\n  - name: \"{{.Comm}}\"\n    comm: [sleeper]\n",
        )
        .expect("Failed to parse rules");
        let config = Config {
            procfs_path: Some(root.to_path_buf()),
            clock_ticks: Some(100),
            ..Config::default()
        };
        let state = AppState::new(config, rules).expect("Failed to build state");
        (dir, Arc::new(state))
    }

    pub async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        String::from_utf8(bytes.to_vec()).expect("Body is UTF-8")
    }
}
