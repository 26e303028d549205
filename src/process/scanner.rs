//! Process table access.
//!
//! [`ProcSource`] is the read contract the aggregation pass depends on.
//! [`ProcfsSource`] implements it over a procfs mount; tests provide their
//! own in-memory sources.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::process::stat::{parse_boot_time, parse_stat, ProcStat};

/// A transient failure reading process data.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl ReadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReadError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the process exited between listing and reading.
    pub fn is_vanished(&self) -> bool {
        matches!(self, ReadError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Handle to one entry of the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcHandle {
    pub pid: u32,
}

/// Read access to the live process table.
pub trait ProcSource: Send + Sync {
    /// Lists all processes.
    fn all_procs(&self) -> Result<Vec<ProcHandle>, ReadError>;

    /// System boot time in seconds since the epoch.
    fn boot_time(&self) -> Result<u64, ReadError>;

    /// Process statistics.
    fn stat(&self, proc: ProcHandle) -> Result<ProcStat, ReadError>;

    /// Command line tokens; empty for kernel threads.
    fn cmdline(&self, proc: ProcHandle) -> Result<Vec<String>, ReadError>;

    /// Numeric id of the owning account.
    fn owner_uid(&self, proc: ProcHandle) -> Result<u32, ReadError>;
}

/// [`ProcSource`] reading a procfs tree.
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    root: PathBuf,
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcfsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn proc_path(&self, proc: ProcHandle) -> PathBuf {
        self.root.join(proc.pid.to_string())
    }
}

impl ProcSource for ProcfsSource {
    fn all_procs(&self) -> Result<Vec<ProcHandle>, ReadError> {
        let entries = fs::read_dir(&self.root).map_err(|e| ReadError::io(&self.root, e))?;

        let mut procs: Vec<ProcHandle> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                if !name.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                name.parse().ok().map(|pid| ProcHandle { pid })
            })
            .collect();
        procs.sort_unstable();
        Ok(procs)
    }

    fn boot_time(&self) -> Result<u64, ReadError> {
        let path = self.root.join("stat");
        let content = fs::read_to_string(&path).map_err(|e| ReadError::io(&path, e))?;
        parse_boot_time(&content).map_err(|reason| ReadError::Malformed { path, reason })
    }

    fn stat(&self, proc: ProcHandle) -> Result<ProcStat, ReadError> {
        let path = self.proc_path(proc).join("stat");
        let content = fs::read_to_string(&path).map_err(|e| ReadError::io(&path, e))?;
        parse_stat(&content).map_err(|reason| ReadError::Malformed { path, reason })
    }

    fn cmdline(&self, proc: ProcHandle) -> Result<Vec<String>, ReadError> {
        let path = self.proc_path(proc).join("cmdline");
        let content = fs::read(&path).map_err(|e| ReadError::io(&path, e))?;
        Ok(split_cmdline(&content))
    }

    fn owner_uid(&self, proc: ProcHandle) -> Result<u32, ReadError> {
        let path = self.proc_path(proc).join("stat");
        let meta = fs::metadata(&path).map_err(|e| ReadError::io(&path, e))?;
        Ok(meta.uid())
    }
}

/// Splits NUL-separated cmdline content. The trailing terminator does not
/// produce an empty token.
pub fn split_cmdline(content: &[u8]) -> Vec<String> {
    let content = content.strip_suffix(&[0u8]).unwrap_or(content);
    if content.is_empty() {
        return Vec::new();
    }
    content
        .split(|&b| b == 0u8)
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}
