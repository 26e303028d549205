//! Startup requirement validation for procgroup-exporter.
//!
//! Verifies that the procfs root can be listed and warns when other
//! users' processes are likely to be unreadable.

use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// Validate all runtime requirements
pub fn validate_requirements(procfs: &Path) -> Result<(), ValidationError> {
    info!("Validating runtime requirements...");

    check_user_privileges();
    check_proc_access(procfs)?;

    info!("All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if geteuid().is_root() {
        info!("Running as root (uid=0)");
    } else {
        warn!("Not running as root - owner lookups of other users' processes may fail");
    }
}

/// Check that the procfs root exists and exposes process entries
fn check_proc_access(procfs: &Path) -> Result<(), ValidationError> {
    let entries = fs::read_dir(procfs).map_err(|e| {
        error!("Cannot list {}: {}", procfs.display(), e);
        match e.kind() {
            std::io::ErrorKind::NotFound => ValidationError::ProcfsMissing(procfs.display().to_string()),
            _ => ValidationError::InsufficientPermissions(e.to_string()),
        }
    })?;

    let has_process = entries.flatten().any(|entry| {
        entry
            .file_name()
            .to_str()
            .is_some_and(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()))
    });
    if !has_process {
        error!("{} contains no process entries", procfs.display());
        return Err(ValidationError::NoProcesses(procfs.display().to_string()));
    }

    // Reading init's stat checks access to processes of other users
    match fs::metadata(procfs.join("1").join("stat")) {
        Ok(_) => info!("{} access: process entries readable", procfs.display()),
        Err(e) => warn!("Could not read {}/1/stat: {}", procfs.display(), e),
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("procfs root not found: {0}")]
    ProcfsMissing(String),

    #[error("no process entries under {0}")]
    NoProcesses(String),
}
