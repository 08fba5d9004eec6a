// src/host/deps.rs

//! pip3 dependency installation for the mdl server

use super::Host;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Package manager executable
pub const PACKAGE_MANAGER: &str = "pip3";

/// Both must be set for the run to count as CI
pub const CI_MARKERS: &[&str] = &["TRAVIS", "CI"];

/// Where pip installs packages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// System-wide, used for the administrative account
    System,
    /// `--user` install into the invoking user's site-packages
    User,
}

/// What the dependency step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyOutcome {
    /// CI environment detected, nothing attempted
    SkippedCi,
    /// pip3 ran; `succeeded` is informational only
    Attempted { mode: InstallMode, succeeded: bool },
}

/// Installs the requirements manifest with pip3
#[derive(Debug, Clone)]
pub struct DependencyInstaller {
    requirements: PathBuf,
}

impl DependencyInstaller {
    pub fn new(requirements: impl AsRef<Path>) -> Self {
        Self {
            requirements: requirements.as_ref().to_path_buf(),
        }
    }

    /// Whether every CI marker variable is present
    pub fn is_ci(host: &dyn Host) -> bool {
        CI_MARKERS.iter().all(|key| host.env_present(key))
    }

    /// pip arguments for the given mode
    pub fn arguments(&self, mode: InstallMode) -> Vec<String> {
        let mut args = vec!["install".to_string()];
        if mode == InstallMode::User {
            args.push("--user".to_string());
        }
        args.push("--upgrade".to_string());
        args.push("--requirement".to_string());
        args.push(self.requirements.to_string_lossy().into_owned());
        args
    }

    /// Install requirements unless running under CI
    ///
    /// A missing pip3 is fatal. A failing pip3 is logged and otherwise
    /// ignored.
    pub fn install(&self, host: &dyn Host) -> Result<DependencyOutcome> {
        if Self::is_ci(host) {
            info!("CI environment detected, skipping pip3 packages");
            return Ok(DependencyOutcome::SkippedCi);
        }

        let pip = host
            .find_executable(PACKAGE_MANAGER)
            .ok_or_else(|| Error::PackageManagerMissing(PACKAGE_MANAGER.to_string()))?;

        let mode = if host.is_privileged() {
            InstallMode::System
        } else {
            InstallMode::User
        };

        info!("Installing required pip3 packages ({:?} mode)", mode);
        let args = self.arguments(mode);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let succeeded = match host.run(&pip, &arg_refs) {
            Ok(true) => true,
            Ok(false) => {
                warn!("{} exited with a failure status", pip.display());
                false
            }
            Err(e) => {
                warn!("Failed to run {}: {}", pip.display(), e);
                false
            }
        };

        Ok(DependencyOutcome::Attempted { mode, succeeded })
    }
}
