// src/host/mod.rs

//! Host environment access
//!
//! Everything the installer learns from or does to the host outside its own
//! files goes through the [`Host`] trait: interpreter probing, environment
//! flags, account lookup and external commands. [`SystemHost`] is the real
//! implementation; tests substitute their own.

pub mod deps;
pub mod privilege;
pub mod prompt;
pub mod runtime;

pub use deps::{DependencyInstaller, InstallMode};
pub use privilege::{
    Identity, PrivilegeManager, SHELL_MARKER, SHELL_RC, ShellRcOutcome, TargetAccount, TargetState,
};
pub use prompt::{Prompter, ScriptedPrompter, StdinPrompter};
pub use runtime::RuntimeVersion;

use crate::error::{Error, Result};
use nix::unistd::{Group, User};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Name of the administrative account
pub const ADMIN_USER: &str = "root";

/// Environment variable sudo sets for the invoking user
pub const SUDO_ENV: &str = "SUDO_UID";

/// Host facts and side effects the installer depends on
pub trait Host {
    /// Version reported by the given interpreter
    fn runtime_version(&self, interpreter: &str) -> Result<RuntimeVersion>;

    /// Whether an environment variable is set (value ignored)
    fn env_present(&self, key: &str) -> bool;

    /// Login name of the user running the installer
    fn current_user(&self) -> String;

    /// Whether the installer runs as the administrative account
    fn is_privileged(&self) -> bool;

    /// Resolve an account name; `Ok(None)` when it does not exist
    fn lookup_account(&self, name: &str) -> Result<Option<TargetAccount>>;

    /// Locate an executable on the search path
    fn find_executable(&self, name: &str) -> Option<PathBuf>;

    /// Run a command to completion, returning whether it exited successfully
    fn run(&self, program: &Path, args: &[&str]) -> io::Result<bool>;
}

/// Refuse to run under sudo
pub fn ensure_not_sudo(host: &dyn Host) -> Result<()> {
    if host.env_present(SUDO_ENV) {
        return Err(Error::SudoRefused);
    }
    Ok(())
}

/// The machine the installer is running on
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl Host for SystemHost {
    fn runtime_version(&self, interpreter: &str) -> Result<RuntimeVersion> {
        let not_found = |reason: String| Error::RuntimeNotFound {
            interpreter: interpreter.to_string(),
            reason,
        };

        let path = which::which(interpreter).map_err(|e| not_found(e.to_string()))?;
        let output = Command::new(&path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| not_found(e.to_string()))?;

        // Python 2 prints its version on stderr
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        debug!("{} --version: {}", path.display(), text.trim());
        RuntimeVersion::parse(&text)
            .ok_or_else(|| not_found(format!("unrecognised output '{}'", text.trim())))
    }

    fn env_present(&self, key: &str) -> bool {
        std::env::var_os(key).is_some()
    }

    fn current_user(&self) -> String {
        User::from_uid(nix::unistd::getuid())
            .ok()
            .flatten()
            .map(|u| u.name)
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_default()
    }

    fn is_privileged(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn lookup_account(&self, name: &str) -> Result<Option<TargetAccount>> {
        let user = User::from_name(name)
            .map_err(|e| Error::io(format!("passwd:{}", name), io::Error::from(e)))?;
        let Some(user) = user else {
            return Ok(None);
        };

        let group = Group::from_gid(user.gid)
            .map_err(|e| Error::io(format!("group:{}", user.gid), io::Error::from(e)))?
            .map(|g| g.name)
            .unwrap_or_else(|| user.gid.to_string());

        Ok(Some(TargetAccount {
            name: user.name,
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
            group,
            home: user.dir,
        }))
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn run(&self, program: &Path, args: &[&str]) -> io::Result<bool> {
        debug!("Running {} {}", program.display(), args.join(" "));
        Command::new(program)
            .args(args)
            .status()
            .map(|s| s.success())
    }
}
