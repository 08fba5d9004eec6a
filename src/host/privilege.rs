// src/host/privilege.rs

//! Target account resolution, shell environment and ownership changes
//!
//! Only engaged when the installer runs as the administrative account.

use super::Host;
use super::prompt::Prompter;
use crate::error::{Error, Result};
use std::fs;
use std::os::unix::fs::{chown, lchown};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Shell start-up file the export block is appended to
pub const SHELL_RC: &str = ".bashrc";

/// First line of the export block; also the re-run guard
pub const SHELL_MARKER: &str = "# Automatically inserted by the mdl installation script";

/// A resolved operating-system account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAccount {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    /// Name of the primary group
    pub group: String,
    pub home: PathBuf,
}

/// Result of asking for the account mdl will run as
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    /// Unprivileged run, no target account needed
    NotRequired,
    /// Account exists
    Resolved(TargetAccount),
    /// The operator entered a name the host does not know
    NotFound(String),
}

/// Who is running the installer and for whom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub privileged: bool,
    pub target: TargetState,
}

impl Identity {
    /// The resolved target, or the fatal error an unresolved one implies
    pub fn require_target(&self) -> Result<&TargetAccount> {
        match &self.target {
            TargetState::Resolved(account) => Ok(account),
            TargetState::NotFound(name) => Err(Error::UnknownUser(name.clone())),
            TargetState::NotRequired => Err(Error::UnknownUser(self.user.clone())),
        }
    }
}

/// What happened to the shell start-up file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellRcOutcome {
    /// No start-up file, nothing written
    Missing,
    /// A block for this install root is already there
    AlreadyPresent,
    /// Block appended
    Appended,
}

/// Privileged host changes for one install root
#[derive(Debug, Clone)]
pub struct PrivilegeManager {
    install_root: PathBuf,
}

impl PrivilegeManager {
    pub fn new(install_root: impl AsRef<Path>) -> Self {
        Self {
            install_root: install_root.as_ref().to_path_buf(),
        }
    }

    /// Determine the running user and, for privileged runs, prompt for and
    /// resolve the account mdl will run as
    pub fn resolve_identity(
        &self,
        host: &dyn Host,
        prompter: &mut dyn Prompter,
    ) -> Result<Identity> {
        let user = host.current_user();
        let privileged = host.is_privileged();

        if !privileged {
            debug!("Running as unprivileged user '{}'", user);
            return Ok(Identity {
                user,
                privileged,
                target: TargetState::NotRequired,
            });
        }

        let name = prompter.ask("Please enter the username under which mdl will run: ")?;
        let name = name.trim().to_string();

        let target = match host.lookup_account(&name)? {
            Some(account) => {
                info!(
                    "mdl will run as {} (uid {}, gid {})",
                    account.name, account.uid, account.gid
                );
                TargetState::Resolved(account)
            }
            None => {
                warn!("User '{}' not found", name);
                TargetState::NotFound(name)
            }
        };

        Ok(Identity {
            user,
            privileged,
            target,
        })
    }

    /// The export block appropriate for the existing start-up file contents
    pub fn shell_export_block(&self, contents: &str) -> String {
        let root = self.install_root.display();
        let assignment = if contents.contains("PYTHONPATH") {
            format!("PYTHONPATH=$PYTHONPATH:{}", root)
        } else {
            format!("PYTHONPATH={}", root)
        };
        format!(
            "\n{}\n# It appended the required PYTHONPATH to your existing PYTHONPATH\n{}\nexport PYTHONPATH\n",
            SHELL_MARKER, assignment
        )
    }

    /// Append the `PYTHONPATH` export to `<home>/.bashrc`
    ///
    /// A missing file is skipped. A file that already carries a block for
    /// this install root is left alone.
    pub fn install_shell_env(&self, home: &Path) -> Result<ShellRcOutcome> {
        let path = home.join(SHELL_RC);
        if !path.is_file() {
            debug!("{} does not exist, skipping", path.display());
            return Ok(ShellRcOutcome::Missing);
        }

        let mut contents = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        if self.has_export_block(&contents) {
            debug!("{} already exports the mdl PYTHONPATH", path.display());
            return Ok(ShellRcOutcome::AlreadyPresent);
        }

        let block = self.shell_export_block(&contents);
        contents.push_str(&block);
        fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
        info!("Added PYTHONPATH export to {}", path.display());
        Ok(ShellRcOutcome::Appended)
    }

    fn has_export_block(&self, contents: &str) -> bool {
        let root = self.install_root.display();
        let fresh = format!("PYTHONPATH={}", root);
        let extend = format!("PYTHONPATH=$PYTHONPATH:{}", root);

        let mut lines = contents.lines();
        while lines.any(|l| l == SHELL_MARKER) {
            let found = lines
                .by_ref()
                .take(3)
                .any(|l| l == fresh || l == extend);
            if found {
                return true;
            }
        }
        false
    }

    /// Ask before re-owning the install root
    pub fn confirm_ownership(
        &self,
        prompter: &mut dyn Prompter,
        account: &TargetAccount,
    ) -> Result<()> {
        let question = format!(
            "Change ownership of {} directory to user:{} group:{} (y,N) ?: ",
            self.install_root.display(),
            account.name,
            account.group
        );
        if prompter.confirm(&question)? {
            Ok(())
        } else {
            Err(Error::OwnershipDeclined)
        }
    }

    /// Recursively set (uid, gid) on everything under the install root, then
    /// on the root itself. Returns the number of entries changed.
    pub fn chown_install_root(&self, uid: u32, gid: u32) -> Result<usize> {
        chown_tree(&self.install_root, uid, gid)
    }
}

/// Recursively set (uid, gid) on every entry below `root`, then on `root`
///
/// Symbolic links are re-owned themselves and never followed. A failure part
/// way leaves the tree with mixed ownership.
pub fn chown_tree(root: &Path, uid: u32, gid: u32) -> Result<usize> {
    let mut changed = 0;

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, e.into())
        })?;

        let path = entry.path();
        let result = if entry.path_is_symlink() {
            lchown(path, Some(uid), Some(gid))
        } else {
            chown(path, Some(uid), Some(gid))
        };
        result.map_err(|e| Error::io(path, e))?;
        changed += 1;
    }

    chown(root, Some(uid), Some(gid)).map_err(|e| Error::io(root, e))?;
    info!("Changed ownership of {} entries under {}", changed + 1, root.display());
    Ok(changed + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::prompt::ScriptedPrompter;
    use std::os::unix::fs::MetadataExt;
    use tempfile::TempDir;

    fn account(uid: u32, gid: u32) -> TargetAccount {
        TargetAccount {
            name: "svc".into(),
            uid,
            gid,
            group: "svcgrp".into(),
            home: PathBuf::from("/home/svc"),
        }
    }

    #[test]
    fn test_export_block_forms() {
        let manager = PrivilegeManager::new("/opt/mdl");

        let fresh = manager.shell_export_block("alias ll='ls -l'\n");
        assert!(fresh.contains("\nPYTHONPATH=/opt/mdl\n"));
        assert!(fresh.starts_with(&format!("\n{}", SHELL_MARKER)));
        assert!(fresh.ends_with("export PYTHONPATH\n"));

        let extend = manager.shell_export_block("export PYTHONPATH=/usr/lib\n");
        assert!(extend.contains("\nPYTHONPATH=$PYTHONPATH:/opt/mdl\n"));
    }

    #[test]
    fn test_shell_env_missing_file() {
        let home = TempDir::new().unwrap();
        let manager = PrivilegeManager::new("/opt/mdl");
        assert_eq!(
            manager.install_shell_env(home.path()).unwrap(),
            ShellRcOutcome::Missing
        );
        assert!(!home.path().join(SHELL_RC).exists());
    }

    #[test]
    fn test_shell_env_appends_once() {
        let home = TempDir::new().unwrap();
        let rc = home.path().join(SHELL_RC);
        fs::write(&rc, "# user settings\n").unwrap();
        let manager = PrivilegeManager::new("/opt/mdl");

        assert_eq!(
            manager.install_shell_env(home.path()).unwrap(),
            ShellRcOutcome::Appended
        );
        assert_eq!(
            manager.install_shell_env(home.path()).unwrap(),
            ShellRcOutcome::AlreadyPresent
        );

        let contents = fs::read_to_string(&rc).unwrap();
        assert!(contents.starts_with("# user settings\n"));
        assert_eq!(contents.matches(SHELL_MARKER).count(), 1);
    }

    #[test]
    fn test_shell_env_other_root_still_appended() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join(SHELL_RC), "").unwrap();

        PrivilegeManager::new("/opt/old")
            .install_shell_env(home.path())
            .unwrap();
        let outcome = PrivilegeManager::new("/opt/new")
            .install_shell_env(home.path())
            .unwrap();
        assert_eq!(outcome, ShellRcOutcome::Appended);

        let contents = fs::read_to_string(home.path().join(SHELL_RC)).unwrap();
        assert!(contents.contains("PYTHONPATH=$PYTHONPATH:/opt/new"));
    }

    #[test]
    fn test_shell_env_root_that_is_a_suffix_still_appended() {
        let home = TempDir::new().unwrap();
        fs::write(home.path().join(SHELL_RC), "").unwrap();

        PrivilegeManager::new("/srv/opt/mdl")
            .install_shell_env(home.path())
            .unwrap();
        let outcome = PrivilegeManager::new("/opt/mdl")
            .install_shell_env(home.path())
            .unwrap();
        assert_eq!(outcome, ShellRcOutcome::Appended);

        let contents = fs::read_to_string(home.path().join(SHELL_RC)).unwrap();
        assert!(contents.contains("\nPYTHONPATH=/srv/opt/mdl\n"));
        assert!(contents.contains("\nPYTHONPATH=$PYTHONPATH:/opt/mdl\n"));
        assert_eq!(
            PrivilegeManager::new("/opt/mdl")
                .install_shell_env(home.path())
                .unwrap(),
            ShellRcOutcome::AlreadyPresent
        );
    }

    #[test]
    fn test_confirm_ownership() {
        let manager = PrivilegeManager::new("/opt/mdl");

        let mut yes = ScriptedPrompter::new(["Y"]);
        assert!(manager.confirm_ownership(&mut yes, &account(1, 1)).is_ok());
        assert!(yes.asked()[0].contains("user:svc group:svcgrp"));

        let mut no = ScriptedPrompter::new([""]);
        let err = manager
            .confirm_ownership(&mut no, &account(1, 1))
            .unwrap_err();
        assert_eq!(err.code(), 1050);
    }

    #[test]
    fn test_chown_tree_covers_every_entry() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join("top.txt"), "x").unwrap();
        fs::write(nested.join("deep.txt"), "y").unwrap();
        std::os::unix::fs::symlink("/etc/hostname", root.path().join("link")).unwrap();

        // Unprivileged tests can only chown to themselves
        let uid = nix::unistd::getuid().as_raw();
        let gid = nix::unistd::getgid().as_raw();

        let changed = chown_tree(root.path(), uid, gid).unwrap();
        assert_eq!(changed, 7);

        for entry in WalkDir::new(root.path()) {
            let entry = entry.unwrap();
            let meta = fs::symlink_metadata(entry.path()).unwrap();
            assert_eq!((meta.uid(), meta.gid()), (uid, gid), "{}", entry.path().display());
        }
    }

    #[test]
    fn test_require_target() {
        let identity = Identity {
            user: "root".into(),
            privileged: true,
            target: TargetState::NotFound("ghost".into()),
        };
        let err = identity.require_target().unwrap_err();
        assert_eq!(err.code(), 1049);
        assert!(err.to_string().contains("ghost"));
    }
}
