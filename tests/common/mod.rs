// tests/common/mod.rs

//! Shared test utilities for the installer integration tests.

#![allow(dead_code)]

use mdl_bootstrap::host::{Host, RuntimeVersion, TargetAccount};
use mdl_bootstrap::{Error, InstallSettings, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Unit template shipped with the mdl checkout
pub const UNIT_TEMPLATE: &str = "[Unit]
Description=mdl API

[Service]
User=mdl
Group=mdl
ExecStart=/home/mdl/bin/mdl_api.py
WorkingDirectory=/home/mdl

[Install]
WantedBy=multi-user.target
";

/// Minimal starting configuration
pub const BASE_CONFIG: &str = "main:
  listen_address: 0.0.0.0
  bind_port: 6000
";

/// A host with canned answers that records the commands it is asked to run
pub struct FakeHost {
    pub version: Option<RuntimeVersion>,
    pub env: HashSet<String>,
    pub user: String,
    pub privileged: bool,
    pub accounts: HashMap<String, TargetAccount>,
    pub executables: HashMap<String, PathBuf>,
    pub command_status: bool,
    pub commands: RefCell<Vec<String>>,
}

impl FakeHost {
    /// An unprivileged host with Python 3.6, pip3 and systemctl
    pub fn new() -> Self {
        let mut executables = HashMap::new();
        executables.insert("pip3".to_string(), PathBuf::from("/usr/bin/pip3"));
        executables.insert("systemctl".to_string(), PathBuf::from("/usr/bin/systemctl"));

        Self {
            version: Some(RuntimeVersion::new(3, 6)),
            env: HashSet::new(),
            user: "alice".to_string(),
            privileged: false,
            accounts: HashMap::new(),
            executables,
            command_status: true,
            commands: RefCell::new(Vec::new()),
        }
    }

    /// A root host that knows `name`, owned by the test process so the
    /// ownership change succeeds without privileges
    pub fn privileged_with_account(name: &str, home: &Path) -> Self {
        let mut host = Self::new();
        host.user = "root".to_string();
        host.privileged = true;
        host.accounts.insert(
            name.to_string(),
            TargetAccount {
                name: name.to_string(),
                uid: nix::unistd::getuid().as_raw(),
                gid: nix::unistd::getgid().as_raw(),
                group: format!("{}grp", name),
                home: home.to_path_buf(),
            },
        );
        host
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl Host for FakeHost {
    fn runtime_version(&self, interpreter: &str) -> Result<RuntimeVersion> {
        self.version.ok_or_else(|| Error::RuntimeNotFound {
            interpreter: interpreter.to_string(),
            reason: "not installed".to_string(),
        })
    }

    fn env_present(&self, key: &str) -> bool {
        self.env.contains(key)
    }

    fn current_user(&self) -> String {
        self.user.clone()
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn lookup_account(&self, name: &str) -> Result<Option<TargetAccount>> {
        Ok(self.accounts.get(name).cloned())
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        self.executables.get(name).cloned()
    }

    fn run(&self, program: &Path, args: &[&str]) -> io::Result<bool> {
        let mut line = program.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.commands.borrow_mut().push(line);
        Ok(self.command_status)
    }
}

/// A throwaway mdl checkout plus a unit directory and a home directory
pub struct Fixture {
    pub temp: TempDir,
    pub root: PathBuf,
    pub unit_dir: PathBuf,
    pub home: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("mdl");
        let unit_dir = temp.path().join("systemd");
        let home = temp.path().join("home");

        fs::create_dir_all(root.join("etc")).unwrap();
        fs::create_dir_all(root.join("var")).unwrap();
        fs::create_dir_all(root.join("examples/linux/systemd")).unwrap();
        fs::create_dir_all(&unit_dir).unwrap();
        fs::create_dir_all(&home).unwrap();

        fs::write(root.join("etc/config.yaml"), BASE_CONFIG).unwrap();
        fs::write(root.join("requirements.txt"), "PyYAML\n").unwrap();
        fs::write(
            root.join("examples/linux/systemd/mdl-api.service"),
            UNIT_TEMPLATE,
        )
        .unwrap();
        fs::write(home.join(".bashrc"), "alias ll='ls -l'\n").unwrap();

        Self {
            temp,
            root,
            unit_dir,
            home,
        }
    }

    pub fn settings(&self) -> InstallSettings {
        let mut settings = InstallSettings::new(&self.root);
        settings.systemd_dir = self.unit_dir.clone();
        settings
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("etc/config.yaml")
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join("var/mdl.db")
    }

    pub fn bashrc(&self) -> String {
        fs::read_to_string(self.home.join(".bashrc")).unwrap()
    }
}
