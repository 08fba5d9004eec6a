// src/config/settings.rs

//! Installer settings and the typed view of the `database` section

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::host::RuntimeVersion;
use tracing::warn;

/// Environment variable naming an alternate configuration directory
pub const CONFIG_DIR_ENV: &str = "MDL_CONFIGDIR";

/// Default service-manager unit directory
pub const DEFAULT_SYSTEMD_DIR: &str = "/etc/systemd/system";

/// Unit templates shipped with mdl, relative to the install root
pub const DEFAULT_UNIT_TEMPLATES: &[&str] = &["examples/linux/systemd/mdl-api.service"];

/// Minimum interpreter version the mdl server supports
pub const MINIMUM_RUNTIME: RuntimeVersion = RuntimeVersion::new(3, 5);

/// Everything the installer needs to know about the host layout
#[derive(Debug, Clone)]
pub struct InstallSettings {
    /// Absolute path of the mdl checkout being installed
    pub install_root: PathBuf,

    /// Configuration directories in priority order; the first is primary
    pub config_dirs: Vec<PathBuf>,

    /// Service-manager unit directory (never created by the installer)
    pub systemd_dir: PathBuf,

    /// Unit templates to render into `systemd_dir`
    pub unit_templates: Vec<PathBuf>,

    /// pip requirements manifest
    pub requirements: PathBuf,

    /// Interpreter checked by the version gate
    pub interpreter: String,

    /// Minimum interpreter version
    pub minimum_runtime: RuntimeVersion,
}

impl InstallSettings {
    /// Settings with every path derived from the install root
    pub fn new(install_root: impl AsRef<Path>) -> Self {
        let install_root = install_root.as_ref().to_path_buf();
        Self {
            config_dirs: vec![install_root.join("etc")],
            systemd_dir: PathBuf::from(DEFAULT_SYSTEMD_DIR),
            unit_templates: DEFAULT_UNIT_TEMPLATES
                .iter()
                .map(|t| install_root.join(t))
                .collect(),
            requirements: install_root.join("requirements.txt"),
            interpreter: "python3".to_string(),
            minimum_runtime: MINIMUM_RUNTIME,
            install_root,
        }
    }

    /// Pick configuration directories: explicit list, then `MDL_CONFIGDIR`,
    /// then `<root>/etc`
    pub fn with_config_dirs(mut self, explicit: Vec<PathBuf>, env_dir: Option<PathBuf>) -> Self {
        if !explicit.is_empty() {
            self.config_dirs = explicit;
        } else if let Some(dir) = env_dir {
            self.config_dirs = vec![dir];
        }
        self
    }

    /// The primary configuration directory (write-back target)
    pub fn primary_config_dir(&self) -> &Path {
        self.config_dirs
            .first()
            .map(PathBuf::as_path)
            .unwrap_or(&self.install_root)
    }

    /// Computed default for a directory-valued key
    pub fn default_directory(&self, suffix: &str) -> PathBuf {
        self.install_root.join(suffix)
    }
}

/// The `database` section of the application configuration
///
/// Pool bounds are consumed by the long-running server. The installer only
/// validates and logs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite database file; relative paths resolve against the install root
    pub db_path: Option<PathBuf>,

    /// Steady-state pooled connections
    pub pool_size: u32,

    /// Extra connections allowed above `pool_size`
    pub max_overflow: u32,

    /// Seconds before a pooled connection is recycled
    pub pool_recycle: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            db_path: None,
            pool_size: 25,
            max_overflow: 25,
            pool_recycle: 3600,
        }
    }
}

impl DatabaseSettings {
    /// Read the `database` section; a missing or null section yields the
    /// defaults, a malformed one is invalid configuration
    pub fn from_config(config: &Value, dirs: &str) -> Result<Self> {
        match config.get("database") {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(section) => serde_yaml::from_value(section.clone()).map_err(|e| {
                warn!("Malformed database section: {}", e);
                Error::InvalidConfiguration {
                    dirs: dirs.to_string(),
                    reason: format!("section 'database': {}", e),
                }
            }),
        }
    }

    /// Resolved database file location
    pub fn path(&self, install_root: &Path) -> PathBuf {
        match &self.db_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => install_root.join(p),
            None => install_root.join("var").join("mdl.db"),
        }
    }

    /// Connection recycle interval
    pub fn recycle_interval(&self) -> Duration {
        Duration::from_secs(self.pool_recycle)
    }

    /// Upper bound on concurrent connections the server may open
    pub fn max_connections(&self) -> u32 {
        self.pool_size.max(1).saturating_add(self.max_overflow)
    }
}
