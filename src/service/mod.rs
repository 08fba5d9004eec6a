// src/service/mod.rs

//! systemd unit generation
//!
//! Unit templates ship with hard-coded values for a `mdl` account living in
//! `/home/mdl`. Rendering swaps those literals for the real install root and
//! target account; nothing else in the template changes.

use crate::error::{Error, Result};
use crate::host::Host;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Home-directory placeholder in shipped templates
pub const HOME_PLACEHOLDER: &str = "/home/mdl";

/// Run-as user placeholder line
pub const USER_PLACEHOLDER: &str = "User=mdl";

/// Run-as group placeholder line
pub const GROUP_PLACEHOLDER: &str = "Group=mdl";

/// Command that makes systemd pick up new or changed units
pub const RELOAD_COMMAND: (&str, &[&str]) = ("systemctl", &["daemon-reload"]);

/// A unit file template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTemplate {
    /// File name of the rendered unit
    pub file_name: String,
    pub text: String,
}

impl UnitTemplate {
    /// Read a template; the rendered unit keeps the template's base name
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::io(
                    path,
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "template has no file name",
                    ),
                )
            })?;
        Ok(Self { file_name, text })
    }

    /// Substitute the install root, user and group placeholders
    pub fn render(&self, install_root: &Path, user: &str, group: &str) -> String {
        self.text
            .replace(HOME_PLACEHOLDER, &install_root.to_string_lossy())
            .replace(USER_PLACEHOLDER, &format!("User={}", user))
            .replace(GROUP_PLACEHOLDER, &format!("Group={}", group))
    }
}

/// What the generator did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Unit directory missing, nothing written
    Skipped,
    /// Units written; `reloaded` is false when the reload command failed
    Written { units: Vec<PathBuf>, reloaded: bool },
}

/// Renders unit templates into the systemd configuration directory
#[derive(Debug, Clone)]
pub struct ServiceUnitGenerator {
    templates: Vec<PathBuf>,
    unit_dir: PathBuf,
}

impl ServiceUnitGenerator {
    pub fn new(templates: Vec<PathBuf>, unit_dir: impl AsRef<Path>) -> Self {
        Self {
            templates,
            unit_dir: unit_dir.as_ref().to_path_buf(),
        }
    }

    /// Render every template and reload systemd
    ///
    /// The unit directory is never created. A failed reload is logged and
    /// otherwise ignored.
    pub fn generate(
        &self,
        host: &dyn Host,
        install_root: &Path,
        user: &str,
        group: &str,
    ) -> Result<UnitOutcome> {
        if !self.unit_dir.is_dir() {
            debug!(
                "{} does not exist, skipping unit generation",
                self.unit_dir.display()
            );
            return Ok(UnitOutcome::Skipped);
        }

        let mut units = Vec::with_capacity(self.templates.len());
        for template_path in &self.templates {
            let template = UnitTemplate::load(template_path)?;
            let target = self.unit_dir.join(&template.file_name);
            fs::write(&target, template.render(install_root, user, group))
                .map_err(|e| Error::io(&target, e))?;
            info!("Installed systemd unit {}", target.display());
            units.push(target);
        }

        let reloaded = self.reload(host);
        Ok(UnitOutcome::Written { units, reloaded })
    }

    fn reload(&self, host: &dyn Host) -> bool {
        let (program, args) = RELOAD_COMMAND;
        let Some(systemctl) = host.find_executable(program) else {
            warn!("{} not available, skipping daemon-reload", program);
            return false;
        };

        match host.run(&systemctl, args) {
            Ok(true) => {
                debug!("Reloaded systemd daemon");
                true
            }
            Ok(false) => {
                warn!("systemctl daemon-reload failed");
                false
            }
            Err(e) => {
                warn!("Failed to run systemctl daemon-reload: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEMPLATE: &str = "[Unit]
Description=mdl API

[Service]
User=mdl
Group=mdl
ExecStart=/home/mdl/bin/mdl-api --start
WorkingDirectory=/home/mdl

[Install]
WantedBy=multi-user.target
";

    #[test]
    fn test_render_replaces_only_placeholders() {
        let template = UnitTemplate {
            file_name: "mdl-api.service".into(),
            text: TEMPLATE.into(),
        };
        let rendered = template.render(Path::new("/opt/app"), "svc", "svcgrp");

        let expected = "[Unit]
Description=mdl API

[Service]
User=svc
Group=svcgrp
ExecStart=/opt/app/bin/mdl-api --start
WorkingDirectory=/opt/app

[Install]
WantedBy=multi-user.target
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_load_keeps_base_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mdl-api.service");
        fs::write(&path, TEMPLATE).unwrap();

        let template = UnitTemplate::load(&path).unwrap();
        assert_eq!(template.file_name, "mdl-api.service");
        assert_eq!(template.text, TEMPLATE);
    }

    #[test]
    fn test_missing_template_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = UnitTemplate::load(&dir.path().join("gone.service")).unwrap_err();
        assert_eq!(err.code(), 1001);
    }
}
