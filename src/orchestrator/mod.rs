// src/orchestrator/mod.rs

//! Sequencing of the installer stages
//!
//! Stages run strictly in [`Stage::all`] order on one thread. The first fatal
//! error stops the run; work already done is kept, and re-running the
//! installer is the recovery path.

mod stages;

pub use stages::{RunReport, Stage, StageOutcome, StageRecord};

use crate::config::{ConfigReconciler, ConfigStore, DatabaseSettings, InstallSettings};
use crate::db::{SchemaProvisioner, SeedLoader};
use crate::error::{Error, Result};
use crate::host::deps::DependencyOutcome;
use crate::host::{
    DependencyInstaller, Host, Identity, PrivilegeManager, Prompter, ShellRcOutcome, TargetAccount,
    ensure_not_sudo,
};
use crate::service::{ServiceUnitGenerator, UnitOutcome};
use rusqlite::Connection;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of one stage that did not fail
enum Step {
    Done(String),
    Skip(String),
}

/// Values handed from earlier stages to later ones
#[derive(Default)]
struct RunState {
    identity: Option<Identity>,
    database: Option<DatabaseSettings>,
    conn: Option<Connection>,
}

/// Runs every installer stage against a host
pub struct Orchestrator<H: Host, P: Prompter> {
    settings: InstallSettings,
    host: H,
    prompter: P,
}

impl<H: Host, P: Prompter> Orchestrator<H, P> {
    pub fn new(settings: InstallSettings, host: H, prompter: P) -> Self {
        Self {
            settings,
            host,
            prompter,
        }
    }

    pub fn settings(&self) -> &InstallSettings {
        &self.settings
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Run every stage in order, stopping at the first fatal error
    pub fn run(&mut self) -> RunReport {
        let mut report = RunReport::new();
        report.privileged = self.host.is_privileged();

        if let Err(e) = ensure_not_sudo(&self.host) {
            warn!("{}", e);
            report.abort(e);
            return report;
        }

        let mut state = RunState::default();

        for stage in Stage::all() {
            let started = Instant::now();

            if report.error().is_some() {
                report.record(*stage, StageOutcome::NotRun, started.elapsed());
                continue;
            }

            if let Some(dep) = stage.depends_on().iter().find(|d| !report.completed(**d)) {
                let reason = format!("{} did not complete", dep);
                info!("Skipping {}: {}", stage, reason);
                report.record(*stage, StageOutcome::Skipped(reason), started.elapsed());
                continue;
            }

            if stage.is_privileged() && !report.privileged {
                let reason = "unprivileged run".to_string();
                debug!("Skipping {}: {}", stage, reason);
                report.record(*stage, StageOutcome::Skipped(reason), started.elapsed());
                continue;
            }

            info!("Starting stage: {}", stage);
            match self.execute(*stage, &mut state) {
                Ok(Step::Done(detail)) => {
                    report.record(*stage, StageOutcome::Completed(detail), started.elapsed());
                }
                Ok(Step::Skip(reason)) => {
                    info!("Skipping {}: {}", stage, reason);
                    report.record(*stage, StageOutcome::Skipped(reason), started.elapsed());
                }
                Err(e) => {
                    warn!("Stage {} failed: {}", stage, e);
                    report.fail(*stage, e, started.elapsed());
                }
            }
        }

        report
    }

    fn execute(&mut self, stage: Stage, state: &mut RunState) -> Result<Step> {
        match stage {
            Stage::RuntimeVersion => self.runtime_version(),
            Stage::Dependencies => self.dependencies(),
            Stage::Identity => self.identity(state),
            Stage::Configuration => self.configuration(state),
            Stage::Schema => self.schema(state),
            Stage::Seed => self.seed(state),
            Stage::ShellEnvironment => self.shell_environment(state),
            Stage::Ownership => self.ownership(state),
            Stage::ServiceUnits => self.service_units(state),
        }
    }

    fn runtime_version(&self) -> Result<Step> {
        let installed = self.host.runtime_version(&self.settings.interpreter)?;
        installed.ensure_at_least(self.settings.minimum_runtime)?;
        Ok(Step::Done(format!("python {}", installed)))
    }

    fn dependencies(&self) -> Result<Step> {
        let installer = DependencyInstaller::new(&self.settings.requirements);
        Ok(match installer.install(&self.host)? {
            DependencyOutcome::SkippedCi => Step::Skip("CI environment".to_string()),
            DependencyOutcome::Attempted { mode, succeeded } => Step::Done(format!(
                "{:?} install {}",
                mode,
                if succeeded { "succeeded" } else { "reported failure" }
            )),
        })
    }

    fn identity(&mut self, state: &mut RunState) -> Result<Step> {
        let manager = PrivilegeManager::new(&self.settings.install_root);
        let identity = manager.resolve_identity(&self.host, &mut self.prompter)?;

        let detail = match identity.require_target() {
            Ok(target) => format!("{} for {}", identity.user, target.name),
            Err(_) if identity.privileged => format!("{}, target unresolved", identity.user),
            Err(_) => identity.user.clone(),
        };
        state.identity = Some(identity);
        Ok(Step::Done(detail))
    }

    fn configuration(&self, state: &mut RunState) -> Result<Step> {
        let store = ConfigStore::new(self.settings.config_dirs.clone());
        let loaded = store.load()?;
        let database = DatabaseSettings::from_config(&loaded, &store.describe())?;
        let outcome = ConfigReconciler::new(&store, &self.settings.install_root).apply(&loaded)?;

        let detail = match &outcome.written {
            Some(path) => format!(
                "{} key(s) updated, wrote {}",
                outcome.updates.len(),
                path.display()
            ),
            None => "up to date".to_string(),
        };
        state.database = Some(database);
        Ok(Step::Done(detail))
    }

    fn schema(&self, state: &mut RunState) -> Result<Step> {
        let db_settings = state.database.clone().unwrap_or_default();
        let provisioner = SchemaProvisioner::new(&self.settings.install_root, db_settings);
        let conn = provisioner.provision()?;
        state.conn = Some(conn);
        Ok(Step::Done(provisioner.path().display().to_string()))
    }

    fn seed(&self, state: &mut RunState) -> Result<Step> {
        let Some(conn) = state.conn.as_ref() else {
            return Ok(Step::Skip("no database connection".to_string()));
        };
        let report = SeedLoader::new(conn).load();
        Ok(Step::Done(format!(
            "{} inserted, {} present, {} failed",
            report.inserted(),
            report.already_present(),
            report.failed()
        )))
    }

    /// Target account for the privileged stages
    fn target(state: &RunState) -> Result<&TargetAccount> {
        match &state.identity {
            Some(identity) => identity.require_target(),
            None => Err(Error::UnknownUser(String::new())),
        }
    }

    fn shell_environment(&self, state: &RunState) -> Result<Step> {
        let target = Self::target(state)?;

        let manager = PrivilegeManager::new(&self.settings.install_root);
        Ok(match manager.install_shell_env(&target.home)? {
            ShellRcOutcome::Missing => Step::Skip("no .bashrc".to_string()),
            ShellRcOutcome::AlreadyPresent => Step::Done("already present".to_string()),
            ShellRcOutcome::Appended => Step::Done("PYTHONPATH appended".to_string()),
        })
    }

    fn ownership(&mut self, state: &RunState) -> Result<Step> {
        let target = Self::target(state)?;

        let manager = PrivilegeManager::new(&self.settings.install_root);
        manager.confirm_ownership(&mut self.prompter, target)?;
        let changed = manager.chown_install_root(target.uid, target.gid)?;
        Ok(Step::Done(format!("{} entries", changed)))
    }

    fn service_units(&self, state: &RunState) -> Result<Step> {
        let target = Self::target(state)?;

        let generator = ServiceUnitGenerator::new(
            self.settings.unit_templates.clone(),
            &self.settings.systemd_dir,
        );
        Ok(
            match generator.generate(
                &self.host,
                &self.settings.install_root,
                &target.name,
                &target.group,
            )? {
                UnitOutcome::Skipped => Step::Skip(format!(
                    "{} does not exist",
                    self.settings.systemd_dir.display()
                )),
                UnitOutcome::Written { units, reloaded } => Step::Done(format!(
                    "{} unit(s){}",
                    units.len(),
                    if reloaded { "" } else { ", reload failed" }
                )),
            },
        )
    }
}

/// Closing advice printed after a successful run
pub fn success_summary(report: &RunReport) -> String {
    let mut out = String::new();

    if report.privileged {
        out.push_str(
            "
You can start mdl daemons with these commands:

    # systemctl start mdl-api.service

You can enable mdl daemons to start on system boot with these commands:

    # systemctl enable mdl-api.service
",
        );
    }

    out.push_str(
        "
mdl requires:

    SQLite >= 3.8 (bundled)
    Python >= 3.5

Please verify.

OK
",
    );
    out
}
