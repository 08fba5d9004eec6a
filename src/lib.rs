// src/lib.rs

//! mdl bootstrap
//!
//! Idempotent installer for the mdl server. A run walks a fixed list of
//! stages and can be repeated safely:
//!
//! - Runtime gate: the Python interpreter must be new enough
//! - Dependencies: pip3 requirements, skipped under CI
//! - Configuration: directory defaults merged and written back
//! - Database: character set, tables and reserved sentinel rows
//! - Privileged setup: shell environment, ownership and systemd units

pub mod config;
pub mod db;
mod error;
pub mod host;
pub mod orchestrator;
pub mod service;

pub use config::{ConfigReconciler, ConfigStore, DatabaseSettings, InstallSettings};
pub use db::{SchemaProvisioner, SeedLoader};
pub use error::{Error, Result};
pub use host::{Host, Prompter, ScriptedPrompter, StdinPrompter, SystemHost};
pub use orchestrator::{Orchestrator, RunReport, Stage, StageOutcome, success_summary};
pub use service::ServiceUnitGenerator;
