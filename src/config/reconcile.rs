// src/config/reconcile.rs

//! Fill directory-valued settings with known-good defaults
//!
//! Only the configured path string is rewritten. The reconciler never creates
//! directories.

use super::store::ConfigStore;
use crate::error::{Error, Result};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory-valued keys under `main` and the suffix of their default path
pub const DIRECTORY_KEYS: &[(&str, &str)] = &[
    ("log_directory", "log"),
    ("ingest_cache_directory", "cache"),
];

/// Why a key had to be rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Key is not present under `main`
    Absent,
    /// Key is present with a null value
    Null,
    /// Value is not a path to an existing directory
    NotADirectory,
}

/// One rewritten key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUpdate {
    pub key: &'static str,
    pub state: KeyState,
    pub value: PathBuf,
}

/// Outcome of reconciling one configuration document
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The reconciled document
    pub config: Value,
    /// Keys that were rewritten
    pub updates: Vec<KeyUpdate>,
    /// Path of the written fragment, if a write-back happened
    pub written: Option<PathBuf>,
}

impl Reconciliation {
    /// Whether any key changed
    pub fn is_updated(&self) -> bool {
        !self.updates.is_empty()
    }
}

/// Applies directory defaults and persists the result when needed
pub struct ConfigReconciler<'a> {
    store: &'a ConfigStore,
    install_root: &'a Path,
}

impl<'a> ConfigReconciler<'a> {
    pub fn new(store: &'a ConfigStore, install_root: &'a Path) -> Self {
        Self {
            store,
            install_root,
        }
    }

    /// Compute the reconciled document without touching the filesystem
    /// beyond directory existence checks
    pub fn reconcile(&self, config: &Value) -> Result<Reconciliation> {
        let mut config = config.clone();
        if !config.is_mapping() {
            return Err(self.invalid("configuration is not a mapping"));
        }
        let Some(main) = config.get_mut("main") else {
            return Err(self.invalid("section 'main' is missing"));
        };
        let Value::Mapping(main) = main else {
            return Err(self.invalid("section 'main' is not a mapping"));
        };

        let mut updates = Vec::new();
        for (key, suffix) in DIRECTORY_KEYS {
            let state = match main.get(*key) {
                None => Some(KeyState::Absent),
                Some(Value::Null) => Some(KeyState::Null),
                Some(Value::String(dir)) if Path::new(dir).is_dir() => None,
                Some(_) => Some(KeyState::NotADirectory),
            };

            let Some(state) = state else {
                debug!("main.{} points at an existing directory", key);
                continue;
            };

            let default = self.install_root.join(suffix);
            let default_str = default.to_string_lossy().into_owned();

            // Re-writing the same default is not a change
            if main.get(*key).and_then(Value::as_str) == Some(default_str.as_str()) {
                debug!("main.{} already holds its default {}", key, default_str);
                continue;
            }

            info!("Setting main.{} to {} ({:?})", key, default_str, state);
            main.insert(Value::from(*key), Value::from(default_str));
            updates.push(KeyUpdate {
                key: *key,
                state,
                value: default,
            });
        }

        Ok(Reconciliation {
            config,
            updates,
            written: None,
        })
    }

    /// Reconcile and, if anything changed, collapse every source directory
    /// into a single fragment in the primary directory
    pub fn apply(&self, config: &Value) -> Result<Reconciliation> {
        let mut outcome = self.reconcile(config)?;
        if !outcome.is_updated() {
            info!("Configuration is up to date");
            return Ok(outcome);
        }

        let Some((primary, others)) = self.store.directories().split_first() else {
            return Err(self.invalid("no configuration directory"));
        };

        // Stale fragments elsewhere would win the next merge
        for dir in others {
            self.store.clear(dir)?;
        }
        outcome.written = Some(self.store.replace(primary, &outcome.config)?);
        Ok(outcome)
    }

    fn invalid(&self, reason: &str) -> Error {
        Error::InvalidConfiguration {
            dirs: self.store.describe(),
            reason: reason.to_string(),
        }
    }
}
