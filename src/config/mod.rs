// src/config/mod.rs

//! Configuration handling
//!
//! - [`store`]: read YAML fragments from one or more directories and write a
//!   single canonical fragment back
//! - [`reconcile`]: default-filling for directory-valued keys under `main`
//! - [`settings`]: installer layout and the typed `database` section

pub mod reconcile;
pub mod settings;
pub mod store;

pub use reconcile::{ConfigReconciler, DIRECTORY_KEYS, KeyState, KeyUpdate, Reconciliation};
pub use settings::{CONFIG_DIR_ENV, DatabaseSettings, InstallSettings};
pub use store::{CANONICAL_FRAGMENT, ConfigStore};
