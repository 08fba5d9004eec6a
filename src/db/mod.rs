// src/db/mod.rs

//! Database provisioning
//!
//! The installer opens one connection, applies the character set, creates
//! any missing tables and then seeds the reserved rows. Pool bounds from the
//! configuration are validated here but only exercised by the mdl server.

pub mod schema;
pub mod seed;

pub use seed::{RESERVED_MARKER, SeedKind, SeedLoader, SeedOutcome, SeedRecord, SeedReport};

use crate::config::DatabaseSettings;
use crate::error::{Error, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Character set every mdl database must use
pub const DATABASE_ENCODING: &str = "UTF-8";

/// Creates the mdl schema in the configured database
#[derive(Debug, Clone)]
pub struct SchemaProvisioner {
    path: PathBuf,
    settings: DatabaseSettings,
}

impl SchemaProvisioner {
    pub fn new(install_root: &Path, settings: DatabaseSettings) -> Self {
        Self {
            path: settings.path(install_root),
            settings,
        }
    }

    /// Database file this provisioner targets
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Connect, apply the character set and create missing tables
    pub fn provision(&self) -> Result<Connection> {
        info!(
            "Database pool: size {}, overflow {} (at most {} connections), recycle {}s",
            self.settings.pool_size,
            self.settings.max_overflow,
            self.settings.max_connections(),
            self.settings.recycle_interval().as_secs()
        );

        let conn = self.connect()?;
        self.apply_charset(&conn)?;

        info!("Applying schema to {}", self.path.display());
        schema::migrate(&conn).map_err(|source| Error::Schema {
            database: self.path.display().to_string(),
            source,
        })?;

        Ok(conn)
    }

    /// Open the provisioning connection
    ///
    /// The file is created if missing, but its directory must already exist.
    pub fn connect(&self) -> Result<Connection> {
        if self.settings.pool_size == 0 {
            return Err(self.unreachable("pool_size must be at least 1"));
        }

        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| self.unreachable(e))?;

        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| self.unreachable(e))?;
        conn.execute_batch("PRAGMA foreign_keys = ON")
            .map_err(|e| self.unreachable(e))?;
        Ok(conn)
    }

    /// Request UTF-8 and verify the database actually uses it
    ///
    /// SQLite fixes the encoding when the first table is created, so an
    /// existing database in another encoding cannot be converted.
    fn apply_charset(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!("PRAGMA encoding = '{}'", DATABASE_ENCODING))
            .map_err(|e| self.unreachable(e))?;

        let encoding: String = conn
            .query_row("PRAGMA encoding", [], |row| row.get(0))
            .map_err(|e| self.unreachable(e))?;

        if encoding != DATABASE_ENCODING {
            return Err(self.unreachable(format!(
                "database encoding is {}, expected {}",
                encoding, DATABASE_ENCODING
            )));
        }
        Ok(())
    }

    fn unreachable(&self, reason: impl ToString) -> Error {
        Error::DatabaseUnreachable {
            database: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
