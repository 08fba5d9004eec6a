// src/error.rs

//! Error type for the mdl bootstrap installer
//!
//! Every fatal condition carries a stable numeric code. Stages return these
//! errors to the orchestrator, and only `main` turns them into a process exit.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an installer run
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is not a mapping, lacks `main`, or failed to parse
    #[error("Configuration files found in {dirs} is invalid: {reason}")]
    InvalidConfiguration { dirs: String, reason: String },

    /// Host runtime is older than the supported minimum
    #[error("Required python version must be >= {required}. Python version {installed} installed")]
    UnsupportedRuntime { required: String, installed: String },

    /// Host runtime could not be found or queried
    #[error("Cannot determine python version using '{interpreter}': {reason}")]
    RuntimeNotFound { interpreter: String, reason: String },

    /// Database could not be opened or its character set could not be applied
    #[error(
        "Cannot connect to database {database}. Verify database server is started. \
         Verify database is created. Verify that the configured database \
         authentication is correct. ({reason})"
    )]
    DatabaseUnreachable { database: String, reason: String },

    /// Schema DDL failed after a successful connection
    #[error("Failed to apply schema to {database}: {source}")]
    Schema {
        database: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The account entered for a privileged run does not exist
    #[error("User {0} not found. Please try again.")]
    UnknownUser(String),

    /// Operator answered anything but "y" to the ownership prompt
    #[error("Aborting as per user request.")]
    OwnershipDeclined,

    /// pip3 is not on the search path
    #[error("Cannot find python \"{0}\". Please install.")]
    PackageManagerMissing(String),

    /// Installer was started through sudo
    #[error(
        "Cannot run setup using \"sudo\". Run as a regular user to install in \
         this directory or as user \"root\"."
    )]
    SudoRefused,

    /// Filesystem or terminal I/O failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Stable exit code for this error
    pub fn code(&self) -> i32 {
        match self {
            Error::Io { .. } => 1001,
            Error::InvalidConfiguration { .. } => 1015,
            Error::UnsupportedRuntime { .. } => 1018,
            Error::RuntimeNotFound { .. } => 1019,
            Error::DatabaseUnreachable { .. } => 1036,
            Error::Schema { .. } => 1037,
            Error::UnknownUser(_) => 1049,
            Error::OwnershipDeclined => 1050,
            Error::PackageManagerMissing(_) => 1052,
            Error::SudoRefused => 1078,
        }
    }

    /// Process exit status for this error
    ///
    /// Unix keeps only the low 8 bits of an exit code, so the status is the
    /// code minus 1000 (1078 exits with 78).
    pub fn exit_status(&self) -> u8 {
        u8::try_from(self.code() - 1000).unwrap_or(1)
    }

    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
