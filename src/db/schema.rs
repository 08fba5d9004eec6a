// src/db/schema.rs

//! Entity schema for the mdl server
//!
//! Every statement is `CREATE ... IF NOT EXISTS`, so applying the schema to a
//! database that already has it leaves existing tables and rows untouched.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Entity tables created by version 1
pub const TABLES: &[&str] = &[
    "devicemakes",
    "devicemodels",
    "routes",
    "riders",
    "drivercompanies",
    "drivers",
    "riderdevices",
    "driverdevices",
];

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Create every missing table
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let current_version = get_schema_version(conn)?;
    info!("Current schema version: {}", current_version);

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying schema version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    ensure_tables(conn)
}

/// Recreate any entity table missing from a database whose recorded version
/// is already current
fn ensure_tables(conn: &Connection) -> rusqlite::Result<()> {
    let mut missing = Vec::new();
    for table in TABLES {
        if !table_exists(conn, table)? {
            missing.push(*table);
        }
    }

    if missing.is_empty() {
        debug!("Schema is up to date");
        return Ok(());
    }

    warn!("Recreating missing tables: {}", missing.join(", "));
    migrate_v1(conn)
}

fn apply_migration(conn: &Connection, version: i32) -> rusqlite::Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => unreachable!("no migration for schema version {}", version),
    }
}

/// Whether a table exists
pub fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [name],
        |row| row.get(0),
    )
}

/// Initial schema - Version 1
///
/// Name columns use `COLLATE NOCASE`, the SQLite counterpart of a
/// case-insensitive general collation.
fn migrate_v1(conn: &Connection) -> rusqlite::Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS devicemakes (
            idx_devicemake INTEGER PRIMARY KEY AUTOINCREMENT,
            make_name TEXT NOT NULL COLLATE NOCASE,
            enabled INTEGER NOT NULL DEFAULT 1,
            ts_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ts_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS devicemodels (
            idx_devicemodel INTEGER PRIMARY KEY AUTOINCREMENT,
            idx_devicemake INTEGER REFERENCES devicemakes(idx_devicemake),
            model_name TEXT NOT NULL COLLATE NOCASE,
            enabled INTEGER NOT NULL DEFAULT 1,
            ts_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ts_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS routes (
            idx_route INTEGER PRIMARY KEY AUTOINCREMENT,
            route_name TEXT NOT NULL COLLATE NOCASE,
            enabled INTEGER NOT NULL DEFAULT 1,
            ts_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ts_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS riders (
            idx_rider INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL COLLATE NOCASE,
            last_name TEXT NOT NULL COLLATE NOCASE,
            password TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            ts_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ts_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS drivercompanies (
            idx_drivercompany INTEGER PRIMARY KEY AUTOINCREMENT,
            drivercompany_name TEXT NOT NULL COLLATE NOCASE,
            enabled INTEGER NOT NULL DEFAULT 1,
            ts_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ts_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS drivers (
            idx_driver INTEGER PRIMARY KEY AUTOINCREMENT,
            idx_drivercompany INTEGER REFERENCES drivercompanies(idx_drivercompany),
            first_name TEXT NOT NULL COLLATE NOCASE,
            last_name TEXT NOT NULL COLLATE NOCASE,
            password TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            ts_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ts_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS riderdevices (
            idx_riderdevice INTEGER PRIMARY KEY AUTOINCREMENT,
            id_riderdevice TEXT NOT NULL COLLATE NOCASE,
            serial_riderdevice TEXT NOT NULL COLLATE NOCASE,
            enabled INTEGER NOT NULL DEFAULT 1,
            ts_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ts_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS driverdevices (
            idx_driverdevice INTEGER PRIMARY KEY AUTOINCREMENT,
            id_driverdevice TEXT NOT NULL COLLATE NOCASE,
            serial_driverdevice TEXT NOT NULL COLLATE NOCASE,
            enabled INTEGER NOT NULL DEFAULT 1,
            ts_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ts_created TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_devicemodels_make ON devicemodels(idx_devicemake);
        CREATE INDEX IF NOT EXISTS idx_drivers_company ON drivers(idx_drivercompany);
        ",
    )?;

    Ok(())
}
