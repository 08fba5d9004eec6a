// src/db/seed.rs

//! Reserved sentinel rows
//!
//! Each entity table gets one disabled placeholder row at a reserved primary
//! key in 1000..=1007. Presence is decided by the key alone; an existing row
//! is never compared, updated or deleted.

use rusqlite::{Connection, params_from_iter};
use std::fmt;
use tracing::{debug, info, warn};

/// Field content of every seeded text column
pub const RESERVED_MARKER: &str = "_SYSTEM_RESERVED_";

/// First identifier of the reserved range
pub const RESERVED_ID_BASE: i64 = 1000;

/// Entity kinds that receive a sentinel row, in seeding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedKind {
    DeviceMake,
    DeviceModel,
    Route,
    Rider,
    DriverCompany,
    Driver,
    RiderDevice,
    DriverDevice,
}

impl SeedKind {
    /// All kinds in seeding order
    pub fn all() -> &'static [SeedKind] {
        &[
            Self::DeviceMake,
            Self::DeviceModel,
            Self::Route,
            Self::Rider,
            Self::DriverCompany,
            Self::Driver,
            Self::RiderDevice,
            Self::DriverDevice,
        ]
    }

    /// Reserved primary key for this kind
    pub fn reserved_id(&self) -> i64 {
        RESERVED_ID_BASE
            + match self {
                Self::DeviceMake => 0,
                Self::DeviceModel => 1,
                Self::Route => 2,
                Self::Rider => 3,
                Self::DriverCompany => 4,
                Self::Driver => 5,
                Self::RiderDevice => 6,
                Self::DriverDevice => 7,
            }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::DeviceMake => "devicemakes",
            Self::DeviceModel => "devicemodels",
            Self::Route => "routes",
            Self::Rider => "riders",
            Self::DriverCompany => "drivercompanies",
            Self::Driver => "drivers",
            Self::RiderDevice => "riderdevices",
            Self::DriverDevice => "driverdevices",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            Self::DeviceMake => "idx_devicemake",
            Self::DeviceModel => "idx_devicemodel",
            Self::Route => "idx_route",
            Self::Rider => "idx_rider",
            Self::DriverCompany => "idx_drivercompany",
            Self::Driver => "idx_driver",
            Self::RiderDevice => "idx_riderdevice",
            Self::DriverDevice => "idx_driverdevice",
        }
    }

    /// Text columns filled with the reserved marker
    pub fn text_columns(&self) -> &'static [&'static str] {
        match self {
            Self::DeviceMake => &["make_name"],
            Self::DeviceModel => &["model_name"],
            Self::Route => &["route_name"],
            Self::Rider | Self::Driver => &["first_name", "last_name", "password"],
            Self::DriverCompany => &["drivercompany_name"],
            Self::RiderDevice => &["id_riderdevice", "serial_riderdevice"],
            Self::DriverDevice => &["id_driverdevice", "serial_driverdevice"],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DeviceMake => "device make",
            Self::DeviceModel => "device model",
            Self::Route => "route",
            Self::Rider => "rider",
            Self::DriverCompany => "driver company",
            Self::Driver => "driver",
            Self::RiderDevice => "rider device",
            Self::DriverDevice => "driver device",
        }
    }

    /// Whether a row exists at `id` in this kind's table
    pub fn row_exists(&self, conn: &Connection, id: i64) -> rusqlite::Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
            self.table(),
            self.id_column()
        );
        conn.query_row(&sql, [id], |row| row.get(0))
    }
}

impl fmt::Display for SeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A sentinel row ready to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRecord {
    pub kind: SeedKind,
    pub id: i64,
    pub fields: Vec<(&'static str, String)>,
    pub enabled: bool,
}

impl SeedRecord {
    /// The reserved placeholder row for a kind
    pub fn sentinel(kind: SeedKind) -> Self {
        Self {
            kind,
            id: kind.reserved_id(),
            fields: kind
                .text_columns()
                .iter()
                .map(|col| (*col, RESERVED_MARKER.to_string()))
                .collect(),
            enabled: false,
        }
    }

    /// Insert this row with its explicit identifier
    pub fn insert(&self, conn: &Connection) -> rusqlite::Result<()> {
        let mut columns = vec![self.kind.id_column()];
        columns.extend(self.fields.iter().map(|(col, _)| *col));
        columns.push("enabled");

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.kind.table(),
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut values: Vec<rusqlite::types::Value> = vec![self.id.into()];
        values.extend(self.fields.iter().map(|(_, v)| v.clone().into()));
        values.push(i64::from(self.enabled).into());

        conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }
}

/// Per-kind result of a seeding pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Inserted,
    AlreadyPresent,
    Failed(String),
}

/// Results of a seeding pass, in seeding order
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub outcomes: Vec<(SeedKind, SeedOutcome)>,
}

impl SeedReport {
    pub fn inserted(&self) -> usize {
        self.count(|o| matches!(o, SeedOutcome::Inserted))
    }

    pub fn already_present(&self) -> usize {
        self.count(|o| matches!(o, SeedOutcome::AlreadyPresent))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SeedOutcome::Failed(_)))
    }

    pub fn outcome(&self, kind: SeedKind) -> Option<&SeedOutcome> {
        self.outcomes.iter().find(|(k, _)| *k == kind).map(|(_, o)| o)
    }

    fn count(&self, pred: impl Fn(&SeedOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Inserts missing sentinel rows
pub struct SeedLoader<'a> {
    conn: &'a Connection,
}

impl<'a> SeedLoader<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Seed every kind independently; a failure on one kind does not stop
    /// the others
    pub fn load(&self) -> SeedReport {
        let mut report = SeedReport::default();

        for kind in SeedKind::all() {
            let outcome = match self.seed(*kind) {
                Ok(true) => {
                    info!("Inserted reserved {} row {}", kind, kind.reserved_id());
                    SeedOutcome::Inserted
                }
                Ok(false) => {
                    debug!("Reserved {} row {} already present", kind, kind.reserved_id());
                    SeedOutcome::AlreadyPresent
                }
                Err(e) => {
                    warn!("Failed to seed reserved {} row: {}", kind, e);
                    SeedOutcome::Failed(e.to_string())
                }
            };
            report.outcomes.push((*kind, outcome));
        }

        report
    }

    /// Returns true if a row was inserted
    fn seed(&self, kind: SeedKind) -> rusqlite::Result<bool> {
        if kind.row_exists(self.conn, kind.reserved_id())? {
            return Ok(false);
        }
        SeedRecord::sentinel(kind).insert(self.conn)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use std::collections::HashSet;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    fn count_at(conn: &Connection, kind: SeedKind) -> i64 {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            kind.table(),
            kind.id_column()
        );
        conn.query_row(&sql, [kind.reserved_id()], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_reserved_ids_are_unique_and_in_range() {
        let ids: HashSet<i64> = SeedKind::all().iter().map(|k| k.reserved_id()).collect();
        assert_eq!(ids.len(), SeedKind::all().len());
        assert!(ids.iter().all(|id| (1000..=1007).contains(id)));
        assert_eq!(SeedKind::DriverCompany.reserved_id(), 1004);
        assert_eq!(SeedKind::Driver.reserved_id(), 1005);
    }

    #[test]
    fn test_seed_exactly_once() {
        let conn = test_db();

        let first = SeedLoader::new(&conn).load();
        assert_eq!(first.inserted(), SeedKind::all().len());

        let second = SeedLoader::new(&conn).load();
        assert_eq!(second.inserted(), 0);
        assert_eq!(second.already_present(), SeedKind::all().len());

        for kind in SeedKind::all() {
            assert_eq!(count_at(&conn, *kind), 1, "{}", kind);
        }
    }

    #[test]
    fn test_sentinel_contents() {
        let conn = test_db();
        SeedLoader::new(&conn).load();

        let (first, password, enabled): (String, String, i64) = conn
            .query_row(
                "SELECT first_name, password, enabled FROM riders WHERE idx_rider = 1003",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(first, RESERVED_MARKER);
        assert_eq!(password, RESERVED_MARKER);
        assert_eq!(enabled, 0);
    }

    #[test]
    fn test_existing_row_is_left_alone() {
        let conn = test_db();
        conn.execute(
            "INSERT INTO routes (idx_route, route_name, enabled) VALUES (1002, 'Operator route', 1)",
            [],
        )
        .unwrap();

        let report = SeedLoader::new(&conn).load();
        assert_eq!(
            report.outcome(SeedKind::Route),
            Some(&SeedOutcome::AlreadyPresent)
        );

        let name: String = conn
            .query_row(
                "SELECT route_name FROM routes WHERE idx_route = 1002",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(name, "Operator route");
    }

    #[test]
    fn test_failure_does_not_block_other_kinds() {
        let conn = test_db();
        conn.execute_batch("DROP TABLE routes").unwrap();

        let report = SeedLoader::new(&conn).load();
        assert!(matches!(
            report.outcome(SeedKind::Route),
            Some(SeedOutcome::Failed(_))
        ));
        assert_eq!(report.failed(), 1);
        assert_eq!(report.inserted(), SeedKind::all().len() - 1);
    }
}
