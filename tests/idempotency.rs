// tests/idempotency.rs

//! Re-running the installer must not change anything it already did.

mod common;

use common::{FakeHost, Fixture};
use mdl_bootstrap::db::{RESERVED_MARKER, SeedKind};
use mdl_bootstrap::host::SHELL_MARKER;
use mdl_bootstrap::{Orchestrator, ScriptedPrompter, Stage, StageOutcome};
use rusqlite::Connection;
use std::fs;

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn test_second_run_changes_nothing() {
    let fixture = Fixture::new();

    let mut first =
        Orchestrator::new(fixture.settings(), FakeHost::new(), ScriptedPrompter::default());
    assert!(first.run().is_success());
    let config_after_first = fs::read_to_string(fixture.config_path()).unwrap();

    let mut second =
        Orchestrator::new(fixture.settings(), FakeHost::new(), ScriptedPrompter::default());
    let report = second.run();
    assert!(report.is_success(), "{:?}", report.summary());

    assert_eq!(
        report.outcome(Stage::Configuration),
        Some(&StageOutcome::Completed("up to date".to_string()))
    );
    assert_eq!(
        report.outcome(Stage::Seed),
        Some(&StageOutcome::Completed(
            "0 inserted, 8 present, 0 failed".to_string()
        ))
    );
    assert_eq!(
        fs::read_to_string(fixture.config_path()).unwrap(),
        config_after_first
    );

    let conn = Connection::open(fixture.db_path()).unwrap();
    for kind in SeedKind::all() {
        assert_eq!(row_count(&conn, kind.table()), 1, "{}", kind);
    }
}

#[test]
fn test_existing_rows_survive_rerun() {
    let fixture = Fixture::new();

    let mut first =
        Orchestrator::new(fixture.settings(), FakeHost::new(), ScriptedPrompter::default());
    assert!(first.run().is_success());

    {
        let conn = Connection::open(fixture.db_path()).unwrap();
        conn.execute(
            "INSERT INTO devicemakes (make_name, enabled) VALUES ('Acme', 1)",
            [],
        )
        .unwrap();
    }

    let mut second =
        Orchestrator::new(fixture.settings(), FakeHost::new(), ScriptedPrompter::default());
    assert!(second.run().is_success());

    let conn = Connection::open(fixture.db_path()).unwrap();
    assert_eq!(row_count(&conn, "devicemakes"), 2);
    let marker: String = conn
        .query_row(
            "SELECT make_name FROM devicemakes WHERE idx_devicemake = 1000",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(marker, RESERVED_MARKER);
}

#[test]
fn test_privileged_rerun_keeps_single_export_block() {
    let fixture = Fixture::new();

    for _ in 0..2 {
        let host = FakeHost::privileged_with_account("svc", &fixture.home);
        let mut orchestrator =
            Orchestrator::new(fixture.settings(), host, ScriptedPrompter::new(["svc", "y"]));
        let report = orchestrator.run();
        assert!(report.is_success(), "{:?}", report.summary());
    }

    assert_eq!(fixture.bashrc().matches(SHELL_MARKER).count(), 1);

    let unit = fs::read_to_string(fixture.unit_dir.join("mdl-api.service")).unwrap();
    assert_eq!(unit.matches("User=svc").count(), 1);
}

#[test]
fn test_existing_directories_are_kept() {
    let fixture = Fixture::new();
    let logs = fixture.temp.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    fs::write(
        fixture.config_path(),
        format!(
            "main:\n  log_directory: {}\n  ingest_cache_directory: {}\n",
            logs.display(),
            logs.display()
        ),
    )
    .unwrap();
    let before = fs::read_to_string(fixture.config_path()).unwrap();

    let mut orchestrator =
        Orchestrator::new(fixture.settings(), FakeHost::new(), ScriptedPrompter::default());
    let report = orchestrator.run();

    assert!(report.is_success(), "{:?}", report.summary());
    assert_eq!(fs::read_to_string(fixture.config_path()).unwrap(), before);
}

#[test]
fn test_rerun_recreates_dropped_table() {
    let fixture = Fixture::new();

    let mut first =
        Orchestrator::new(fixture.settings(), FakeHost::new(), ScriptedPrompter::default());
    assert!(first.run().is_success());

    Connection::open(fixture.db_path())
        .unwrap()
        .execute_batch("DROP TABLE routes")
        .unwrap();

    let mut second =
        Orchestrator::new(fixture.settings(), FakeHost::new(), ScriptedPrompter::default());
    let report = second.run();
    assert!(report.is_success(), "{:?}", report.summary());
    assert_eq!(
        report.outcome(Stage::Seed),
        Some(&StageOutcome::Completed(
            "1 inserted, 7 present, 0 failed".to_string()
        ))
    );

    let conn = Connection::open(fixture.db_path()).unwrap();
    assert_eq!(row_count(&conn, "routes"), 1);
}
