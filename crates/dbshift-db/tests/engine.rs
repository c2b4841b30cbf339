use std::path::Path;

use dbshift_common::Error;
use dbshift_config::{AppConfig, DatabaseConfig, MigrationConfig};
use dbshift_db::scaffold::{create_migration, create_seeder};
use dbshift_db::{MemoryReporter, Migrator, SqlFileLoader};
use rusqlite::Connection;
use tempfile::TempDir;

fn write_table_migration(dir: &Path, identifier: &str, table: &str) {
    std::fs::write(
        dir.join(format!("{identifier}.sql")),
        format!(
            "-- up\nDROP TABLE IF EXISTS {table};\nCREATE TABLE {table} (id INTEGER PRIMARY KEY AUTOINCREMENT);\n\n-- down\nDROP TABLE IF EXISTS {table};\n"
        ),
    )
    .unwrap();
}

fn app_config(root: &TempDir) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            path: root.path().join("database").join("database.sqlite"),
        },
        migration: MigrationConfig {
            dir: root.path().join("database"),
            ..Default::default()
        },
    }
}

fn open(config: &AppConfig, reporter: &MemoryReporter) -> Migrator {
    Migrator::open(
        config,
        Box::new(SqlFileLoader::new()),
        Box::new(reporter.clone()),
    )
    .unwrap()
}

/// Lays out the three `create_testN` migrations and three seeders.
fn fixture() -> (TempDir, AppConfig) {
    let root = TempDir::new().unwrap();
    let config = app_config(&root);
    let migrations = config.migration.migrations_dir();
    let seeders = config.migration.seeders_dir();
    std::fs::create_dir_all(&migrations).unwrap();
    std::fs::create_dir_all(&seeders).unwrap();

    for n in 1..=3 {
        write_table_migration(
            &migrations,
            &format!("0000000000000{n}_create_test{n}_table"),
            &format!("test{n}"),
        );
        let inserts: String = (1..=n)
            .map(|id| format!("INSERT INTO test{n} (id) VALUES ({id});\n"))
            .collect();
        std::fs::write(seeders.join(format!("test{n}.sql")), inserts).unwrap();
    }

    (root, config)
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .unwrap()
        > 0
}

fn ledger_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn migrate_rollback_reset_scenario() {
    let (_root, config) = fixture();
    let reporter = MemoryReporter::new();
    let migrator = open(&config, &reporter);

    let summary = migrator.migrate().unwrap();
    assert_eq!(summary.applied.len(), 3);
    migrator
        .with_connection(|conn| {
            for n in 1..=3 {
                assert!(table_exists(conn, &format!("test{n}")));
            }
            assert_eq!(ledger_rows(conn), 3);
            Ok(())
        })
        .unwrap();

    let summary = migrator.rollback(Some(2)).unwrap();
    assert_eq!(
        summary.rolled_back,
        vec!["00000000000003_create_test3_table", "00000000000002_create_test2_table"]
    );
    migrator
        .with_connection(|conn| {
            assert!(table_exists(conn, "test1"));
            assert!(!table_exists(conn, "test2"));
            assert!(!table_exists(conn, "test3"));
            assert_eq!(ledger_rows(conn), 1);
            Ok(())
        })
        .unwrap();

    migrator.reset().unwrap();
    migrator
        .with_connection(|conn| {
            assert!(!table_exists(conn, "test1"));
            assert_eq!(ledger_rows(conn), 0);
            Ok(())
        })
        .unwrap();

    assert_eq!(
        reporter.messages(),
        vec![
            "00000000000001_create_test1_table: migrating...",
            "00000000000002_create_test2_table: migrating...",
            "00000000000003_create_test3_table: migrating...",
            "00000000000003_create_test3_table: rolling back...",
            "00000000000002_create_test2_table: rolling back...",
            "00000000000001_create_test1_table: rolling back...",
        ]
    );
}

#[test]
fn ledger_survives_reopen() {
    let (_root, config) = fixture();
    let reporter = MemoryReporter::new();

    open(&config, &reporter).migrate().unwrap();

    let summary = open(&config, &reporter).migrate().unwrap();
    assert!(summary.applied.is_empty());
    assert_eq!(summary.skipped, 3);
}

#[test]
fn new_migration_is_picked_up_after_earlier_run() {
    let (_root, config) = fixture();
    let reporter = MemoryReporter::new();
    let migrator = open(&config, &reporter);
    migrator.migrate().unwrap();

    write_table_migration(
        &config.migration.migrations_dir(),
        "00000000000004_create_test4_table",
        "test4",
    );
    let summary = migrator.migrate().unwrap();
    assert_eq!(summary.applied, vec!["00000000000004_create_test4_table"]);

    // The newest one is the first to go back.
    let summary = migrator.rollback(Some(1)).unwrap();
    assert_eq!(summary.rolled_back, vec!["00000000000004_create_test4_table"]);
}

#[test]
fn refresh_reapplies_all() {
    let (_root, config) = fixture();
    let reporter = MemoryReporter::new();
    let migrator = open(&config, &reporter);
    migrator.migrate().unwrap();

    let summary = migrator.refresh().unwrap();
    assert_eq!(summary.rolled_back.len(), 3);
    assert_eq!(summary.applied.len(), 3);
    migrator
        .with_connection(|conn| {
            assert_eq!(ledger_rows(conn), 3);
            Ok(())
        })
        .unwrap();
}

#[test]
fn removed_file_fails_rollback() {
    let (_root, config) = fixture();
    let reporter = MemoryReporter::new();
    let migrator = open(&config, &reporter);
    migrator.migrate().unwrap();

    std::fs::remove_file(
        config
            .migration
            .migrations_dir()
            .join("00000000000003_create_test3_table.sql"),
    )
    .unwrap();

    let err = migrator.rollback(Some(1)).unwrap_err();
    assert!(matches!(err, Error::MissingUnit(_)));
    migrator
        .with_connection(|conn| {
            assert!(table_exists(conn, "test3"));
            assert_eq!(ledger_rows(conn), 3);
            Ok(())
        })
        .unwrap();
}

#[test]
fn broken_migration_stops_batch() {
    let (_root, config) = fixture();
    std::fs::write(
        config
            .migration
            .migrations_dir()
            .join("00000000000002_create_test2_table.sql"),
        "-- up\nCREATE TABLE test2 (id INTEGER;\n-- down\nDROP TABLE IF EXISTS test2;\n",
    )
    .unwrap();

    let reporter = MemoryReporter::new();
    let migrator = open(&config, &reporter);
    let err = migrator.migrate().unwrap_err();
    assert!(matches!(err, Error::Unit(_)));

    migrator
        .with_connection(|conn| {
            assert!(table_exists(conn, "test1"));
            assert!(!table_exists(conn, "test3"));
            assert_eq!(ledger_rows(conn), 1);
            Ok(())
        })
        .unwrap();
}

#[test]
fn seeders_run_against_migrated_schema() {
    let (_root, config) = fixture();
    let reporter = MemoryReporter::new();
    let migrator = open(&config, &reporter);
    migrator.migrate().unwrap();

    migrator.seed(None).unwrap();
    migrator
        .with_connection(|conn| {
            for n in 1..=3i64 {
                let count: i64 = conn
                    .query_row(&format!("SELECT COUNT(*) FROM test{n}"), [], |row| row.get(0))
                    .unwrap();
                assert_eq!(count, n);
            }
            Ok(())
        })
        .unwrap();

    assert!(matches!(
        migrator.seed(Some("unknown")),
        Err(Error::Usage(_))
    ));
}

#[test]
fn scaffolded_units_round_trip_through_engine() {
    let root = TempDir::new().unwrap();
    let config = app_config(&root);
    let reporter = MemoryReporter::new();

    let path = create_migration(&config.migration, "test").unwrap();
    create_seeder(&config.migration, "test").unwrap();
    let identifier = path.file_stem().unwrap().to_str().unwrap().to_string();

    let migrator = open(&config, &reporter);
    assert_eq!(migrator.migrate().unwrap().applied, vec![identifier.clone()]);
    migrator.seed(Some("test")).unwrap();
    migrator
        .with_connection(|conn| {
            let id: i64 = conn
                .query_row("SELECT id FROM example", [], |row| row.get(0))
                .unwrap();
            assert_eq!(id, 1);
            Ok(())
        })
        .unwrap();

    assert_eq!(migrator.rollback(Some(1)).unwrap().rolled_back, vec![identifier]);
    migrator
        .with_connection(|conn| {
            assert!(!table_exists(conn, "example"));
            Ok(())
        })
        .unwrap();
}

#[test]
fn missing_migrations_dir_is_not_an_error() {
    let root = TempDir::new().unwrap();
    let config = app_config(&root);
    let reporter = MemoryReporter::new();
    let migrator = open(&config, &reporter);

    assert!(migrator.migrate().unwrap().applied.is_empty());
    assert!(migrator.seed(None).unwrap().is_empty());
}
