// ABOUTME: Integration tests for loading interchange files into SQLite
// ABOUTME: Runs the real sqlite3 shell when installed and checks results with rusqlite

use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::Connection;
use std::io::Write;
use std::path::{Path, PathBuf};
use tablehop::commands::{import_sqlite, SqliteImportOptions};
use tablehop::filters::TableFilter;
use tablehop::interchange::InterchangeWriter;
use tablehop::tools;

/// sqlite3 location, or None when the shell is not installed
fn sqlite3() -> Option<PathBuf> {
    match tools::locate_tool("sqlite3") {
        Ok(location) => Some(location.path),
        Err(_) => {
            println!("Skipping: sqlite3 is not installed");
            None
        }
    }
}

fn write_fixtures(dir: &Path) {
    let columns = vec!["ID".to_string(), "NAME".to_string(), "NOTE".to_string()];

    let mut writer = InterchangeWriter::create(&dir.join("CUSTOMER.csv"), false, &columns).unwrap();
    writer.write_record(["1", "Acme | Co", ""]).unwrap();
    writer.write_record(["2", "Say \"hi\"", "line one\nline two"]).unwrap();
    writer.write_record(["3", "", "x"]).unwrap();
    writer.finish().unwrap();

    let mut writer = InterchangeWriter::create(&dir.join("SALES.csv.gz"), true, &["AMOUNT".to_string()]).unwrap();
    for amount in ["10.50", "20", "30"] {
        writer.write_record([amount]).unwrap();
    }
    writer.finish().unwrap();

    // Header-less file is skipped with a warning
    std::fs::write(dir.join("EMPTY.csv"), "").unwrap();
}

fn options(sqlite3: PathBuf, input_dir: PathBuf, db: &Path) -> SqliteImportOptions {
    SqliteImportOptions {
        input_dir,
        sqlite_db: db.to_string_lossy().into_owned(),
        sqlite3_path: Some(sqlite3),
        drop_existing: false,
        assume_yes: true,
        filter: TableFilter::empty(),
    }
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| row.get(0))
        .unwrap()
}

#[tokio::test]
async fn test_import_plain_and_compressed_files() {
    let Some(sqlite3) = sqlite3() else { return };

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    write_fixtures(&input);
    let db = dir.path().join("migrated.db");

    let summary = import_sqlite(options(sqlite3, input, &db)).await.unwrap();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.rows, 6);
    assert_eq!(summary.skipped, vec!["EMPTY"]);

    let conn = Connection::open(&db).unwrap();
    assert_eq!(count(&conn, "CUSTOMER"), 3);
    assert_eq!(count(&conn, "SALES"), 3);

    let rows: Vec<(String, String, String)> = conn
        .prepare("SELECT ID, NAME, NOTE FROM CUSTOMER ORDER BY ID")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(
        rows,
        vec![
            ("1".into(), "Acme | Co".into(), "".into()),
            ("2".into(), "Say \"hi\"".into(), "line one\nline two".into()),
            ("3".into(), "".into(), "x".into()),
        ]
    );

    // Every column is TEXT
    let declared: Vec<String> = conn
        .prepare("SELECT type FROM pragma_table_info('SALES')")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(declared, vec!["TEXT"]);
}

#[tokio::test]
async fn test_reimport_appends_unless_dropped() {
    let Some(sqlite3) = sqlite3() else { return };

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    write_fixtures(&input);
    let db = dir.path().join("twice.db");

    let mut opts = options(sqlite3, input, &db);
    opts.filter = TableFilter::new(Some(vec!["sales".to_string()]), None).unwrap();

    import_sqlite(opts.clone()).await.unwrap();
    let summary = import_sqlite(opts.clone()).await.unwrap();
    assert_eq!(summary.rows, 3);
    assert_eq!(count(&Connection::open(&db).unwrap(), "SALES"), 6);

    opts.drop_existing = true;
    import_sqlite(opts).await.unwrap();
    assert_eq!(count(&Connection::open(&db).unwrap(), "SALES"), 3);
}

#[tokio::test]
async fn test_file_name_with_quotes_and_spaces() {
    let Some(sqlite3) = sqlite3() else { return };

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in dir");
    std::fs::create_dir(&input).unwrap();

    let path = input.join("Order Items.csv.gz");
    let mut encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    encoder.write_all(b"SKU|QTY\nA-1|2\nB-2|5\n").unwrap();
    encoder.finish().unwrap();

    let db = dir.path().join("items.db");
    let summary = import_sqlite(options(sqlite3, input, &db)).await.unwrap();
    assert_eq!(summary.rows, 2);

    let conn = Connection::open(&db).unwrap();
    assert_eq!(count(&conn, "Order Items"), 2);
}
