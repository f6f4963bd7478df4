// ABOUTME: Integration tests for loading interchange files into PostgreSQL
// ABOUTME: Checks the psql commands issued via a recording stand-in, or loads a real database

use std::env;
use std::path::{Path, PathBuf};
use tablehop::commands::{import_postgres, PostgresImportOptions};
use tablehop::filters::TableFilter;
use tablehop::interchange::InterchangeWriter;

/// Records the password and --command of each call; answers \copy with a COPY tag
#[cfg(unix)]
const RECORDING_PSQL: &str = r#"#!/bin/sh
here=$(dirname "$0")
cmd=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--command" ]; then shift; cmd="$1"; fi
  shift
done
printf '%s\t%s\n' "$PGPASSWORD" "$cmd" >> "$here/psql.log"
case "$cmd" in
  *"FROM STDIN"*) cat > "$here/stdin.txt"; echo "COPY 2" ;;
  "\\copy"*) echo "COPY 3" ;;
  CREATE*) echo "CREATE TABLE" ;;
  DROP*) echo "DROP TABLE" ;;
esac
"#;

#[cfg(unix)]
fn install_recording_psql(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("psql");
    std::fs::write(&path, RECORDING_PSQL).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_fixtures(dir: &Path) {
    let columns = vec!["ID".to_string(), "NAME".to_string()];
    let mut writer = InterchangeWriter::create(&dir.join("CUSTOMER.csv"), false, &columns).unwrap();
    writer.write_record(["1", "Acme | Co"]).unwrap();
    writer.write_record(["2", "two\nlines"]).unwrap();
    writer.write_record(["3", ""]).unwrap();
    writer.finish().unwrap();

    let mut writer =
        InterchangeWriter::create(&dir.join("SALES.csv.gz"), true, &["AMOUNT".to_string()]).unwrap();
    writer.write_record(["10.50"]).unwrap();
    writer.write_record(["20"]).unwrap();
    writer.finish().unwrap();
}

fn options(psql_path: Option<PathBuf>, input_dir: PathBuf) -> PostgresImportOptions {
    PostgresImportOptions {
        input_dir,
        host: "localhost".to_string(),
        port: 5432,
        dbname: "warehouse".to_string(),
        user: "loader".to_string(),
        password: "secret".to_string(),
        psql_path,
        drop_existing: false,
        assume_yes: true,
        filter: TableFilter::empty(),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_import_issues_create_and_copy() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    std::fs::create_dir(&bin).unwrap();
    let psql = install_recording_psql(&bin);

    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    write_fixtures(&input);

    let summary = import_postgres(options(Some(psql), input.clone()))
        .await
        .unwrap();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.rows, 5);
    assert!(summary.skipped.is_empty());

    let log = std::fs::read_to_string(bin.join("psql.log")).unwrap();
    let expected = format!(
        "secret\tCREATE TABLE IF NOT EXISTS \"customer\" (\"ID\" TEXT, \"NAME\" TEXT);\n\
         secret\t\\copy \"customer\" FROM '{}' WITH (FORMAT csv, DELIMITER '|', HEADER true)\n\
         secret\tCREATE TABLE IF NOT EXISTS \"sales\" (\"AMOUNT\" TEXT);\n\
         secret\t\\copy \"sales\" FROM STDIN WITH (FORMAT csv, DELIMITER '|', HEADER true)\n",
        input.join("CUSTOMER.csv").display()
    );
    assert_eq!(log, expected);

    // The gzipped file reached psql decompressed
    assert_eq!(
        std::fs::read_to_string(bin.join("stdin.txt")).unwrap(),
        "AMOUNT\n10.50\n20\n"
    );
}

#[tokio::test]
async fn test_missing_psql_path_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let err = import_postgres(options(
        Some(dir.path().join("no-such-psql")),
        dir.path().to_path_buf(),
    ))
    .await
    .unwrap_err();
    assert!(err.to_string().contains("was not found at"));
}

/// Loads into a real PostgreSQL database
///
/// Needs TEST_PG_DBNAME, TEST_PG_USER and TEST_PG_PASSWORD (TEST_PG_HOST
/// defaults to localhost) plus psql on PATH.
#[tokio::test]
#[ignore]
async fn test_import_real_postgres() {
    let (Ok(dbname), Ok(user), Ok(password)) = (
        env::var("TEST_PG_DBNAME"),
        env::var("TEST_PG_USER"),
        env::var("TEST_PG_PASSWORD"),
    ) else {
        println!("Skipping: TEST_PG_DBNAME/USER/PASSWORD not set");
        return;
    };

    let dir = tempfile::tempdir().unwrap();
    write_fixtures(dir.path());

    let mut opts = options(None, dir.path().to_path_buf());
    opts.host = env::var("TEST_PG_HOST").unwrap_or_else(|_| "localhost".to_string());
    opts.dbname = dbname;
    opts.user = user;
    opts.password = password;
    opts.drop_existing = true;

    let summary = import_postgres(opts).await.unwrap();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.rows, 5);
}
