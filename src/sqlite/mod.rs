// ABOUTME: Drives the sqlite3 shell for table creation and .import loading
// ABOUTME: Validates the target database path before anything is written

use crate::interchange::DELIMITER;
use crate::tools::spawn_error;
use crate::utils::quote_identifier;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// sqlite3 exited non-zero
#[derive(Debug, thiserror::Error)]
#[error("sqlite3 failed.\nInput: {input}\nStderr: {stderr}")]
pub struct Sqlite3Error {
    pub input: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Validate the SQLite database file the importer writes to
///
/// The file itself may not exist yet (sqlite3 creates it), but it must not
/// be a directory and its parent directory must exist.
///
/// # Examples
///
/// ```no_run
/// # use tablehop::sqlite::validate_target_path;
/// assert!(validate_target_path("migrated.db").is_ok());
/// assert!(validate_target_path("/nonexistent/dir/out.db").is_err());
/// ```
pub fn validate_target_path(path: &str) -> Result<PathBuf> {
    if path.trim().is_empty() {
        bail!("SQLite database path cannot be empty");
    }

    let path_buf = PathBuf::from(path);

    if path_buf.is_dir() {
        bail!("Path '{}' is a directory, not a database file", path);
    }

    let parent = match path_buf.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !parent.is_dir() {
        bail!(
            "Directory '{}' for SQLite database '{}' does not exist",
            parent.display(),
            path
        );
    }

    tracing::debug!("Validated SQLite target path: {}", path_buf.display());

    Ok(path_buf)
}

/// One sqlite3 database file
#[derive(Debug, Clone)]
pub struct Sqlite3Client {
    sqlite3_path: PathBuf,
    database: PathBuf,
}

impl Sqlite3Client {
    pub fn new(sqlite3_path: &Path, database: &Path) -> Self {
        Self {
            sqlite3_path: sqlite3_path.to_path_buf(),
            database: database.to_path_buf(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.sqlite3_path);
        cmd.arg("-batch")
            .arg("-bail")
            .arg(&self.database)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn check(input: &str, output: std::process::Output) -> Result<String> {
        if !output.status.success() {
            return Err(Sqlite3Error {
                input: input.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                exit_code: output.status.code(),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run one SQL statement passed as a command-line argument
    pub async fn execute(&self, sql: &str) -> Result<String> {
        tracing::debug!("sqlite3: {}", sql);

        let output = self
            .command()
            .arg(sql)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error("sqlite3", &self.sqlite3_path, e))?;

        Self::check(sql, output)
    }

    /// Feed a script of SQL and dot-commands through stdin
    pub async fn run_script(&self, script: &str) -> Result<String> {
        tracing::debug!("sqlite3 script:\n{}", script);

        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error("sqlite3", &self.sqlite3_path, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .context("Failed to send script to sqlite3")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for sqlite3")?;

        Self::check(script, output)
    }

    /// Number of rows currently in `table`
    pub async fn count_rows(&self, table: &str) -> Result<u64> {
        let stdout = self.execute(&count_rows_sql(table)).await?;
        stdout
            .trim()
            .parse()
            .with_context(|| format!("Unexpected COUNT(*) output from sqlite3: '{}'", stdout.trim()))
    }
}

/// `CREATE TABLE IF NOT EXISTS` with every column as TEXT
pub fn create_table_sql(table: &str, columns: &[String]) -> String {
    let column_defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_identifier(c)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        quote_identifier(table),
        column_defs.join(", ")
    )
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {};", quote_identifier(table))
}

pub fn count_rows_sql(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {};", quote_identifier(table))
}

/// Dot-command script loading an interchange file into `table`
///
/// `.mode csv` must come before `.separator`, which it would otherwise
/// reset to a comma. Passing `--csv` to `.import` has the same effect, so
/// the import relies on the output mode instead.
pub fn import_script(file: &Path, table: &str) -> String {
    format!(
        ".bail on\n.mode csv\n.separator {}\n.import --skip 1 {} {}\n",
        DELIMITER as char,
        dot_command_argument(&file.to_string_lossy()),
        dot_command_argument(table)
    )
}

/// Quote a sqlite3 dot-command argument
///
/// Double-quoted arguments have C-style escapes resolved by the shell, so
/// backslashes and quotes are escaped.
pub fn dot_command_argument(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate_target_path() {
        let dir = tempdir().unwrap();

        let new_db = dir.path().join("new.db");
        assert_eq!(
            validate_target_path(new_db.to_str().unwrap()).unwrap(),
            new_db
        );

        assert!(validate_target_path("").is_err());
        assert!(validate_target_path(dir.path().to_str().unwrap()).is_err());

        let orphan = dir.path().join("missing").join("x.db");
        assert!(validate_target_path(orphan.to_str().unwrap()).is_err());

        // Bare file name resolves against the current directory
        assert!(validate_target_path("relative.db").is_ok());
    }

    #[test]
    fn test_create_and_drop_sql() {
        assert_eq!(
            create_table_sql("EMPLOYEE", &["EMP_NO".to_string(), "LAST \"NAME\"".to_string()]),
            "CREATE TABLE IF NOT EXISTS \"EMPLOYEE\" (\"EMP_NO\" TEXT, \"LAST \"\"NAME\"\"\" TEXT);"
        );
        assert_eq!(drop_table_sql("EMPLOYEE"), "DROP TABLE IF EXISTS \"EMPLOYEE\";");
        assert_eq!(count_rows_sql("EMPLOYEE"), "SELECT COUNT(*) FROM \"EMPLOYEE\";");
    }

    #[test]
    fn test_import_script() {
        let script = import_script(Path::new("/tmp/EMPLOYEE.csv"), "EMPLOYEE");
        assert_eq!(
            script,
            ".bail on\n.mode csv\n.separator |\n.import --skip 1 \"/tmp/EMPLOYEE.csv\" \"EMPLOYEE\"\n"
        );
    }

    #[test]
    fn test_dot_command_argument_escapes() {
        assert_eq!(dot_command_argument("plain"), "\"plain\"");
        assert_eq!(dot_command_argument("it's"), "\"it's\"");
        assert_eq!(dot_command_argument("C:\\tmp\\a.csv"), "\"C:\\\\tmp\\\\a.csv\"");
        assert_eq!(dot_command_argument("say \"x\""), "\"say \\\"x\\\"\"");
    }

    #[tokio::test]
    async fn test_missing_executable_is_fatal() {
        let client = Sqlite3Client::new(Path::new("/nonexistent/sqlite3"), Path::new("x.db"));
        let err = client.execute("SELECT 1;").await.unwrap_err();
        assert!(crate::tools::is_fatal(&err));
    }
}
