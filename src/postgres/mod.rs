// ABOUTME: Drives the psql client for table creation and bulk loading
// ABOUTME: Builds \copy commands for interchange files and parses COPY tags

use crate::interchange::DELIMITER;
use crate::tools::spawn_error;
use crate::utils::quote_identifier;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Connection settings for one PostgreSQL database
#[derive(Debug, Clone)]
pub struct PsqlClient {
    psql_path: PathBuf,
    host: String,
    port: u16,
    dbname: String,
    user: String,
    password: String,
}

/// psql exited non-zero
#[derive(Debug, thiserror::Error)]
#[error("An error occurred while executing psql command.\nCommand: {command}\nStderr: {stderr}")]
pub struct PsqlError {
    pub command: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl PsqlClient {
    pub fn new(
        psql_path: &Path,
        host: &str,
        port: u16,
        dbname: &str,
        user: &str,
        password: &str,
    ) -> Self {
        Self {
            psql_path: psql_path.to_path_buf(),
            host: host.to_string(),
            port,
            dbname: dbname.to_string(),
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    /// Arguments for running a single command
    ///
    /// `ON_ERROR_STOP` makes psql exit non-zero when the command fails;
    /// `--no-password` stops it from prompting when PGPASSWORD is wrong.
    pub fn args(&self, command: &str) -> Vec<String> {
        vec![
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--dbname".to_string(),
            self.dbname.clone(),
            "--username".to_string(),
            self.user.clone(),
            "--no-psqlrc".to_string(),
            "--no-password".to_string(),
            "--set".to_string(),
            "ON_ERROR_STOP=1".to_string(),
            "--command".to_string(),
            command.to_string(),
        ]
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new(&self.psql_path);
        cmd.args(self.args(command))
            .env("PGPASSWORD", &self.password)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Execute one command and return its stdout
    ///
    /// # Errors
    ///
    /// Returns [`PsqlError`] when psql exits non-zero, or
    /// [`crate::tools::ToolFailedToStart`] when psql cannot be launched.
    pub async fn run(&self, command: &str) -> Result<String> {
        tracing::debug!("psql: {}", command);

        let output = self
            .command(command)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| spawn_error("psql", &self.psql_path, e))?;

        if !output.status.success() {
            return Err(PsqlError {
                command: command.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                exit_code: output.status.code(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Execute a command that reads from stdin (`\copy ... FROM STDIN`)
    ///
    /// The reader is drained on a blocking thread and pumped into psql
    /// while its output is collected, so neither side can block on a full
    /// pipe.
    pub async fn run_with_stdin<R>(&self, command: &str, mut input: R) -> Result<String>
    where
        R: Read + Send + 'static,
    {
        tracing::debug!("psql (stdin): {}", command);

        let mut child = self
            .command(command)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error("psql", &self.psql_path, e))?;

        let mut stdin = child.stdin.take().context("psql stdin was not captured")?;
        let mut stdout = child
            .stdout
            .take()
            .context("psql stdout was not captured")?;
        let mut stderr = child
            .stderr
            .take()
            .context("psql stderr was not captured")?;

        // Decompression and file reads block, so they run off the runtime
        let (tx, mut rx) = mpsc::channel::<std::io::Result<Vec<u8>>>(4);
        let reader = tokio::task::spawn_blocking(move || {
            let mut chunk = vec![0u8; 64 * 1024];
            loop {
                let read = input.read(&mut chunk).map(|n| chunk[..n].to_vec());
                let done = !matches!(&read, Ok(bytes) if !bytes.is_empty());
                // The receiver is gone once psql stops reading
                if tx.blocking_send(read).is_err() || done {
                    break;
                }
            }
        });

        let feed = async move {
            while let Some(read) = rx.recv().await {
                let bytes = read.context("Failed to read interchange data")?;
                if bytes.is_empty() {
                    break;
                }
                if let Err(e) = stdin.write_all(&bytes).await {
                    // psql quit early; its exit status and stderr say why
                    if e.kind() == std::io::ErrorKind::BrokenPipe {
                        break;
                    }
                    return Err(e).context("Failed to stream data to psql");
                }
            }
            drop(stdin);
            Ok::<(), anyhow::Error>(())
        };

        let collect_stdout = async {
            let mut captured = Vec::new();
            stdout
                .read_to_end(&mut captured)
                .await
                .context("Failed to read psql output")?;
            Ok::<Vec<u8>, anyhow::Error>(captured)
        };

        let collect_stderr = async {
            let mut captured = Vec::new();
            stderr
                .read_to_end(&mut captured)
                .await
                .context("Failed to read psql stderr")?;
            Ok::<Vec<u8>, anyhow::Error>(captured)
        };

        let ((), out, err) = tokio::try_join!(feed, collect_stdout, collect_stderr)?;
        reader.await.context("Interchange reader task failed")?;
        let status = child.wait().await.context("Failed to wait for psql")?;

        if !status.success() {
            return Err(PsqlError {
                command: command.to_string(),
                stderr: String::from_utf8_lossy(&err).trim().to_string(),
                exit_code: status.code(),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&out).into_owned())
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

fn copy_options() -> String {
    format!(
        "WITH (FORMAT csv, DELIMITER '{}', HEADER true)",
        DELIMITER as char
    )
}

/// `\copy` from a plain file on the client machine
pub fn copy_from_file_command(table: &str, path: &Path) -> String {
    format!(
        "\\copy {} FROM {} {}",
        quote_identifier(table),
        psql_quote_argument(&path.to_string_lossy()),
        copy_options()
    )
}

/// `\copy` reading the (decompressed) file from psql's stdin
pub fn copy_from_stdin_command(table: &str) -> String {
    format!(
        "\\copy {} FROM STDIN {}",
        quote_identifier(table),
        copy_options()
    )
}

/// Quote a psql meta-command argument
///
/// psql treats backslashes inside single-quoted meta-command arguments as
/// escapes and a doubled single quote as a literal quote.
pub fn psql_quote_argument(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Extract the row count from psql's `COPY n` command tag
pub fn parse_copy_count(stdout: &str) -> Option<u64> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("COPY "))
        .find_map(|count| count.trim().parse().ok())
}
