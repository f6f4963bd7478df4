// ABOUTME: Drives Firebird's isql client for catalog discovery and row export
// ABOUTME: Credentials travel in ISC_USER/ISC_PASSWORD, SQL on stdin

pub mod output;
pub mod queries;

use crate::encoding::OutputEncoding;
use crate::interchange::InterchangeWriter;
use crate::tools::spawn_error;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use output::{clean_catalog_output, DataLineCleaner};

/// Connection settings for one Firebird database
#[derive(Debug, Clone)]
pub struct IsqlClient {
    isql_path: PathBuf,
    uri: String,
    username: String,
    password: String,
    charset: Option<String>,
    encoding: OutputEncoding,
}

/// Outcome of streaming one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStream {
    /// All rows were written; the writer may be finished
    Complete { rows: u64 },
    /// isql exited non-zero; the writer should be discarded
    Failed { rows: u64, exit_code: Option<i32> },
}

/// isql exited non-zero
#[derive(Debug, thiserror::Error)]
#[error("Error executing isql command.\nCommand: {sql}\nStderr: {stderr}")]
pub struct IsqlError {
    pub sql: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl IsqlClient {
    pub fn new(
        isql_path: &Path,
        uri: &str,
        username: &str,
        password: &str,
        encoding: OutputEncoding,
    ) -> Self {
        Self {
            isql_path: isql_path.to_path_buf(),
            uri: uri.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            charset: None,
            encoding,
        }
    }

    /// Ask the server to transliterate output into `charset` (isql `-ch`)
    pub fn with_charset(mut self, charset: Option<String>) -> Self {
        self.charset = charset;
        self
    }

    /// Arguments after the executable; the password is deliberately absent
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            self.uri.clone(),
            "-u".to_string(),
            self.username.clone(),
            "-q".to_string(),
        ];
        if let Some(charset) = &self.charset {
            args.push("-ch".to_string());
            args.push(charset.clone());
        }
        args
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.isql_path);
        cmd.args(self.args())
            // Keep the password out of the process list
            .env("ISC_USER", &self.username)
            .env("ISC_PASSWORD", &self.password)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run a catalog query and return its cleaned, trimmed output lines
    ///
    /// # Errors
    ///
    /// * [`IsqlError`] when isql exits non-zero
    /// * [`crate::encoding::DecodeError`] when stdout is not valid in the
    ///   configured encoding
    /// * [`crate::tools::ToolFailedToStart`] when isql cannot be launched
    pub async fn run_query(&self, sql: &str) -> Result<Vec<String>> {
        tracing::debug!("isql: {}", sql);

        let mut child = self
            .command()
            .spawn()
            .map_err(|e| spawn_error("isql", &self.isql_path, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(format!("{}\n", sql).as_bytes())
                .await
                .context("Failed to send SQL to isql")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for isql")?;

        if !output.status.success() {
            return Err(IsqlError {
                sql: sql.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                exit_code: output.status.code(),
            }
            .into());
        }

        let stdout = self.encoding.decode(&output.stdout)?;
        Ok(clean_catalog_output(&stdout))
    }

    /// User tables of the database
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.run_query(queries::LIST_TABLES_SQL).await
    }

    /// Columns of `table` in declaration order
    pub async fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        self.run_query(&queries::list_columns_sql(table)).await
    }

    /// Stream every row of `table` into `writer`
    ///
    /// Rows are formatted by the server (see [`queries::export_table_sql`]);
    /// each output line is cleaned and appended as it arrives.
    ///
    /// # Errors
    ///
    /// Returns an error for I/O failures, decode failures and a stream that
    /// ends inside a quoted field. A non-zero isql exit is reported as
    /// [`TableStream::Failed`] together with its stderr, which is logged.
    pub async fn export_table(
        &self,
        table: &str,
        columns: &[String],
        field_length: u32,
        writer: &mut InterchangeWriter,
    ) -> Result<TableStream> {
        let sql = queries::export_table_sql(table, columns, field_length);
        tracing::debug!("isql: {}", sql.trim_end());

        let mut child = self
            .command()
            .spawn()
            .map_err(|e| spawn_error("isql", &self.isql_path, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(sql.as_bytes())
                .await
                .context("Failed to send SQL to isql")?;
        }

        let stdout = child
            .stdout
            .take()
            .context("isql stdout was not captured")?;
        let mut stderr = child
            .stderr
            .take()
            .context("isql stderr was not captured")?;

        let progress = row_spinner(table);

        let copy_rows = async {
            let mut reader = BufReader::new(stdout);
            let mut cleaner = DataLineCleaner::new();
            let mut buf = Vec::new();
            let mut rows = 0u64;

            loop {
                buf.clear();
                let read = reader
                    .read_until(b'\n', &mut buf)
                    .await
                    .context("Failed to read isql output")?;
                if read == 0 {
                    break;
                }

                let line = self.encoding.decode(&buf)?;
                if let Some(clean) = cleaner.clean(&line) {
                    writer.write_line(clean.text)?;
                    if clean.completes_record {
                        rows += 1;
                        progress.inc(1);
                    }
                }
            }

            if cleaner.is_incomplete() {
                bail!("isql output for table '{}' ended inside a quoted field", table);
            }

            Ok::<u64, anyhow::Error>(rows)
        };

        let collect_stderr = async {
            let mut captured = Vec::new();
            stderr
                .read_to_end(&mut captured)
                .await
                .context("Failed to read isql stderr")?;
            Ok::<Vec<u8>, anyhow::Error>(captured)
        };

        let (rows, stderr_bytes) = tokio::try_join!(copy_rows, collect_stderr)?;
        progress.finish_and_clear();

        let status = child.wait().await.context("Failed to wait for isql")?;
        if !status.success() {
            let stderr_text = String::from_utf8_lossy(&stderr_bytes);
            tracing::warn!("    - Stderr: {}", stderr_text.trim());
            return Ok(TableStream::Failed {
                rows,
                exit_code: status.code(),
            });
        }

        Ok(TableStream::Complete { rows })
    }
}

/// Spinner counting streamed rows; hidden when stderr is not a terminal
fn row_spinner(table: &str) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("    {spinner} {msg}: {pos} rows") {
        progress.set_style(style);
    }
    progress.set_message(table.to_string());
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}
