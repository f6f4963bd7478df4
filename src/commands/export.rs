// ABOUTME: export-firebird command - dumps every Firebird user table to interchange files
// ABOUTME: Catalog failures end the run; a failed table stream skips just that table

use crate::commands::TransferSummary;
use crate::encoding::OutputEncoding;
use crate::filters::TableFilter;
use crate::firebird::{IsqlClient, TableStream};
use crate::interchange::{InterchangeFile, InterchangeWriter};
use crate::tools;
use crate::utils;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Settings for one export run, already merged from flags and config
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub uri: String,
    pub username: String,
    pub password: String,
    pub isql_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub encoding: String,
    pub charset: Option<String>,
    pub compress: bool,
    pub field_length: u32,
    pub filter: TableFilter,
}

/// Export the Firebird database described by `options`
///
/// # Errors
///
/// Fails without exporting anything when isql cannot be found, the
/// encoding label is unknown, or the output directory cannot be created.
/// Any catalog query failure or decode failure also ends the run; a
/// failure while streaming one table's rows only skips that table.
pub async fn export_firebird(options: ExportOptions) -> Result<TransferSummary> {
    let encoding = OutputEncoding::from_label(&options.encoding)?;
    let isql = tools::resolve_tool("isql", options.isql_path.as_deref())?;
    tracing::info!("Using isql at {}", isql.path.display());

    utils::ensure_output_dir(&options.output_dir)?;
    tracing::info!(
        "Output files will be saved in: {}",
        options.output_dir.display()
    );

    let client = IsqlClient::new(
        &isql.path,
        &options.uri,
        &options.username,
        &options.password,
        encoding,
    )
    .with_charset(options.charset.clone());

    tracing::info!(
        "Fetching table list from Firebird database (using {} encoding)...",
        encoding.name()
    );
    let tables = client
        .list_tables()
        .await
        .context("Failed to list Firebird tables")?;
    tracing::info!("Found {} tables.", tables.len());

    let mut summary = TransferSummary::start();

    for table in &tables {
        if !options.filter.should_transfer(table) {
            tracing::debug!("Skipping table '{}' (filtered out)", table);
            summary.record_filtered();
            continue;
        }

        tracing::info!("  - Processing table: {}...", table);

        if let Err(e) = utils::validate_table_name(table) {
            tracing::warn!("    - {}. Skipping.", e);
            summary.record_skip(table);
            continue;
        }
        if table.contains(['/', '\\']) {
            tracing::warn!(
                "    - Table name '{}' cannot be used as a file name. Skipping.",
                table
            );
            summary.record_skip(table);
            continue;
        }

        let columns = client
            .list_columns(table)
            .await
            .with_context(|| format!("Failed to list columns of table '{}'", table))?;

        if columns.is_empty() {
            tracing::warn!(
                "    - Warning: Could not find columns for table '{}'. Skipping.",
                table
            );
            summary.record_skip(table);
            continue;
        }

        match export_table(&client, table, &columns, &options).await {
            Ok(Some((rows, bytes))) => summary.record_success(rows, bytes),
            Ok(None) => summary.record_skip(table),
            Err(e) if tools::is_fatal(&e) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "    - An error occurred while processing table '{}': {:#}",
                    table,
                    e
                );
                summary.record_skip(table);
            }
        }
    }

    tracing::info!("Export process complete.");
    summary.log("Exported");

    Ok(summary)
}

/// Stream one table into its interchange file
///
/// Returns `None` when isql failed; the partial file is removed.
async fn export_table(
    client: &IsqlClient,
    table: &str,
    columns: &[String],
    options: &ExportOptions,
) -> Result<Option<(u64, u64)>> {
    let path = InterchangeFile::output_path(&options.output_dir, table, options.compress);
    let mut writer = InterchangeWriter::create(&path, options.compress, columns)?;

    let streamed = client
        .export_table(table, columns, options.field_length, &mut writer)
        .await;

    match streamed {
        Ok(TableStream::Complete { rows }) => {
            let written = writer.finish()?;
            tracing::info!(
                "    ✓ Successfully exported {} rows to {}",
                rows,
                file_name(&path)
            );
            Ok(Some((rows, written.bytes)))
        }
        Ok(TableStream::Failed { rows, exit_code }) => {
            tracing::warn!(
                "    - Error streaming data for table '{}' (isql exit code {:?} after {} rows).",
                table,
                exit_code,
                rows
            );
            writer.discard()?;
            Ok(None)
        }
        Err(e) => {
            if let Err(discard_err) = writer.discard() {
                tracing::warn!(
                    "    - Could not remove partial file {}: {:#}",
                    path.display(),
                    discard_err
                );
            }
            Err(e)
        }
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options(output_dir: PathBuf) -> ExportOptions {
        ExportOptions {
            uri: "localhost:employee".to_string(),
            username: "SYSDBA".to_string(),
            password: "masterkey".to_string(),
            isql_path: Some(PathBuf::from("/nonexistent/bin/isql")),
            output_dir,
            encoding: "utf-8".to_string(),
            charset: None,
            compress: false,
            field_length: crate::firebird::queries::DEFAULT_FIELD_LENGTH,
            filter: TableFilter::empty(),
        }
    }

    #[tokio::test]
    async fn test_unknown_encoding_fails_before_anything_runs() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let mut opts = options(out.clone());
        opts.encoding = "klingon-8".to_string();

        assert!(export_firebird(opts).await.is_err());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_missing_isql_path_is_reported() {
        let dir = tempdir().unwrap();
        let err = export_firebird(options(dir.path().join("out")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/bin/isql"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name(std::path::Path::new("/tmp/out/EMPLOYEE.csv.gz")),
            "EMPLOYEE.csv.gz"
        );
    }
}
