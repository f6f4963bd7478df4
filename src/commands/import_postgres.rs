// ABOUTME: import-postgres command - loads interchange files into PostgreSQL with psql
// ABOUTME: One TEXT table per file, filled through \copy in CSV mode

use crate::commands::TransferSummary;
use crate::filters::TableFilter;
use crate::interactive;
use crate::interchange::{self, InterchangeFile};
use crate::postgres::{self, PsqlClient};
use crate::tools;
use crate::utils;
use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PostgresImportOptions {
    pub input_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub psql_path: Option<PathBuf>,
    pub drop_existing: bool,
    pub assume_yes: bool,
    pub filter: TableFilter,
}

/// Import every interchange file in `options.input_dir`
///
/// Table names are the file names up to the first `.`, lowercased.
pub async fn import_postgres(options: PostgresImportOptions) -> Result<TransferSummary> {
    let psql = tools::resolve_tool("psql", options.psql_path.as_deref())?;
    tracing::info!("Using psql at {}", psql.path.display());

    utils::ensure_input_dir(&options.input_dir)?;
    let files: Vec<InterchangeFile> = interchange::discover_files(&options.input_dir)?;

    let mut summary = TransferSummary::start();
    let mut selected = Vec::with_capacity(files.len());
    for file in files {
        if options.filter.should_transfer(&file.table_name()) {
            selected.push(file);
        } else {
            tracing::debug!("Skipping '{}' (filtered out)", file.file_name());
            summary.record_filtered();
        }
    }

    tracing::info!(
        "Found {} files to import into PostgreSQL database '{}'.",
        selected.len(),
        options.dbname
    );

    if options.drop_existing
        && !interactive::confirm_drop(
            &format!("PostgreSQL database '{}'", options.dbname),
            selected.len(),
            options.assume_yes,
        )?
    {
        tracing::info!("Import cancelled by user.");
        return Ok(summary);
    }

    let client = PsqlClient::new(
        &psql.path,
        &options.host,
        options.port,
        &options.dbname,
        &options.user,
        &options.password,
    );

    for file in &selected {
        let table = file.table_name().to_lowercase();
        tracing::info!(
            "  - Processing '{}' into table '{}'...",
            file.file_name(),
            table
        );

        match import_file(&client, file, &table, options.drop_existing).await {
            Ok(Some((rows, bytes))) => summary.record_success(rows, bytes),
            Ok(None) => summary.record_skip(&table),
            Err(e) if tools::is_fatal(&e) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "    - An unexpected error occurred with file {}: {:#}",
                    file.file_name(),
                    e
                );
                summary.record_skip(&table);
            }
        }
    }

    tracing::info!("PostgreSQL import process complete.");
    summary.log("Imported");

    Ok(summary)
}

/// Create and fill one table; `None` means the file was skipped
async fn import_file(
    client: &PsqlClient,
    file: &InterchangeFile,
    table: &str,
    drop_existing: bool,
) -> Result<Option<(u64, u64)>> {
    utils::validate_table_name(table)?;

    let Some(columns) = file.read_header()? else {
        tracing::warn!(
            "    - Warning: File '{}' is empty or has no header. Skipping.",
            file.file_name()
        );
        return Ok(None);
    };

    if drop_existing {
        client
            .run(&postgres::drop_table_sql(table))
            .await
            .with_context(|| format!("Failed to drop table '{}'", table))?;
    }

    if let Err(e) = client
        .run(&postgres::create_table_sql(table, &columns))
        .await
    {
        if tools::is_fatal(&e) {
            return Err(e);
        }
        tracing::warn!("    - {:#}", e);
        tracing::warn!(
            "    - Failed to create table '{}'. Skipping import for this file.",
            table
        );
        return Ok(None);
    }

    let expected = match file.count_records() {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!("    - Could not count records in the file: {:#}", e);
            None
        }
    };

    let loaded = if file.compressed {
        let reader = file.open_reader()?;
        client
            .run_with_stdin(&postgres::copy_from_stdin_command(table), reader)
            .await
    } else {
        let absolute = if file.path.is_absolute() {
            file.path.clone()
        } else {
            std::env::current_dir()
                .context("Failed to resolve the current directory")?
                .join(&file.path)
        };
        client
            .run(&postgres::copy_from_file_command(table, &absolute))
            .await
    };

    let stdout = match loaded {
        Ok(stdout) => stdout,
        Err(e) if tools::is_fatal(&e) => return Err(e),
        Err(e) => {
            tracing::warn!("    - {:#}", e);
            tracing::warn!("    - Failed to import data for table '{}'.", table);
            return Ok(None);
        }
    };

    let rows = postgres::parse_copy_count(&stdout);
    match (rows, expected) {
        (Some(rows), Some(expected)) if rows != expected => tracing::warn!(
            "    ⚠ Loaded {} rows into '{}' but the file holds {} records",
            rows,
            table,
            expected
        ),
        (None, _) => tracing::debug!("psql did not report a COPY count"),
        _ => {}
    }

    let rows = rows.or(expected).unwrap_or(0);
    tracing::info!(
        "    ✓ Successfully imported {} rows into table '{}'.",
        rows,
        table
    );

    let bytes = std::fs::metadata(&file.path).map(|m| m.len()).unwrap_or(0);
    Ok(Some((rows, bytes)))
}
