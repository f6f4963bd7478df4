// ABOUTME: import-sqlite command - loads interchange files into a SQLite database file
// ABOUTME: Uses the sqlite3 shell's .import; gzipped inputs go through a temp file

use crate::commands::TransferSummary;
use crate::filters::TableFilter;
use crate::interactive;
use crate::interchange::{self, InterchangeFile};
use crate::sqlite::{self, Sqlite3Client};
use crate::tools;
use crate::utils;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct SqliteImportOptions {
    pub input_dir: PathBuf,
    pub sqlite_db: String,
    pub sqlite3_path: Option<PathBuf>,
    pub drop_existing: bool,
    pub assume_yes: bool,
    pub filter: TableFilter,
}

/// Import every interchange file in `options.input_dir` into `options.sqlite_db`
///
/// Table names are the file names up to the first `.`, case preserved.
pub async fn import_sqlite(options: SqliteImportOptions) -> Result<TransferSummary> {
    let sqlite3 = tools::resolve_tool("sqlite3", options.sqlite3_path.as_deref())?;
    tracing::info!("Using sqlite3 at {}", sqlite3.path.display());

    let database = sqlite::validate_target_path(&options.sqlite_db)?;
    utils::ensure_input_dir(&options.input_dir)?;
    let files = interchange::discover_files(&options.input_dir)?;

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
        "Found {} files to import into SQLite database '{}'.",
        selected.len(),
        database.display()
    );

    if options.drop_existing
        && !interactive::confirm_drop(
            &format!("SQLite database '{}'", database.display()),
            selected.len(),
            options.assume_yes,
        )?
    {
        tracing::info!("Import cancelled by user.");
        return Ok(summary);
    }

    let client = Sqlite3Client::new(&sqlite3.path, &database);

    for file in &selected {
        let table = file.table_name();
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
                    "    - An error occurred while importing {}: {:#}",
                    file.file_name(),
                    e
                );
                summary.record_skip(&table);
            }
        }
    }

    tracing::info!("SQLite import process complete.");
    summary.log("Imported");

    Ok(summary)
}

async fn import_file(
    client: &Sqlite3Client,
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
            .execute(&sqlite::drop_table_sql(table))
            .await
            .with_context(|| format!("Failed to drop table '{}'", table))?;
    }

    if let Err(e) = client
        .execute(&sqlite::create_table_sql(table, &columns))
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

    let before = client.count_rows(table).await?;

    // Held until the import finishes; dropping it deletes the file
    let decompressed = if file.compressed {
        Some(decompress_to_temp(file)?)
    } else {
        None
    };
    let source: &Path = match &decompressed {
        Some(temp) => temp.path(),
        None => &file.path,
    };

    if let Err(e) = client.run_script(&sqlite::import_script(source, table)).await {
        if tools::is_fatal(&e) {
            return Err(e);
        }
        tracing::warn!("    - {:#}", e);
        tracing::warn!("    - Failed to import data into table '{}'.", table);
        return Ok(None);
    }
    drop(decompressed);

    let after = client.count_rows(table).await?;
    let rows = after.saturating_sub(before);

    match file.count_records() {
        Ok(expected) if expected != rows => tracing::warn!(
            "    ⚠ Loaded {} rows into '{}' but the file holds {} records",
            rows,
            table,
            expected
        ),
        Ok(_) => {}
        Err(e) => tracing::warn!("    - Could not count records in the file: {:#}", e),
    }

    tracing::info!(
        "    ✓ Successfully imported {} rows into table '{}'.",
        rows,
        table
    );

    let bytes = std::fs::metadata(&file.path).map(|m| m.len()).unwrap_or(0);
    Ok(Some((rows, bytes)))
}

/// Gunzip a `.csv.gz` into a temporary `.csv` removed on drop
fn decompress_to_temp(file: &InterchangeFile) -> Result<NamedTempFile> {
    let mut temp = tempfile::Builder::new()
        .prefix("tablehop-")
        .suffix(".csv")
        .tempfile()
        .context("Failed to create temporary file for decompression")?;

    let mut reader = file.open_reader()?;
    std::io::copy(&mut reader, temp.as_file_mut())
        .with_context(|| format!("Failed to decompress '{}'", file.path.display()))?;
    temp.as_file_mut()
        .flush()
        .context("Failed to flush decompressed data")?;

    tracing::debug!(
        "Decompressed {} to {}",
        file.file_name(),
        temp.path().display()
    );
    Ok(temp)
}
