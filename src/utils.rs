// ABOUTME: Utility functions for quoting, validation and human-readable output
// ABOUTME: Shared by the Firebird exporter and the PostgreSQL/SQLite importers

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;

/// Quote an SQL identifier (table or column name) with double quotes
///
/// Embedded double quotes are doubled, which is the escaping rule shared by
/// Firebird, PostgreSQL and SQLite for delimited identifiers.
///
/// # Examples
///
/// ```
/// # use tablehop::utils::quote_identifier;
/// assert_eq!(quote_identifier("users"), "\"users\"");
/// assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quote an SQL string literal with single quotes
///
/// # Examples
///
/// ```
/// # use tablehop::utils::quote_literal;
/// assert_eq!(quote_literal("CUSTOMERS"), "'CUSTOMERS'");
/// assert_eq!(quote_literal("O'BRIEN"), "'O''BRIEN'");
/// ```
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Validate a table name before it is interpolated into SQL
///
/// Table names reach SQL either from the Firebird catalog or from
/// interchange file names. They are always emitted through
/// [`quote_identifier`], so the only names rejected here are those no
/// engine accepts: empty names and names carrying control characters.
///
/// # Errors
///
/// Returns an error if the name is empty, whitespace-only, or contains a
/// control character (including NUL and line breaks).
pub fn validate_table_name(table_name: &str) -> Result<()> {
    if table_name.trim().is_empty() {
        bail!("Table name cannot be empty or whitespace-only");
    }

    if let Some(c) = table_name.chars().find(|c| c.is_control()) {
        bail!(
            "Table name '{}' contains control character \\x{:02x}",
            sanitize_identifier(table_name),
            c as u32
        );
    }

    Ok(())
}

/// Sanitize an identifier (table name, column name, etc.) for display
///
/// Removes control characters and limits length to prevent log injection
/// and keep error messages readable. This is for display only; SQL text
/// goes through [`quote_identifier`] and [`quote_literal`].
///
/// # Examples
///
/// ```
/// # use tablehop::utils::sanitize_identifier;
/// assert_eq!(sanitize_identifier("normal_table"), "normal_table");
/// assert_eq!(sanitize_identifier("table\x00name"), "tablename");
/// assert_eq!(sanitize_identifier("table\nname"), "tablename");
///
/// let long_name = "a".repeat(200);
/// assert_eq!(sanitize_identifier(&long_name).len(), 100);
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}

/// Create the export directory (and any missing parents)
pub fn ensure_output_dir(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        bail!(
            "Output path '{}' exists and is not a directory",
            path.display()
        );
    }

    std::fs::create_dir_all(path)
        .with_context(|| format!("Error creating output directory '{}'", path.display()))?;

    Ok(())
}

/// Check that an input directory exists before scanning it
pub fn ensure_input_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!(
            "Input directory '{}' does not exist or is not a directory",
            path.display()
        );
    }
    Ok(())
}

/// Format bytes into human-readable format
///
/// # Examples
///
/// ```
/// # use tablehop::utils::format_bytes;
/// assert_eq!(format_bytes(1024), "1.0 KB");
/// assert_eq!(format_bytes(1536), "1.5 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.1} {}", size, UNITS[unit_idx])
}

/// Format an elapsed duration for the end-of-run summary
///
/// Sub-minute durations keep one decimal of seconds; longer runs switch to
/// minutes and then hours.
pub fn format_elapsed(duration: Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1} minutes", secs / 60.0)
    } else {
        format!("{:.1} hours", secs / 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("CUSTOMER"), "\"CUSTOMER\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_identifier(""), "\"\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("EMPLOYEE"), "'EMPLOYEE'");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal("''"), "''''''");
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("users").is_ok());
        assert!(validate_table_name("RDB$PAGES").is_ok());
        assert!(validate_table_name("with space").is_ok());

        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("   ").is_err());
        assert!(validate_table_name("bad\nname").is_err());
        assert!(validate_table_name("bad\x00name").is_err());
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("normal_table"), "normal_table");
        assert_eq!(sanitize_identifier("table\x00name"), "tablename");
        assert_eq!(sanitize_identifier("table\nname"), "tablename");

        let long_name = "a".repeat(200);
        assert_eq!(sanitize_identifier(&long_name).len(), 100);
    }

    #[test]
    fn test_ensure_output_dir_creates_nested() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_output_dir(&nested).unwrap();
        assert!(nested.is_dir());

        // Existing directory is fine
        ensure_output_dir(&nested).unwrap();
    }

    #[test]
    fn test_ensure_output_dir_rejects_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(ensure_output_dir(&file).is_err());
    }

    #[test]
    fn test_ensure_input_dir() {
        let dir = tempdir().unwrap();
        assert!(ensure_input_dir(dir.path()).is_ok());
        assert!(ensure_input_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.0 B");
        assert_eq!(format_bytes(500), "500.0 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
        assert_eq!(format_bytes(1073741824), "1.0 GB");
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_elapsed(Duration::from_secs(90)), "1.5 minutes");
        assert_eq!(format_elapsed(Duration::from_secs(5400)), "1.5 hours");
    }
}
