// ABOUTME: Command implementations, one per transfer step
// ABOUTME: Exports check-tools, export-firebird, import-postgres and import-sqlite

pub mod check;
pub mod export;
pub mod import_postgres;
pub mod import_sqlite;

pub use check::check_tools;
pub use export::{export_firebird, ExportOptions};
pub use import_postgres::{import_postgres, PostgresImportOptions};
pub use import_sqlite::{import_sqlite, SqliteImportOptions};

use crate::utils::{format_bytes, format_elapsed};
use std::time::Instant;

/// Per-run tally logged when a command finishes
#[derive(Debug)]
pub struct TransferSummary {
    pub completed: usize,
    pub skipped: Vec<String>,
    pub filtered: usize,
    pub rows: u64,
    pub bytes: u64,
    started: Instant,
}

impl TransferSummary {
    pub fn start() -> Self {
        Self {
            completed: 0,
            skipped: Vec::new(),
            filtered: 0,
            rows: 0,
            bytes: 0,
            started: Instant::now(),
        }
    }

    pub fn record_success(&mut self, rows: u64, bytes: u64) {
        self.completed += 1;
        self.rows += rows;
        self.bytes += bytes;
    }

    pub fn record_skip(&mut self, table: &str) {
        self.skipped.push(table.to_string());
    }

    pub fn record_filtered(&mut self) {
        self.filtered += 1;
    }

    pub fn log(&self, verb: &str) {
        tracing::info!(
            "✓ {} {} table(s), {} row(s), {} in {}",
            verb,
            self.completed,
            self.rows,
            format_bytes(self.bytes),
            format_elapsed(self.started.elapsed())
        );
        if self.filtered > 0 {
            tracing::info!("  {} table(s) excluded by filters", self.filtered);
        }
        if !self.skipped.is_empty() {
            tracing::warn!(
                "⚠ {} table(s) skipped: {}",
                self.skipped.len(),
                self.skipped.join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_tallies() {
        let mut summary = TransferSummary::start();
        summary.record_success(10, 100);
        summary.record_success(5, 50);
        summary.record_skip("BROKEN");
        summary.record_filtered();

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.rows, 15);
        assert_eq!(summary.bytes, 150);
        assert_eq!(summary.skipped, vec!["BROKEN"]);
        assert_eq!(summary.filtered, 1);
    }
}
