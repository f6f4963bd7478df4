// ABOUTME: check-tools command - reports which database clients are installed
// ABOUTME: Looks in PATH first, then in the common per-OS install directories

use crate::tools::{self, Platform, KNOWN_TOOLS};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;

/// Result of looking for one client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    FoundInPath,
    FoundInCommonDirectory,
    NotFound,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolReport {
    pub tool: String,
    pub description: String,
    pub status: ToolStatus,
    pub path: Option<PathBuf>,
}

/// Check one tool, logging each step
pub fn check_tool(tool: &str, description: &str) -> ToolReport {
    tracing::info!("Checking for: {} ({})", description, tool);

    let report = |status, path| ToolReport {
        tool: tool.to_string(),
        description: description.to_string(),
        status,
        path,
    };

    if let Some(path) = tools::find_on_path(tool) {
        tracing::info!("  ✓ [ FOUND ] Found at: {}", path.display());
        return report(ToolStatus::FoundInPath, Some(path));
    }

    tracing::info!("  ⚠ [ NOT IN PATH ] Searching common directories...");

    if let Some(path) = tools::find_in_dirs(tool, tools::search_dirs(Platform::current(), tool)) {
        tracing::info!("  ✓ [ FOUND ] Found at: {}", path.display());
        return report(ToolStatus::FoundInCommonDirectory, Some(path));
    }

    tracing::warn!(
        "  ✗ [ NOT FOUND ] Could not find {} in PATH or common directories.",
        tool
    );
    report(ToolStatus::NotFound, None)
}

/// Check every known database client
///
/// With `json`, the reports are also printed to stdout as a JSON array.
/// With `strict`, a missing tool turns into an error (non-zero exit).
pub fn check_tools(json: bool, strict: bool) -> Result<Vec<ToolReport>> {
    tracing::info!("Starting database tool checks...");

    let reports: Vec<ToolReport> = KNOWN_TOOLS
        .iter()
        .map(|(tool, description)| check_tool(tool, description))
        .collect();

    tracing::info!("Checks complete.");

    if json {
        let rendered =
            serde_json::to_string_pretty(&reports).context("Failed to render tool report")?;
        println!("{}", rendered);
    }

    if strict {
        let missing: Vec<&str> = reports
            .iter()
            .filter(|r| r.status == ToolStatus::NotFound)
            .map(|r| r.tool.as_str())
            .collect();
        if !missing.is_empty() {
            bail!("Missing database client tools: {}", missing.join(", "));
        }
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_every_known_tool_in_order() {
        let reports = check_tools(false, false).unwrap();
        let names: Vec<&str> = reports.iter().map(|r| r.tool.as_str()).collect();
        assert_eq!(names, vec!["psql", "mysql", "isql", "sqlite3"]);

        for report in &reports {
            match report.status {
                ToolStatus::NotFound => assert!(report.path.is_none()),
                _ => assert!(report.path.is_some()),
            }
        }
    }

    #[test]
    fn test_unknown_tool_not_found() {
        let report = check_tool("no-such-client-zz", "Nothing");
        assert_eq!(report.status, ToolStatus::NotFound);
        assert!(report.path.is_none());
    }

    #[test]
    fn test_report_serializes_snake_case() {
        let report = ToolReport {
            tool: "psql".into(),
            description: "PostgreSQL Client".into(),
            status: ToolStatus::FoundInCommonDirectory,
            path: Some(PathBuf::from("/usr/bin/psql")),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "found_in_common_directory");
        assert_eq!(json["path"], "/usr/bin/psql");
    }
}
