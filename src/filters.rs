// ABOUTME: Table include/exclude filtering for selective transfer
// ABOUTME: Applied to catalog tables on export and to file-derived tables on import

use anyhow::{bail, Result};

/// Which tables an export or import should touch
#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    include_tables: Option<Vec<String>>,
    exclude_tables: Option<Vec<String>>,
}

impl TableFilter {
    /// Creates a filter from CLI arguments
    ///
    /// Names are compared case-insensitively: Firebird stores unquoted
    /// names upper-case while the PostgreSQL importer lowercases them.
    pub fn new(
        include_tables: Option<Vec<String>>,
        exclude_tables: Option<Vec<String>>,
    ) -> Result<Self> {
        if include_tables.is_some() && exclude_tables.is_some() {
            bail!("Cannot use both --include-tables and --exclude-tables");
        }

        let normalize = |tables: Vec<String>| -> Result<Vec<String>> {
            tables
                .into_iter()
                .map(|t| {
                    let trimmed = t.trim();
                    if trimmed.is_empty() {
                        bail!("Table names in --include-tables/--exclude-tables cannot be empty");
                    }
                    Ok(trimmed.to_lowercase())
                })
                .collect()
        };

        Ok(Self {
            include_tables: include_tables.map(normalize).transpose()?,
            exclude_tables: exclude_tables.map(normalize).transpose()?,
        })
    }

    /// Creates an empty filter (transfer everything)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Determines if a table should be transferred
    pub fn should_transfer(&self, table_name: &str) -> bool {
        let name = table_name.trim().to_lowercase();

        if let Some(ref include) = self.include_tables {
            if !include.contains(&name) {
                return false;
            }
        }

        if let Some(ref exclude) = self.exclude_tables {
            if exclude.contains(&name) {
                return false;
            }
        }

        true
    }
}
