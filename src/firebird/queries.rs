// ABOUTME: SQL text sent to isql for catalog discovery and row export
// ABOUTME: Rows are formatted server-side into quoted, pipe-delimited records

use crate::utils::{quote_identifier, quote_literal};

/// User tables (no system tables, no views)
pub const LIST_TABLES_SQL: &str = "SELECT rdb$relation_name FROM rdb$relations \
     WHERE rdb$system_flag = 0 AND rdb$view_blr IS NULL;";

/// Default VARCHAR length each column is cast to before concatenation
pub const DEFAULT_FIELD_LENGTH: u32 = 1024;

/// Column names of `table` in declaration order
pub fn list_columns_sql(table: &str) -> String {
    format!(
        "SELECT rdb$field_name FROM rdb$relation_fields \
         WHERE rdb$relation_name = {} ORDER BY rdb$field_position;",
        quote_literal(table)
    )
}

/// Field text emitted for NULL when other fields share the line
pub const NULL_FIELD: &str = "";

/// Field text emitted for NULL in a one-column table
///
/// A lone empty field would print as a blank line, which the cleaner
/// cannot tell apart from isql's own spacing, so the row is kept as an
/// empty quoted string instead.
pub const LONE_NULL_FIELD: &str = "\"\"";

/// Expression rendering one column as an interchange field
///
/// Non-NULL values are wrapped in double quotes with inner quotes doubled;
/// NULL becomes `null_field` (concatenating NULL yields NULL, which
/// COALESCE replaces).
pub fn field_expression(column: &str, field_length: u32, null_field: &str) -> String {
    format!(
        "COALESCE('\"' || REPLACE(CAST({} AS VARCHAR({})), '\"', '\"\"') || '\"', {})",
        quote_identifier(column),
        field_length,
        quote_literal(null_field)
    )
}

/// Full export statement for one table
///
/// `SET HEADING OFF` stops isql from printing the column header and the
/// `===` separator above the rows.
pub fn export_table_sql(table: &str, columns: &[String], field_length: u32) -> String {
    let null_field = if columns.len() == 1 {
        LONE_NULL_FIELD
    } else {
        NULL_FIELD
    };
    let fields: Vec<String> = columns
        .iter()
        .map(|c| field_expression(c, field_length, null_field))
        .collect();

    format!(
        "SET HEADING OFF;\nSELECT {} FROM {};\n",
        fields.join(" || '|' || "),
        quote_identifier(table)
    )
}
