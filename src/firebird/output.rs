// ABOUTME: Cleans the text isql prints around query results
// ABOUTME: Drops header, separator and blank lines; reassembles quoted multi-line rows

/// Column headers printed above the two catalog queries
const CATALOG_HEADERS: &[&str] = &["RDB$RELATION_NAME", "RDB$FIELD_NAME"];

/// Interactive prompts isql may echo when reading from a pipe
const PROMPTS: &[&str] = &["SQL>", "CON>"];

/// Checks if a line from isql output is a header, separator, or empty
///
/// # Examples
///
/// ```
/// # use tablehop::firebird::output::is_junk_line;
/// assert!(is_junk_line("   "));
/// assert!(is_junk_line("==============================="));
/// assert!(is_junk_line("RDB$RELATION_NAME"));
/// assert!(!is_junk_line("CUSTOMER"));
/// ```
pub fn is_junk_line(line: &str) -> bool {
    let stripped = strip_prompts(line).trim();

    if stripped.is_empty() {
        return true;
    }

    if stripped.chars().all(|c| c == '=') {
        return true;
    }

    CATALOG_HEADERS.contains(&stripped)
}

/// Remove echoed `SQL> ` / `CON> ` prompts from the start of a line
pub fn strip_prompts(line: &str) -> &str {
    let mut rest = line;
    while let Some(after) = PROMPTS
        .iter()
        .find_map(|p| rest.trim_start().strip_prefix(p))
    {
        rest = after.trim_start();
    }
    rest
}

/// Split catalog query output into trimmed values, dropping junk lines
pub fn clean_catalog_output(stdout: &str) -> Vec<String> {
    stdout
        .trim()
        .lines()
        .filter(|line| !is_junk_line(line))
        .map(|line| strip_prompts(line).trim().to_string())
        .collect()
}

/// One cleaned line of a data export
#[derive(Debug, PartialEq, Eq)]
pub struct DataLine<'a> {
    pub text: &'a str,
    /// False while a quoted field continues onto the next line
    pub completes_record: bool,
}

/// Line-by-line cleaner for `SET HEADING OFF` data output
///
/// Rows arrive as pre-formatted interchange records. Outside a quoted
/// field, isql's blank lines are dropped and its column padding is
/// trimmed from the right. Inside a quoted field that spans lines the
/// text is kept verbatim.
#[derive(Debug, Default)]
pub struct DataLineCleaner {
    in_quotes: bool,
}

impl DataLineCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clean one line (without its line terminator)
    ///
    /// Returns `None` for lines that carry no data.
    pub fn clean<'a>(&mut self, raw: &'a str) -> Option<DataLine<'a>> {
        let line = raw.trim_end_matches(['\r', '\n']);
        let starts_quoted = self.in_quotes;

        let line = if starts_quoted {
            line
        } else {
            strip_prompts(line)
        };

        let quotes = line.bytes().filter(|b| *b == b'"').count();
        let ends_quoted = starts_quoted ^ (quotes % 2 == 1);
        self.in_quotes = ends_quoted;

        let text = if ends_quoted { line } else { line.trim_end() };

        if !starts_quoted && !ends_quoted && text.trim().is_empty() {
            return None;
        }

        Some(DataLine {
            text,
            completes_record: !ends_quoted,
        })
    }

    /// True when the stream ended inside a quoted field
    pub fn is_incomplete(&self) -> bool {
        self.in_quotes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_junk_lines() {
        assert!(is_junk_line(""));
        assert!(is_junk_line("   \t"));
        assert!(is_junk_line("=="));
        assert!(is_junk_line("   =======================================   "));
        assert!(is_junk_line("RDB$RELATION_NAME"));
        assert!(is_junk_line("RDB$FIELD_NAME                 "));
        assert!(is_junk_line("SQL> "));

        assert!(!is_junk_line("CUSTOMER"));
        assert!(!is_junk_line("= not a separator"));
        assert!(!is_junk_line("RDB$RELATION_NAME_X"));
    }

    #[test]
    fn test_clean_catalog_output() {
        let stdout = "\n\
RDB$RELATION_NAME\n\
===============================================================================\n\
COUNTRY                                                                        \n\
JOB                                                                            \n\
\n\
SALES                                                                          \n\
\n";
        assert_eq!(clean_catalog_output(stdout), vec!["COUNTRY", "JOB", "SALES"]);
    }

    #[test]
    fn test_clean_catalog_output_with_prompts() {
        let stdout = "SQL> \nRDB$FIELD_NAME\n=====\nSQL> CUST_NO\nCUSTOMER\nSQL> ";
        assert_eq!(clean_catalog_output(stdout), vec!["CUST_NO", "CUSTOMER"]);
    }

    #[test]
    fn test_clean_catalog_output_empty() {
        assert!(clean_catalog_output("").is_empty());
        assert!(clean_catalog_output("\n\n  \n").is_empty());
    }

    #[test]
    fn test_data_cleaner_trims_padding_and_blank_lines() {
        let mut cleaner = DataLineCleaner::new();

        assert_eq!(cleaner.clean(""), None);
        assert_eq!(
            cleaner.clean("\"1\"|\"Alice\"        \r\n"),
            Some(DataLine {
                text: "\"1\"|\"Alice\"",
                completes_record: true
            })
        );
        assert_eq!(cleaner.clean("                    "), None);
        assert_eq!(
            cleaner.clean("\"2\"|      "),
            Some(DataLine {
                text: "\"2\"|",
                completes_record: true
            })
        );
        assert!(!cleaner.is_incomplete());
    }

    #[test]
    fn test_data_cleaner_keeps_multiline_fields_verbatim() {
        let mut cleaner = DataLineCleaner::new();

        let first = cleaner.clean("\"7\"|\"first line   ").unwrap();
        assert_eq!(first.text, "\"7\"|\"first line   ");
        assert!(!first.completes_record);

        let blank = cleaner.clean("").unwrap();
        assert_eq!(blank.text, "");
        assert!(!blank.completes_record);

        let last = cleaner.clean("last \"\"quoted\"\" line\"     ").unwrap();
        assert_eq!(last.text, "last \"\"quoted\"\" line\"");
        assert!(last.completes_record);
        assert!(!cleaner.is_incomplete());
    }

    #[test]
    fn test_data_cleaner_escaped_quotes_do_not_open_field() {
        let mut cleaner = DataLineCleaner::new();
        let line = cleaner.clean("\"say \"\"hi\"\"\"|\"x\"").unwrap();
        assert!(line.completes_record);
    }

    #[test]
    fn test_data_cleaner_reports_truncated_stream() {
        let mut cleaner = DataLineCleaner::new();
        cleaner.clean("\"1\"|\"never closed");
        assert!(cleaner.is_incomplete());
    }
}
