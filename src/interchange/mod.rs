// ABOUTME: The pipe-delimited interchange file passed from exporters to importers
// ABOUTME: Discovers .csv/.csv.gz files, reads headers and counts records

pub mod writer;

pub use writer::InterchangeWriter;

use anyhow::{bail, Context, Result};
use flate2::read::MultiGzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Field separator of the interchange format
pub const DELIMITER: u8 = b'|';

/// Extension of plain interchange files
pub const PLAIN_EXTENSION: &str = ".csv";

/// Extension of gzip-compressed interchange files
pub const GZIP_EXTENSION: &str = ".csv.gz";

/// One interchange file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterchangeFile {
    pub path: PathBuf,
    pub compressed: bool,
}

impl InterchangeFile {
    /// Classify a path by its extension; `None` if it is not an interchange file
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.starts_with('.') {
            return None;
        }

        if name.ends_with(GZIP_EXTENSION) {
            Some(Self {
                path: path.to_path_buf(),
                compressed: true,
            })
        } else if name.ends_with(PLAIN_EXTENSION) {
            Some(Self {
                path: path.to_path_buf(),
                compressed: false,
            })
        } else {
            None
        }
    }

    /// Path of the file an exporter writes for `table`
    pub fn output_path(dir: &Path, table: &str, compressed: bool) -> PathBuf {
        let extension = if compressed {
            GZIP_EXTENSION
        } else {
            PLAIN_EXTENSION
        };
        dir.join(format!("{}{}", table, extension))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Target table: the file name up to its first `.`
    pub fn table_name(&self) -> String {
        let name = self.file_name();
        name.split('.').next().unwrap_or_default().to_string()
    }

    /// Open the file for reading, gunzipping transparently
    pub fn open_reader(&self) -> Result<Box<dyn BufRead + Send>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open '{}'", self.path.display()))?;

        if self.compressed {
            Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
        } else {
            Ok(Box::new(BufReader::new(file)))
        }
    }

    /// Read the column names from the first line
    ///
    /// Returns `Ok(None)` when the file is empty or its first line is
    /// blank; importers warn and skip such files.
    pub fn read_header(&self) -> Result<Option<Vec<String>>> {
        let mut reader = self.open_reader()?;
        let mut first = String::new();
        reader
            .read_line(&mut first)
            .with_context(|| format!("Failed to read header of '{}'", self.path.display()))?;

        let line = first.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(DELIMITER)
            .from_reader(line.as_bytes());

        let record = match csv_reader.records().next() {
            Some(record) => record.with_context(|| {
                format!("Failed to parse header of '{}'", self.path.display())
            })?,
            None => return Ok(None),
        };

        Ok(Some(record.iter().map(|c| c.trim().to_string()).collect()))
    }

    /// Count the records after the header line
    ///
    /// Quoted fields may span lines, so this parses the file rather than
    /// counting newlines.
    pub fn count_records(&self) -> Result<u64> {
        let reader = self.open_reader()?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(DELIMITER)
            .from_reader(reader);

        let mut count = 0;
        for record in csv_reader.records() {
            record.with_context(|| {
                format!(
                    "Failed to parse record {} of '{}'",
                    count + 1,
                    self.path.display()
                )
            })?;
            count += 1;
        }
        Ok(count)
    }
}

/// Find every `*.csv` and `*.csv.gz` file directly inside `dir`
///
/// Files are returned sorted by name. Two files that map to the same table
/// (e.g. `A.csv` and `A.csv.gz`) are both returned; a warning is logged
/// since their rows will land in one table.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or holds no
/// interchange files.
pub fn discover_files(dir: &Path) -> Result<Vec<InterchangeFile>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory '{}'", dir.display()))?;

    let mut files: Vec<InterchangeFile> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| InterchangeFile::from_path(&path))
        .collect();

    if files.is_empty() {
        bail!("No .csv or .csv.gz files found in '{}'.", dir.display());
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut seen: HashMap<String, String> = HashMap::new();
    for file in &files {
        if let Some(previous) = seen.insert(file.table_name(), file.file_name()) {
            tracing::warn!(
                "⚠ '{}' and '{}' both load into table '{}'",
                previous,
                file.file_name(),
                file.table_name()
            );
        }
    }

    Ok(files)
}
