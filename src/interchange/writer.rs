// ABOUTME: Writes interchange files, optionally gzip-compressed
// ABOUTME: Header and records use CSV quoting with '|' as the delimiter

use super::DELIMITER;
use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Sink {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Sink::Plain(w) => w,
            Sink::Gzip(w) => w,
        }
    }
}

/// Streaming writer for one interchange file
pub struct InterchangeWriter {
    path: PathBuf,
    sink: Sink,
    lines: u64,
}

/// What a finished file looks like on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenFile {
    /// Lines written after the header
    pub lines: u64,
    /// Size on disk (compressed size for `.csv.gz`)
    pub bytes: u64,
}

impl InterchangeWriter {
    /// Create (truncate) `path` and write the header line
    pub fn create(path: &Path, compress: bool, columns: &[String]) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        let buffered = BufWriter::new(file);

        let sink = if compress {
            Sink::Gzip(GzEncoder::new(buffered, Compression::default()))
        } else {
            Sink::Plain(buffered)
        };

        let mut writer = Self {
            path: path.to_path_buf(),
            sink,
            lines: 0,
        };

        let header = encode_record(columns.iter().map(String::as_str))?;
        writer
            .sink
            .writer()
            .write_all(&header)
            .with_context(|| format!("Failed to write header to '{}'", path.display()))?;

        Ok(writer)
    }

    /// Append a line that is already in interchange format
    ///
    /// Used for rows the database formatted itself; a newline is appended.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.sink
            .writer()
            .write_all(&bytes)
            .with_context(|| format!("Failed to write to '{}'", self.path.display()))?;
        self.lines += 1;
        Ok(())
    }

    /// Append one record, quoting fields as needed
    pub fn write_record<'a, I>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let encoded = encode_record(fields)?;
        self.sink
            .writer()
            .write_all(&encoded)
            .with_context(|| format!("Failed to write to '{}'", self.path.display()))?;
        self.lines += 1;
        Ok(())
    }

    /// Flush everything (including the gzip trailer) and report the result
    pub fn finish(self) -> Result<WrittenFile> {
        let path = self.path;
        let mut buffered = match self.sink {
            Sink::Plain(w) => w,
            Sink::Gzip(encoder) => encoder
                .finish()
                .with_context(|| format!("Failed to finish gzip stream '{}'", path.display()))?,
        };
        buffered
            .flush()
            .with_context(|| format!("Failed to flush '{}'", path.display()))?;
        drop(buffered);

        let bytes = std::fs::metadata(&path)
            .with_context(|| format!("Failed to stat '{}'", path.display()))?
            .len();

        Ok(WrittenFile {
            lines: self.lines,
            bytes,
        })
    }

    /// Drop the partially written file
    pub fn discard(self) -> Result<()> {
        let path = self.path;
        drop(self.sink);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove partial file '{}'", path.display()))?;
        }
        Ok(())
    }
}

/// Encode one record with CSV quoting, terminated by `\n`
pub fn encode_record<'a, I>(fields: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer
        .write_record(fields)
        .context("Failed to encode record")?;
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to encode record: {}", e.error()))
}
