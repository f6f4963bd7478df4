// ABOUTME: Decodes client output in the character set the source database emits
// ABOUTME: Strict UTF-8 by default, any WHATWG label (latin-1, cp1252, ...) on request

use anyhow::{bail, Result};
use encoding_rs::{Encoding, UTF_8};

/// Remediation hint shown with every decode failure
pub const ENCODING_HINT: &str =
    "Try using a different encoding with the --encoding flag, such as 'latin-1' or 'cp1252'.";

/// Output could not be decoded with the configured encoding
#[derive(Debug, thiserror::Error)]
#[error(
    "A character encoding error occurred. The database output is not valid '{label}'.\n\
     {hint}\n\
     Details: {details}"
)]
pub struct DecodeError {
    pub label: String,
    pub details: String,
    pub hint: &'static str,
}

/// A resolved output encoding
#[derive(Debug, Clone, Copy)]
pub struct OutputEncoding {
    label: &'static str,
    encoding: &'static Encoding,
}

impl OutputEncoding {
    /// Resolve an encoding label such as `utf-8`, `latin-1` or `cp1252`
    ///
    /// # Errors
    ///
    /// Returns an error for labels `encoding_rs` does not know.
    pub fn from_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        // Common aliases WHATWG does not list
        let lookup = match normalized.as_str() {
            "latin-1" | "latin_1" => "latin1",
            "cp-1252" => "cp1252",
            other => other,
        };

        match Encoding::for_label(lookup.as_bytes()) {
            Some(encoding) => Ok(Self {
                label: encoding.name(),
                encoding,
            }),
            None => bail!(
                "Unknown encoding '{}'. Use a label such as 'utf-8', 'latin-1' or 'cp1252'.",
                label
            ),
        }
    }

    pub fn utf8() -> Self {
        Self {
            label: UTF_8.name(),
            encoding: UTF_8,
        }
    }

    pub fn name(&self) -> &'static str {
        self.label
    }

    /// Decode raw client output
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the bytes are malformed for this
    /// encoding. Single-byte encodings map every byte, so in practice only
    /// UTF-8 (and multi-byte encodings) can fail.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        if self.encoding == UTF_8 {
            return match std::str::from_utf8(bytes) {
                Ok(text) => Ok(text.to_string()),
                Err(e) => Err(self.error(e.to_string()).into()),
            };
        }

        match self
            .encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
        {
            Some(text) => Ok(text.into_owned()),
            None => Err(self
                .error(format!("malformed {} byte sequence", self.label))
                .into()),
        }
    }

    fn error(&self, details: String) -> DecodeError {
        DecodeError {
            label: self.label.to_string(),
            details,
            hint: ENCODING_HINT,
        }
    }
}

impl Default for OutputEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}
