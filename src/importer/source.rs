//! Reading source files: optional gunzip, content hashing, encoding probe
//! and CSV row extraction.

use crate::importer::error::ImportError;
use crate::importer::profiles::TextEncoding;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One CSV data row keyed by header name.
pub type RawRow = HashMap<String, String>;

/// A source file loaded into memory.
pub struct SourceFile {
    pub path: PathBuf,
    /// SHA-256 of the bytes on disk, lowercase hex.
    pub content_hash: String,
    contents: Vec<u8>,
}

impl SourceFile {
    /// Reads `path`, transparently gunzipping files named `*.gz`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref().to_path_buf();
        let raw = std::fs::read(&path)?;
        let content_hash = content_hash(&raw);

        let contents = if is_gzip(&path) {
            let mut decoded = Vec::new();
            GzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
            debug!(
                path = %path.display(),
                compressed = raw.len(),
                decompressed = decoded.len(),
                "Gunzipped source file"
            );
            decoded
        } else {
            raw
        };

        Ok(Self {
            path,
            content_hash,
            contents,
        })
    }

    /// Final path component, used as the file identity in import records.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Decodes the contents, trying `preferred` first and then the probe
    /// order (UTF-8, Latin-1, Windows-1252).
    pub fn decode(
        &self,
        preferred: Option<TextEncoding>,
    ) -> Result<(String, TextEncoding), ImportError> {
        preferred
            .into_iter()
            .chain(TextEncoding::PROBE_ORDER)
            .find_map(|encoding| {
                encoding
                    .decode(&self.contents)
                    .map(|text| (text, encoding))
            })
            .ok_or_else(|| ImportError::Undecodable {
                path: self.path.clone(),
            })
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

/// Hex SHA-256 digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Header names of a CSV text, empty when there is no header row.
pub fn read_headers(text: &str) -> Result<Vec<String>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    Ok(rdr.headers()?.iter().map(str::to_string).collect())
}

/// Parses a CSV text into its header list and keyed rows.
///
/// Short rows only carry the columns they have; extra cells are dropped.
pub fn read_rows(text: &str) -> Result<(Vec<String>, Vec<RawRow>), csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row: RawRow = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(row);
    }

    Ok((headers, rows))
}
