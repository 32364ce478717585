//! Picks the source profile a CSV file was written with.

use crate::importer::profiles::{GENERIC, PROFILES, SourceProfile, TextEncoding};
use crate::importer::source::{SourceFile, read_headers};
use std::path::Path;
use tracing::{debug, info, warn};

/// Returns the first registered profile whose fingerprint is satisfied by
/// `headers`, or the generic profile when none is.
pub fn detect_source(headers: &[String]) -> &'static SourceProfile {
    if headers.is_empty() {
        return &GENERIC;
    }

    match PROFILES
        .iter()
        .copied()
        .filter(|p| !p.is_generic())
        .find(|p| p.matches(headers))
    {
        Some(profile) => {
            info!(source = profile.id, name = profile.name, "Source detected");
            profile
        }
        None => {
            info!(?headers, "No known source matched, using generic profile");
            &GENERIC
        }
    }
}

/// Detects the source of the file at `path`.
///
/// The header row is decoded with UTF-8, then Latin-1, then Windows-1252;
/// the first encoding that yields a non-empty header wins. Unreadable or
/// undecodable files map to the generic profile.
pub fn detect_source_file(path: impl AsRef<Path>) -> &'static SourceProfile {
    let path = path.as_ref();
    let file = match SourceFile::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read file for source detection");
            return &GENERIC;
        }
    };

    for encoding in TextEncoding::PROBE_ORDER {
        let Some(text) = encoding.decode(file.contents()) else {
            debug!(encoding = encoding.as_str(), "Header decode failed, trying next encoding");
            continue;
        };

        match read_headers(&text) {
            Ok(headers) if !headers.is_empty() => return detect_source(&headers),
            Ok(_) => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not parse CSV header");
                return &GENERIC;
            }
        }
    }

    &GENERIC
}
