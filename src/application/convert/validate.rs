//! Cheap syntactic gate applied before any expensive work.
//!
//! This is deliberately a prefix heuristic, not a parser: it exists only to
//! reject obviously non-document input before a subprocess is spawned.

use thiserror::Error;

/// Document-root markers accepted after leading whitespace, compared
/// ASCII-case-insensitively.
const ROOT_MARKERS: [&str; 2] = ["<!doctype", "<html"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidPayload {
    #[error("request body is empty")]
    Empty,
    #[error("payload is not valid UTF-8 text")]
    NotUtf8,
    #[error("payload does not start with an HTML document root")]
    MissingRootMarker,
}

/// Check that `text` plausibly is an HTML document.
///
/// Rejects empty input and anything that, after trimming leading
/// whitespace, does not begin with `<!doctype` or `<html`. Only the first
/// few bytes after the whitespace are ever inspected.
pub fn validate_document(text: &str) -> Result<(), InvalidPayload> {
    if text.is_empty() {
        return Err(InvalidPayload::Empty);
    }

    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Err(InvalidPayload::Empty);
    }

    let head = trimmed.as_bytes();
    let recognized = ROOT_MARKERS.iter().any(|marker| {
        let marker = marker.as_bytes();
        head.len() >= marker.len() && head[..marker.len()].eq_ignore_ascii_case(marker)
    });

    if recognized {
        Ok(())
    } else {
        Err(InvalidPayload::MissingRootMarker)
    }
}
