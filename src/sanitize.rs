// ABOUTME: Sanitization helpers for the deckforge pipeline
// ABOUTME: Strips control characters, escapes markdown and validates image references and filenames

use crate::errors::{DeckError, Result};
use log::debug;
use url::Url;

const MARKDOWN_SPECIALS: [char; 8] = ['\\', '*', '_', '`', '[', ']', '<', '>'];
const MAX_FILENAME_BYTES: usize = 255;

/// Remove control characters, keeping newlines and tabs
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Backslash-escape the characters markdown would interpret inline,
/// backslash included
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_SPECIALS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Control-strip then escape: the form all slide text takes
pub fn clean_text(text: &str) -> String {
    escape_markdown(&strip_control_chars(text))
}

/// Validate an image reference. http(s) URLs come back canonicalized;
/// anything else must be a relative path that normalizes without
/// traversal. Invalid references yield `None`.
pub fn validate_image_ref(reference: &str) -> Option<String> {
    let reference = strip_control_chars(reference);
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let lowered = reference.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return match Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
                Some(url.to_string())
            }
            _ => {
                debug!("Dropping malformed image URL: {}", reference);
                None
            }
        };
    }

    if Url::parse(reference).is_ok() {
        // Any other scheme (data:, javascript:, file:, C:) is rejected
        debug!("Dropping image reference with unsupported scheme: {}", reference);
        return None;
    }

    normalize_relative_path(reference)
}

fn normalize_relative_path(path: &str) -> Option<String> {
    let unified = path.replace('\\', "/");
    if unified.starts_with('/') || unified.starts_with('~') {
        debug!("Dropping absolute image path: {}", path);
        return None;
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                debug!("Dropping image path with traversal: {}", path);
                return None;
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Validate a single path component used as an output filename
pub fn validate_safe_filename(name: &str) -> Result<String> {
    let invalid = |reason: &str| {
        Err(DeckError::InvalidResourcePath(format!(
            "unsafe filename '{}': {}",
            name.escape_debug(),
            reason
        )))
    };

    if name.trim().is_empty() {
        return invalid("empty");
    }
    if name.len() > MAX_FILENAME_BYTES {
        return invalid("too long");
    }
    if name.chars().any(char::is_control) {
        return invalid("contains control characters");
    }
    if name.contains('/') || name.contains('\\') {
        return invalid("contains a path separator");
    }
    if name == "." || name == ".." || name.contains("..") {
        return invalid("contains a traversal sequence");
    }
    if name.contains(':') {
        return invalid("contains a drive or stream separator");
    }

    Ok(name.to_string())
}
