//! `.env` loading for the plugin directory.
//!
//! Values are read into a map and never exported to the process environment,
//! so the file can be re-read on every refresh without leaking into other
//! lookups. The format is plain `KEY=VALUE` lines: no variable expansion, no
//! inline comments, no multi-line values. A bad line is skipped on its own.

use std::collections::HashMap;
use std::path::Path;

/// Parses `.env` content into a map. Later duplicates overwrite earlier ones;
/// malformed lines are skipped.
pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_line(trimmed) {
            Some((key, value)) => {
                values.insert(key.to_string(), value.to_string());
            }
            None => tracing::debug!("Skipping malformed .env line {}", index + 1),
        }
    }
    values
}

/// Reads a `.env` file. Missing or unreadable files yield an empty map.
pub fn load_dotenv(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_dotenv(&content),
        Err(e) => {
            tracing::debug!("No .env at {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, unquote(value.trim())))
}

/// Strips one pair of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
