//! Research notes on disk → [`Document`]s.
//!
//! A note is a markdown file with an optional `---`-delimited YAML header.
//! The header's top-level `doi`/`identifier` and `title` keys win; otherwise
//! the first `# ` heading supplies the title and the body is scanned for the
//! first DOI-looking token.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{CoreError, Result};
use crate::models::Document;

const NOTE_EXTENSIONS: &[&str] = &["md", "markdown"];
const IDENTIFIER_KEYS: &[&str] = &["doi", "identifier"];

static DOI_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b10\.\d{4,9}/[^\s"'<>]+"#).expect("valid regex")
});

/// Load every note under `dir`, recursively, in path order.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(CoreError::DirectoryNotFound(dir.display().to_string()));
    }

    let mut documents = Vec::new();
    for path in note_paths(dir) {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!("skipping unreadable note {}: {e}", path.display());
                continue;
            }
        };
        let id = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        documents.push(parse_document(&id, &text).with_path(path));
    }
    Ok(documents)
}

fn note_paths(dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_note_file(entry.path()) {
                    paths.push(entry.into_path());
                }
            }
            Err(e) => warn!("error walking notes directory: {e}"),
        }
    }
    paths.sort();
    paths
}

/// Check if a path looks like a markdown note.
pub fn is_note_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            NOTE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Build a [`Document`] from the text of a single note.
pub fn parse_document(id: &str, text: &str) -> Document {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let (header, body) = match split_header(text) {
        Some((yaml, body)) => (parse_header(id, yaml), body),
        None => (Mapping::new(), text),
    };

    let mut raw_identifier = None;
    let mut raw_title = None;
    for (key, value) in &header {
        let Some(key) = key.as_str().map(str::to_lowercase) else {
            continue;
        };
        let Some(value) = scalar_text(value) else {
            continue;
        };
        if raw_identifier.is_none() && IDENTIFIER_KEYS.contains(&key.as_str()) {
            raw_identifier = Some(value);
        } else if raw_title.is_none() && key == "title" {
            raw_title = Some(value);
        }
    }

    let raw_title = raw_title.or_else(|| first_heading(body));
    let raw_identifier = raw_identifier.or_else(|| find_identifier_token(body));

    Document {
        raw_identifier,
        raw_title,
        ..Document::new(id)
    }
}

/// Split a leading `---` block into its YAML text and the remaining body.
/// An unterminated block is not a header.
fn split_header(text: &str) -> Option<(&str, &str)> {
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    if first.trim() != "---" {
        return None;
    }

    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed == "---" || trimmed == "..." {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn parse_header(id: &str, yaml: &str) -> Mapping {
    if yaml.trim().is_empty() {
        return Mapping::new();
    }
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(mapping)) => mapping,
        Ok(_) => Mapping::new(),
        Err(e) => {
            warn!(note = id, "ignoring malformed header: {e}");
            Mapping::new()
        }
    }
}

/// Text of a scalar header value; nested values and blanks yield nothing.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

/// First DOI-looking token in free text, trailing punctuation removed.
pub fn find_identifier_token(text: &str) -> Option<String> {
    DOI_TOKEN_RE.find_iter(text).find_map(|m| {
        let token = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', ')', ']', '}', '>', '*', '_']);
        (token.contains('/') && !token.ends_with('/')).then(|| token.to_string())
    })
}
