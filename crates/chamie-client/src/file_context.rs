//! Uploaded-file grounding context.
//!
//! At most one file is active at a time; uploading another replaces it.
//! The raw text is kept for display, and a lightly normalized markdown
//! rendering of it is what actually rides along on chat requests.

use crate::error::ClientError;
use regex::Regex;

/// Grounding context derived from one uploaded plain-text file.
#[derive(Debug, Clone)]
pub struct FileContext {
    pub name: String,
    pub raw_text: String,
    /// Markdown rendering of `raw_text`, sent to the server as grounding.
    pub derived_text: String,
}

impl FileContext {
    /// Build context from an uploaded file. Only `.txt` is accepted.
    pub fn from_upload(name: impl Into<String>, raw_text: impl Into<String>) -> Result<Self, ClientError> {
        let name = name.into();
        if !name.to_lowercase().ends_with(".txt") {
            return Err(ClientError::UnsupportedFile(name));
        }
        let raw_text = raw_text.into();
        let derived_text = derive_markdown(&raw_text);
        Ok(Self {
            name,
            raw_text,
            derived_text,
        })
    }
}

/// Lightweight plain-text to markdown normalization.
///
/// Heuristic line rewrites, applied in order: numbered and bulleted lines
/// become list items, ALL-CAPS lines become headings, `Label:` lines become
/// subheadings, double-quoted spans become inline code, bare URLs become
/// links, and runs of blank lines collapse to paragraph breaks.
pub fn derive_markdown(text: &str) -> String {
    // Upload-time one-shot; compiling here keeps the function self-contained.
    let ordered = Regex::new(r"(?m)^(\d+)\.\s+(.+)$").expect("static pattern");
    let unordered = Regex::new(r"(?m)^[-*]\s+(.+)$").expect("static pattern");
    let heading = Regex::new(r"(?m)^([A-Z][A-Z\s]{2,})$").expect("static pattern");
    let subheading = Regex::new(r"(?m)^([^#\n].*[^:\n]):$").expect("static pattern");
    let quoted = Regex::new("\"([^\"\n]+)\"").expect("static pattern");
    let url = Regex::new(r"(https?://\S+)").expect("static pattern");
    let blank_runs = Regex::new(r"\n{3,}").expect("static pattern");

    let markdown = ordered.replace_all(text, "$1. $2");
    let markdown = unordered.replace_all(&markdown, "- $1");
    let markdown = heading.replace_all(&markdown, "# $1");
    let markdown = subheading.replace_all(&markdown, "## $1");
    let markdown = quoted.replace_all(&markdown, "`$1`");
    let markdown = url.replace_all(&markdown, "[$1]($1)");
    let markdown = blank_runs.replace_all(&markdown, "\n\n");
    markdown.into_owned()
}
