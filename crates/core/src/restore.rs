//! Transcript restoration.
//!
//! OCR'd newspaper transcripts come out with one physical line per printed
//! line, words split by soft hyphens and runs of spaces. Restoration re-joins
//! each paragraph into a single line so the transcript reads (and matches
//! search queries) as continuous text. Paragraphs are separated by two blank
//! lines, both in the input and in the output.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::StoreError;

const PARAGRAPH_BREAK: &str = "\n\n\n";
const SOFT_HYPHEN: char = '¬';
// UTF-8 `¬` read as Latin-1 shows up as `Â¬`
const MOJIBAKE_LEAD: char = 'Â';

/// Decode bytes as UTF-8, falling back to Latin-1 when they are not valid UTF-8.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    }
}

/// Restore a transcript: join lines inside each paragraph, drop soft hyphens
/// and collapse repeated spaces.
///
/// Soft hyphens are removed in both forms: the mojibake `Â¬` left by a
/// Latin-1 round trip and a bare `¬`, each with the whitespace after it. The
/// older cleanup script only handled `Â¬`.
pub fn restore_text_lines(text: &str) -> String {
    let paragraphs: Vec<String> = text
        .split(PARAGRAPH_BREAK)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .map(|paragraph| {
            paragraph
                .split('\n')
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();

    let joined = paragraphs.join(PARAGRAPH_BREAK);
    collapse_spaces(&remove_soft_hyphens(&joined))
}

/// Remove soft hyphens together with any whitespace that follows them.
fn remove_soft_hyphens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(SOFT_HYPHEN) {
        let head = &rest[..pos];
        out.push_str(head.strip_suffix(MOJIBAKE_LEAD).unwrap_or(head));
        rest = rest[pos + SOFT_HYPHEN.len_utf8()..].trim_start();
    }
    out.push_str(rest);
    out
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for ch in text.chars() {
        let is_space = ch == ' ';
        if !(is_space && previous_space) {
            out.push(ch);
        }
        previous_space = is_space;
    }
    out
}

/// Default output path: `<stem>_restored.<ext>` next to the input.
pub fn restored_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(ext) => format!("{stem}_restored.{}", ext.to_string_lossy()),
        None => format!("{stem}_restored"),
    };
    input.with_file_name(file_name)
}

/// Restore a transcript file, writing UTF-8 to `output` or to
/// [`restored_path`]. Returns the path written.
pub fn restore_file(input: &Path, output: Option<&Path>) -> Result<PathBuf, StoreError> {
    let bytes = fs::read(input).map_err(|source| StoreError::Io {
        path: input.to_path_buf(),
        source,
    })?;
    let restored = restore_text_lines(&decode_text(bytes));

    let output_path = output.map_or_else(|| restored_path(input), Path::to_path_buf);
    fs::write(&output_path, restored).map_err(|source| StoreError::Io {
        path: output_path.clone(),
        source,
    })?;

    info!(input = %input.display(), output = %output_path.display(), "Restored transcript.");
    Ok(output_path)
}
