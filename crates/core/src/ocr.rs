//! Text extraction from structured OCR documents.
//!
//! ```json
//! { "pages": [ { "textRegions": [ { "text": "...", "textLines": [ { "text": "..." } ] } ] } ] }
//! ```
//!
//! Fragments are collected in document order: pages, then regions, then a
//! region's own text before its lines. Blank fragments are skipped; the rest
//! are kept untrimmed and joined with a single space.
//!
//! Shapes are read loosely where they can be: a `textRegions` or `textLines`
//! that is not an array contributes nothing, and a `text` that is absent,
//! `null`, `false`, `0` or `""` is no text. A `null` page, region or line, or
//! a `text` holding any other non-string value, makes the whole document
//! malformed, and none of its text is used.

use serde_json::Value;

use crate::error::EnrichError;

/// Collect the text fragments of an OCR document in document order.
///
/// Fails with [`EnrichError::UnexpectedShape`] when the document has no
/// `pages` array and with [`EnrichError::Malformed`] when an element cannot be
/// read.
pub fn collect_ocr_fragments(document: &Value) -> Result<Vec<&str>, EnrichError> {
    let pages = document
        .get("pages")
        .and_then(Value::as_array)
        .ok_or(EnrichError::UnexpectedShape)?;

    let mut fragments = Vec::new();
    for page in pages {
        let Some(regions) = element(page, "page")?.get("textRegions").and_then(Value::as_array)
        else {
            continue;
        };
        for region in regions {
            let region = element(region, "region")?;
            push_fragment(&mut fragments, region.get("text"))?;
            let Some(lines) = region.get("textLines").and_then(Value::as_array) else {
                continue;
            };
            for line in lines {
                push_fragment(&mut fragments, element(line, "line")?.get("text"))?;
            }
        }
    }
    Ok(fragments)
}

fn element<'a>(value: &'a Value, kind: &str) -> Result<&'a Value, EnrichError> {
    if value.is_null() {
        return Err(EnrichError::Malformed(format!("{kind} is null")));
    }
    Ok(value)
}

fn push_fragment<'a>(
    fragments: &mut Vec<&'a str>,
    value: Option<&'a Value>,
) -> Result<(), EnrichError> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => fragments.push(text),
        Some(other) if is_truthy(other) && !other.is_string() => {
            return Err(EnrichError::Malformed(format!("text is not a string: {other}")));
        }
        _ => {}
    }
    Ok(())
}

/// JavaScript truthiness of a JSON value.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_none_or(|n| n.abs() > 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parse an OCR payload and return its text joined with single spaces.
pub fn extract_ocr_text(payload: &str) -> Result<String, EnrichError> {
    let document: Value = serde_json::from_str(payload)?;
    collect_ocr_fragments(&document).map(|fragments| fragments.join(" "))
}
