//! Search records and the enrichment variants that target them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier field carried by every record.
pub const ID_FIELD: &str = "id";

/// Kind of side-file a record can reference.
///
/// Each variant reads its own reference field and writes its own text field,
/// so a record may carry references of both kinds without the passes touching
/// each other's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Structured OCR document (`pages` / `textRegions` / `textLines`)
    Ocr,
    /// Flat text transcript, used verbatim
    Transcript,
}

impl Variant {
    /// Every variant, in the order passes run when all are enabled.
    pub const ALL: [Variant; 2] = [Variant::Ocr, Variant::Transcript];

    /// Field holding the side-file reference.
    pub fn reference_field(self) -> &'static str {
        match self {
            Variant::Ocr => "object_location",
            Variant::Transcript => "object_transcript",
        }
    }

    /// Field receiving the extracted text.
    pub fn text_field(self) -> &'static str {
        match self {
            Variant::Ocr => "ocr_text",
            Variant::Transcript => "transcript_text",
        }
    }

    /// Lowercase name used in config files and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Ocr => "ocr",
            Variant::Transcript => "transcript",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One searchable entry of the generated store.
///
/// Serialized as a plain JSON object. Field order is preserved so the written
/// store follows the configured field order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Record identifier, if present and string-valued.
    pub fn id(&self) -> Option<&str> {
        self.get_str(ID_FIELD)
    }

    /// Raw value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Value of a field when it is a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Insert or overwrite a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Whether the record has the given field.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Side-file reference for `variant`.
    ///
    /// Missing, `null`, empty and non-string values all mean "nothing to
    /// enrich".
    pub fn reference(&self, variant: Variant) -> Option<&str> {
        self.get_str(variant.reference_field())
            .filter(|reference| !reference.is_empty())
    }

    /// Enrichment text for `variant`, if string-valued.
    pub fn text(&self, variant: Variant) -> Option<&str> {
        self.get_str(variant.text_field())
    }

    /// Make sure the text field of `variant` holds a string, defaulting to `""`.
    pub fn ensure_text_field(&mut self, variant: Variant) {
        if self.text(variant).is_none() {
            self.insert(variant.text_field(), "");
        }
    }

    /// Overwrite the text field of `variant`.
    pub fn set_text(&mut self, variant: Variant, text: String) {
        self.insert(variant.text_field(), text);
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_fields(fields)
    }
}
