//! Store preparation: metadata rows to record skeletons.
//!
//! A collection's metadata table lists one item per row. Items become search
//! records when they have an `objectid`; child items (those with a
//! `parentid`) only when child objects are searchable. Each record carries
//! the configured searchable fields, the side-file reference of every enabled
//! variant, an empty text field per variant, and an `id` pointing at the
//! item's page.

use lunrstore_common::{ID_FIELD, Record, SearchFields, Variant};
use serde_json::{Map, Value};
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::error::StoreError;

/// Column of the search configuration table naming a field.
pub const FIELD_COLUMN: &str = "field";

const OBJECT_ID: &str = "objectid";
const PARENT_ID: &str = "parentid";

/// One metadata row. Empty CSV cells are left out.
pub type MetadataItem = Map<String, Value>;

/// What goes into each record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSpec {
    /// Searchable fields, in output order
    pub fields: Vec<String>,
    /// Include items that have a `parentid`
    pub search_child_objects: bool,
    /// Variants whose reference and text fields are added
    pub variants: Vec<Variant>,
}

/// Load the metadata table. `.json` files hold an array of objects; anything
/// else is read as CSV with a header row.
pub fn load_metadata(path: &Path) -> Result<Vec<MetadataItem>, StoreError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let items = if is_json {
        load_json_items(path)?
    } else {
        load_csv_items(path)?
    };
    debug!(path = %path.display(), items = items.len(), "Loaded metadata.");
    Ok(items)
}

fn load_json_items(path: &Path) -> Result<Vec<MetadataItem>, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value =
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| {
            StoreError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;

    let Value::Array(rows) = value else {
        return Err(StoreError::Shape {
            path: path.to_path_buf(),
            reason: "expected an array of objects".to_string(),
        });
    };
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(item) => Ok(item),
            _ => Err(StoreError::Shape {
                path: path.to_path_buf(),
                reason: format!("entry {index} is not an object"),
            }),
        })
        .collect()
}

fn load_csv_items(path: &Path) -> Result<Vec<MetadataItem>, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();

    let mut items = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_err)?;
        let item: MetadataItem = headers
            .iter()
            .zip(row.iter())
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(header, cell)| (header.trim().to_string(), Value::String(cell.to_string())))
            .collect();
        items.push(item);
    }
    Ok(items)
}

/// Read searchable field names from the `field` column of a CSV table.
pub fn load_search_fields(path: &Path) -> Result<Vec<String>, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let column = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|header| header.trim() == FIELD_COLUMN)
        .ok_or_else(|| StoreError::MissingColumn {
            path: path.to_path_buf(),
            column: FIELD_COLUMN,
        })?;

    let mut fields = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_err)?;
        if let Some(field) = row.get(column).map(str::trim).filter(|f| !f.is_empty()) {
            fields.push(field.to_string());
        }
    }
    Ok(fields)
}

/// Turn a configured field source into the list of field names.
pub fn resolve_search_fields(source: &SearchFields) -> Result<Vec<String>, StoreError> {
    match source {
        SearchFields::Inline(fields) => Ok(fields.clone()),
        SearchFields::File(path) => load_search_fields(path),
    }
}

/// Build the record skeletons for `items`.
pub fn prepare_records(items: &[MetadataItem], spec: &StoreSpec) -> Vec<Record> {
    items
        .iter()
        .filter_map(|item| {
            let object_id = present(item, OBJECT_ID)?;
            let parent_id = present(item, PARENT_ID);
            if parent_id.is_some() && !spec.search_child_objects {
                return None;
            }
            Some(build_record(item, spec, &object_id, parent_id.as_deref()))
        })
        .collect()
}

fn build_record(
    item: &MetadataItem,
    spec: &StoreSpec,
    object_id: &str,
    parent_id: Option<&str>,
) -> Record {
    let mut record = Record::new();
    for field in &spec.fields {
        if let Some(value) = present(item, field) {
            record.insert(field.as_str(), normalize_whitespace(&value).replace("\"\"", "\""));
        }
    }
    for variant in &spec.variants {
        if let Some(reference) = present(item, variant.reference_field()) {
            record.insert(variant.reference_field(), reference);
        }
        record.insert(variant.text_field(), "");
    }
    let id = match parent_id {
        Some(parent) => format!("{parent}.html#{object_id}"),
        None => format!("{object_id}.html"),
    };
    record.insert(ID_FIELD, id);
    record
}

/// String form of a field when it counts as present: not missing, `null`,
/// `false` or empty.
fn present(item: &MetadataItem, field: &str) -> Option<String> {
    match item.get(field)? {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Collapse every run of whitespace into one space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn item(value: Value) -> MetadataItem {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test items are objects"),
        }
    }

    fn spec(fields: &[&str], children: bool) -> StoreSpec {
        StoreSpec {
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            search_child_objects: children,
            variants: vec![Variant::Ocr],
        }
    }

    #[test]
    fn test_items_without_objectid_are_dropped() {
        let items = vec![
            item(json!({"title": "No id"})),
            item(json!({"objectid": "", "title": "Empty id"})),
            item(json!({"objectid": "obj1", "title": "Kept"})),
        ];
        let records = prepare_records(&items, &spec(&["title"], false));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), Some("obj1.html"));
    }

    #[test]
    fn test_child_objects_follow_flag() {
        let items = vec![
            item(json!({"objectid": "parent1"})),
            item(json!({"objectid": "child1", "parentid": "parent1"})),
        ];

        let records = prepare_records(&items, &spec(&[], false));
        assert_eq!(records.len(), 1);

        let records = prepare_records(&items, &spec(&[], true));
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id(), Some("parent1.html#child1"));
    }

    #[test]
    fn test_record_shape_and_field_order() {
        let items = vec![item(json!({
            "objectid": "obj1",
            "title": "  A   \"\"quoted\"\"\n title ",
            "subject": "",
            "date": 1944,
            "object_location": "objects/obj1.json"
        }))];

        let records = prepare_records(&items, &spec(&["title", "subject", "date"], false));
        let out = serde_json::to_string(&records[0]).unwrap();
        assert_eq!(
            out,
            r#"{"title":"A \"quoted\" title","date":"1944","object_location":"objects/obj1.json","ocr_text":"","id":"obj1.html"}"#
        );
    }

    #[test]
    fn test_every_variant_gets_its_fields() {
        let items = vec![item(json!({"objectid": "obj1", "object_transcript": "t/obj1.txt"}))];
        let spec = StoreSpec {
            fields: Vec::new(),
            search_child_objects: false,
            variants: vec![Variant::Ocr, Variant::Transcript],
        };

        let records = prepare_records(&items, &spec);
        let rec = &records[0];
        assert_eq!(rec.reference(Variant::Ocr), None);
        assert_eq!(rec.text(Variant::Ocr), Some(""));
        assert_eq!(rec.reference(Variant::Transcript), Some("t/obj1.txt"));
        assert_eq!(rec.text(Variant::Transcript), Some(""));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\t b\n\nc  "), "a b c");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_load_csv_metadata_skips_empty_cells() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.csv");
        fs::write(
            &path,
            "objectid,parentid,title,object_location\nobj1,,First,objects/obj1.json\nobj2,obj1,\"Second, child\",\n",
        )
        .unwrap();

        let items = load_metadata(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert!(!items[0].contains_key("parentid"));
        assert_eq!(items[1]["title"], json!("Second, child"));
        assert!(!items[1].contains_key("object_location"));
    }

    #[test]
    fn test_load_json_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.json");
        fs::write(&path, r#"[{"objectid": "obj1"}, {"objectid": "obj2"}]"#).unwrap();
        assert_eq!(load_metadata(&path).unwrap().len(), 2);

        fs::write(&path, r#"{"objectid": "obj1"}"#).unwrap();
        assert!(matches!(load_metadata(&path), Err(StoreError::Shape { .. })));
    }

    #[test]
    fn test_load_search_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config-search.csv");
        fs::write(
            &path,
            "field,index,display,btn\ntitle,true,true,\ndescription,true,false,\n,,,\nsubject,true,true,true\n",
        )
        .unwrap();

        assert_eq!(
            load_search_fields(&path).unwrap(),
            vec!["title", "description", "subject"]
        );

        fs::write(&path, "name\ntitle\n").unwrap();
        assert!(matches!(
            load_search_fields(&path),
            Err(StoreError::MissingColumn { column: "field", .. })
        ));
    }
}
