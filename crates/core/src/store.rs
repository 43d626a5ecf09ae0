//! Reading and writing the search store.
//!
//! The store is either a JSON array of records or a script that assigns that
//! array to a global `store` variable for the search page to pick up.

use lunrstore_common::{Record, StoreFormat};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::StoreError;

const JS_BINDING: &str = "var store";

/// Render records in the given format.
pub fn render_store(records: &[Record], format: StoreFormat) -> Result<String, serde_json::Error> {
    match format {
        StoreFormat::Json => {
            let mut out = serde_json::to_string_pretty(records)?;
            out.push('\n');
            Ok(out)
        }
        StoreFormat::Js => {
            let array = serde_json::to_string(records)?;
            Ok(format!("{JS_BINDING} = {array};\n"))
        }
    }
}

/// Parse a store written by [`render_store`] in either format.
pub fn parse_store(contents: &str) -> Result<Vec<Record>, serde_json::Error> {
    serde_json::from_str(strip_js_binding(contents))
}

fn strip_js_binding(contents: &str) -> &str {
    let trimmed = contents.trim();
    let Some(rest) = trimmed.strip_prefix(JS_BINDING) else {
        return trimmed;
    };
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    rest.trim().trim_end_matches(';').trim_end()
}

/// Write records to `path`, creating parent directories as needed.
pub fn write_store(path: &Path, records: &[Record], format: StoreFormat) -> Result<(), StoreError> {
    let rendered = render_store(records, format).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, rendered).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), records = records.len(), %format, "Wrote search store.");
    Ok(())
}

/// Load a store file in either format.
pub fn load_store(path: &Path) -> Result<Vec<Record>, StoreError> {
    let contents = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_store(&contents).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}
