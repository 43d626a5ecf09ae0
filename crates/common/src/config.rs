//! Layered configuration for building a search store.
//!
//! Values come from three layers: built-in defaults, an optional
//! `lunrstore.toml`, and command-line overrides. Each layer is a
//! [`ConfigFile`] with every key optional; [`ConfigFile::merge`] stacks them
//! and [`StoreConfig::resolve`] validates the result.
//!
//! ```toml
//! metadata = "_data/metadata.csv"
//! search_fields = "_data/config-search.csv"
//! search_child_objects = false
//! variants = ["ocr"]
//! base_url = "https://example.org/collection/"
//! output = "assets/data/store.json"
//! format = "json"
//! concurrency = 32
//! fetch_timeout_secs = 20
//! ```
//!
//! Relative paths resolve against the working directory.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::record::Variant;

const DEFAULT_METADATA: &str = "_data/metadata.csv";
const DEFAULT_SEARCH_FIELDS: &str = "_data/config-search.csv";
const DEFAULT_OUTPUT: &str = "assets/data/store.json";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        /// Path of the config file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config file {}: {source}", .path.display())]
    Parse {
        /// Path of the config file
        path: PathBuf,
        /// Underlying TOML error
        source: toml::de::Error,
    },
    /// A value is present but unusable
    #[error("Invalid value for `{key}`: {reason}")]
    Invalid {
        /// Offending key
        key: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Output shape of the written store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFormat {
    /// A JSON array of records
    #[default]
    Json,
    /// A script assigning the array to `var store`
    Js,
}

impl StoreFormat {
    /// Guess the format from an output path: `.js` is a script, anything else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("js") => StoreFormat::Js,
            _ => StoreFormat::Json,
        }
    }
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFormat::Json => f.write_str("json"),
            StoreFormat::Js => f.write_str("js"),
        }
    }
}

/// Where the list of searchable fields comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFields {
    /// A CSV table with a `field` column
    File(PathBuf),
    /// Field names given directly
    Inline(Vec<String>),
}

/// Where side-files are retrieved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideFileSource {
    /// HTTP(S) GET relative to a base URL
    BaseUrl(Url),
    /// File reads relative to a site root directory
    SiteRoot(PathBuf),
}

/// One configuration layer. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Metadata table (CSV or JSON array)
    pub metadata: Option<PathBuf>,
    /// CSV table listing searchable fields
    pub search_fields: Option<PathBuf>,
    /// Searchable fields given inline; wins over `search_fields`
    pub fields: Option<Vec<String>>,
    /// Include child objects (items with a `parentid`)
    pub search_child_objects: Option<bool>,
    /// Enrichment variants to run
    pub variants: Option<Vec<Variant>>,
    /// Base URL for side-file retrieval over HTTP
    pub base_url: Option<String>,
    /// Site root for side-file retrieval from disk
    pub site_root: Option<PathBuf>,
    /// Output path of the store
    pub output: Option<PathBuf>,
    /// Output format of the store
    pub format: Option<StoreFormat>,
    /// Maximum number of in-flight retrievals
    pub concurrency: Option<usize>,
    /// Per-retrieval timeout in seconds
    pub fetch_timeout_secs: Option<u64>,
}

impl ConfigFile {
    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` if given, otherwise `default_path` when it exists.
    ///
    /// An explicit path must exist; a missing default file yields an empty layer.
    pub fn discover(explicit: Option<&Path>, default_path: &Path) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None if default_path.exists() => Self::load(default_path),
            None => Ok(Self::default()),
        }
    }

    /// Stack `overrides` on top of `self`. Keys set in `overrides` win.
    ///
    /// `base_url` and `site_root` are one choice: setting either in the
    /// override layer discards both from the lower layer. The same holds for
    /// `fields` and `search_fields`.
    pub fn merge(self, overrides: ConfigFile) -> ConfigFile {
        let source_overridden = overrides.base_url.is_some() || overrides.site_root.is_some();
        let (base_url, site_root) = if source_overridden {
            (overrides.base_url, overrides.site_root)
        } else {
            (self.base_url, self.site_root)
        };

        let fields_overridden = overrides.fields.is_some() || overrides.search_fields.is_some();
        let (fields, search_fields) = if fields_overridden {
            (overrides.fields, overrides.search_fields)
        } else {
            (self.fields, self.search_fields)
        };

        ConfigFile {
            metadata: overrides.metadata.or(self.metadata),
            search_fields,
            fields,
            search_child_objects: overrides.search_child_objects.or(self.search_child_objects),
            variants: overrides.variants.or(self.variants),
            base_url,
            site_root,
            output: overrides.output.or(self.output),
            format: overrides.format.or(self.format),
            concurrency: overrides.concurrency.or(self.concurrency),
            fetch_timeout_secs: overrides.fetch_timeout_secs.or(self.fetch_timeout_secs),
        }
    }
}

/// Fully resolved, validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Metadata table path
    pub metadata: PathBuf,
    /// Source of the searchable field list
    pub search_fields: SearchFields,
    /// Include child objects
    pub search_child_objects: bool,
    /// Enrichment variants, deduplicated, in configured order
    pub variants: Vec<Variant>,
    /// Side-file source
    pub source: SideFileSource,
    /// Output path
    pub output: PathBuf,
    /// Output format, inferred from `output` when not configured
    pub format: StoreFormat,
    /// In-flight retrieval cap; `None` means unbounded
    pub concurrency: Option<NonZeroUsize>,
    /// Per-retrieval timeout; `None` means no timeout
    pub fetch_timeout: Option<Duration>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            metadata: PathBuf::from(DEFAULT_METADATA),
            search_fields: SearchFields::File(PathBuf::from(DEFAULT_SEARCH_FIELDS)),
            search_child_objects: false,
            variants: vec![Variant::Ocr],
            source: SideFileSource::SiteRoot(PathBuf::from(".")),
            output: PathBuf::from(DEFAULT_OUTPUT),
            format: StoreFormat::Json,
            concurrency: None,
            fetch_timeout: None,
        }
    }
}

impl StoreConfig {
    /// Apply a merged layer on top of the defaults and validate it.
    pub fn resolve(layer: ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let source = match (layer.base_url, layer.site_root) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Invalid {
                    key: "base_url",
                    reason: "cannot be combined with `site_root`".to_string(),
                });
            }
            (Some(raw), None) => SideFileSource::BaseUrl(parse_base_url(&raw)?),
            (None, Some(root)) => SideFileSource::SiteRoot(root),
            (None, None) => defaults.source,
        };

        let search_fields = match (layer.fields, layer.search_fields) {
            (Some(fields), _) => SearchFields::Inline(fields),
            (None, Some(path)) => SearchFields::File(path),
            (None, None) => defaults.search_fields,
        };

        let variants = match layer.variants {
            Some(list) if list.is_empty() => {
                return Err(ConfigError::Invalid {
                    key: "variants",
                    reason: "at least one variant is required".to_string(),
                });
            }
            Some(list) => dedup_variants(list),
            None => defaults.variants,
        };

        let concurrency = layer
            .concurrency
            .map(|value| {
                NonZeroUsize::new(value).ok_or_else(|| ConfigError::Invalid {
                    key: "concurrency",
                    reason: "must be greater than zero".to_string(),
                })
            })
            .transpose()?;

        let fetch_timeout = match layer.fetch_timeout_secs {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    key: "fetch_timeout_secs",
                    reason: "must be greater than zero".to_string(),
                });
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let output = layer.output.unwrap_or(defaults.output);
        let format = layer
            .format
            .unwrap_or_else(|| StoreFormat::from_path(&output));

        Ok(Self {
            metadata: layer.metadata.unwrap_or(defaults.metadata),
            search_fields,
            search_child_objects: layer
                .search_child_objects
                .unwrap_or(defaults.search_child_objects),
            variants,
            source,
            output,
            format,
            concurrency,
            fetch_timeout,
        })
    }
}

/// Parse a base URL, making sure relative references resolve under its path.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw).map_err(|err| ConfigError::Invalid {
        key: "base_url",
        reason: err.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::Invalid {
            key: "base_url",
            reason: format!("{raw} cannot be used as a base URL"),
        });
    }
    // Without a trailing slash `Url::join` would replace the last segment
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn dedup_variants(list: Vec<Variant>) -> Vec<Variant> {
    let mut out = Vec::with_capacity(list.len());
    for variant in list {
        if !out.contains(&variant) {
            out.push(variant);
        }
    }
    out
}
