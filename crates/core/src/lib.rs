//! Search store building and side-file text enrichment.
//!
//! The pipeline has three stages:
//!
//! 1. [`prepare`] turns a metadata table and a searchable-field list into
//!    record skeletons.
//! 2. [`enrich`] fetches each record's side-file (OCR JSON or transcript)
//!    through a [`fetch::SideFileFetcher`] and merges the extracted text back.
//! 3. [`store`] writes the records as JSON or as a `var store = [...]` script.
//!
//! [`restore`] holds the offline transcript clean-up used before publishing.

pub mod common;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod ocr;
pub mod prepare;
pub mod restore;
pub mod store;

pub use enrich::{
    EnrichOptions, EnrichmentOutcome, EnrichmentReport, Enricher, RecordOutcome, enrich_all,
};
pub use error::{EnrichError, FetchError, StoreError};
pub use fetch::{HttpFetcher, LocalFetcher, SideFileFetcher};
pub use prepare::{StoreSpec, load_metadata, prepare_records, resolve_search_fields};
pub use store::{load_store, write_store};
