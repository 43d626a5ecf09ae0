//! The text enrichment pass.
//!
//! For every record carrying a side-file reference, the pass retrieves the
//! side-file, extracts its text according to the [`Variant`] and writes it
//! into the variant's text field. Retrievals run concurrently; the pass
//! returns only once every one of them has settled.
//!
//! Failures stay local to their record: the text field keeps its initial
//! value, a diagnostic keyed by the record id is logged, and the outcome is
//! reported in the returned [`EnrichmentReport`]. The pass itself never fails.

use futures_util::StreamExt;
use futures_util::stream;
use lunrstore_common::{Record, StoreConfig, Variant};
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::common::Timer;
use crate::error::EnrichError;
use crate::fetch::SideFileFetcher;
use crate::ocr::extract_ocr_text;

/// Tuning knobs for a pass. The default runs every retrieval at once with no
/// timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichOptions {
    /// Maximum number of retrievals in flight; `None` is unbounded
    pub concurrency: Option<NonZeroUsize>,
    /// Per-retrieval timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl From<&StoreConfig> for EnrichOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            timeout: config.fetch_timeout,
        }
    }
}

/// What happened to one record during a pass.
#[derive(Debug)]
pub enum EnrichmentOutcome {
    /// Text was extracted and written
    Enriched {
        /// Length of the written text, in characters
        chars: usize,
    },
    /// The record has no reference for this variant
    Skipped,
    /// Enrichment failed; the text field was left as it was
    Failed(EnrichError),
}

impl EnrichmentOutcome {
    /// Whether text was written.
    pub fn is_enriched(&self) -> bool {
        matches!(self, EnrichmentOutcome::Enriched { .. })
    }

    /// Whether the record was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, EnrichmentOutcome::Skipped)
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&EnrichError> {
        match self {
            EnrichmentOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome of one record, with enough context to find it again.
#[derive(Debug)]
pub struct RecordOutcome {
    /// Position of the record in the input slice
    pub index: usize,
    /// Record id, or an empty string when the record has none
    pub id: String,
    /// What happened
    pub outcome: EnrichmentOutcome,
}

/// Per-record outcomes of a pass, in record order.
#[derive(Debug)]
pub struct EnrichmentReport {
    variant: Variant,
    entries: Vec<RecordOutcome>,
    elapsed: Duration,
}

impl EnrichmentReport {
    /// Variant this pass ran for.
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// One entry per input record, in input order.
    pub fn entries(&self) -> &[RecordOutcome] {
        &self.entries
    }

    /// Wall time of the pass.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Outcome for the record with the given id.
    pub fn outcome_for(&self, id: &str) -> Option<&EnrichmentOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.outcome)
    }

    /// Number of records whose text was written.
    pub fn enriched(&self) -> usize {
        self.entries.iter().filter(|entry| entry.outcome.is_enriched()).count()
    }

    /// Number of records without a reference.
    pub fn skipped(&self) -> usize {
        self.entries.iter().filter(|entry| entry.outcome.is_skipped()).count()
    }

    /// Number of records whose enrichment failed.
    pub fn failed(&self) -> usize {
        self.failures().count()
    }

    /// Failed records with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&RecordOutcome, &EnrichError)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.outcome.error().map(|err| (entry, err)))
    }
}

/// Runs enrichment passes for one variant against one fetcher.
#[derive(Debug, Clone)]
pub struct Enricher<F> {
    fetcher: F,
    variant: Variant,
    options: EnrichOptions,
}

impl<F: SideFileFetcher> Enricher<F> {
    /// Create an enricher with default options.
    pub fn new(fetcher: F, variant: Variant) -> Self {
        Self {
            fetcher,
            variant,
            options: EnrichOptions::default(),
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: EnrichOptions) -> Self {
        self.options = options;
        self
    }

    /// Enrich `records` in place.
    ///
    /// Every record ends the pass with a string-valued text field. Only the
    /// variant's text field is written; nothing is removed or renamed.
    pub async fn enrich(&self, records: &mut [Record]) -> EnrichmentReport {
        let variant = self.variant;
        let timer = Timer::start(format!("enrich_{variant}"));
        let limit = self
            .options
            .concurrency
            .map_or(records.len().max(1), NonZeroUsize::get);

        debug!(%variant, records = records.len(), limit, "Starting enrichment pass.");

        // Retrievals only read the records; results are applied after all settle.
        let mut settled: Vec<(usize, Result<Option<String>, EnrichError>)> =
            stream::iter(records.iter().enumerate())
                .map(|(index, record)| async move { (index, self.attempt(record).await) })
                .buffer_unordered(limit)
                .collect()
                .await;
        settled.sort_unstable_by_key(|(index, _)| *index);

        let mut entries = Vec::with_capacity(records.len());
        for (record, (index, result)) in records.iter_mut().zip(settled) {
            record.ensure_text_field(variant);
            let outcome = match result {
                Ok(None) => EnrichmentOutcome::Skipped,
                Ok(Some(text)) => {
                    let chars = text.chars().count();
                    record.set_text(variant, text);
                    EnrichmentOutcome::Enriched { chars }
                }
                Err(err) => EnrichmentOutcome::Failed(err),
            };
            entries.push(RecordOutcome {
                index,
                id: record.id().unwrap_or_default().to_string(),
                outcome,
            });
        }

        let elapsed = timer.elapsed();
        let report = EnrichmentReport {
            variant,
            entries,
            elapsed,
        };
        info!(
            %variant,
            enriched = report.enriched(),
            skipped = report.skipped(),
            failed = report.failed(),
            elapsed_ms = elapsed.as_millis(),
            "{} text loaded into search store",
            variant
        );
        timer.finish();
        report
    }

    /// Retrieve and extract the text for one record. `Ok(None)` means there
    /// is nothing to enrich.
    async fn attempt(&self, record: &Record) -> Result<Option<String>, EnrichError> {
        let Some(reference) = record.reference(self.variant) else {
            return Ok(None);
        };
        let id = record.id().unwrap_or_default();

        let result = self.retrieve(reference).await.and_then(|payload| match self.variant {
            Variant::Ocr => extract_ocr_text(&payload),
            Variant::Transcript => Ok(payload),
        });

        match &result {
            Err(err) if err.is_diagnostic() => {
                warn!(id, reference, error = %err, "Could not load {} for {}", self.variant, id);
            }
            Err(err) => {
                debug!(id, reference, error = %err, "No {} text in side-file.", self.variant);
            }
            Ok(_) => {}
        }

        result.map(Some)
    }

    async fn retrieve(&self, reference: &str) -> Result<String, EnrichError> {
        let fetch = self.fetcher.fetch(reference);
        match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| EnrichError::Timeout(limit))?
                .map_err(EnrichError::from),
            None => fetch.await.map_err(EnrichError::from),
        }
    }
}

/// Run one independent pass per variant over the same records.
///
/// Each variant reads only its own reference field and writes only its own
/// text field, so records carrying references of several kinds are enriched
/// once per kind without interference.
pub async fn enrich_all<F: SideFileFetcher>(
    records: &mut [Record],
    fetcher: &F,
    variants: &[Variant],
    options: EnrichOptions,
) -> Vec<EnrichmentReport> {
    let mut reports = Vec::with_capacity(variants.len());
    for &variant in variants {
        let enricher = Enricher::new(fetcher, variant).with_options(options);
        reports.push(enricher.enrich(records).await);
    }
    reports
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory fetcher that records every reference it is asked for.
    #[derive(Debug, Default)]
    struct MapFetcher {
        files: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MapFetcher {
        fn with(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                ..Self::default()
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl SideFileFetcher for MapFetcher {
        async fn fetch(&self, reference: &str) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(reference.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.files
                .get(reference)
                .cloned()
                .ok_or_else(|| FetchError::InvalidReference {
                    reference: reference.to_string(),
                    reason: "not found".to_string(),
                })
        }
    }

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    const OCR_DOC: &str =
        r#"{"pages":[{"textRegions":[{"text":"A","textLines":[{"text":"B"},{"text":"C"}]}]}]}"#;

    #[tokio::test]
    async fn test_records_without_reference_are_not_fetched() {
        let fetcher = MapFetcher::default();
        let mut records = vec![
            record(json!({"id": "a.html", "ocr_text": ""})),
            record(json!({"id": "b.html", "object_location": "", "ocr_text": ""})),
        ];

        let report = Enricher::new(&fetcher, Variant::Ocr).enrich(&mut records).await;

        assert!(fetcher.requested().is_empty());
        assert_eq!(report.skipped(), 2);
        for rec in &records {
            assert_eq!(rec.text(Variant::Ocr), Some(""));
        }
    }

    #[tokio::test]
    async fn test_ocr_text_is_merged() {
        let fetcher = MapFetcher::with(&[("objects/a.json", OCR_DOC)]);
        let mut records = vec![record(
            json!({"title": "Letter", "object_location": "objects/a.json", "ocr_text": "", "id": "a.html"}),
        )];

        let report = Enricher::new(&fetcher, Variant::Ocr).enrich(&mut records).await;

        assert_eq!(records[0].text(Variant::Ocr), Some("A B C"));
        assert_eq!(records[0].get_str("title"), Some("Letter"));
        assert!(matches!(
            report.outcome_for("a.html"),
            Some(EnrichmentOutcome::Enriched { chars: 5 })
        ));
    }

    #[tokio::test]
    async fn test_transcript_is_verbatim() {
        let fetcher = MapFetcher::with(&[("t/a.txt", "Hello\nWorld")]);
        let mut records = vec![record(
            json!({"id": "a.html", "object_transcript": "t/a.txt", "transcript_text": ""}),
        )];

        Enricher::new(&fetcher, Variant::Transcript)
            .enrich(&mut records)
            .await;

        assert_eq!(records[0].text(Variant::Transcript), Some("Hello\nWorld"));
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_reported_once() {
        let fetcher = MapFetcher::with(&[
            ("ok.json", OCR_DOC),
            ("broken.json", "{not json"),
            ("nopages.json", r#"{"id":"x"}"#),
        ]);
        let mut records = vec![
            record(json!({"id": "ok.html", "object_location": "ok.json", "ocr_text": ""})),
            record(json!({"id": "missing.html", "object_location": "missing.json", "ocr_text": ""})),
            record(json!({"id": "broken.html", "object_location": "broken.json", "ocr_text": ""})),
            record(json!({"id": "nopages.html", "object_location": "nopages.json", "ocr_text": ""})),
            record(json!({"id": "none.html", "ocr_text": ""})),
        ];

        let report = Enricher::new(&fetcher, Variant::Ocr).enrich(&mut records).await;

        assert_eq!(report.entries().len(), records.len());
        assert_eq!(report.enriched(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 3);
        assert_eq!(
            report.failures().filter(|(entry, _)| entry.id == "missing.html").count(),
            1
        );
        assert!(matches!(
            report.outcome_for("missing.html").and_then(EnrichmentOutcome::error),
            Some(EnrichError::Fetch(_))
        ));
        assert!(matches!(
            report.outcome_for("broken.html").and_then(EnrichmentOutcome::error),
            Some(EnrichError::Parse(_))
        ));
        assert!(matches!(
            report.outcome_for("nopages.html").and_then(EnrichmentOutcome::error),
            Some(EnrichError::UnexpectedShape)
        ));

        let texts: Vec<_> = records.iter().map(|r| r.text(Variant::Ocr).unwrap()).collect();
        assert_eq!(texts, vec!["A B C", "", "", "", ""]);
    }

    #[tokio::test]
    async fn test_text_field_is_initialized_when_missing() {
        let fetcher = MapFetcher::default();
        let mut records = vec![
            record(json!({"id": "a.html"})),
            record(json!({"id": "b.html", "object_location": "gone.json"})),
        ];

        Enricher::new(&fetcher, Variant::Ocr).enrich(&mut records).await;

        assert_eq!(records[0].text(Variant::Ocr), Some(""));
        assert_eq!(records[1].text(Variant::Ocr), Some(""));
        assert_eq!(records[1].get_str("object_location"), Some("gone.json"));
    }

    #[tokio::test]
    async fn test_second_pass_yields_same_values() {
        let fetcher = MapFetcher::with(&[("a.json", OCR_DOC)]);
        let mut records = vec![
            record(json!({"id": "a.html", "object_location": "a.json", "ocr_text": ""})),
            record(json!({"id": "b.html", "object_location": "b.json", "ocr_text": ""})),
        ];
        let enricher = Enricher::new(&fetcher, Variant::Ocr);

        enricher.enrich(&mut records).await;
        let once = records.clone();
        enricher.enrich(&mut records).await;

        assert_eq!(records, once);
        assert_eq!(fetcher.requested().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let files: Vec<(String, String)> = (0..8)
            .map(|i| (format!("{i}.json"), OCR_DOC.to_string()))
            .collect();
        let file_refs: Vec<(&str, &str)> =
            files.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let fetcher = MapFetcher::with(&file_refs);
        let mut records: Vec<Record> = (0..8)
            .map(|i| record(json!({"id": format!("{i}.html"), "object_location": format!("{i}.json"), "ocr_text": ""})))
            .collect();

        let options = EnrichOptions {
            concurrency: NonZeroUsize::new(2),
            timeout: None,
        };
        let report = Enricher::new(&fetcher, Variant::Ocr)
            .with_options(options)
            .enrich(&mut records)
            .await;

        assert_eq!(report.enriched(), 8);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 2);
        for (i, entry) in report.entries().iter().enumerate() {
            assert_eq!(entry.index, i);
            assert_eq!(entry.id, format!("{i}.html"));
        }
    }

    #[tokio::test]
    async fn test_both_variants_run_independently() {
        let fetcher = MapFetcher::with(&[("a.json", OCR_DOC), ("a.txt", "spoken words")]);
        let mut records = vec![record(json!({
            "id": "a.html",
            "object_location": "a.json",
            "object_transcript": "a.txt",
            "ocr_text": "",
            "transcript_text": ""
        }))];

        let reports = enrich_all(
            &mut records,
            &fetcher,
            &[Variant::Ocr, Variant::Transcript],
            EnrichOptions::default(),
        )
        .await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].variant(), Variant::Ocr);
        assert_eq!(records[0].text(Variant::Ocr), Some("A B C"));
        assert_eq!(records[0].text(Variant::Transcript), Some("spoken words"));
    }

    #[tokio::test]
    async fn test_empty_input_completes() {
        let fetcher = MapFetcher::default();
        let mut records: Vec<Record> = Vec::new();
        let report = Enricher::new(&fetcher, Variant::Ocr).enrich(&mut records).await;
        assert!(report.entries().is_empty());
    }

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_one_warning_per_failed_record() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let fetcher = MapFetcher::with(&[
            ("ok.json", OCR_DOC),
            ("nopages.json", r#"{"id":"x"}"#),
            ("nullpage.json", r#"{"pages":[null,{"textRegions":[{"text":"lost"}]}]}"#),
        ]);
        let mut records = vec![
            record(json!({"id": "ok.html", "object_location": "ok.json", "ocr_text": ""})),
            record(json!({"id": "missing.html", "object_location": "missing.json", "ocr_text": ""})),
            record(json!({"id": "nopages.html", "object_location": "nopages.json", "ocr_text": ""})),
            record(json!({"id": "nullpage.html", "object_location": "nullpage.json", "ocr_text": ""})),
            record(json!({"id": "none.html", "ocr_text": ""})),
        ];

        let report = Enricher::new(&fetcher, Variant::Ocr).enrich(&mut records).await;

        let warnings: Vec<String> = logs
            .lines()
            .into_iter()
            .filter(|line| line.contains("WARN"))
            .collect();
        let mentioning = |id: &str| warnings.iter().filter(|line| line.contains(id)).count();

        assert_eq!(mentioning("missing.html"), 1, "{warnings:#?}");
        assert_eq!(mentioning("nullpage.html"), 1, "{warnings:#?}");
        assert_eq!(mentioning("none.html"), 0, "{warnings:#?}");
        assert_eq!(mentioning("nopages.html"), 0, "{warnings:#?}");
        assert_eq!(mentioning("ok.html"), 0, "{warnings:#?}");
        assert_eq!(warnings.len(), 2, "{warnings:#?}");

        assert!(matches!(
            report.outcome_for("nullpage.html").and_then(EnrichmentOutcome::error),
            Some(EnrichError::Malformed(_))
        ));
        assert_eq!(records[3].text(Variant::Ocr), Some(""));
    }
}
