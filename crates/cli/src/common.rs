//! Argument groups and helpers shared by the commands

use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use lunrstore_common::{
    CONFIG_FILENAME, ConfigFile, Record, SideFileSource, StoreConfig, StoreFormat, Variant,
};
use lunrstore_core::common::format_elapsed;
use lunrstore_core::{EnrichOptions, EnrichmentReport, HttpFetcher, LocalFetcher, enrich_all};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub async fn run_cli_async<F, Fut>(f: F) -> i32
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    match f().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

/// Side-file kinds
#[derive(ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
#[value(rename_all = "lower")]
pub enum VariantArg {
    /// OCR JSON referenced by `object_location`
    Ocr,
    /// Plain-text transcript referenced by `object_transcript`
    Transcript,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Ocr => Variant::Ocr,
            VariantArg::Transcript => Variant::Transcript,
        }
    }
}

/// Store output formats
#[derive(ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
#[value(rename_all = "lower")]
pub enum FormatArg {
    /// JSON array
    Json,
    /// `var store = [...];` script
    Js,
}

impl From<FormatArg> for StoreFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => StoreFormat::Json,
            FormatArg::Js => StoreFormat::Js,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    #[arg(
        long = "variant",
        value_enum,
        value_name = "KIND",
        help = "Side-file kind to load, repeatable. Defaults to ocr"
    )]
    pub variants: Vec<VariantArg>,
    #[arg(
        long = "base-url",
        value_name = "URL",
        conflicts_with = "site_root",
        help = "Retrieve side-files over HTTP relative to this URL"
    )]
    pub base_url: Option<String>,
    #[arg(
        long = "site-root",
        value_name = "DIR",
        help = "Read side-files from this directory. Defaults to the working directory"
    )]
    pub site_root: Option<PathBuf>,
    #[arg(
        long,
        value_name = "N",
        help = "Maximum number of side-files retrieved at once"
    )]
    pub concurrency: Option<usize>,
    #[arg(
        long = "timeout-secs",
        value_name = "SECS",
        help = "Give up on a side-file after this many seconds"
    )]
    pub timeout_secs: Option<u64>,
}

impl FetchArgs {
    /// Copy the flags that were given into `layer`.
    pub fn apply(self, layer: &mut ConfigFile) {
        if !self.variants.is_empty() {
            layer.variants = Some(self.variants.into_iter().map(Variant::from).collect());
        }
        if self.base_url.is_some() || self.site_root.is_some() {
            layer.base_url = self.base_url;
            layer.site_root = self.site_root;
        }
        layer.concurrency = self.concurrency.or(layer.concurrency);
        layer.fetch_timeout_secs = self.timeout_secs.or(layer.fetch_timeout_secs);
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    #[arg(long, short = 'o', value_name = "FILE", help = "Where to write the store")]
    pub output: Option<PathBuf>,
    #[arg(
        long,
        value_enum,
        help = "Store format. Inferred from the output extension when omitted"
    )]
    pub format: Option<FormatArg>,
}

impl OutputArgs {
    /// Copy the flags that were given into `layer`.
    pub fn apply(self, layer: &mut ConfigFile) {
        layer.output = self.output.or(layer.output.take());
        layer.format = self.format.map(StoreFormat::from).or(layer.format);
    }
}

/// Read the config file (explicit path, or `lunrstore.toml` when present),
/// stack the command-line layer on top and validate the result.
pub fn load_config(explicit: Option<&Path>, overrides: ConfigFile) -> Result<StoreConfig, String> {
    let file =
        ConfigFile::discover(explicit, Path::new(CONFIG_FILENAME)).map_err(|err| err.to_string())?;
    StoreConfig::resolve(file.merge(overrides))
        .map_err(|err| format!("Invalid configuration: {err}"))
}

pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());
    spinner
}

/// Run one enrichment pass per configured variant with the fetcher the
/// configured side-file source calls for.
pub async fn enrich_records(
    records: &mut [Record],
    config: &StoreConfig,
) -> Result<Vec<EnrichmentReport>, String> {
    let options = EnrichOptions::from(config);
    let variants = config
        .variants
        .iter()
        .map(|variant| variant.as_str())
        .collect::<Vec<_>>()
        .join(" and ");
    let sp = spinner(&format!("📄 Loading {variants} text..."));

    let reports = match &config.source {
        SideFileSource::BaseUrl(base_url) => match HttpFetcher::new(base_url.clone()) {
            Ok(fetcher) => Ok(enrich_all(records, &fetcher, &config.variants, options).await),
            Err(err) => Err(format!("Failed to create HTTP client: {err}")),
        },
        SideFileSource::SiteRoot(root) => {
            let fetcher = LocalFetcher::new(root.clone());
            Ok(enrich_all(records, &fetcher, &config.variants, options).await)
        }
    };

    sp.finish_and_clear();
    reports
}

pub fn print_reports(reports: &[EnrichmentReport]) {
    for report in reports {
        println!(
            "{} text: {} enriched, {} skipped, {} failed in {}",
            report.variant(),
            report.enriched(),
            report.skipped(),
            report.failed(),
            format_elapsed(report.elapsed())
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_flags_override_config_file() {
        let file = ConfigFile {
            site_root: Some(PathBuf::from("_site")),
            concurrency: Some(4),
            variants: Some(vec![Variant::Transcript]),
            ..ConfigFile::default()
        };
        let mut layer = ConfigFile::default();
        FetchArgs {
            base_url: Some("https://example.org/demo".to_string()),
            concurrency: Some(8),
            ..FetchArgs::default()
        }
        .apply(&mut layer);

        let config = StoreConfig::resolve(file.merge(layer)).unwrap();
        assert_eq!(
            config.source,
            SideFileSource::BaseUrl("https://example.org/demo/".parse().unwrap())
        );
        assert_eq!(config.concurrency.map(usize::from), Some(8));
        assert_eq!(config.variants, vec![Variant::Transcript]);
    }

    #[test]
    fn test_unset_flags_keep_config_file_values() {
        let file = ConfigFile {
            output: Some(PathBuf::from("assets/js/lunr-store.js")),
            fetch_timeout_secs: Some(10),
            ..ConfigFile::default()
        };
        let mut layer = ConfigFile::default();
        FetchArgs::default().apply(&mut layer);
        OutputArgs::default().apply(&mut layer);

        let config = StoreConfig::resolve(file.merge(layer)).unwrap();
        assert_eq!(config.output, PathBuf::from("assets/js/lunr-store.js"));
        assert_eq!(config.format, StoreFormat::Js);
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_format_flag_wins_over_extension() {
        let mut layer = ConfigFile::default();
        OutputArgs {
            output: Some(PathBuf::from("store.js")),
            format: Some(FormatArg::Json),
        }
        .apply(&mut layer);

        let config = StoreConfig::resolve(layer).unwrap();
        assert_eq!(config.format, StoreFormat::Json);
    }

    #[test]
    fn test_repeated_variant_flags() {
        let mut layer = ConfigFile::default();
        FetchArgs {
            variants: vec![VariantArg::Transcript, VariantArg::Ocr],
            ..FetchArgs::default()
        }
        .apply(&mut layer);
        assert_eq!(
            layer.variants,
            Some(vec![Variant::Transcript, Variant::Ocr])
        );
    }
}
