use clap::Args;
use lunrstore_common::{ConfigFile, StoreFormat};
use lunrstore_core::{load_store, write_store};
use std::path::PathBuf;

use crate::common::{
    FetchArgs, OutputArgs, enrich_records, load_config, print_reports, run_cli_async,
};

#[derive(Args, Debug, Clone)]
pub struct EnrichArgs {
    #[arg(
        value_name = "STORE",
        help = "Existing store, a JSON array or a `var store = [...]` script"
    )]
    pub store: PathBuf,
    #[arg(
        long,
        short = 'c',
        value_name = "FILE",
        help = "Config file. Defaults to lunrstore.toml in the working directory when present"
    )]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub fetch: FetchArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

impl EnrichArgs {
    /// The store is rewritten in place unless `--output` is given; the format
    /// follows the output path unless `--format` is given.
    fn into_layer(self) -> ConfigFile {
        let mut layer = ConfigFile::default();
        self.fetch.apply(&mut layer);
        let output = self.output.output.unwrap_or(self.store);
        layer.format = Some(
            self.output
                .format
                .map_or_else(|| StoreFormat::from_path(&output), StoreFormat::from),
        );
        layer.output = Some(output);
        layer
    }
}

pub async fn run(args: EnrichArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: EnrichArgs) -> Result<(), String> {
    let input = args.store.clone();
    let explicit = args.config.clone();
    let config = load_config(explicit.as_deref(), args.into_layer())?;

    let mut records = load_store(&input).map_err(|err| format!("Failed to load store: {err}"))?;
    println!("Loaded {} records from {}", records.len(), input.display());

    let reports = enrich_records(&mut records, &config).await?;
    print_reports(&reports);

    write_store(&config.output, &records, config.format)
        .map_err(|err| format!("Failed to write search store: {err}"))?;
    println!("✅ Search store written to {}", config.output.display());
    Ok(())
}
