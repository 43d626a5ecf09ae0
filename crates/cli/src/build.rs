use clap::Args;
use lunrstore_common::ConfigFile;
use lunrstore_core::common::{Timer, format_elapsed};
use lunrstore_core::{StoreSpec, load_metadata, prepare_records, resolve_search_fields, write_store};
use std::path::PathBuf;
use tracing::debug;

use crate::common::{
    FetchArgs, OutputArgs, enrich_records, load_config, print_reports, run_cli_async,
};

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[arg(
        long,
        short = 'c',
        value_name = "FILE",
        help = "Config file. Defaults to lunrstore.toml in the working directory when present"
    )]
    pub config: Option<PathBuf>,
    #[arg(long, value_name = "FILE", help = "Metadata table, CSV or JSON array")]
    pub metadata: Option<PathBuf>,
    #[arg(
        long = "fields",
        value_name = "FILE",
        conflicts_with = "field",
        help = "CSV table whose `field` column lists the searchable fields"
    )]
    pub fields_file: Option<PathBuf>,
    #[arg(long = "field", value_name = "NAME", help = "Searchable field, repeatable")]
    pub field: Vec<String>,
    #[arg(long = "child-objects", help = "Also index child objects (items with a parentid)")]
    pub child_objects: bool,
    #[arg(long = "no-enrich", help = "Write the store without loading side-file text")]
    pub no_enrich: bool,
    #[command(flatten)]
    pub fetch: FetchArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

impl BuildArgs {
    fn into_layer(self) -> ConfigFile {
        let mut layer = ConfigFile {
            metadata: self.metadata,
            search_fields: self.fields_file,
            fields: (!self.field.is_empty()).then_some(self.field),
            search_child_objects: self.child_objects.then_some(true),
            ..ConfigFile::default()
        };
        self.fetch.apply(&mut layer);
        self.output.apply(&mut layer);
        layer
    }
}

pub async fn run(args: BuildArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: BuildArgs) -> Result<(), String> {
    let timer = Timer::start("build");
    let enrich = !args.no_enrich;
    let explicit = args.config.clone();
    let config = load_config(explicit.as_deref(), args.into_layer())?;
    debug!(?config, "Resolved build configuration");

    let items = load_metadata(&config.metadata)
        .map_err(|err| format!("Failed to load metadata: {err}"))?;
    let fields = resolve_search_fields(&config.search_fields)
        .map_err(|err| format!("Failed to load search fields: {err}"))?;
    let spec = StoreSpec {
        fields,
        search_child_objects: config.search_child_objects,
        variants: config.variants.clone(),
    };
    let mut records = prepare_records(&items, &spec);
    timer.lap("prepare");
    println!(
        "Prepared {} records from {} metadata items",
        records.len(),
        items.len()
    );

    if enrich {
        let reports = enrich_records(&mut records, &config).await?;
        print_reports(&reports);
        timer.lap("enrich");
    } else {
        println!("Skipping side-file text");
    }

    write_store(&config.output, &records, config.format)
        .map_err(|err| format!("Failed to write search store: {err}"))?;
    println!(
        "✅ Search store written to {} in {}",
        config.output.display(),
        format_elapsed(timer.elapsed())
    );
    timer.finish();
    Ok(())
}
