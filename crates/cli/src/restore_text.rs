use clap::Args;
use lunrstore_core::restore::restore_file;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct RestoreTextArgs {
    #[arg(value_name = "INPUT", help = "Raw transcript exported with hard line breaks")]
    pub input: PathBuf,
    #[arg(
        value_name = "OUTPUT",
        help = "Where to write the restored text. Defaults to <INPUT>_restored next to the input"
    )]
    pub output: Option<PathBuf>,
}

pub fn run(args: &RestoreTextArgs) -> i32 {
    match restore_file(&args.input, args.output.as_deref()) {
        Ok(path) => {
            println!("✅ Restored text written to {}", path.display());
            0
        }
        Err(err) => {
            eprintln!("Failed to restore {}: {err}", args.input.display());
            1
        }
    }
}
