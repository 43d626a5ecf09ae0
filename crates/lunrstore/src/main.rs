//! The `lunrstore` command.

fn main() {
    std::process::exit(lunrstore_cli::run_cli(std::env::args().collect()));
}
