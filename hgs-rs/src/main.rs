use clap::Parser;
use tracing_subscriber::EnvFilter;

use hgs::cli::{self, Cli};

fn main() {
    let cli = Cli::parse();
    let config = match cli.config() {
        Ok(config) => config,
        Err(e) => fail(e),
    };

    // -v beats HGS_LOG; HGS_LOG beats the default.
    let default = config.log_filter();
    let filter = match config.verbosity {
        0 => EnvFilter::try_from_env("HGS_LOG").unwrap_or_else(|_| EnvFilter::new(default)),
        _ => EnvFilter::new(default),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli::run(&cli, &config, std::io::stdin().lock()) {
        Ok(output) => print!("{output}"),
        Err(e) => fail(e),
    }
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("hgs: {e}");
    std::process::exit(1);
}
