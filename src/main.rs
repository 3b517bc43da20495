mod cli;

use clap::Parser;
use cli::config::ConsortiumConfig;
use cli::Cli;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Install the log subscriber. `RUST_LOG` wins over the config file.
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = ConsortiumConfig::load_or_default(cli.config_path().map(Path::new))
            .map(|config| config.logging.level)
            .unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level)
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = cli::execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
