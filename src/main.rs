//! registry-console: headless notification watcher.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_CONFIG: &str = "registry-console.json";

/// Watch a container registry for new notifications and log them
#[derive(Parser, Debug)]
#[command(name = "registry-console", version, about, long_about = None)]
struct Cli {
    /// Console configuration (JSON page payload plus a `console` section)
    #[arg(env = "REGISTRY_CONSOLE_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Directory holding the local preference store
    #[arg(env = "REGISTRY_CONSOLE_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match registry_console_lib::run(&cli.config, &cli.data_dir).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("[console] {}", err);
            ExitCode::FAILURE
        }
    }
}
