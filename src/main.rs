use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use galloader::shutdown::spawn_signal_listener;
use galloader::{Config, Pipeline};

#[derive(Parser)]
#[command(name = "galloader")]
#[command(about = "Download every picture from a range of concept-art gallery chapters")]
#[command(version)]
struct Cli {
    /// Configuration file path (optional, defaults apply when missing)
    #[arg(short, long, default_value = "galloader.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Config::load(&cli.config)?;
    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let pipeline = Pipeline::new(config)?;

    let token = CancellationToken::new();
    let signals = spawn_signal_listener(token.clone());

    let summary = pipeline.run(token.clone()).await?;

    // Lets the signal listener return.
    token.cancel();
    signals.await?;

    info!(
        "Done: {} pictures saved to {:?}",
        summary.downloaded,
        pipeline.config().pipeline.output_dir
    );
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("galloader={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .init();
}
