use anyhow::Result;
use clap::Parser;
use socksfront::{config, decree};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "The negotiating front end of a SOCKS5 proxy", long_about = None)]
struct Args {
    /// Decree document (JSON) describing the proxy instances to launch
    #[arg(short, long)]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    // Parse args
    let args = Args::parse();

    // Initialize tracing subscriber
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    // Read decrees; any problem here ends the process before the event loop
    let decrees = config::load(&args.config)?;
    info!("loaded {} decree(s) from {}", decrees.len(), args.config.display());

    // Run them
    decree::execute(&decrees)
}
