use std::{fs::OpenOptions, path::PathBuf, sync::Mutex};

use clap::{CommandFactory, Parser, error::ErrorKind};
use flashproxy::facilitator::{
    DEFAULT_ADDRESS, DEFAULT_PORT, Facilitator, FacilitatorConfig, LogTarget,
};
use tracing_subscriber::EnvFilter;

/// Flash bridge facilitator: register client addresses with HTTP POST requests
/// and serve them out again with HTTP GET.
#[derive(Parser)]
#[command(author, version, about, after_help = format!("Listens on {DEFAULT_ADDRESS} {DEFAULT_PORT} by default."))]
struct Args {
    /// Don't write a log file, log to stdout.
    #[arg(short, long)]
    debug: bool,

    /// Append the log to FILENAME [default: facilitator.log]
    #[arg(short, long, value_name = "FILENAME")]
    log: Option<PathBuf>,

    /// [HOST] [PORT]; a lone number is taken as the port
    #[arg(num_args = 0..=2, value_name = "HOST PORT")]
    addr: Vec<String>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    let config = match FacilitatorConfig::from_args(&args.addr, args.debug, args.log) {
        Ok(config) => config,
        Err(e) => Args::command().error(ErrorKind::InvalidValue, e).exit(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("flashproxy=info,facilitator=info"));
    match &config.log {
        LogTarget::Stdout => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init(),
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
    }

    let facilitator = Facilitator::bind(&config).await?;
    tracing::info!(addr = %facilitator.local_addr()?, "facilitator started");
    facilitator.run().await
}
