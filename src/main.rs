use anyhow::Result;
use clap::Parser;
use lan_watcher::cli::commands::Commands;
use lan_watcher::cli::{CaptureCommandHandler, Cli, handle_devices_command};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => handle_devices_command()?,
        Commands::Capture(args) => CaptureCommandHandler::handle_capture_command(args).await?,
    }

    Ok(())
}
