use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "refine")]
#[command(about = "Refine - rewrite selected text with an LLM", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a piece of text through the full extension flow
    Improve(commands::improve::ImproveArgs),
    /// Show the effective settings (API key masked)
    Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json)?;

    match cli.command {
        Commands::Improve(args) => commands::improve::run(args).await?,
        Commands::Settings => commands::settings::show().await?,
    }

    Ok(())
}
