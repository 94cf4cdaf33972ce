//! `chanres` CLI - resolve playable streams for channel videos

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "chanres")]
#[command(about = "Resolve playable HLS/DASH streams for channel videos")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/chanres/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the streams of a video page or playback API URL
    Resolve {
        /// Video page or API URL
        url: String,

        /// Channel name (detected from the URL when omitted)
        #[arg(long)]
        channel: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Prefer HLS over DASH
        #[arg(long)]
        no_widevine: bool,

        /// Fetch every manifest and list its variants
        #[arg(long)]
        probe: bool,
    },

    /// List supported channels
    Channels,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "chanres=debug",
        _ => "chanres=trace",
    };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Resolve {
            url,
            channel,
            json,
            no_widevine,
            probe,
        } => {
            cmd::resolve::cmd_resolve(
                &url,
                channel.as_deref(),
                cmd::resolve::ResolveFlags {
                    json,
                    no_widevine,
                    probe,
                },
                cli.config.as_deref(),
            )
            .await?;
        }
        Commands::Channels => {
            cmd::channels::cmd_channels();
        }
    }

    Ok(())
}
