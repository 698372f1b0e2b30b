use std::io;
use std::path::PathBuf;
use std::process::exit;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod loader;
mod replay;

#[derive(Parser)]
#[command(name = "magic-filter")]
#[command(about = "XDP classifier for the UDP/9999 application protocol", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the XDP program and attach it to an interface
    Attach(AttachCommand),
    /// Run hex-encoded frames through the classification pipeline
    Replay(ReplayCommand),
}

#[derive(Args)]
struct AttachCommand {
    /// Network interface to attach the program to
    #[arg(long, value_name = "IFACE")]
    iface: String,
    /// XDP attach mode
    #[arg(long, value_enum, default_value_t = loader::XdpMode::Skb)]
    xdp_mode: loader::XdpMode,
}

#[derive(Args)]
struct ReplayCommand {
    /// File with one hex-encoded frame per line, or `-` for stdin
    #[arg(long, value_name = "FILE", default_value = "-")]
    input: PathBuf,
    /// Print a JSON report instead of one line per frame
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("magic-filter error: {err:?}");
        exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Attach(cmd)) => {
            let opts = loader::AttachOptions {
                iface: cmd.iface,
                xdp_mode: cmd.xdp_mode,
            };
            loader::attach_program(opts).await?;
        }
        Some(Commands::Replay(cmd)) => {
            let opts = replay::ReplayOptions {
                input: cmd.input,
                json: cmd.json,
            };
            replay::run_replay(opts)?;
        }
        None => {
            Cli::command().print_help().ok();
            println!();
        }
    }

    Ok(())
}
