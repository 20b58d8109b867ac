//! TiM - Think-in-Memory command line host
//!
//! ## Commands
//!
//! - `repl`: interactive shell over one memory
//! - `demo`: seed the paper's example thoughts, recall and organize them

mod config;
mod demo;
mod repl;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{info, Level};

use tim_core::ThinkInMemory;

use crate::config::TimConfig;
use crate::repl::Session;

#[derive(Parser)]
#[command(name = "tim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Think-in-Memory: long-term thought memory for LLM agents", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to tim.toml (default: built-in settings with TIM_* overrides)
    #[arg(short, long, global = true, env = "TIM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive memory shell
    Repl,

    /// Seed example thoughts, run sample recalls and organize every bucket
    Demo {
        /// Thoughts returned per recall (default: memory.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tim_core::init_tracing(cli.json, level);

    let config = TimConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let built = config.build()?;

    match cli.command {
        Commands::Repl => {
            let agent = built
                .responder
                .map(|responder| ThinkInMemory::new(built.memory.clone(), responder));
            let session = Session::new(built.memory.clone(), agent);
            println!("{}", repl::HELP);
            let stdin = BufReader::new(tokio::io::stdin());
            repl::run(&session, stdin, &mut std::io::stdout()).await?;
        }
        Commands::Demo { top_k } => {
            let top_k = top_k.unwrap_or(config.memory.default_top_k);
            demo::run(&built.memory, built.reachable_buckets, top_k, &mut std::io::stdout()).await?;
        }
    }

    built.memory.metrics().flush();
    info!(event = "session.closed", memory_id = %built.memory.id());
    Ok(())
}
