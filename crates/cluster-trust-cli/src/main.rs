//! Cluster Trust CLI - key maintenance and token tooling for operators.
//!
//! This is the entry point for the `ctrust` binary.

mod keys;
mod token;

use clap::{Parser, Subcommand};

use keys::{KeysAction, StoreArgs};
use token::TokenAction;

/// Cluster Trust CLI - manage Portal keys, issue and verify tokens.
#[derive(Parser, Debug)]
#[command(name = "ctrust")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging.
    #[arg(long, global = true, default_value = "false")]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage the Portal's signing keys.
    Keys {
        #[command(flatten)]
        store: StoreArgs,

        #[command(subcommand)]
        action: KeysAction,
    },
    /// Issue or verify tokens.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("cluster_trust=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let output = run(args.command).await?;
    println!("{output}");
    Ok(())
}

async fn run(command: Command) -> anyhow::Result<String> {
    match command {
        Command::Keys { store, action } => {
            let manager = store.open_manager()?;
            keys::run(action, &manager)
        }
        Command::Token {
            action: TokenAction::Issue(args),
        } => token::issue(&args),
        Command::Token {
            action: TokenAction::Verify(args),
        } => token::verify(&args).await,
    }
}
