//! TonConnect wallet CLI
//!
//! Pairs with dapps over TonConnect and signs TON transfers from the command line.
//!
//! # WARNING
//! - Seeds are read from disk in plain form. Keep them `chmod 600`.
//! - Signed transfers are only printed; broadcasting is up to you.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use tonconnect_wallet::cli::commands;
use tonconnect_wallet::config::Config;

/// TonConnect wallet - session protocol and transfer signing
#[derive(Parser)]
#[command(name = "tonconnect-wallet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new wallet seed
    Keygen {
        /// Where to write the seed (default: wallet.seed_path)
        #[arg(long)]
        out: Option<String>,

        /// Overwrite an existing seed file
        #[arg(long)]
        force: bool,
    },

    /// Decrypt and show a bridge message from a dapp
    Decrypt {
        /// Base64 bridge message
        message: String,

        /// Hex session secret key
        #[arg(long, env = "TONWALLET_SESSION_KEY")]
        session_key: String,

        /// Hex client id of the dapp
        #[arg(long)]
        client_id: String,
    },

    /// Answer a tc:// connect link
    Connect {
        /// Connect link
        link: String,

        /// Path to the dapp manifest JSON
        #[arg(long)]
        manifest: String,

        /// Reuse an existing hex session key instead of a fresh one
        #[arg(long, env = "TONWALLET_SESSION_KEY")]
        session_key: Option<String>,
    },

    /// Sign a sendTransaction request and print the sealed response
    Respond {
        /// Base64 bridge message
        message: String,

        /// Hex session secret key
        #[arg(long, env = "TONWALLET_SESSION_KEY")]
        session_key: String,

        /// Hex client id of the dapp
        #[arg(long)]
        client_id: String,

        /// Current wallet seqno
        #[arg(long)]
        seqno: u32,
    },

    /// Sign a transfer from a JSON intent (inline or @file)
    Transfer {
        intent: String,

        /// Current wallet seqno
        #[arg(long)]
        seqno: u32,
    },

    /// Print an NFT ownership proof link
    NftProof {
        /// NFT item address
        nft: String,
    },

    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tonconnect_wallet=info".parse()?),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Keygen { out, force } => commands::keygen(&config, out.as_deref(), force),
        Commands::Decrypt {
            message,
            session_key,
            client_id,
        } => commands::decrypt(&session_key, &client_id, &message),
        Commands::Connect {
            link,
            manifest,
            session_key,
        } => commands::connect(&config, &link, &manifest, session_key.as_deref()),
        Commands::Respond {
            message,
            session_key,
            client_id,
            seqno,
        } => commands::respond(&config, &session_key, &client_id, &message, seqno),
        Commands::Transfer { intent, seqno } => commands::transfer(&config, &intent, seqno),
        Commands::NftProof { nft } => commands::nft_proof(&config, &nft),
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
