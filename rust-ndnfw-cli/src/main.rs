use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod utils;

/// ndnfw Command Line Interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a deterministic forwarding scenario over in-memory faces
    Simulate {
        /// Name prefix served by the producer (NDN URI format)
        #[clap(short, long, default_value = "/sim")]
        prefix: String,

        /// Number of consumer faces
        #[clap(short, long, default_value = "2")]
        consumers: usize,

        /// Number of distinct names each consumer requests per round
        #[clap(short, long, default_value = "10")]
        names: usize,

        /// Number of request rounds; later rounds are answered from the cache
        #[clap(short, long, default_value = "2")]
        rounds: usize,

        /// The producer ignores every Nth name (0 answers everything)
        #[clap(long, default_value = "0")]
        drop_every: usize,

        /// Read forwarder options from a node configuration file
        #[clap(long)]
        config: Option<PathBuf>,

        /// Answer failures and duplicates with NACKs
        #[clap(long)]
        nacks: bool,

        /// Print the results as JSON
        #[clap(long)]
        json: bool,
    },

    /// Encode an Interest, NACK or Data packet and print it as hex
    Encode {
        /// Name of the packet (NDN URI format)
        name: String,

        /// Encode a Data packet with this content instead of an Interest
        #[clap(long)]
        content: Option<String>,

        /// Interest nonce (random if omitted)
        #[clap(long)]
        nonce: Option<u32>,

        /// Interest lifetime in milliseconds
        #[clap(long, default_value = "4000")]
        lifetime: u32,

        /// Turn the Interest into a NACK (loop, congestion or giveup-pit)
        #[clap(long)]
        nack: Option<String>,

        /// Data freshness period in milliseconds
        #[clap(long, default_value = "10000")]
        freshness: u32,
    },

    /// Print the effective node configuration
    Config {
        /// Configuration file to load (defaults only if omitted)
        #[clap(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "warn" }
    )).init();

    match cli.command {
        Commands::Simulate {
            prefix,
            consumers,
            names,
            rounds,
            drop_every,
            config,
            nacks,
            json,
        } => {
            let options = commands::simulate::SimulateOptions {
                prefix,
                consumers,
                names,
                rounds,
                drop_every,
                config,
                nacks,
            };
            commands::simulate::run_simulation(options, json)?;
        }
        Commands::Encode {
            name,
            content,
            nonce,
            lifetime,
            nack,
            freshness,
        } => {
            let options = commands::encode::EncodeOptions {
                name,
                content,
                nonce,
                lifetime,
                nack,
                freshness,
            };
            commands::encode::encode_packet(options)?;
        }
        Commands::Config { file } => {
            commands::config::show_config(file)?;
        }
    }

    Ok(())
}
