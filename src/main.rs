use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Explain why an image embeds near or far from a reference point", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain a random image under a random projection model
    Demo {
        /// Experiment config (TOML); defaults are used when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the experiment's random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Height and width of the random image
        #[arg(long, default_value_t = 32)]
        size: usize,

        /// Embedding dimensionality of the projection model
        #[arg(long, default_value_t = 10)]
        dim: usize,

        /// Write the explanation JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect experiment configs
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective experiment config as TOML
    Show {
        /// Experiment config (TOML); defaults are shown when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List the parameters that differ between two experiment configs
    Diff {
        /// First config
        a: PathBuf,

        /// Second config
        b: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Demo {
            config,
            seed,
            size,
            dim,
            output,
        } => {
            commands::demo::execute(commands::demo::DemoOptions {
                config,
                seed,
                size,
                dim,
                output,
            })?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show { config } => {
                commands::config::show(config.as_deref())?;
            }
            ConfigCommands::Diff { a, b } => {
                commands::config::diff(&a, &b)?;
            }
        },
    }

    Ok(())
}
