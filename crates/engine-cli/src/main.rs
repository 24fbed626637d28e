//! `engctl`: command-line front door for the trading decision engine.
//!
//! Mirrors the teacher's `gat-cli` shape — a `cli` module holding the
//! clap derive tree, a `commands` module holding one file per subsystem,
//! and a thin `main` that initializes tracing and dispatches.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, CodecCommands, Commands, PipelineCommands, RegistryCommands, WalCommands};

fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing subscriber failed");

    let cli = Cli::parse();
    match cli.command {
        Commands::Codec(CodecCommands::Encode { input, output }) => commands::codec::encode(&input, &output),
        Commands::Codec(CodecCommands::Decode { input, output }) => commands::codec::decode(&input, output.as_deref()),
        Commands::Solve { descriptor, vector } => commands::solve::solve(&descriptor, &vector),
        Commands::MonteCarlo { descriptor, center, scenarios, thresholds } => {
            commands::solve::monte_carlo(&descriptor, &center, scenarios, thresholds.as_deref())
        }
        Commands::Registry(RegistryCommands::Register { frame }) => commands::registry::register(&frame),
        Commands::Registry(RegistryCommands::List) => commands::registry::list(),
        Commands::Registry(RegistryCommands::Show { product_group }) => commands::registry::show(&product_group),
        Commands::Pipeline(PipelineCommands::Run { request, wal_dir }) => commands::pipeline::run(&request, &wal_dir),
        Commands::Wal(WalCommands::Read { path }) => commands::wal::read(&path),
        Commands::Wal(WalCommands::Verify { path }) => commands::wal::verify(&path),
        Commands::Wal(WalCommands::Recover { dir }) => commands::wal::recover(&dir),
        Commands::Doctor => commands::doctor::run(),
    }
}
