//! Top-level argument grammar (`engctl`). One `Commands` variant per
//! subsystem, mirroring the teacher's `gat-cli::cli` layout: the clap
//! derive tree lives here, the handlers live under `commands/`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "engctl", version, about = "Commodities LP / Monte Carlo decision engine control plane")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode/decode model descriptors between JSON and the binary wire format.
    #[command(subcommand)]
    Codec(CodecCommands),
    /// Run a single LP solve against a descriptor and a variable vector.
    Solve {
        /// Path to a JSON-encoded ModelDescriptor.
        #[arg(long)]
        descriptor: PathBuf,
        /// Path to a JSON array of f64 variable values.
        #[arg(long)]
        vector: PathBuf,
    },
    /// Run a Monte Carlo batch against a descriptor and a center vector.
    MonteCarlo {
        #[arg(long)]
        descriptor: PathBuf,
        #[arg(long)]
        center: PathBuf,
        #[arg(long, default_value_t = 1000)]
        scenarios: u32,
        /// Path to a JSON SignalThresholds; defaults to a neutral {0,0,0}.
        #[arg(long)]
        thresholds: Option<PathBuf>,
    },
    /// Inspect or register variable frames in the process-wide registry.
    #[command(subcommand)]
    Registry(RegistryCommands),
    /// Drive one or more requests through the Solve Pipeline.
    #[command(subcommand)]
    Pipeline(PipelineCommands),
    /// Inspect the Snapshot WAL on disk.
    #[command(subcommand)]
    Wal(WalCommands),
    /// Report on environment and on-disk state this binary depends on.
    Doctor,
}

#[derive(Subcommand)]
pub enum CodecCommands {
    /// JSON descriptor -> binary wire bytes.
    Encode {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Binary wire bytes -> JSON descriptor.
    Decode {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RegistryCommands {
    /// Register a variable frame from a JSON file.
    Register {
        #[arg(long)]
        frame: PathBuf,
    },
    /// List registered product groups.
    List,
    /// Print the registered frame for one product group as JSON.
    Show {
        product_group: String,
    },
}

#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Run one solve request (JSON-encoded `engine_pipeline::SolveRequest`
    /// fields) through the pipeline, against a fresh in-memory audit index
    /// and a WAL directory on disk.
    Run {
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        wal_dir: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum WalCommands {
    /// Print every frame in one `.wal` file as JSON lines.
    Read {
        path: PathBuf,
    },
    /// Verify the hash chain of one `.wal` file.
    Verify {
        path: PathBuf,
    },
    /// Recover (seq, per-type last hash) from a WAL directory.
    Recover {
        dir: PathBuf,
    },
}
