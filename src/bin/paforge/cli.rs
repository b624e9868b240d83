use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "paforge",
    about = "Synthetic tissue volumes for photoacoustic simulation",
    version,
    author,
    before_help = crate::display::banner_for_help(),
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compose a tissue volume from a settings file (TOML)
    #[command(visible_alias = "c")]
    Compose(ComposeArgs),

    /// Run a processing pipeline on an existing field store (JSON)
    #[command(visible_alias = "p")]
    Process(ProcessArgs),

    /// Compose one volume per seed, in parallel
    #[command(visible_alias = "b")]
    Batch(BatchArgs),

    /// List molecules and tissue presets
    #[command(visible_alias = "l")]
    Library(LibraryArgs),
}

impl Command {
    pub fn quiet(&self) -> bool {
        match self {
            Command::Compose(args) => args.io.quiet,
            Command::Process(args) => args.io.quiet,
            Command::Batch(args) => args.quiet,
            Command::Library(_) => false,
        }
    }
}

/// I/O options shared by the compose and process commands.
#[derive(Args)]
pub struct IoOptions {
    /// Input file (stdin if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output field store (stdout if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Suppress progress output (for scripting)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Overrides applied on top of the settings file.
#[derive(Args)]
#[command(next_help_heading = "Simulation")]
pub struct SimulationOptions {
    /// Random seed (overrides simulation.random_seed)
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Wavelengths in nm, comma-separated (overrides simulation.wavelengths)
    #[arg(long, value_name = "NM", value_delimiter = ',')]
    pub wavelengths: Vec<u32>,

    /// Custom molecule library (TOML file)
    #[arg(long, value_name = "FILE")]
    pub molecules: Option<PathBuf>,
}

#[derive(Args)]
pub struct ComposeArgs {
    #[command(flatten)]
    pub io: IoOptions,

    #[command(flatten)]
    pub simulation: SimulationOptions,

    /// Additional processing steps (TOML file with [[processing]] tables)
    #[arg(long, value_name = "FILE")]
    pub pipeline: Option<PathBuf>,

    /// Skip the processing steps embedded in the settings file
    #[arg(long)]
    pub no_processing: bool,
}

#[derive(Args)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub io: IoOptions,

    /// Processing steps (TOML file with [[processing]] tables)
    #[arg(short, long, value_name = "FILE")]
    pub pipeline: PathBuf,

    /// Random seed for stochastic components
    #[arg(long, value_name = "SEED", default_value = "0")]
    pub seed: u64,

    /// Custom molecule library (TOML file)
    #[arg(long, value_name = "FILE")]
    pub molecules: Option<PathBuf>,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Settings file (stdin if omitted)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output path; each store is written with a `_seed<N>` suffix
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Seeds to compose, comma-separated
    #[arg(long, value_name = "SEED", value_delimiter = ',', required = true)]
    pub seeds: Vec<u64>,

    /// Wavelengths in nm, comma-separated (overrides simulation.wavelengths)
    #[arg(long, value_name = "NM", value_delimiter = ',')]
    pub wavelengths: Vec<u32>,

    /// Custom molecule library (TOML file)
    #[arg(long, value_name = "FILE")]
    pub molecules: Option<PathBuf>,

    /// Suppress progress output (for scripting)
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct LibraryArgs {
    /// Wavelength at which optical properties are listed (nm)
    #[arg(long, value_name = "NM", default_value = "800")]
    pub wavelength: u32,

    /// Custom molecule library (TOML file)
    #[arg(long, value_name = "FILE")]
    pub molecules: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}
