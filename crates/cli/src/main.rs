mod cmd;
mod logging;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "simconf", version, about = "Resolve layered simulation configuration trees")]
struct Cli {
    /// Configuration root directory holding the component folders
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Enable debug logging (RUST_LOG overrides this)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load, merge and resolve a setup, printing the final tree as YAML
    Resolve(ResolveArgs),

    /// Check that the configuration root is usable
    Doctor,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Setup document, relative to the root (extension optional)
    pub setup: PathBuf,

    /// User overrides document (highest precedence)
    #[arg(long)]
    pub user: Option<PathBuf>,

    /// Calendar for date arithmetic: gregorian, noleap, or equal:<days>
    #[arg(long, default_value = "gregorian")]
    pub calendar: String,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Resolve(args) => cmd::resolve::run(&cli.root, &args),
        Commands::Doctor => cmd::doctor::run(&cli.root),
    }
}
