use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::design::load_dir;
use crate::error::DefinitionError;
use crate::generator::{generate, print_issues};
use crate::router::Router;

/// Command-line interface for mediaroute
#[derive(Parser, Debug)]
#[command(name = "mediaroute-gen", version)]
#[command(about = "Check API definitions and generate routing artifacts", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the definitions and write routes.json, validators.json,
    /// media_types.json and ROUTES.md
    Generate {
        /// Directory holding the definition files
        #[arg(short, long)]
        source: PathBuf,

        /// Output directory for artifacts
        #[arg(short, long, default_value = "generated")]
        output: PathBuf,

        /// Verbose, human-readable logging
        #[arg(long, default_value_t = false)]
        debug: bool,
    },
    /// Load and check the definitions without writing artifacts
    Check {
        #[arg(short, long)]
        source: PathBuf,
    },
    /// Print the routing table
    Routes {
        #[arg(short, long)]
        source: PathBuf,
    },
}

impl Commands {
    /// Whether the command asked for debug logging.
    pub fn debug(&self) -> bool {
        matches!(self, Commands::Generate { debug: true, .. })
    }
}

/// Run a parsed command.
pub fn execute(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Generate { source, output, .. } => {
            let written = generate(source, output)?;
            println!(
                "✨ Generated {} artifact(s) in {}",
                written.len(),
                output.display()
            );
            Ok(())
        }
        Commands::Check { source } => {
            let api = load_dir(source)?;
            let actions: usize = api.resources().iter().map(|r| r.actions.len()).sum();
            println!(
                "✅ {}: {} media type(s), {} resource(s), {} action(s)",
                api.name,
                api.media_types().len(),
                api.resources().len(),
                actions
            );
            Ok(())
        }
        Commands::Routes { source } => {
            let api = load_dir(source)?;
            Router::new(&api).dump_routes();
            Ok(())
        }
    }
}

/// Run a parsed command and map the outcome to an exit code. Definition
/// problems are listed one per line on stderr.
pub fn run_cli(cli: Cli) -> ExitCode {
    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<DefinitionError>() {
                Some(definition) => print_issues(&definition.issues),
                None => eprintln!("❌ {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
