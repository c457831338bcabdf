//! Command-line interface for teraify.
//!
//! One command for now:
//!
//! ```bash
//! # Bundle an entry module, templates compiled in, to stdout
//! teraify bundle src/entry.js
//!
//! # Write to a file, with invocation locals and self-scoped templates
//! teraify bundle src/entry.js -o dist/bundle.js \
//!     --locals '{"pageTitle": "Tera"}' --self
//!
//! # Print the discovered template dependency edges as well
//! teraify bundle src/entry.js --list-deps
//! ```
//!
//! Invocation options given here are merged over any `teraify.toml` or
//! `package.json` manifest found near the compiled files; flags win on key
//! collisions.

pub mod bundle;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Build-time Tera template transform for JavaScript bundles.
#[derive(Debug, Parser)]
#[command(name = "teraify", version, about)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all logging.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Bundle a JavaScript module graph, compiling templates inline.
    Bundle(bundle::BundleCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.verbose, self.quiet);
        match self.command {
            Commands::Bundle(cmd) => cmd.execute().await,
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("warn")
    };
    // Logs go to stderr; stdout is reserved for bundle output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
