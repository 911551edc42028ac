//! CLI argument definitions for modgraph.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "modgraph",
    version,
    about = "Resolve module dependency graphs",
    long_about = "modgraph resolves the dependency graph of a module catalog: it selects \
                  versions, settles version and capability conflicts, applies excludes and \
                  substitutions, and writes the result as a compact binary stream."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the root component of a catalog and print its dependency tree
    Resolve {
        /// Module catalog (TOML)
        catalog: PathBuf,
        /// Resolution config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Check the result against this lock file
        #[arg(long)]
        lock: Option<PathBuf>,
        /// Write the resolved versions to this lock file
        #[arg(long)]
        write_lock: Option<PathBuf>,
        /// Maximum tree depth
        #[arg(long)]
        depth: Option<usize>,
        /// Write the serialized result stream to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print a JSON summary instead of the tree
        #[arg(long)]
        json: bool,
    },

    /// Explain why a module was selected and how it is reached
    Insight {
        /// Module catalog (TOML)
        catalog: PathBuf,
        /// Module to explain (group:name, or name alone)
        module: String,
        /// Resolution config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the tree stored in a serialized result stream
    Replay {
        /// Stream written by `modgraph resolve --output`
        file: PathBuf,
        /// Maximum tree depth
        #[arg(long)]
        depth: Option<usize>,
    },
}

/// Parse command-line arguments into a [`Cli`] struct.
pub fn parse() -> Cli {
    Cli::parse()
}
