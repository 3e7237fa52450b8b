//! Defines the command-line arguments and subcommands for the Mapling CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "mapling",
    version,
    about = "Run, inspect and test mappings that reshape structured messages."
)]
pub struct MaplingArgs {
    /// Environment configuration file (YAML).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Raise log verbosity: -v info, -vv debug, -vvv trace.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a mapping file against a message.
    Eval {
        /// The mapping to run.
        #[arg(required = true)]
        file: PathBuf,
        /// The message to map. Read from stdin when absent.
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Treat every non-empty input line as a message of one batch.
        #[arg(long)]
        lines: bool,
    },
    /// Evaluate a single expression against a message and print its value.
    Query {
        /// The expression, for example `this.user.name.uppercase()`.
        #[arg(required = true)]
        expression: String,
        /// The message to query. Read from stdin when absent.
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
    /// List the input paths a mapping reads.
    Targets {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// List the available functions.
    Functions {
        /// Print the full specifications as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the available methods.
    Methods {
        /// Print the full specifications as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run the documented examples of every function and method.
    Check,
    /// Discover and run all YAML test suites in a directory.
    Test {
        /// The directory containing the suites.
        #[arg(default_value = "tests/suites")]
        path: PathBuf,
    },
}
