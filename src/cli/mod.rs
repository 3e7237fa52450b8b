//! The Mapling Command-Line Interface.
//!
//! This module is the main entry point for all CLI commands and orchestrates
//! the core library functions. Every handler returns a [`Result`]; errors are rendered
//! once, here, through miette.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process;

use clap::Parser;

use crate::cli::args::{Command, MaplingArgs};
use crate::config::EnvironmentConfig;
use crate::conformance;
use crate::environment::Environment;
use crate::errors::{print_error, MappingError, Result};
use crate::message::{Batch, Part};
use crate::runtime::FunctionContext;
use crate::value::Value;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = MaplingArgs::parse();
    init_logging(args.verbose);

    match execute(&args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            print_error(e);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn build_environment(config: Option<&Path>) -> Result<Environment> {
    match config {
        Some(path) => {
            log::info!("loading environment config from {}", path.display());
            Ok(Environment::from_config(&EnvironmentConfig::load(path)?))
        }
        None => Ok(Environment::standard()),
    }
}

/// Dispatches a command. `Ok(false)` means the command ran but reported failures.
pub fn execute(args: &MaplingArgs) -> Result<bool> {
    let env = build_environment(args.config.as_deref())?;

    match &args.command {
        Command::Eval { file, input, lines } => {
            eval_file(&env, file, input.as_deref(), *lines)?;
            Ok(true)
        }
        Command::Query { expression, input } => {
            query(&env, expression, input.as_deref())?;
            Ok(true)
        }
        Command::Targets { file } => {
            let mapping = env.parse(&read_file(file)?)?;
            for target in mapping.targets() {
                println!("{target}");
            }
            Ok(true)
        }
        Command::Functions { json } => {
            list(env.functions().specs(), *json, "")?;
            Ok(true)
        }
        Command::Methods { json } => {
            list(env.methods().specs(), *json, ".")?;
            Ok(true)
        }
        Command::Check => {
            let results = conformance::check_examples(&env);
            Ok(output::print_results(&results)?.failed == 0)
        }
        Command::Test { path } => {
            if !path.is_dir() {
                return Err(MappingError::general(format!(
                    "test path {} is not a directory",
                    path.display()
                )));
            }
            let results = conformance::run_suites(&env, path);
            if results.is_empty() {
                println!("No test suites found in {}", path.display());
            }
            Ok(output::print_results(&results)?.failed == 0)
        }
    }
}

// ============================================================================
// COMMAND HANDLERS
// ============================================================================

fn eval_file(env: &Environment, file: &Path, input: Option<&Path>, lines: bool) -> Result<()> {
    let mapping = env.parse(&read_file(file)?)?;
    let raw = read_input(input)?;
    let parts = if lines {
        raw.split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .map(Part::new)
            .collect()
    } else {
        vec![Part::new(raw)]
    };
    let batch = Batch::new(parts);

    for index in 0..batch.parts().len() {
        match mapping.map_part(&batch, index)? {
            Some(part) => println!("{}", String::from_utf8_lossy(part.raw())),
            None => log::info!("message {index} was deleted"),
        }
    }
    mapping.close()
}

fn query(env: &Environment, expression: &str, input: Option<&Path>) -> Result<()> {
    let query = env.parse_query(expression)?;
    let part = Part::new(read_input(input)?);
    let parsed = part.structured().ok();
    let batch = Batch::from(part);
    let ctx = match &parsed {
        Some(value) => FunctionContext::for_value(value),
        None => FunctionContext::empty(),
    }
    .with_batch(&batch, 0);

    let result = query.exec(&ctx)?;
    query.close()?;
    match result {
        Value::String(s) => println!("{s}"),
        other => println!("{}", other.to_json_pretty()),
    }
    Ok(())
}

fn list<'a>(
    specs: impl Iterator<Item = &'a crate::registry::FunctionSpec>,
    json: bool,
    call_prefix: &str,
) -> Result<()> {
    if json {
        let specs: Vec<_> = specs.collect();
        let rendered = serde_json::to_string_pretty(&specs)
            .map_err(|err| MappingError::general(format!("failed to serialise specs: {err}")))?;
        println!("{rendered}");
        return Ok(());
    }
    output::print_specs(specs, call_prefix)?;
    Ok(())
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| {
        MappingError::general(format!("failed to read {}: {err}", path.display()))
    })
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => fs::read(path).map_err(|err| {
            MappingError::general(format!("failed to read {}: {err}", path.display()))
        }),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}
