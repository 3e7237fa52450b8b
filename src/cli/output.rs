//! Handles all user-facing output for the CLI.
//!
//! Pretty-printing, colours and diffs live here so every command reports in the same
//! way. Colour is enabled only when stdout is a terminal.

use std::io::{self, Write};

use difference::{Changeset, Difference};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::conformance::{CaseResult, Outcome, Summary};
use crate::registry::{FunctionSpec, Status};

pub fn stdout() -> StandardStream {
    let choice = if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

fn colored(out: &mut StandardStream, color: Color, bold: bool, text: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold))?;
    write!(out, "{text}")?;
    out.reset()
}

// ============================================================================
// REGISTRY LISTINGS
// ============================================================================

/// One line per entry: name, category, status marker and summary.
pub fn print_specs<'a>(specs: impl Iterator<Item = &'a FunctionSpec>, call_prefix: &str) -> io::Result<()> {
    let mut out = stdout();
    let mut specs: Vec<_> = specs.collect();
    specs.sort_by(|a, b| (a.category, &a.name).cmp(&(b.category, &b.name)));
    if specs.is_empty() {
        writeln!(out, "  No entries found.")?;
        return Ok(());
    }
    for spec in specs {
        colored(&mut out, Color::Cyan, true, &format!("{call_prefix}{}", spec.name))?;
        write!(out, " [{}]", spec.category)?;
        match spec.status {
            Status::Stable => {}
            Status::Deprecated => colored(&mut out, Color::Red, false, " (deprecated)")?,
            Status::Beta => colored(&mut out, Color::Yellow, false, " (beta)")?,
            Status::Experimental => colored(&mut out, Color::Yellow, false, " (experimental)")?,
        }
        if spec.impure {
            write!(out, " (impure)")?;
        }
        writeln!(out, "  {}", spec.summary)?;
    }
    Ok(())
}

// ============================================================================
// HARNESS RESULTS
// ============================================================================

/// Prints each case, a diff for every failure, then the totals.
pub fn print_results(results: &[CaseResult]) -> io::Result<Summary> {
    let mut out = stdout();
    for result in results {
        match &result.outcome {
            Outcome::Pass => {
                colored(&mut out, Color::Green, false, "✓")?;
                writeln!(out, " {} {}", result.source, result.name)?;
            }
            Outcome::Skipped { reason } => {
                colored(&mut out, Color::Yellow, false, "-")?;
                writeln!(out, " {} {} (skipped: {reason})", result.source, result.name)?;
            }
            Outcome::Fail { expected, actual } => {
                colored(&mut out, Color::Red, true, "✗")?;
                writeln!(out, " {} {}", result.source, result.name)?;
                print_diff(&mut out, expected, actual)?;
            }
        }
    }

    let summary = Summary::of(results);
    writeln!(out)?;
    colored(&mut out, Color::White, true, "Summary")?;
    writeln!(out)?;
    colored(&mut out, Color::Green, false, &format!("  passed:  {}", summary.passed))?;
    writeln!(out)?;
    if summary.failed > 0 {
        colored(&mut out, Color::Red, false, &format!("  failed:  {}", summary.failed))?;
        writeln!(out)?;
    }
    if summary.skipped > 0 {
        colored(&mut out, Color::Yellow, false, &format!("  skipped: {}", summary.skipped))?;
        writeln!(out)?;
    }
    Ok(summary)
}

fn print_diff(out: &mut StandardStream, expected: &str, actual: &str) -> io::Result<()> {
    let changeset = Changeset::new(expected, actual, "\n");
    for diff in &changeset.diffs {
        match diff {
            Difference::Same(text) => {
                for line in text.lines() {
                    writeln!(out, "    {line}")?;
                }
            }
            Difference::Rem(text) => {
                for line in text.lines() {
                    colored(out, Color::Red, false, &format!("  - {line}"))?;
                    writeln!(out)?;
                }
            }
            Difference::Add(text) => {
                for line in text.lines() {
                    colored(out, Color::Green, false, &format!("  + {line}"))?;
                    writeln!(out)?;
                }
            }
        }
    }
    Ok(())
}
