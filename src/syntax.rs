//! # Syntax
//!
//! The mapping language grammar (`syntax/grammar.pest`) and the compiler that lowers it
//! into runtime nodes.
//!
//! ## Module Structure
//!
//! - `grammar.pest`: statements, the expression grammar, literals and keywords
//! - `parser`: pest driver, operator precedence and node construction
//!
//! Precedence from loosest to tightest: `|`, `||`, `&&`, comparisons, `+ -`, `* / %`,
//! prefix `! -`, then `.field` and `.method()`.

mod parser;

pub use parser::{parse_mapping, parse_query};
