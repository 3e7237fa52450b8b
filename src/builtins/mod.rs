//! # Standard Library
//!
//! Every function and method a standard [`Environment`](crate::Environment) provides.
//!
//! ## Module Structure
//!
//! - **`helpers`**: registration shortcuts and shared argument checks
//! - **`general`**: sentinels, errors, ranges, variables and fallbacks
//! - **`message`**: raw content, metadata, batch position and tracing
//! - **`environment`**: process environment, clock and identifiers (impure)
//! - **`stateful`**: counters and seeded random numbers (impure)
//! - **`numbers`**: rounding and numeric conversions
//! - **`strings`**: text operations shared by strings and byte sequences
//! - **`encoding`**: hashing, base64/hex and JSON (de)serialisation
//! - **`regex`**: regular expression matching and replacement
//! - **`collections`**: higher-order array and object methods
//!
//! ## Design Principles
//!
//! - **Documented by Example**: every entry carries at least one example, and the examples
//!   run as conformance tests
//! - **Compile Once**: constructors validate static arguments when the mapping is parsed

use std::sync::Arc;

use crate::registry::{FunctionSet, MethodSet};

pub mod collections;
pub mod encoding;
pub mod environment;
pub mod general;
pub mod helpers;
pub mod message;
pub mod numbers;
pub mod regex;
pub mod stateful;
pub mod strings;

pub use stateful::CounterRegistry;

/// Registers the whole standard library.
pub fn register_all(
    functions: &mut FunctionSet,
    methods: &mut MethodSet,
    counters: &Arc<CounterRegistry>,
) {
    general::register_functions(functions);
    general::register_methods(methods);
    message::register_functions(functions);
    environment::register_functions(functions);
    stateful::register_functions(functions, counters);
    numbers::register_methods(methods);
    strings::register_methods(methods);
    encoding::register_methods(methods);
    regex::register_methods(methods);
    collections::register_methods(methods);
}
