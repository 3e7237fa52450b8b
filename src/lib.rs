//! # Mapling
//!
//! An embeddable runtime for a small mapping language used to reshape, filter and route
//! structured messages. A mapping document is compiled once into a tree of [`Function`]
//! nodes and then executed against many messages, possibly concurrently.
//!
//! ```
//! use mapling::{Environment, Value};
//!
//! let env = Environment::standard();
//! let mapping = env.parse("root.name = this.name.uppercase()").unwrap();
//! let out = mapping.query(&Value::from_json_str(r#"{"name":"ada"}"#).unwrap()).unwrap();
//! assert_eq!(out.to_json_string(), r#"{"name":"ADA"}"#);
//! ```

pub mod builtins;
pub mod cli;
pub mod config;
pub mod conformance;
pub mod environment;
pub mod errors;
pub mod mapping;
pub mod message;
pub mod params;
pub mod registry;
pub mod runtime;
pub mod syntax;
pub mod value;

pub use crate::config::EnvironmentConfig;
pub use crate::environment::Environment;
pub use crate::errors::{MappingError, Result};
pub use crate::mapping::{Mapping, MappingInput, MappingOutput};
pub use crate::message::{Batch, MessageBatch, Part, TraceSpan};
pub use crate::runtime::{Func, Function, FunctionContext, TargetKind, TargetPath, TargetsContext};
pub use crate::value::Value;
