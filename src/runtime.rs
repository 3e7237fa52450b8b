//! # Mapling Runtime
//!
//! The evaluator core. A compiled mapping is a tree of [`Function`] nodes; evaluation
//! walks the tree with a borrowed [`FunctionContext`] and every node returns exactly one
//! [`Value`](crate::value::Value) (possibly a sentinel) or an error.
//!
//! ## Module Structure
//!
//! - **`context`**: per-evaluation contexts and named sub-context frames
//! - **`function`**: the `Function` trait, literals and the closures built-ins compile to
//! - **`field`**: field, variable and metadata references
//! - **`literals`**: array and object constructors
//! - **`ops`**: arithmetic, comparison, boolean and coalescing operators
//! - **`control`**: `if`, `match` and lambda expressions
//! - **`targets`**: static target path analysis
//!
//! ## Design Principles
//!
//! - **Shared Trees**: compiled nodes are immutable or guard their own state, so one tree
//!   can serve concurrent callers
//! - **Borrowed Contexts**: contexts never outlive a single `exec` call
//! - **Single Annotation**: errors are annotated once, by the first consumer

pub mod context;
pub mod control;
pub mod field;
pub mod function;
pub mod literals;
pub mod ops;
pub mod targets;

pub use context::{FunctionContext, NamedFrame, Variables};
pub use control::{IfFunction, LambdaFunction, MatchCase, MatchFunction};
pub use field::{FieldFunction, FieldScope, GetFunction, MetadataFunction, VariableFunction};
pub use function::{
    exec_child, method_body, recovering_body, ClosureFunction, Func, Function, FunctionBody,
    Literal, MemoizedQuery, MethodBody, MethodFunction,
};
pub use literals::{ArrayLiteral, ObjectLiteral};
pub use ops::{ArithmeticFunction, CoalesceFunction, NegateFunction, NotFunction, Op};
pub use targets::{TargetKind, TargetPath, TargetsContext};
