//! # Environments
//!
//! An [`Environment`] is the set of functions and methods a mapping may call, plus the
//! services those built-ins share. Mappings are always parsed through an environment, and
//! narrowing one (`without_functions`, `only_pure`, a config file) produces a new
//! environment that leaves the original untouched.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::builtins::{self, CounterRegistry};
use crate::config::{EnvironmentConfig, DEFAULT_MAX_DEPTH};
use crate::errors::Result;
use crate::mapping::Mapping;
use crate::registry::{
    FunctionCtor, FunctionSet, FunctionSpec, MethodCtor, MethodSet, MethodSpec, Status,
};
use crate::runtime::Func;
use crate::syntax;

static GLOBAL: Lazy<Environment> = Lazy::new(Environment::standard);

#[derive(Clone)]
pub struct Environment {
    functions: FunctionSet,
    methods: MethodSet,
    counters: Arc<CounterRegistry>,
    max_depth: usize,
}

impl Environment {
    /// An environment with no functions or methods.
    pub fn empty() -> Self {
        Self {
            functions: FunctionSet::new("function"),
            methods: MethodSet::new("method"),
            counters: Arc::new(CounterRegistry::default()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// A fresh environment holding the full standard library.
    pub fn standard() -> Self {
        let mut env = Self::empty();
        builtins::register_all(&mut env.functions, &mut env.methods, &env.counters);
        log::debug!(
            "standard environment ready with {} functions and {} methods",
            env.functions.len(),
            env.methods.len()
        );
        env
    }

    /// The process wide standard environment.
    pub fn global() -> &'static Environment {
        &GLOBAL
    }

    /// The standard environment narrowed by `config`.
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        let mut env = Self::standard();
        let functions: Vec<&str> = config.disabled_functions.iter().map(String::as_str).collect();
        let methods: Vec<&str> = config.disabled_methods.iter().map(String::as_str).collect();
        env = env.without_functions(&functions).without_methods(&methods);
        if config.only_pure {
            env = env.only_pure();
        }
        if !config.allow_deprecated {
            env = env.without_deprecated();
        }
        env.max_depth = config.max_depth;
        env
    }

    pub fn without_functions(&self, names: &[&str]) -> Self {
        log::debug!("removing functions {names:?}");
        Self {
            functions: self.functions.without(names),
            ..self.clone()
        }
    }

    pub fn without_methods(&self, names: &[&str]) -> Self {
        log::debug!("removing methods {names:?}");
        Self {
            methods: self.methods.without(names),
            ..self.clone()
        }
    }

    /// Drops every impure function and method.
    pub fn only_pure(&self) -> Self {
        Self {
            functions: self.functions.only_pure(),
            methods: self.methods.only_pure(),
            ..self.clone()
        }
    }

    pub fn without_deprecated(&self) -> Self {
        let current = |spec: &FunctionSpec| spec.status != Status::Deprecated;
        Self {
            functions: self.functions.filter(current),
            methods: self.methods.filter(current),
            ..self.clone()
        }
    }

    pub fn with_max_depth(&self, max_depth: usize) -> Self {
        Self {
            max_depth,
            ..self.clone()
        }
    }

    /// Compiles a mapping document.
    pub fn parse(&self, source: &str) -> Result<Mapping> {
        let mapping = syntax::parse_mapping(self, source)?;
        log::debug!("compiled mapping with {} statements", mapping.statements().len());
        Ok(mapping)
    }

    /// Compiles a single expression.
    pub fn parse_query(&self, source: &str) -> Result<Func> {
        syntax::parse_query(self, source)
    }

    pub fn register_function(&mut self, spec: FunctionSpec, ctor: FunctionCtor) -> Result<()> {
        self.functions.add(spec, ctor)
    }

    pub fn register_method(&mut self, spec: MethodSpec, ctor: MethodCtor) -> Result<()> {
        self.methods.add(spec, ctor)
    }

    pub fn functions(&self) -> &FunctionSet {
        &self.functions
    }

    pub fn methods(&self) -> &MethodSet {
        &self.methods
    }

    /// Named counters shared by every mapping parsed from this environment.
    pub fn counters(&self) -> &Arc<CounterRegistry> {
        &self.counters
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::standard()
    }
}
