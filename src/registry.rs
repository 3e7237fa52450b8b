//! # Function and Method Registry
//!
//! Every built-in is registered once as a [`FunctionSpec`] paired with a constructor. The
//! parser asks a [`FunctionSet`] or [`MethodSet`] to initialise a call site: the arguments
//! are bound against the declared parameters and the constructor returns the compiled node.
//! Constructors run once per call site, never per message.
//!
//! ## Registry Invariant
//!
//! Specs are immutable after registration. Sets are cheap to clone and filtering returns a
//! new set, so an [`Environment`](crate::Environment) can be narrowed without affecting
//! the one it came from.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::errors::{MappingError, Result};
use crate::params::{CallArg, DynamicArgsFunction, ParamDef, Params, ParsedParams};
use crate::runtime::{recovering_body, Func, MethodBody, MethodFunction};

/// Snake case: lowercase alphanumeric words joined by single underscores.
fn valid_name(name: &str) -> bool {
    name.split('_').all(|word| {
        !word.is_empty() && word.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    })
}

// ============================================================================
// SPECIFICATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Stable,
    Beta,
    Experimental,
    Deprecated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    General,
    Message,
    Environment,
    Stateful,
    Numbers,
    Strings,
    Encoding,
    Regex,
    Collections,
    Coercion,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::General => "general",
            Category::Message => "message",
            Category::Environment => "environment",
            Category::Stateful => "stateful",
            Category::Numbers => "numbers",
            Category::Strings => "strings",
            Category::Encoding => "encoding",
            Category::Regex => "regex",
            Category::Collections => "collections",
            Category::Coercion => "coercion",
        };
        f.write_str(name)
    }
}

/// A documented usage that doubles as a conformance test.
///
/// `mapping` is a complete mapping. Each result pairs a JSON input document with the
/// expected JSON output, or with `Error(<substring>)` when the mapping must fail.
#[derive(Debug, Clone, Serialize)]
pub struct Example {
    pub summary: String,
    pub mapping: String,
    pub results: Vec<(String, String)>,
    pub skip_testing: bool,
}

impl Example {
    pub fn new(summary: &str, mapping: &str, results: &[(&str, &str)]) -> Self {
        Self {
            summary: summary.to_string(),
            mapping: mapping.to_string(),
            results: results
                .iter()
                .map(|(input, output)| (input.to_string(), output.to_string()))
                .collect(),
            skip_testing: false,
        }
    }

    /// For examples whose output is not reproducible, such as timestamps.
    pub fn skip_testing(mut self) -> Self {
        self.skip_testing = true;
        self
    }
}

/// The registration record of a function or method.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub category: Category,
    pub status: Status,
    pub summary: String,
    pub description: String,
    pub params: Params,
    /// Reads the environment, the clock or randomness, or keeps state between calls.
    pub impure: bool,
    pub examples: Vec<Example>,
}

/// Methods are described by the same record as functions.
pub type MethodSpec = FunctionSpec;

impl FunctionSpec {
    pub fn new(name: &str, category: Category, summary: &str) -> Self {
        Self {
            name: name.to_string(),
            category,
            status: Status::Stable,
            summary: summary.to_string(),
            description: String::new(),
            params: Params::new(),
            impure: false,
            examples: Vec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn param(mut self, def: ParamDef) -> Self {
        self.params = self.params.add(def);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.params = self.params.variadic();
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn beta(self) -> Self {
        self.status(Status::Beta)
    }

    pub fn deprecated(self) -> Self {
        self.status(Status::Deprecated)
    }

    pub fn impure(mut self) -> Self {
        self.impure = true;
        self
    }

    pub fn example(mut self, example: Example) -> Self {
        self.examples.push(example);
        self
    }
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

/// Builds a function node from bound parameters.
pub type FunctionCtor = Arc<dyn Fn(&ParsedParams) -> Result<Func> + Send + Sync>;

/// Builds a method body from bound parameters. The target is attached by the registry.
pub type MethodCtor = Arc<dyn Fn(&ParsedParams) -> Result<MethodBody> + Send + Sync>;

pub fn function_ctor<F>(ctor: F) -> FunctionCtor
where
    F: Fn(&ParsedParams) -> Result<Func> + Send + Sync + 'static,
{
    Arc::new(ctor)
}

pub fn method_ctor<F>(ctor: F) -> MethodCtor
where
    F: Fn(&ParsedParams) -> Result<MethodBody> + Send + Sync + 'static,
{
    Arc::new(ctor)
}

// ============================================================================
// SETS
// ============================================================================

#[derive(Clone)]
struct Entry<C> {
    spec: Arc<FunctionSpec>,
    ctor: C,
}

/// A name keyed set of registered entries.
#[derive(Clone)]
pub struct Registry<C> {
    kind: &'static str,
    entries: BTreeMap<String, Entry<C>>,
}

pub type FunctionSet = Registry<FunctionCtor>;
pub type MethodSet = Registry<MethodCtor>;

impl<C: Clone> Registry<C> {
    /// `kind` names the entries in error messages ("function", "method").
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Registers an entry. Names must be snake case and unique within the set.
    pub fn add(&mut self, spec: FunctionSpec, ctor: C) -> Result<()> {
        if !valid_name(&spec.name) {
            return Err(MappingError::general(format!(
                "{} name `{}` is not snake case",
                self.kind, spec.name
            )));
        }
        if self.entries.contains_key(&spec.name) {
            return Err(MappingError::general(format!(
                "conflicting {} name: {}",
                self.kind, spec.name
            )));
        }
        log::trace!("registering {} `{}`", self.kind, spec.name);
        self.entries.insert(
            spec.name.clone(),
            Entry {
                spec: Arc::new(spec),
                ctor,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSpec> {
        self.entries.get(name).map(|entry| entry.spec.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &FunctionSpec> {
        self.entries.values().map(|entry| entry.spec.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A copy keeping only the entries `keep` accepts.
    pub fn filter(&self, keep: impl Fn(&FunctionSpec) -> bool) -> Self {
        Self {
            kind: self.kind,
            entries: self
                .entries
                .iter()
                .filter(|(_, entry)| keep(&entry.spec))
                .map(|(name, entry)| (name.clone(), entry.clone()))
                .collect(),
        }
    }

    pub fn without(&self, names: &[&str]) -> Self {
        self.filter(|spec| !names.contains(&spec.name.as_str()))
    }

    pub fn only_pure(&self) -> Self {
        self.filter(|spec| !spec.impure)
    }

    fn entry(&self, name: &str) -> Result<&Entry<C>> {
        let entry = self.entries.get(name).ok_or_else(|| MappingError::Unknown {
            kind: self.kind,
            name: name.to_string(),
        })?;
        if entry.spec.status == Status::Deprecated {
            log::warn!("{} `{}` is deprecated", self.kind, name);
        }
        Ok(entry)
    }
}

impl Registry<FunctionCtor> {
    /// Compiles a call to the function `name`.
    pub fn init(&self, name: &str, args: Vec<CallArg>) -> Result<Func> {
        let entry = self.entry(name)?;
        let parsed = entry
            .spec
            .params
            .bind(args)
            .map_err(|err| err.annotate(format!("function `{name}`")))?;
        if parsed.is_dynamic() {
            return Ok(Arc::new(DynamicArgsFunction::new(
                name,
                parsed,
                entry.ctor.clone(),
            )));
        }
        (entry.ctor)(&parsed).map_err(|err| err.annotate(format!("function `{name}`")))
    }
}

impl Registry<MethodCtor> {
    /// Compiles a call to the method `name` on `target`.
    pub fn init(&self, name: &str, target: Func, args: Vec<CallArg>) -> Result<Func> {
        let entry = self.entry(name)?;
        let parsed = entry
            .spec
            .params
            .bind(args)
            .map_err(|err| err.annotate(format!("method `{name}`")))?;
        let queries = parsed.queries();
        let body: MethodBody = if parsed.is_dynamic() {
            let ctor = entry.ctor.clone();
            recovering_body(move |target, ctx| {
                let resolved = parsed.resolve(ctx)?;
                let body = ctor(&resolved)?;
                body(target, ctx)
            })
        } else {
            (entry.ctor)(&parsed).map_err(|err| err.annotate(format!("method `{name}`")))?
        };
        Ok(Arc::new(MethodFunction::new(name, target, body, queries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamDef;
    use crate::runtime::{method_body, FieldFunction, Function, FunctionContext, Literal};
    use crate::value::Value;

    fn shout() -> (FunctionSpec, MethodCtor) {
        let spec = FunctionSpec::new("shout", Category::Strings, "Appends a suffix.")
            .param(ParamDef::string("suffix", "text to append").default("!"));
        let ctor = method_ctor(|params| {
            let suffix = params.field_string("suffix")?;
            Ok(method_body(move |value, _ctx| match value {
                Value::String(s) => Ok(Value::String(format!("{s}{suffix}"))),
                other => Err(MappingError::expected("string", &other)),
            }))
        });
        (spec, ctor)
    }

    #[test]
    fn names_are_validated_and_unique() {
        let mut set = MethodSet::new("method");
        let (spec, ctor) = shout();
        set.add(spec.clone(), ctor.clone()).unwrap();
        assert!(set.add(spec, ctor.clone()).is_err());
        let (mut bad, _) = shout();
        bad.name = "Bad-Name".into();
        assert!(set.add(bad, ctor).is_err());
        assert_eq!(set.names(), vec!["shout"]);
        assert!(valid_name("re_find_all"));
        assert!(!valid_name("trailing_"));
    }

    #[test]
    fn unknown_entries_are_reported() {
        let set = FunctionSet::new("function");
        let err = set.init("nope", vec![]).err().unwrap();
        assert_eq!(err.to_string(), "unrecognised function `nope`");
    }

    #[test]
    fn methods_bind_static_and_dynamic_arguments() {
        let mut set = MethodSet::new("method");
        let (spec, ctor) = shout();
        set.add(spec, ctor).unwrap();

        let doc = Value::from_json_str(r#"{"name":"hi","tail":"?"}"#).unwrap();
        let ctx = FunctionContext::for_value(&doc);
        let target: Func = Arc::new(FieldFunction::this(&["name"]));

        let fixed = set.init("shout", target.clone(), vec![]).unwrap();
        assert_eq!(fixed.exec(&ctx).unwrap(), Value::from("hi!"));

        let dynamic = set
            .init(
                "shout",
                target,
                vec![CallArg::positional(Arc::new(FieldFunction::this(&["tail"])))],
            )
            .unwrap();
        assert_eq!(dynamic.exec(&ctx).unwrap(), Value::from("hi?"));
    }

    #[test]
    fn filtering_returns_new_sets() {
        let mut set = FunctionSet::new("function");
        let pure = FunctionSpec::new("one", Category::General, "");
        let impure = FunctionSpec::new("two", Category::Environment, "").impure();
        let ctor = function_ctor(|_| Ok(Literal::func(Value::Null)));
        set.add(pure, ctor.clone()).unwrap();
        set.add(impure, ctor).unwrap();
        assert_eq!(set.only_pure().names(), vec!["one"]);
        assert_eq!(set.without(&["one"]).names(), vec!["two"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn constructor_errors_name_the_function() {
        let mut set = FunctionSet::new("function");
        let spec = FunctionSpec::new("fails", Category::General, "");
        set.add(spec, function_ctor(|_| Err(MappingError::general("bad config"))))
            .unwrap();
        let err = set.init("fails", vec![]).err().unwrap();
        assert_eq!(err.to_string(), "function `fails`: bad config");
    }
}
