//! # Parameter Binding
//!
//! Turns the arguments written at a call site into the typed inputs a function or method
//! constructor closes over.
//!
//! ## Binding Rules
//!
//! - Arguments are positional, named (`name: expr`) or mixed with positional ones first
//! - Unknown names, duplicates and surplus positional arguments are rejected
//! - Missing parameters take their default, or fail when they are required
//! - Literal arguments are coerced to the declared kind at compile time
//! - Non-literal arguments to value parameters stay dynamic and are resolved on each call,
//!   unless the parameter is static only
//! - Query parameters keep the argument expression itself

use std::sync::Arc;

use serde::Serialize;

use crate::errors::{MappingError, Result};
use crate::registry::FunctionCtor;
use crate::runtime::{exec_child, Func, Function, FunctionContext, Literal, TargetPath, TargetsContext};
use crate::value::{Array, Object, Value};

// ============================================================================
// DECLARATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Any,
    String,
    Int,
    Float,
    Bool,
    Array,
    Object,
    /// The argument expression itself, executed by the function as it sees fit.
    Query,
}

impl ParamKind {
    fn expected(&self) -> &'static str {
        match self {
            ParamKind::Any | ParamKind::Query => "any",
            ParamKind::String => "string",
            ParamKind::Int => "integer",
            ParamKind::Float => "number",
            ParamKind::Bool => "bool",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }

    /// Checks a resolved argument against the kind, converting where that is lossless.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        let coerced = match (self, &value) {
            (ParamKind::Any | ParamKind::Query, _) => Some(value.clone()),
            (ParamKind::String, Value::String(_)) => Some(value.clone()),
            (ParamKind::String, Value::Bytes(b)) => {
                Some(Value::String(String::from_utf8_lossy(b).into_owned()))
            }
            (ParamKind::Int, v) if v.is_number() => v.as_i64().map(Value::Int),
            (ParamKind::Float, v) if v.is_number() => v.as_f64().map(Value::Float),
            (ParamKind::Bool, Value::Bool(_))
            | (ParamKind::Array, Value::Array(_))
            | (ParamKind::Object, Value::Object(_)) => Some(value.clone()),
            _ => None,
        };
        coerced.ok_or_else(|| MappingError::expected(self.expected(), &value))
    }
}

/// A declared parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParamDef {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// The argument must be a literal.
    pub static_only: bool,
    /// A query argument executed with the method target as its context.
    pub scoped: bool,
}

impl ParamDef {
    pub fn new(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            optional: false,
            default: None,
            static_only: false,
            scoped: false,
        }
    }

    pub fn any(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Any, description)
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::String, description)
    }

    pub fn int(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Int, description)
    }

    pub fn float(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Float, description)
    }

    pub fn bool(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Bool, description)
    }

    pub fn array(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Array, description)
    }

    pub fn object(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Object, description)
    }

    pub fn query(name: &str, description: &str) -> Self {
        Self::new(name, ParamKind::Query, description)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Sets a default, which also makes the parameter optional.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.optional = true;
        self
    }

    pub fn static_only(mut self) -> Self {
        self.static_only = true;
        self
    }

    pub fn scoped(mut self) -> Self {
        self.scoped = true;
        self
    }
}

/// The ordered parameter list of a function or method.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Params {
    pub defs: Vec<ParamDef>,
    /// Every positional argument is accepted and collected in order.
    pub variadic: bool,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, def: ParamDef) -> Self {
        self.defs.push(def);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// Binds call site arguments to the declared parameters.
    pub fn bind(&self, args: Vec<CallArg>) -> Result<ParsedParams> {
        if self.variadic {
            return self.bind_variadic(args);
        }

        let total = args.len();
        let mut slots: Vec<Option<Func>> = vec![None; self.defs.len()];
        let mut position = 0;
        let mut seen_named = false;

        for arg in args {
            match arg.name {
                None if seen_named => {
                    return Err(MappingError::params(
                        "positional arguments cannot follow named arguments",
                    ))
                }
                None => {
                    if position >= self.defs.len() {
                        return Err(MappingError::params(format!(
                            "wrong number of arguments, expected {}, got {total}",
                            self.defs.len()
                        )));
                    }
                    slots[position] = Some(arg.value);
                    position += 1;
                }
                Some(name) => {
                    seen_named = true;
                    let index = self
                        .defs
                        .iter()
                        .position(|def| def.name == name)
                        .ok_or_else(|| MappingError::params(format!("unknown parameter `{name}`")))?;
                    if slots[index].is_some() {
                        return Err(MappingError::params(format!(
                            "duplicate argument for parameter `{name}`"
                        )));
                    }
                    slots[index] = Some(arg.value);
                }
            }
        }

        let values = self
            .defs
            .iter()
            .zip(slots)
            .map(|(def, slot)| bind_one(def, slot))
            .collect::<Result<Vec<_>>>()?;

        Ok(ParsedParams {
            defs: Arc::new(self.defs.clone()),
            values,
            variadic: Vec::new(),
        })
    }

    fn bind_variadic(&self, args: Vec<CallArg>) -> Result<ParsedParams> {
        let mut variadic = Vec::with_capacity(args.len());
        for arg in args {
            if let Some(name) = arg.name {
                return Err(MappingError::params(format!(
                    "named argument `{name}` is not accepted by a variadic parameter list"
                )));
            }
            variadic.push(match arg.value.literal() {
                Some(value) => ParamValue::Value(value.clone()),
                None => ParamValue::Dynamic(arg.value),
            });
        }
        Ok(ParsedParams {
            defs: Arc::new(Vec::new()),
            values: Vec::new(),
            variadic,
        })
    }
}

fn bind_one(def: &ParamDef, slot: Option<Func>) -> Result<ParamValue> {
    let Some(arg) = slot else {
        return match (&def.default, def.optional) {
            (Some(default), _) if def.kind == ParamKind::Query => {
                Ok(ParamValue::Query(Literal::func(default.clone())))
            }
            (Some(default), _) => Ok(ParamValue::Value(default.clone())),
            (None, true) => Ok(ParamValue::Absent),
            (None, false) => Err(MappingError::params(format!(
                "missing required parameter `{}`",
                def.name
            ))),
        };
    };

    if def.kind == ParamKind::Query {
        return Ok(ParamValue::Query(arg));
    }
    match arg.literal() {
        Some(Value::Null) if def.optional => Ok(match &def.default {
            Some(default) => ParamValue::Value(default.clone()),
            None => ParamValue::Absent,
        }),
        Some(value) => def
            .kind
            .coerce(value.clone())
            .map(ParamValue::Value)
            .map_err(|err| MappingError::params(format!("parameter `{}`: {err}", def.name))),
        None if def.static_only => Err(MappingError::params(format!(
            "parameter `{}` must be a literal value, got {}",
            def.name,
            arg.annotation()
        ))),
        None => Ok(ParamValue::Dynamic(arg)),
    }
}

// ============================================================================
// BOUND ARGUMENTS
// ============================================================================

/// One argument as written at a call site.
#[derive(Clone)]
pub struct CallArg {
    pub name: Option<String>,
    pub value: Func,
}

impl CallArg {
    pub fn positional(value: Func) -> Self {
        Self { name: None, value }
    }

    pub fn named(name: impl Into<String>, value: Func) -> Self {
        Self {
            name: Some(name.into()),
            value,
        }
    }
}

#[derive(Clone)]
pub enum ParamValue {
    Absent,
    Value(Value),
    Query(Func),
    /// A value argument that has to be evaluated per call.
    Dynamic(Func),
}

/// The outcome of binding: one entry per declared parameter.
#[derive(Clone)]
pub struct ParsedParams {
    defs: Arc<Vec<ParamDef>>,
    values: Vec<ParamValue>,
    variadic: Vec<ParamValue>,
}

impl ParsedParams {
    /// True when some argument still needs a context to be resolved.
    pub fn is_dynamic(&self) -> bool {
        self.values
            .iter()
            .chain(self.variadic.iter())
            .any(|value| matches!(value, ParamValue::Dynamic(_)))
    }

    /// Evaluates dynamic arguments against `ctx`, producing fully static parameters.
    pub fn resolve(&self, ctx: &FunctionContext<'_>) -> Result<ParsedParams> {
        let values = self
            .defs
            .iter()
            .zip(&self.values)
            .map(|(def, value)| match value {
                ParamValue::Dynamic(query) => {
                    let resolved = exec_child(query.as_ref(), ctx)?;
                    if resolved.is_null() && def.optional {
                        return Ok(match &def.default {
                            Some(default) => ParamValue::Value(default.clone()),
                            None => ParamValue::Absent,
                        });
                    }
                    def.kind.coerce(resolved).map(ParamValue::Value).map_err(|err| {
                        MappingError::params(format!("parameter `{}`: {err}", def.name))
                    })
                }
                other => Ok(other.clone()),
            })
            .collect::<Result<Vec<_>>>()?;
        let variadic = self
            .variadic
            .iter()
            .map(|value| match value {
                ParamValue::Dynamic(query) => exec_child(query.as_ref(), ctx).map(ParamValue::Value),
                other => Ok(other.clone()),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ParsedParams {
            defs: self.defs.clone(),
            values,
            variadic,
        })
    }

    /// Every argument expression, flagged when it runs with the method target as context.
    pub fn queries(&self) -> Vec<(Func, bool)> {
        self.defs
            .iter()
            .zip(&self.values)
            .filter_map(|(def, value)| match value {
                ParamValue::Query(query) => Some((query.clone(), def.scoped)),
                ParamValue::Dynamic(query) => Some((query.clone(), false)),
                _ => None,
            })
            .chain(self.variadic.iter().filter_map(|value| match value {
                ParamValue::Dynamic(query) => Some((query.clone(), false)),
                _ => None,
            }))
            .collect()
    }

    /// Argument expressions without the scope flag.
    pub fn query_funcs(&self) -> Vec<Func> {
        self.queries().into_iter().map(|(query, _)| query).collect()
    }

    fn slot(&self, name: &str) -> Option<&ParamValue> {
        let index = self.defs.iter().position(|def| def.name == name)?;
        self.values.get(index)
    }

    fn missing(name: &str) -> MappingError {
        MappingError::params(format!("parameter `{name}` was not provided"))
    }

    /// The resolved value of a parameter, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.slot(name)? {
            ParamValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn field_value(&self, name: &str) -> Result<Value> {
        self.get(name).cloned().ok_or_else(|| Self::missing(name))
    }

    pub fn field_string(&self, name: &str) -> Result<String> {
        self.field_optional_string(name)?
            .ok_or_else(|| Self::missing(name))
    }

    pub fn field_optional_string(&self, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Bytes(b)) => Ok(Some(String::from_utf8_lossy(b).into_owned())),
            Some(other) => Err(MappingError::expected("string", other)),
        }
    }

    pub fn field_int(&self, name: &str) -> Result<i64> {
        self.field_optional_int(name)?.ok_or_else(|| Self::missing(name))
    }

    pub fn field_optional_int(&self, name: &str) -> Result<Option<i64>> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| MappingError::expected("integer", value)),
        }
    }

    pub fn field_float(&self, name: &str) -> Result<f64> {
        let value = self.get(name).ok_or_else(|| Self::missing(name))?;
        value
            .as_f64()
            .ok_or_else(|| MappingError::expected("number", value))
    }

    pub fn field_bool(&self, name: &str) -> Result<bool> {
        self.field_optional_bool(name)?.ok_or_else(|| Self::missing(name))
    }

    pub fn field_optional_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(MappingError::expected("bool", other)),
        }
    }

    pub fn field_array(&self, name: &str) -> Result<Array> {
        match self.get(name) {
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(MappingError::expected("array", other)),
            None => Err(Self::missing(name)),
        }
    }

    pub fn field_object(&self, name: &str) -> Result<Object> {
        match self.get(name) {
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(MappingError::expected("object", other)),
            None => Err(Self::missing(name)),
        }
    }

    pub fn field_query(&self, name: &str) -> Result<Func> {
        self.field_optional_query(name)?
            .ok_or_else(|| Self::missing(name))
    }

    pub fn field_optional_query(&self, name: &str) -> Result<Option<Func>> {
        match self.slot(name) {
            Some(ParamValue::Query(query)) => Ok(Some(query.clone())),
            Some(ParamValue::Value(value)) => Ok(Some(Literal::func(value.clone()))),
            _ => Ok(None),
        }
    }

    /// Positional arguments of a variadic parameter list, once resolved.
    pub fn variadic(&self) -> Vec<Value> {
        self.variadic
            .iter()
            .filter_map(|value| match value {
                ParamValue::Value(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// DYNAMIC ARGUMENTS
// ============================================================================

/// A function call with arguments that can only be resolved per call. Each call
/// resolves them and constructs the function afresh.
pub struct DynamicArgsFunction {
    name: String,
    params: ParsedParams,
    ctor: FunctionCtor,
}

impl DynamicArgsFunction {
    pub fn new(name: impl Into<String>, params: ParsedParams, ctor: FunctionCtor) -> Self {
        Self {
            name: name.into(),
            params,
            ctor,
        }
    }
}

impl Function for DynamicArgsFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let resolved = self.params.resolve(ctx)?;
        let function = (self.ctor)(&resolved)?;
        function.exec(ctx)
    }

    fn annotation(&self) -> String {
        format!("function `{}`", self.name)
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let paths = self
            .params
            .query_funcs()
            .iter()
            .flat_map(|query| query.query_targets(ctx.clone()).1)
            .collect();
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        for query in self.params.query_funcs() {
            query.close()?;
        }
        Ok(())
    }
}
