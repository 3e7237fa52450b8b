//! Array and object constructors with dynamic members.
//!
//! Constructors whose members are all constants are folded into a single
//! [`Literal`](crate::runtime::Literal) by the parser; these nodes only exist when at least
//! one member has to be evaluated per call. Members that evaluate to `Delete` or `Nothing`
//! are left out of the result.

use crate::errors::{MappingError, Result};
use crate::runtime::context::FunctionContext;
use crate::runtime::function::{close_all, exec_child, union_targets, Func, Function};
use crate::runtime::targets::{TargetPath, TargetsContext};
use crate::value::{Array, Object, Value};

pub struct ArrayLiteral {
    items: Vec<Func>,
}

impl ArrayLiteral {
    pub fn new(items: Vec<Func>) -> Self {
        Self { items }
    }
}

impl Function for ArrayLiteral {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let mut out = Array::new();
        for item in &self.items {
            let value = exec_child(item.as_ref(), ctx)?;
            if !value.is_sentinel() {
                out.push_back(value);
            }
        }
        Ok(Value::Array(out))
    }

    fn annotation(&self) -> String {
        "array literal".to_string()
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let paths = union_targets(&ctx, &self.items);
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        close_all(&self.items)
    }
}

pub struct ObjectLiteral {
    entries: Vec<(Func, Func)>,
}

impl ObjectLiteral {
    pub fn new(entries: Vec<(Func, Func)>) -> Self {
        Self { entries }
    }
}

impl Function for ObjectLiteral {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let mut out = Object::new();
        for (key_fn, value_fn) in &self.entries {
            let key = match exec_child(key_fn.as_ref(), ctx)? {
                Value::String(key) => key,
                other => {
                    return Err(MappingError::expected("string", &other)
                        .annotate(format!("object key from {}", key_fn.annotation())))
                }
            };
            let value = exec_child(value_fn.as_ref(), ctx)?;
            if !value.is_sentinel() {
                out.insert(key, value);
            }
        }
        Ok(Value::Object(out))
    }

    fn annotation(&self) -> String {
        "object literal".to_string()
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let paths = self
            .entries
            .iter()
            .flat_map(|(key, value)| {
                let mut paths = key.query_targets(ctx.clone()).1;
                paths.extend(value.query_targets(ctx.clone()).1);
                paths
            })
            .collect();
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        close_all(self.entries.iter().flat_map(|(key, value)| [key, value]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::field::FieldFunction;
    use crate::runtime::function::Literal;
    use std::sync::Arc;

    #[test]
    fn sentinels_are_skipped() {
        let doc = Value::from_json_str(r#"{"a":1}"#).unwrap();
        let ctx = FunctionContext::for_value(&doc);
        let array = ArrayLiteral::new(vec![
            Arc::new(FieldFunction::this(&["a"])),
            Literal::func(Value::Nothing),
            Literal::func(Value::Delete),
        ]);
        assert_eq!(array.exec(&ctx).unwrap(), Value::from(vec![Value::from(1i64)]));

        let object = ObjectLiteral::new(vec![
            (Literal::func(Value::from("kept")), Arc::new(FieldFunction::this(&["a"]))),
            (Literal::func(Value::from("gone")), Literal::func(Value::Delete)),
        ]);
        assert_eq!(
            object.exec(&ctx).unwrap().to_json_string(),
            r#"{"kept":1}"#
        );
    }

    #[test]
    fn object_keys_must_be_strings() {
        let object = ObjectLiteral::new(vec![(Literal::func(Value::from(5i64)), Literal::func(Value::Null))]);
        let err = object.exec(&FunctionContext::empty()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "object key from number literal: expected string value, got number (5)"
        );
    }
}
