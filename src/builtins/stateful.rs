//! # Stateful Built-ins
//!
//! Functions whose result depends on earlier calls. State belongs to the compiled node
//! (one counter per call site) and is shared by every concurrent caller of that node, so
//! each node serialises access with its own mutex.
//!
//! ## State Machines
//!
//! - **`counter`**: uninitialised until the first call resolves `min` and `max`, then
//!   counts from `min` up to and including `max` before starting over
//! - **`random_int`**: seeded on the first call, then draws from the same generator
//! - **`count`**: named counters held by the environment's [`CounterRegistry`]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::builtins::helpers::register;
use crate::errors::{MappingError, Result};
use crate::params::ParamDef;
use crate::registry::{function_ctor, Category, Example, FunctionSet, FunctionSpec};
use crate::runtime::function::{close_all, union_targets};
use crate::runtime::{
    exec_child, ClosureFunction, Func, Function, FunctionContext, MemoizedQuery, TargetPath,
    TargetsContext,
};
use crate::value::Value;

fn resolve_int(query: &Func, ctx: &FunctionContext<'_>, name: &str) -> Result<i64> {
    let value = exec_child(query.as_ref(), ctx)?;
    value
        .as_i64()
        .ok_or_else(|| MappingError::params(format!("parameter `{name}`: {}", MappingError::expected("integer", &value))))
}

// ============================================================================
// COUNTER
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct CounterState {
    min: i64,
    max: i64,
    /// The value most recently returned.
    current: i64,
}

/// `counter(min, max, set)`
pub struct CounterFunction {
    min: Func,
    max: Func,
    set: Option<Func>,
    state: Mutex<Option<CounterState>>,
}

impl CounterFunction {
    pub fn new(min: Func, max: Func, set: Option<Func>) -> Self {
        Self {
            min,
            max,
            set,
            state: Mutex::new(None),
        }
    }

    fn initialise(&self, ctx: &FunctionContext<'_>) -> Result<CounterState> {
        let min = resolve_int(&self.min, ctx, "min")?;
        let max = resolve_int(&self.max, ctx, "max")?;
        if min < 0 {
            return Err(MappingError::params(format!(
                "min must be greater than or equal to zero, got {min}"
            )));
        }
        if max <= min {
            return Err(MappingError::params(format!(
                "max must be greater than min, got min {min} and max {max}"
            )));
        }
        log::debug!("counter initialised with min {min} and max {max}");
        Ok(CounterState {
            min,
            max,
            current: min - 1,
        })
    }

    fn advance(&self, state: &mut CounterState, ctx: &FunctionContext<'_>) -> Result<Value> {
        if let Some(set) = &self.set {
            match exec_child(set.as_ref(), ctx)? {
                Value::Nothing => return Ok(Value::Int(state.current)),
                Value::Delete => {
                    log::trace!("counter reset to {}", state.min);
                    state.current = state.min - 1;
                }
                Value::Null => {}
                other => {
                    let value = other
                        .as_i64()
                        .ok_or_else(|| MappingError::expected("integer", &other))?;
                    state.current = value;
                    return Ok(Value::Int(value));
                }
            }
        }

        let value = match state.current.checked_add(1) {
            Some(next) if next < state.max => next,
            _ => state.max,
        };
        state.current = if value >= state.max { state.min - 1 } else { value };
        Ok(Value::Int(value))
    }
}

impl Function for CounterFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let mut guard = self.state.lock();
        let mut state = match *guard {
            Some(state) => state,
            None => self.initialise(ctx)?,
        };
        let result = self.advance(&mut state, ctx);
        *guard = Some(state);
        result
    }

    fn annotation(&self) -> String {
        "function `counter`".to_string()
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let paths = union_targets(&ctx, [&self.min, &self.max].into_iter().chain(self.set.iter()));
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        close_all([&self.min, &self.max].into_iter().chain(self.set.iter()))
    }
}

// ============================================================================
// RANDOM INTEGERS
// ============================================================================

/// `random_int(seed, min, max)`
pub struct RandomIntFunction {
    seed: Func,
    min: i64,
    max: i64,
    rng: Mutex<Option<Xoshiro256StarStar>>,
}

impl RandomIntFunction {
    /// Validates the bounds. `i64::MAX` itself is reserved and cannot be used as `max`.
    pub fn new(seed: Func, min: i64, max: i64) -> Result<Self> {
        if min < 0 {
            return Err(MappingError::params(format!(
                "min must be greater than or equal to zero, got {min}"
            )));
        }
        if max == i64::MAX {
            return Err(MappingError::params(format!(
                "max must be less than {}",
                i64::MAX
            )));
        }
        if max <= min {
            return Err(MappingError::params(format!(
                "max must be greater than min, got min {min} and max {max}"
            )));
        }
        Ok(Self {
            seed: MemoizedQuery::func(seed),
            min,
            max,
            rng: Mutex::new(None),
        })
    }
}

impl Function for RandomIntFunction {
    fn exec(&self, ctx: &FunctionContext<'_>) -> Result<Value> {
        let mut guard = self.rng.lock();
        if guard.is_none() {
            let seed = exec_child(self.seed.as_ref(), ctx)?;
            let seed = seed
                .as_i64()
                .map(|s| s as u64)
                .or_else(|| seed.as_u64())
                .ok_or_else(|| MappingError::expected("integer seed", &seed))?;
            log::debug!("random_int seeded with {seed}");
            *guard = Some(Xoshiro256StarStar::seed_from_u64(seed));
        }
        match guard.as_mut() {
            Some(rng) => Ok(Value::Int(rng.gen_range(self.min..=self.max))),
            None => Err(MappingError::general("random generator is not seeded")),
        }
    }

    fn annotation(&self) -> String {
        "function `random_int`".to_string()
    }

    fn query_targets(&self, ctx: TargetsContext) -> (TargetsContext, Vec<TargetPath>) {
        let paths = self.seed.query_targets(ctx.clone()).1;
        (ctx, paths)
    }

    fn close(&self) -> Result<()> {
        self.seed.close()
    }
}

// ============================================================================
// NAMED COUNTERS
// ============================================================================

/// Named counters shared by every mapping compiled from one environment.
///
/// Each key has its own atomic counter inside a sharded map, so unrelated keys never
/// contend for the same lock.
#[derive(Debug, Default)]
pub struct CounterRegistry {
    counters: DashMap<String, AtomicI64>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter `name` and returns its new value, starting at 1.
    pub fn increment(&self, name: &str) -> i64 {
        if let Some(counter) = self.counters.get(name) {
            return counter.fetch_add(1, Ordering::SeqCst) + 1;
        }
        let counter = self
            .counters
            .entry(name.to_string())
            .or_insert_with(|| AtomicI64::new(0));
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The current value of `name` without incrementing it.
    pub fn get(&self, name: &str) -> Option<i64> {
        self.counters
            .get(name)
            .map(|counter| counter.load(Ordering::SeqCst))
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

// ============================================================================
// REGISTRATION
// ============================================================================

pub fn register_functions(functions: &mut FunctionSet, counters: &Arc<CounterRegistry>) {
    register(
        functions,
        FunctionSpec::new("counter", Category::Stateful, "Returns an incrementing integer.")
            .description(
                "Counts from `min` up to and including `max`, then starts over at `min`. `min` \
                 and `max` are resolved once, on the first call. When `set` is given it is \
                 evaluated on every call: `nothing()` returns the current value without counting, \
                 `deleted()` restarts the count at `min`, `null` counts normally and any other \
                 integer becomes the new value.",
            )
            .param(ParamDef::query("min", "the first value").default(1i64))
            .param(ParamDef::query("max", "the last value before starting over").default(i64::MAX))
            .param(ParamDef::query("set", "an optional override evaluated on every call").optional())
            .impure()
            .example(Example::new(
                "Number messages.",
                "root = this\nroot.id = counter()",
                &[
                    (r#"{"a":"x"}"#, r#"{"a":"x","id":1}"#),
                    (r#"{"a":"y"}"#, r#"{"a":"y","id":2}"#),
                ],
            ))
            .example(Example::new(
                "Cycle through a bounded range.",
                "root.n = counter(min: 100, max: 102)",
                &[
                    ("{}", r#"{"n":100}"#),
                    ("{}", r#"{"n":101}"#),
                    ("{}", r#"{"n":102}"#),
                    ("{}", r#"{"n":100}"#),
                ],
            ))
            .example(Example::new(
                "Peek or reset on demand.",
                r#"root.n = counter(set: if this.peek == true { nothing() } else if this.reset == true { deleted() } else { null })"#,
                &[
                    ("{}", r#"{"n":1}"#),
                    ("{}", r#"{"n":2}"#),
                    (r#"{"peek":true}"#, r#"{"n":2}"#),
                    (r#"{"reset":true}"#, r#"{"n":1}"#),
                    ("{}", r#"{"n":2}"#),
                ],
            )),
        function_ctor(|params| {
            let counter = CounterFunction::new(
                params.field_query("min")?,
                params.field_query("max")?,
                params.field_optional_query("set")?,
            );
            Ok(Arc::new(counter))
        }),
    );

    register(
        functions,
        FunctionSpec::new("random_int", Category::Stateful, "Generates a pseudo-random integer.")
            .description(
                "Draws uniformly from `[min, max]`. The generator is seeded once, from the first \
                 evaluation of `seed`, so equal seeds produce equal sequences.",
            )
            .param(ParamDef::query("seed", "seed for the generator").default(0i64))
            .param(ParamDef::int("min", "the smallest value").default(0i64).static_only())
            .param(ParamDef::int("max", "the largest value").default(i64::MAX - 1).static_only())
            .impure()
            .example(Example::new(
                "Roll a die.",
                "root.ok = random_int(seed: 7, min: 1, max: 6) <= 6",
                &[("{}", r#"{"ok":true}"#)],
            ))
            .example(Example::new(
                "The largest 64 bit integer is reserved.",
                "root.n = random_int(max: 9223372036854775807)",
                &[("{}", "Error(max must be less than)")],
            )
            .skip_testing()),
        function_ctor(|params| {
            let random = RandomIntFunction::new(
                params.field_query("seed")?,
                params.field_int("min")?,
                params.field_int("max")?,
            )?;
            Ok(Arc::new(random))
        }),
    );

    let counters = counters.clone();
    register(
        functions,
        FunctionSpec::new("count", Category::Stateful, "Increments a counter shared by name.")
            .description(
                "Every mapping compiled from the same environment shares the counter `name`. \
                 Prefer `counter`, which keeps its state per call site.",
            )
            .param(ParamDef::string("name", "the counter name"))
            .impure()
            .deprecated()
            .example(Example::new(
                "Count documents seen.",
                r#"root.seen = count("documents_seen_example")"#,
                &[("{}", r#"{"seen":1}"#), ("{}", r#"{"seen":2}"#)],
            )
            .skip_testing()),
        function_ctor(move |params| {
            let name = params.field_string("name")?;
            let counters = counters.clone();
            Ok(ClosureFunction::new("function `count`", move |_ctx| {
                Ok(Value::Int(counters.increment(&name)))
            })
            .into_func())
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Literal;

    fn counter(min: i64, max: i64, set: Option<Func>) -> CounterFunction {
        CounterFunction::new(Literal::func(Value::Int(min)), Literal::func(Value::Int(max)), set)
    }

    fn next(function: &dyn Function) -> Value {
        function.exec(&FunctionContext::empty()).unwrap()
    }

    #[test]
    fn counter_wraps_after_returning_max() {
        let c = counter(100, 102, None);
        let seen: Vec<Value> = (0..7).map(|_| next(&c)).collect();
        let expected: Vec<Value> = [100, 101, 102, 100, 101, 102, 100].into_iter().map(Value::Int).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn counter_validates_bounds_on_first_call() {
        let c = counter(5, 5, None);
        assert!(c.exec(&FunctionContext::empty()).is_err());
        let negative = counter(-1, 5, None);
        assert!(negative.exec(&FunctionContext::empty()).is_err());
    }

    #[test]
    fn counter_overrides_replace_the_value() {
        let c = counter(1, 100, Some(Literal::func(Value::Int(40))));
        assert_eq!(next(&c), Value::Int(40));
        let plain = counter(1, 100, None);
        *plain.state.lock() = Some(CounterState { min: 1, max: 100, current: 40 });
        assert_eq!(next(&plain), Value::Int(41));
    }

    #[test]
    fn overriding_to_the_largest_integer_wraps_instead_of_overflowing() {
        let c = counter(1, i64::MAX, None);
        *c.state.lock() = Some(CounterState { min: 1, max: i64::MAX, current: i64::MAX });
        assert_eq!(next(&c), Value::Int(i64::MAX));
        assert_eq!(next(&c), Value::Int(1));
    }

    #[test]
    fn random_sequences_repeat_for_equal_seeds() {
        let draw = || {
            let random = RandomIntFunction::new(Literal::func(Value::Int(42)), 0, 1000).unwrap();
            (0..10).map(|_| next(&random)).collect::<Vec<_>>()
        };
        assert_eq!(draw(), draw());
    }

    #[test]
    fn random_bounds_are_checked() {
        let seed = || Literal::func(Value::Int(0));
        assert!(RandomIntFunction::new(seed(), 0, i64::MAX).is_err());
        assert!(RandomIntFunction::new(seed(), -1, 10).is_err());
        assert!(RandomIntFunction::new(seed(), 10, 10).is_err());
        assert!(RandomIntFunction::new(seed(), 0, i64::MAX - 1).is_ok());
    }

    #[test]
    fn named_counters_are_independent() {
        let registry = CounterRegistry::new();
        assert_eq!(registry.increment("a"), 1);
        assert_eq!(registry.increment("a"), 2);
        assert_eq!(registry.increment("b"), 1);
        assert_eq!(registry.get("a"), Some(2));
        assert_eq!(registry.len(), 2);
    }
}
