//! Setup Registry
//!
//! Stubs are configured behaviors for one signature. Each configuration call
//! on a [`StubHandle`] overwrites exactly one slot of the stub; nothing
//! composes additively, and the most recent call for a slot wins.
//!
//! ## Resolution order
//!
//! When several stubs match a call, the **most recently registered** one
//! wins. A wildcard setup followed by a specific one lets the specific one
//! override it for the values it covers; the reverse order lets the wildcard
//! shadow the specific setup entirely.

use crate::matcher::{args_match, Arg};
use crate::result::{InjectedFault, MockResult};
use crate::sequence::{SequenceBinding, SequenceToken};
use crate::value::{render_joined, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// Side effect run with the observed arguments
pub type Callback = Rc<dyn Fn(&[Value])>;

/// Value computed from the observed arguments
pub type ValueFactory = Rc<dyn Fn(&[Value]) -> Value>;

/// Callback that writes through by-reference arguments and returns the result
pub type ByRefCallback = Rc<dyn Fn(&mut [Value]) -> Value>;

/// One entry of a sequential result
#[derive(Debug, Clone)]
pub enum SequenceStep {
    /// Return this value
    Value(Value),
    /// Raise this fault
    Fault(InjectedFault),
}

/// How a matched stub produces its result
///
/// A single slot: `returns`, `returns_with`, `returns_in_order` and `throws`
/// each replace whatever was there.
#[derive(Clone)]
pub enum ResultStrategy {
    /// Fixed value
    Static(Value),
    /// Computed from the observed arguments
    Factory(ValueFactory),
    /// Consumed in order; the cursor stays on the last entry once reached
    Sequential {
        /// Entries in return order
        steps: Vec<SequenceStep>,
        /// Next entry to use
        cursor: usize,
    },
    /// Always raise this fault
    Throws(InjectedFault),
}

impl fmt::Debug for ResultStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
            Self::Sequential { steps, cursor } => f
                .debug_struct("Sequential")
                .field("steps", steps)
                .field("cursor", cursor)
                .finish(),
            Self::Throws(fault) => f.debug_tuple("Throws").field(fault).finish(),
        }
    }
}

/// Value written to one out parameter
#[derive(Clone)]
pub enum OutValue {
    /// Fixed value
    Static(Value),
    /// Computed from the observed arguments
    Factory(ValueFactory),
}

impl fmt::Debug for OutValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Ref/out parameter configuration of a stub
///
/// Configured indices are excluded from argument matching. A by-ref callback,
/// when present, replaces the per-index values at execution time but its
/// indices are still excluded from matching.
#[derive(Clone, Default)]
pub struct RefOutSpec {
    values: BTreeMap<usize, OutValue>,
    by_ref_indices: BTreeSet<usize>,
    by_ref: Option<ByRefCallback>,
}

impl RefOutSpec {
    /// Whether anything is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.by_ref.is_none()
    }

    /// Per-index out values
    #[must_use]
    pub const fn values(&self) -> &BTreeMap<usize, OutValue> {
        &self.values
    }

    /// Indices excluded from matching
    #[must_use]
    pub fn ignored_indices(&self) -> Vec<usize> {
        self.values
            .keys()
            .copied()
            .collect::<BTreeSet<_>>()
            .union(&self.by_ref_indices)
            .copied()
            .collect()
    }

    /// By-ref callback, if configured
    #[must_use]
    pub fn by_ref_callback(&self) -> Option<&ByRefCallback> {
        self.by_ref.as_ref()
    }

    /// Write the configured outputs into `args`
    ///
    /// Returns the by-ref callback's result when one is configured, otherwise
    /// writes each per-index value and returns `None`. Factories see the
    /// arguments as observed, before any write.
    pub fn apply(&self, args: &mut [Value]) -> Option<Value> {
        if let Some(callback) = &self.by_ref {
            return Some(callback(args));
        }
        let observed = args.to_vec();
        for (&index, out) in &self.values {
            if let Some(slot) = args.get_mut(index) {
                *slot = match out {
                    OutValue::Static(value) => value.clone(),
                    OutValue::Factory(factory) => factory(&observed),
                };
            }
        }
        None
    }
}

impl fmt::Debug for RefOutSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefOutSpec")
            .field("values", &self.values)
            .field("by_ref_indices", &self.by_ref_indices)
            .field("by_ref", &self.by_ref.as_ref().map(|_| ".."))
            .finish()
    }
}

/// One configured behavior
pub struct Stub {
    signature: String,
    expected: Vec<Arg>,
    strategy: Option<ResultStrategy>,
    callback: Option<Callback>,
    ref_out: RefOutSpec,
    event: Option<(String, Vec<Value>)>,
    sequence: Option<SequenceBinding>,
    verifiable: bool,
    match_count: usize,
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub")
            .field("signature", &self.signature)
            .field("expected", &self.expected)
            .field("strategy", &self.strategy)
            .field("callback", &self.callback.as_ref().map(|_| ".."))
            .field("ref_out", &self.ref_out)
            .field("event", &self.event)
            .field("sequence", &self.sequence)
            .field("verifiable", &self.verifiable)
            .field("match_count", &self.match_count)
            .finish()
    }
}

/// Resolved result before any user code runs
enum Planned {
    Value(Value),
    Factory(ValueFactory),
    Fault(InjectedFault),
    Default,
}

/// Shared, mutable reference to a registered stub
///
/// Configuration methods consume and return the handle so they chain off
/// `Mock::setup`. Clone the handle to keep configuring it later.
#[derive(Clone)]
pub struct StubHandle(Rc<RefCell<Stub>>);

impl StubHandle {
    fn new(signature: &str, expected: Vec<Arg>, strategy: Option<ResultStrategy>) -> Self {
        Self(Rc::new(RefCell::new(Stub {
            signature: signature.to_string(),
            expected,
            strategy,
            callback: None,
            ref_out: RefOutSpec::default(),
            event: None,
            sequence: None,
            verifiable: false,
            match_count: 0,
        })))
    }

    fn set_strategy(&self, strategy: ResultStrategy) {
        self.0.borrow_mut().strategy = Some(strategy);
    }

    /// Return a fixed value
    pub fn returns(self, value: impl Into<Value>) -> Self {
        self.set_strategy(ResultStrategy::Static(value.into()));
        self
    }

    /// Compute the return value from the observed arguments
    pub fn returns_with<F>(self, factory: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.set_strategy(ResultStrategy::Factory(Rc::new(factory)));
        self
    }

    /// Return `values` one per call, repeating the last
    pub fn returns_in_order<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let steps = values
            .into_iter()
            .map(|v| SequenceStep::Value(v.into()))
            .collect();
        self.set_strategy(ResultStrategy::Sequential { steps, cursor: 0 });
        self
    }

    /// Raise `fault` on every matched call
    pub fn throws(self, fault: InjectedFault) -> Self {
        self.set_strategy(ResultStrategy::Throws(fault));
        self
    }

    /// Run `callback` with the observed arguments before the result is computed
    pub fn callback<F>(self, callback: F) -> Self
    where
        F: Fn(&[Value]) + 'static,
    {
        self.0.borrow_mut().callback = Some(Rc::new(callback));
        self
    }

    /// Raise `event` with `args` after the callback
    pub fn raises(self, event: &str, args: Vec<Value>) -> Self {
        self.0.borrow_mut().event = Some((event.to_string(), args));
        self
    }

    /// Write a fixed value to out parameter `index`
    pub fn out_value(self, index: usize, value: impl Into<Value>) -> Self {
        self.set_out(index, OutValue::Static(value.into()));
        self
    }

    /// Write a computed value to out parameter `index`
    pub fn out_with<F>(self, index: usize, factory: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.set_out(index, OutValue::Factory(Rc::new(factory)));
        self
    }

    fn set_out(&self, index: usize, out: OutValue) {
        let mut stub = self.0.borrow_mut();
        stub.ref_out.values.insert(index, out);
    }

    /// Handle by-reference parameters `indices` with `callback`
    ///
    /// The callback writes through the argument slice and returns the call's
    /// result. It supersedes per-index out values when the call completes.
    /// A later call replaces both the callback and its indices.
    pub fn ref_callback<F>(self, indices: &[usize], callback: F) -> Self
    where
        F: Fn(&mut [Value]) -> Value + 'static,
    {
        {
            let mut stub = self.0.borrow_mut();
            stub.ref_out.by_ref_indices = indices.iter().copied().collect();
            stub.ref_out.by_ref = Some(Rc::new(callback));
        }
        self
    }

    /// Bind this stub to the next step of `token`
    ///
    /// Rebinding to the token the stub already holds keeps its step.
    pub fn in_sequence(self, token: &SequenceToken) -> Self {
        {
            let mut stub = self.0.borrow_mut();
            let bound = stub
                .sequence
                .as_ref()
                .is_some_and(|binding| binding.token.ptr_eq(token));
            if !bound {
                stub.sequence = Some(SequenceBinding::bind(token));
            }
        }
        self
    }

    /// Require this stub to be matched by `Mock::verify_all`
    pub fn verifiable(self) -> Self {
        self.0.borrow_mut().verifiable = true;
        self
    }

    /// Signature this stub answers
    #[must_use]
    pub fn signature(&self) -> String {
        self.0.borrow().signature.clone()
    }

    /// Calls this stub has matched
    #[must_use]
    pub fn match_count(&self) -> usize {
        self.0.borrow().match_count
    }

    /// Whether `verifiable` was requested
    #[must_use]
    pub fn is_verifiable(&self) -> bool {
        self.0.borrow().verifiable
    }

    /// Snapshot of the ref/out configuration
    #[must_use]
    pub fn ref_out(&self) -> RefOutSpec {
        self.0.borrow().ref_out.clone()
    }

    /// Whether any ref/out parameter is configured
    #[must_use]
    pub fn has_ref_out(&self) -> bool {
        !self.0.borrow().ref_out.is_empty()
    }

    /// Sequence binding, if any
    #[must_use]
    pub fn sequence_binding(&self) -> Option<SequenceBinding> {
        self.0.borrow().sequence.clone()
    }

    /// Configured callback, if any
    #[must_use]
    pub fn callback_fn(&self) -> Option<Callback> {
        self.0.borrow().callback.clone()
    }

    /// Event to raise and its arguments, if any
    #[must_use]
    pub fn event(&self) -> Option<(String, Vec<Value>)> {
        self.0.borrow().event.clone()
    }

    /// Whether two handles refer to the same stub
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Signature, count and per-index check
    #[must_use]
    pub fn matches(&self, signature: &str, observed: &[Value]) -> bool {
        let stub = self.0.borrow();
        if stub.signature != signature {
            return false;
        }
        let ignored = stub.ref_out.ignored_indices();
        args_match(&stub.expected, observed, &ignored)
    }

    pub(crate) fn record_match(&self) {
        self.0.borrow_mut().match_count += 1;
    }

    /// Take the next planned result, advancing a sequential cursor
    fn plan(&self) -> Planned {
        let mut stub = self.0.borrow_mut();
        match &mut stub.strategy {
            None => Planned::Default,
            Some(ResultStrategy::Static(value)) => Planned::Value(value.clone()),
            Some(ResultStrategy::Factory(factory)) => Planned::Factory(Rc::clone(factory)),
            Some(ResultStrategy::Throws(fault)) => Planned::Fault(fault.clone()),
            Some(ResultStrategy::Sequential { steps, cursor }) => {
                let Some(step) = steps.get(*cursor).cloned() else {
                    return Planned::Default;
                };
                if *cursor + 1 < steps.len() {
                    *cursor += 1;
                }
                match step {
                    SequenceStep::Value(value) => Planned::Value(value),
                    SequenceStep::Fault(fault) => Planned::Fault(fault),
                }
            }
        }
    }

    /// Compute the call's result from the strategy
    ///
    /// `default` supplies the value for stubs without a strategy.
    pub(crate) fn compute_result<D>(&self, args: &[Value], default: D) -> MockResult<Value>
    where
        D: FnOnce() -> Value,
    {
        Self::resolve(self.plan(), args, default)
    }

    fn resolve<D>(planned: Planned, args: &[Value], default: D) -> MockResult<Value>
    where
        D: FnOnce() -> Value,
    {
        match planned {
            Planned::Value(value) => Ok(value),
            Planned::Factory(factory) => Ok(factory(args)),
            Planned::Fault(fault) => Err(fault.into()),
            Planned::Default => Ok(default()),
        }
    }

    /// Finish a by-ref hand-off: write outputs, then compute the result
    ///
    /// A planned fault, from `throws` or a sequence step, raises before
    /// anything is written. Otherwise a by-ref callback's return value takes
    /// precedence over every other strategy.
    pub(crate) fn complete<D>(&self, args: &mut [Value], default: D) -> MockResult<Value>
    where
        D: FnOnce() -> Value,
    {
        let planned = self.plan();
        if let Planned::Fault(fault) = planned {
            return Err(fault.into());
        }
        let ref_out = self.ref_out();
        if let Some(result) = ref_out.apply(args) {
            return Ok(result);
        }
        Self::resolve(planned, args, default)
    }
}

impl fmt::Debug for StubHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0.borrow(), f)
    }
}

impl fmt::Display for StubHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stub = self.0.borrow();
        write!(f, "{}({})", stub.signature, render_joined(&stub.expected))
    }
}

/// Builder for `Mock::setup_sequence`
///
/// Every `returns`/`throws` appends one step to the stub's sequential result.
#[derive(Debug, Clone)]
pub struct SequentialSetup {
    stub: StubHandle,
}

impl SequentialSetup {
    pub(crate) fn new(stub: StubHandle) -> Self {
        Self { stub }
    }

    fn push(&self, step: SequenceStep) {
        let mut stub = self.stub.0.borrow_mut();
        match &mut stub.strategy {
            Some(ResultStrategy::Sequential { steps, .. }) => steps.push(step),
            other => {
                *other = Some(ResultStrategy::Sequential {
                    steps: vec![step],
                    cursor: 0,
                });
            }
        }
    }

    /// Append a value step
    pub fn returns(self, value: impl Into<Value>) -> Self {
        self.push(SequenceStep::Value(value.into()));
        self
    }

    /// Append a fault step
    pub fn throws(self, fault: InjectedFault) -> Self {
        self.push(SequenceStep::Fault(fault));
        self
    }

    /// The underlying stub, for further configuration
    #[must_use]
    pub fn stub(&self) -> StubHandle {
        self.stub.clone()
    }
}

/// Ordered stubs of one mock
#[derive(Debug, Clone, Default)]
pub struct SetupRegistry {
    stubs: Vec<StubHandle>,
}

impl SetupRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stub
    pub fn add_stub(
        &mut self,
        signature: &str,
        expected: Vec<Arg>,
        strategy: Option<ResultStrategy>,
    ) -> StubHandle {
        let stub = StubHandle::new(signature, expected, strategy);
        self.stubs.push(stub.clone());
        stub
    }

    /// Most recently registered stub matching the call
    #[must_use]
    pub fn find_match(&self, signature: &str, observed: &[Value]) -> Option<StubHandle> {
        self.stubs.iter().rev().find_map(|stub| {
            let hit = stub.matches(signature, observed);
            tracing::trace!(signature, stub = %stub, hit, "evaluated setup");
            hit.then(|| stub.clone())
        })
    }

    /// All stubs in registration order
    #[must_use]
    pub fn stubs(&self) -> &[StubHandle] {
        &self.stubs
    }

    /// Number of stubs
    #[must_use]
    pub fn len(&self) -> usize {
        self.stubs.len()
    }

    /// Check if no stubs are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }

    /// Drop every stub
    pub fn clear(&mut self) {
        self.stubs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::It;
    use crate::result::MockError;
    use crate::{args, values};

    fn no_default() -> Value {
        Value::from("default")
    }

    mod matching_tests {
        use super::*;

        #[test]
        fn test_signature_must_match() {
            let mut registry = SetupRegistry::new();
            registry.add_stub("Foo", args![], None);
            assert!(registry.find_match("Foo", &[]).is_some());
            assert!(registry.find_match("Bar", &[]).is_none());
        }

        #[test]
        fn test_argument_count_must_match() {
            let mut registry = SetupRegistry::new();
            registry.add_stub("Add", args![It::any::<i64>(), It::any::<i64>()], None);
            assert!(registry.find_match("Add", &values![1]).is_none());
            assert!(registry.find_match("Add", &values![1, 2, 3]).is_none());
            assert!(registry.find_match("Add", &values![1, 2]).is_some());
        }

        #[test]
        fn test_last_registered_match_wins() {
            let mut registry = SetupRegistry::new();
            let wildcard = registry.add_stub("Get", args![It::any::<i64>()], None);
            let specific = registry.add_stub("Get", args![7], None);

            let hit = registry.find_match("Get", &values![7]).unwrap();
            assert!(hit.ptr_eq(&specific));
            let miss = registry.find_match("Get", &values![8]).unwrap();
            assert!(miss.ptr_eq(&wildcard));
        }

        #[test]
        fn test_later_wildcard_shadows_earlier_specific() {
            let mut registry = SetupRegistry::new();
            registry.add_stub("Get", args![7], None);
            let wildcard = registry.add_stub("Get", args![It::any::<i64>()], None);
            let hit = registry.find_match("Get", &values![7]).unwrap();
            assert!(hit.ptr_eq(&wildcard));
        }

        #[test]
        fn test_out_indices_excluded_from_matching() {
            let mut registry = SetupRegistry::new();
            registry
                .add_stub("TryParse", args!["42", 0], None)
                .out_value(1, 42);
            assert!(registry.find_match("TryParse", &values!["42", 999]).is_some());
            assert!(registry.find_match("TryParse", &values!["41", 999]).is_none());
        }

        #[test]
        fn test_ref_callback_indices_excluded_from_matching() {
            let mut registry = SetupRegistry::new();
            registry
                .add_stub("Swap", args![0, 0], None)
                .ref_callback(&[0, 1], |args| {
                    args.swap(0, 1);
                    Value::Null
                });
            assert!(registry.find_match("Swap", &values![5, 6]).is_some());
        }
    }

    mod strategy_tests {
        use super::*;

        #[test]
        fn test_sequential_clamps_at_last() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("Next", args![], None)
                .returns_in_order([1, 2, 3]);
            let results: Vec<_> = (0..4)
                .map(|_| stub.compute_result(&[], no_default).unwrap())
                .collect();
            assert_eq!(results, values![1, 2, 3, 3]);
        }

        #[test]
        fn test_sequential_fault_step() {
            let mut registry = SetupRegistry::new();
            let stub = registry.add_stub("Next", args![], None);
            SequentialSetup::new(stub.clone())
                .returns(1)
                .throws(InjectedFault::message("exhausted"));
            assert_eq!(stub.compute_result(&[], no_default).unwrap(), Value::from(1));
            for _ in 0..2 {
                let err = stub.compute_result(&[], no_default).unwrap_err();
                assert_eq!(err.to_string(), "exhausted");
            }
        }

        #[test]
        fn test_factory_sees_arguments() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("Double", args![It::any::<i64>()], None)
                .returns_with(|args| Value::from(args[0].as_int().unwrap_or(0) * 2));
            assert_eq!(
                stub.compute_result(&values![21], no_default).unwrap(),
                Value::from(42)
            );
        }

        #[test]
        fn test_last_write_wins_across_strategies() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("Get", args![], None)
                .throws(InjectedFault::message("boom"))
                .returns(5);
            assert_eq!(stub.compute_result(&[], no_default).unwrap(), Value::from(5));

            let stub = stub.returns(1).throws(InjectedFault::message("boom"));
            assert!(stub.compute_result(&[], no_default).is_err());
        }

        #[test]
        fn test_no_strategy_uses_default() {
            let mut registry = SetupRegistry::new();
            let stub = registry.add_stub("Get", args![], None);
            assert_eq!(
                stub.compute_result(&[], no_default).unwrap(),
                Value::from("default")
            );
        }

        #[test]
        fn test_empty_sequence_uses_default() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("Get", args![], None)
                .returns_in_order(Vec::<Value>::new());
            assert_eq!(
                stub.compute_result(&[], no_default).unwrap(),
                Value::from("default")
            );
        }

        #[test]
        fn test_sequential_builder_restarts_after_overwrite() {
            let mut registry = SetupRegistry::new();
            let stub = registry.add_stub("Get", args![], None).returns(9);
            SequentialSetup::new(stub.clone()).returns(1).returns(2);
            assert_eq!(stub.compute_result(&[], no_default).unwrap(), Value::from(1));
            assert_eq!(stub.compute_result(&[], no_default).unwrap(), Value::from(2));
        }
    }

    mod ref_out_tests {
        use super::*;

        #[test]
        fn test_complete_writes_out_values() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("TryParse", args!["42", 0], None)
                .out_value(1, 42)
                .returns(true);
            let mut args = values!["42", 0];
            let result = stub.complete(&mut args, no_default).unwrap();
            assert_eq!(result, Value::from(true));
            assert_eq!(args[1], Value::from(42));
        }

        #[test]
        fn test_out_factory_sees_observed_args() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("Len", args![It::any::<String>(), 0], None)
                .out_with(1, |args| {
                    Value::from(args[0].as_str().map_or(0, |s| s.len() as i64))
                });
            let mut args = values!["hello", 0];
            stub.complete(&mut args, no_default).unwrap();
            assert_eq!(args[1], Value::from(5));
        }

        #[test]
        fn test_by_ref_callback_supersedes_values() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("Swap", args![0, 0], None)
                .out_value(0, 100)
                .returns(7)
                .ref_callback(&[0, 1], |args| {
                    args.swap(0, 1);
                    Value::from("swapped")
                });
            let mut args = values![1, 2];
            let result = stub.complete(&mut args, no_default).unwrap();
            assert_eq!(result, Value::from("swapped"));
            assert_eq!(args, values![2, 1]);
            assert_eq!(stub.ref_out().ignored_indices(), vec![0, 1]);
        }

        #[test]
        fn test_throws_before_writing() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("TryParse", args!["x", 0], None)
                .out_value(1, 5)
                .throws(InjectedFault::message("bad input"));
            let mut args = values!["x", 0];
            let err = stub.complete(&mut args, no_default).unwrap_err();
            assert!(matches!(err, MockError::Injected(_)));
            assert_eq!(args[1], Value::from(0));
        }

        #[test]
        fn test_sequence_fault_step_before_writing() {
            let mut registry = SetupRegistry::new();
            let stub = registry.add_stub("TryRead", args![0], None).out_value(0, 9);
            SequentialSetup::new(stub.clone())
                .throws(InjectedFault::message("busy"))
                .returns(true);

            let mut args = values![0];
            assert!(stub.complete(&mut args, no_default).is_err());
            assert_eq!(args[0], Value::from(0));

            assert_eq!(stub.complete(&mut args, no_default).unwrap(), Value::from(true));
            assert_eq!(args[0], Value::from(9));
        }

        #[test]
        fn test_ref_callback_replaces_indices() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("Fill", args![0, 0], None)
                .ref_callback(&[0], |_| Value::Null)
                .ref_callback(&[1], |_| Value::Null);
            assert_eq!(stub.ref_out().ignored_indices(), vec![1]);
            assert!(stub.matches("Fill", &values![0, 5]));
            assert!(!stub.matches("Fill", &values![5, 5]));
        }

        #[test]
        fn test_out_value_overwrites_same_index() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("Read", args![0], None)
                .out_value(0, 1)
                .out_value(0, 2);
            let mut args = values![0];
            stub.complete(&mut args, no_default).unwrap();
            assert_eq!(args[0], Value::from(2));
        }
    }

    mod handle_tests {
        use super::*;

        #[test]
        fn test_display_lists_expected_args() {
            let mut registry = SetupRegistry::new();
            let stub = registry.add_stub("Save", args!["doc", It::any::<i64>()], None);
            assert_eq!(stub.to_string(), "Save(\"doc\", any::<int>())");
        }

        #[test]
        fn test_slots_overwrite() {
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("Save", args![], None)
                .raises("Saved", values![1])
                .raises("Stored", values![2]);
            assert_eq!(stub.event(), Some(("Stored".to_string(), values![2])));
        }

        #[test]
        fn test_rebinding_same_token_keeps_step() {
            let token = SequenceToken::new();
            let mut registry = SetupRegistry::new();
            let open = registry
                .add_stub("Open", args![], None)
                .in_sequence(&token)
                .in_sequence(&token);
            let close = registry.add_stub("Close", args![], None).in_sequence(&token);

            assert_eq!(token.steps_registered(), 2);
            assert_eq!(open.sequence_binding().map(|b| b.step), Some(0));
            assert_eq!(close.sequence_binding().map(|b| b.step), Some(1));
            open.sequence_binding().unwrap().record("Open").unwrap();
            close.sequence_binding().unwrap().record("Close").unwrap();
            assert!(token.is_complete());
        }

        #[test]
        fn test_binding_other_token_rebinds() {
            let first = SequenceToken::new();
            let second = SequenceToken::new();
            let mut registry = SetupRegistry::new();
            let stub = registry
                .add_stub("Open", args![], None)
                .in_sequence(&first)
                .in_sequence(&second);
            assert!(stub.sequence_binding().unwrap().token.ptr_eq(&second));
        }

        #[test]
        fn test_clear() {
            let mut registry = SetupRegistry::new();
            registry.add_stub("A", args![], None);
            assert_eq!(registry.len(), 1);
            registry.clear();
            assert!(registry.is_empty());
        }
    }
}
