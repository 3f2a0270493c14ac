//! Invocation Router
//!
//! [`Mock`] owns everything configured for one substitute and resolves each
//! intercepted call through a fixed pipeline:
//!
//! ```text
//! log ──► chaos ──► match ──► sequence ──► callback ──► event ──► result
//!                     │                                   │
//!                     └─ no match: Strict error /         └─ ref/out configured:
//!                        Loose default                       hand the stub back
//! ```
//!
//! A mock is single-threaded: its state sits behind a `RefCell` and no user
//! callback runs while that state is borrowed, so callbacks, factories and
//! event handlers may call back into the same mock.

use crate::chaos::{ChaosDecision, ChaosEngine, ChaosPolicy, ChaosStatistics};
use crate::invocation::{Invocation, InvocationLog};
use crate::matcher::{Arg, It};
use crate::result::{MockError, MockResult};
use crate::setup::{SequentialSetup, SetupRegistry, StubHandle};
use crate::substrate::{dispatch, EventRegistry, PropertyStore};
use crate::times::Times;
use crate::value::{render_joined, EventHandler, Value, ValueKind};
use crate::verify;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// What happens to calls no stub matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockBehavior {
    /// Raise [`MockError::Unmatched`]
    Strict,
    /// Return the default value
    #[default]
    Loose,
}

impl fmt::Display for MockBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("Strict"),
            Self::Loose => f.write_str("Loose"),
        }
    }
}

/// How default values are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// Zero value of the declared return kind, `null` if undeclared
    #[default]
    Empty,
    /// Like `Empty`, but signatures returning [`ValueKind::Mock`] get a
    /// nested mock, the same one on every call
    Mock,
}

/// Mock configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockConfig {
    /// Unmatched-call handling
    pub behavior: MockBehavior,
    /// Default value strategy
    pub default_value: DefaultValue,
    /// Declared return kinds per signature
    pub return_kinds: BTreeMap<String, ValueKind>,
}

impl MockConfig {
    /// Loose mock with empty defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the behavior
    #[must_use]
    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Set the default value strategy
    #[must_use]
    pub fn with_default_value(mut self, default_value: DefaultValue) -> Self {
        self.default_value = default_value;
        self
    }

    /// Declare the return kind of `signature`
    #[must_use]
    pub fn with_return_kind(mut self, signature: &str, kind: ValueKind) -> Self {
        self.return_kinds.insert(signature.to_string(), kind);
        self
    }
}

/// Terminal state of a resolved call
#[derive(Debug, Clone)]
pub enum CallOutcome {
    /// Ordinary return value
    Return(Value),
    /// The matched stub has ref/out configuration; finish with
    /// [`Mock::complete`] against the real argument slots
    ByRef(StubHandle),
}

impl CallOutcome {
    /// Check for a by-ref hand-off
    #[must_use]
    pub const fn is_by_ref(&self) -> bool {
        matches!(self, Self::ByRef(_))
    }
}

/// Implemented by generated substitutes to expose their mock
pub trait Mocked {
    /// The mock backing this substitute
    fn mock(&self) -> &Mock;
}

#[derive(Debug, Default)]
struct MockState {
    config: MockConfig,
    setups: SetupRegistry,
    log: InvocationLog,
    chaos: Option<ChaosEngine>,
    properties: PropertyStore,
    events: EventRegistry,
    nested: HashMap<String, Rc<Mock>>,
}

/// Runtime core of one test double
///
/// # Example
///
/// ```
/// use doble::{args, values, It, Mock, MockBehavior, Times, Value};
///
/// let mock = Mock::new(MockBehavior::Strict);
/// mock.setup("Add", args![It::any::<i64>(), 2]).returns(4);
///
/// assert_eq!(mock.call("Add", values![2, 2]).unwrap(), Value::from(4));
/// assert!(mock.call("Add", values![2, 3]).is_err());
///
/// mock.verify("Add", args![It::any::<i64>(), It::any::<i64>()], Times::exactly(2)).unwrap();
/// ```
pub struct Mock {
    state: RefCell<MockState>,
}

impl Mock {
    /// Create a mock with `behavior` and empty defaults
    #[must_use]
    pub fn new(behavior: MockBehavior) -> Self {
        Self::with_config(MockConfig::new().with_behavior(behavior))
    }

    /// Create a mock from a full configuration
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            state: RefCell::new(MockState {
                config,
                ..MockState::default()
            }),
        }
    }

    /// Resolve `target` as a mock
    ///
    /// Accepts a `Mock` or an `Rc<Mock>`.
    ///
    /// # Errors
    ///
    /// Returns a misuse error for anything else.
    pub fn of(target: &dyn Any) -> MockResult<&Self> {
        target
            .downcast_ref::<Self>()
            .or_else(|| target.downcast_ref::<Rc<Self>>().map(|rc| &**rc))
            .ok_or_else(|| MockError::misuse("object is not a mock"))
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> MockConfig {
        self.state.borrow().config.clone()
    }

    /// Current behavior
    #[must_use]
    pub fn behavior(&self) -> MockBehavior {
        self.state.borrow().config.behavior
    }

    /// Declare the return kind of `signature` for default values
    pub fn declare_return(&self, signature: &str, kind: ValueKind) {
        self.state
            .borrow_mut()
            .config
            .return_kinds
            .insert(signature.to_string(), kind);
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Register a stub for `signature` with expected arguments
    pub fn setup(&self, signature: &str, expected: Vec<Arg>) -> StubHandle {
        tracing::debug!(signature, args = expected.len(), "setup registered");
        self.state
            .borrow_mut()
            .setups
            .add_stub(signature, expected, None)
    }

    /// Register a stub whose results are appended step by step
    pub fn setup_sequence(&self, signature: &str, expected: Vec<Arg>) -> SequentialSetup {
        SequentialSetup::new(self.setup(signature, expected))
    }

    /// Registered stubs in registration order
    #[must_use]
    pub fn setups(&self) -> Vec<StubHandle> {
        self.state.borrow().setups.stubs().to_vec()
    }

    // =========================================================================
    // Chaos
    // =========================================================================

    /// Attach a chaos policy, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns a misuse error if the policy's failure rate is invalid.
    pub fn set_chaos(&self, policy: ChaosPolicy) -> MockResult<()> {
        let engine = ChaosEngine::new(policy)?;
        tracing::debug!(seed = engine.seed().value(), "chaos policy attached");
        self.state.borrow_mut().chaos = Some(engine);
        Ok(())
    }

    /// Detach the chaos policy
    pub fn clear_chaos(&self) {
        self.state.borrow_mut().chaos = None;
    }

    /// Chaos counters, if a policy is attached
    #[must_use]
    pub fn chaos_statistics(&self) -> Option<ChaosStatistics> {
        self.state.borrow().chaos.as_ref().map(ChaosEngine::statistics)
    }

    /// Zero the chaos counters
    pub fn reset_chaos_statistics(&self) {
        if let Some(engine) = self.state.borrow_mut().chaos.as_mut() {
            engine.reset_statistics();
        }
    }

    // =========================================================================
    // Invocation
    // =========================================================================

    /// Resolve one intercepted call
    ///
    /// # Errors
    ///
    /// Surfaces chaos faults, ordering violations, strict misses, event
    /// handler faults and configured stub faults unchanged.
    pub fn invoke(&self, signature: &str, args: Vec<Value>) -> MockResult<CallOutcome> {
        let span = tracing::debug_span!("invoke", signature);
        let _guard = span.enter();

        let (decision, setups) = {
            let mut state = self.state.borrow_mut();
            state.log.append(signature, args.clone());
            let decision = state.chaos.as_mut().map(ChaosEngine::decide);
            (decision, state.setups.clone())
        };

        if let Some(decision) = decision {
            Self::apply_chaos(decision)?;
        }

        let Some(stub) = setups.find_match(signature, &args) else {
            return self.unmatched(signature, &args);
        };
        tracing::debug!(stub = %stub, "setup matched");

        if let Some(binding) = stub.sequence_binding() {
            binding.record(signature)?;
        }
        stub.record_match();
        if let Some(callback) = stub.callback_fn() {
            callback(&args);
        }
        if let Some((event, event_args)) = stub.event() {
            self.raise_event(&event, event_args)?;
        }
        if stub.has_ref_out() {
            tracing::debug!("handing off ref/out resolution");
            return Ok(CallOutcome::ByRef(stub));
        }

        stub.compute_result(&args, || self.default_value(signature))
            .map(CallOutcome::Return)
    }

    /// Resolve a call and return its value
    ///
    /// By-ref hand-offs are completed against a copy of `args`, so written
    /// outputs are discarded; use [`Mock::call_by_ref`] to keep them.
    ///
    /// # Errors
    ///
    /// See [`Mock::invoke`].
    pub fn call(&self, signature: &str, args: Vec<Value>) -> MockResult<Value> {
        let mut slots = args.clone();
        match self.invoke(signature, args)? {
            CallOutcome::Return(value) => Ok(value),
            CallOutcome::ByRef(stub) => self.complete(&stub, &mut slots),
        }
    }

    /// Resolve a call, writing ref/out results back into `args`
    ///
    /// # Errors
    ///
    /// See [`Mock::invoke`].
    pub fn call_by_ref(&self, signature: &str, args: &mut [Value]) -> MockResult<Value> {
        match self.invoke(signature, args.to_vec())? {
            CallOutcome::Return(value) => Ok(value),
            CallOutcome::ByRef(stub) => self.complete(&stub, args),
        }
    }

    /// Finish a by-ref hand-off: write outputs into `args` and compute the result
    ///
    /// # Errors
    ///
    /// Returns the stub's configured fault, if any.
    pub fn complete(&self, stub: &StubHandle, args: &mut [Value]) -> MockResult<Value> {
        let signature = stub.signature();
        stub.complete(args, || self.default_value(&signature))
    }

    fn apply_chaos(decision: ChaosDecision) -> MockResult<()> {
        if let Some(delay) = decision.delay {
            tracing::debug!(?delay, "chaos delay");
            std::thread::sleep(delay);
        }
        if decision.triggered {
            match decision.fault {
                Some(fault) => {
                    tracing::debug!(fault = %fault, "chaos fault injected");
                    return Err(fault.into());
                }
                None => tracing::debug!("chaos triggered with no faults configured"),
            }
        }
        Ok(())
    }

    fn unmatched(&self, signature: &str, args: &[Value]) -> MockResult<CallOutcome> {
        match self.behavior() {
            MockBehavior::Strict => {
                tracing::debug!("no setup matched strict mock");
                Err(MockError::Unmatched {
                    signature: signature.to_string(),
                    args: render_joined(args),
                })
            }
            MockBehavior::Loose => Ok(CallOutcome::Return(self.default_value(signature))),
        }
    }

    /// Default value for `signature` under the configured strategy
    #[must_use]
    pub fn default_value(&self, signature: &str) -> Value {
        let mut state = self.state.borrow_mut();
        let kind = state.config.return_kinds.get(signature).copied();
        match (state.config.default_value, kind) {
            (DefaultValue::Mock, Some(ValueKind::Mock)) => {
                let nested_config = MockConfig::new()
                    .with_behavior(state.config.behavior)
                    .with_default_value(DefaultValue::Mock);
                let nested = state
                    .nested
                    .entry(signature.to_string())
                    .or_insert_with(|| Rc::new(Self::with_config(nested_config)));
                Value::Mock(Rc::clone(nested))
            }
            (_, Some(kind)) => kind.zero_value(),
            (_, None) => Value::Null,
        }
    }

    // =========================================================================
    // Properties and events
    // =========================================================================

    /// Auto-track property `name`, seeding its value
    pub fn setup_property(&self, name: &str, initial: impl Into<Value>) {
        self.state.borrow_mut().properties.track(name, initial.into());
    }

    /// Read property `name`
    ///
    /// Tracked properties return their slot and log `get_name`; others are
    /// resolved as an ordinary `get_name` call.
    ///
    /// # Errors
    ///
    /// See [`Mock::invoke`] for untracked properties.
    pub fn get_property(&self, name: &str) -> MockResult<Value> {
        let getter = format!("get_{name}");
        {
            let mut state = self.state.borrow_mut();
            if let Some(value) = state.properties.get(name).cloned() {
                state.log.append(&getter, Vec::new());
                return Ok(value);
            }
        }
        self.call(&getter, Vec::new())
    }

    /// Write property `name`
    ///
    /// Tracked properties store the value and log `set_name(value)`; others
    /// are resolved as an ordinary `set_name` call.
    ///
    /// # Errors
    ///
    /// See [`Mock::invoke`] for untracked properties.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> MockResult<()> {
        let setter = format!("set_{name}");
        let value = value.into();
        {
            let mut state = self.state.borrow_mut();
            if state.properties.set(name, value.clone()) {
                state.log.append(&setter, vec![value]);
                return Ok(());
            }
        }
        self.call(&setter, vec![value]).map(|_| ())
    }

    /// Subscribe `handler` to event `name`, logging `add_name(handler)`
    pub fn add_event_handler(&self, name: &str, handler: EventHandler) {
        let mut state = self.state.borrow_mut();
        state
            .log
            .append(&format!("add_{name}"), vec![Value::Handler(handler.clone())]);
        state.events.subscribe(name, handler);
    }

    /// Unsubscribe `handler` from event `name`, logging `remove_name(handler)`
    pub fn remove_event_handler(&self, name: &str, handler: &EventHandler) {
        let mut state = self.state.borrow_mut();
        state
            .log
            .append(&format!("remove_{name}"), vec![Value::Handler(handler.clone())]);
        state.events.unsubscribe(name, handler);
    }

    /// Invoke every subscriber of `name` in subscription order
    ///
    /// # Errors
    ///
    /// Returns the first failing handler's own fault.
    pub fn raise_event(&self, name: &str, args: Vec<Value>) -> MockResult<()> {
        let handlers = self.state.borrow().events.subscribers(name);
        tracing::debug!(event = name, subscribers = handlers.len(), "raising event");
        dispatch(&handlers, &args).map_err(MockError::Injected)
    }

    /// Number of subscribers of `name`
    #[must_use]
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.state.borrow().events.subscriber_count(name)
    }

    // =========================================================================
    // Log and reset
    // =========================================================================

    /// Snapshot of recorded calls
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.borrow().log.entries().to_vec()
    }

    /// Clear setups, calls, properties, events and nested mocks
    pub fn reset(&self) {
        let mut state = self.state.borrow_mut();
        state.setups.clear();
        state.log.clear();
        state.properties.clear();
        state.events.clear();
        state.nested.clear();
    }

    /// Clear recorded calls only
    pub fn reset_calls(&self) {
        self.state.borrow_mut().log.clear();
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Check how often `signature` was called with matching arguments
    ///
    /// # Errors
    ///
    /// Returns [`MockError::VerificationFailed`] when the count falls outside
    /// `times`.
    pub fn verify(&self, signature: &str, expected: Vec<Arg>, times: Times) -> MockResult<()> {
        let entries = self.invocations();
        let hits = verify::matching_calls(&entries, signature, &expected);
        {
            let state = self.state.borrow();
            verify::check_count(&state.log, signature, &expected, times, hits.len())?;
        }
        self.state.borrow_mut().log.mark_verified(&hits);
        Ok(())
    }

    /// Verify reads of property `name`
    ///
    /// # Errors
    ///
    /// See [`Mock::verify`].
    pub fn verify_get(&self, name: &str, times: Times) -> MockResult<()> {
        self.verify(&format!("get_{name}"), Vec::new(), times)
    }

    /// Verify writes of `value` to property `name`
    ///
    /// # Errors
    ///
    /// See [`Mock::verify`].
    pub fn verify_set(&self, name: &str, value: impl Into<Arg>, times: Times) -> MockResult<()> {
        self.verify(&format!("set_{name}"), vec![value.into()], times)
    }

    /// Verify subscriptions to event `name`
    ///
    /// # Errors
    ///
    /// See [`Mock::verify`].
    pub fn verify_add(&self, name: &str, times: Times) -> MockResult<()> {
        self.verify(&format!("add_{name}"), vec![It::any_value().into()], times)
    }

    /// Verify unsubscriptions from event `name`
    ///
    /// # Errors
    ///
    /// See [`Mock::verify`].
    pub fn verify_remove(&self, name: &str, times: Times) -> MockResult<()> {
        self.verify(&format!("remove_{name}"), vec![It::any_value().into()], times)
    }

    /// Fail if any recorded call was not accounted for by a verification
    ///
    /// # Errors
    ///
    /// Returns [`MockError::UnverifiedCalls`].
    pub fn verify_no_other_calls(&self) -> MockResult<()> {
        verify::check_all_verified(&self.state.borrow().log)
    }

    /// Fail if any stub marked `verifiable` was never matched
    ///
    /// # Errors
    ///
    /// Returns [`MockError::UnmatchedSetups`].
    pub fn verify_all(&self) -> MockResult<()> {
        verify::check_verifiable_setups(&self.setups())
    }
}

impl Default for Mock {
    fn default() -> Self {
        Self::with_config(MockConfig::default())
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Mock")
                .field("behavior", &state.config.behavior)
                .field("setups", &state.setups.len())
                .field("invocations", &state.log.len())
                .field("chaos", &state.chaos.is_some())
                .finish(),
            Err(_) => f.write_str("Mock { <in use> }"),
        }
    }
}
