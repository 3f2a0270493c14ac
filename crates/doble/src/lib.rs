//! Doble: Runtime Core for Rust Test Doubles
//!
//! Doble (Spanish: "double", as in stunt double) is the engine behind
//! generated mock objects. A substitute forwards each intercepted member call
//! to a [`Mock`], which records it, consults chaos and ordering constraints,
//! picks the configured stub and produces the result.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      DOBLE Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Substitute │    │ Invocation │    │ Setup      │            │
//! │   │ (generated)│───►│ Router     │───►│ Registry   │            │
//! │   │            │    │ (Mock)     │    │ + Matchers │            │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │                           │                                      │
//! │         ┌─────────────────┼─────────────────┐                    │
//! │         ▼                 ▼                 ▼                    │
//! │   ┌──────────┐     ┌────────────┐    ┌────────────┐             │
//! │   │ Chaos    │     │ Invocation │    │ Sequence   │             │
//! │   │ Engine   │     │ Log        │    │ Tokens     │             │
//! │   └──────────┘     └─────┬──────┘    └────────────┘             │
//! │                          ▼                                       │
//! │                    ┌────────────┐                                │
//! │                    │ Verify +   │                                │
//! │                    │ Times      │                                │
//! │                    └────────────┘                                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use doble::prelude::*;
//!
//! let mock = Mock::new(MockBehavior::Strict);
//! mock.setup("GetUser", args![It::is::<i64, _>(|id| *id > 0)])
//!     .returns("alice");
//!
//! assert_eq!(mock.call("GetUser", values![7]).unwrap(), Value::from("alice"));
//! mock.verify("GetUser", args![7], Times::once()).unwrap();
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod chaos;
mod invocation;
mod matcher;
mod mock;
mod result;
mod sequence;
mod setup;
mod substrate;
mod times;
/// Subscriber setup for resolution diagnostics
pub mod tracing_support;
mod value;
mod verify;

pub use chaos::{ChaosDecision, ChaosEngine, ChaosPolicy, ChaosStatistics, Seed};
pub use invocation::{Invocation, InvocationLog};
pub use matcher::{Arg, ArgumentMatcher, It, MatcherKind, Range};
pub use mock::{CallOutcome, DefaultValue, Mock, MockBehavior, MockConfig, Mocked};
pub use result::{InjectedFault, MessageFault, MockError, MockResult};
pub use sequence::{SequenceBinding, SequenceToken};
pub use setup::{
    ByRefCallback, Callback, OutValue, RefOutSpec, ResultStrategy, SequenceStep, SequentialSetup,
    SetupRegistry, StubHandle, ValueFactory,
};
pub use substrate::{dispatch, EventRegistry, PropertyStore};
pub use times::Times;
pub use value::{EventHandler, Value, ValueKind, ValueType};

/// Common imports for tests that drive mocks
pub mod prelude {
    pub use crate::{args, values};
    pub use crate::{
        Arg, CallOutcome, ChaosPolicy, DefaultValue, EventHandler, InjectedFault, It, Mock,
        MockBehavior, MockConfig, MockError, MockResult, Mocked, Range, SequenceToken, Times,
        Value, ValueKind,
    };
}
