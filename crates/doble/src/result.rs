//! Result and error types for Doble.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for Doble operations
pub type MockResult<T> = Result<T, MockError>;

/// Errors raised by the mock engine
///
/// Nothing here is retried or swallowed internally. Every variant reaches the
/// caller of the operation that produced it.
#[derive(Debug, Clone, Error)]
pub enum MockError {
    /// Strict mock received a call that no setup matches
    #[error("{signature}({args}) invocation failed with mock behavior Strict: all invocations on the mock must have a corresponding setup")]
    Unmatched {
        /// Signature of the call
        signature: String,
        /// Rendered observed arguments
        args: String,
    },

    /// A call bound to a sequence token arrived out of order
    #[error("Call to {signature} is out of sequence: expected step {expected}, got step {actual}")]
    OutOfSequence {
        /// Step the token was waiting for
        expected: usize,
        /// Step the call was bound to
        actual: usize,
        /// Signature of the call
        signature: String,
    },

    /// Observed call count fell outside the requested cardinality
    #[error("Expected invocation on the mock {expected}, but was {actual} times: {signature}({args})\n\nPerformed invocations:\n{performed}")]
    VerificationFailed {
        /// Signature being verified
        signature: String,
        /// Rendered expected arguments
        args: String,
        /// Cardinality description, e.g. `exactly 2 times`
        expected: String,
        /// Matching invocations actually observed
        actual: usize,
        /// Rendered invocation log
        performed: String,
    },

    /// Invocations remained that no verification accounted for
    #[error("The following invocations on the mock were not verified:\n{calls}")]
    UnverifiedCalls {
        /// Rendered unverified invocations
        calls: String,
    },

    /// Setups marked verifiable were never matched
    #[error("The following setups on the mock were not matched:\n{setups}")]
    UnmatchedSetups {
        /// Rendered setups
        setups: String,
    },

    /// A fault configured by the test author (stub, sequence step or chaos policy)
    #[error(transparent)]
    Injected(InjectedFault),

    /// The engine was used incorrectly
    #[error("Invalid mock usage: {message}")]
    Misuse {
        /// Error message
        message: String,
    },
}

impl MockError {
    /// Create a misuse error
    #[must_use]
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse {
            message: message.into(),
        }
    }

    /// The injected fault, if this error carries one
    #[must_use]
    pub fn injected(&self) -> Option<&InjectedFault> {
        match self {
            Self::Injected(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<InjectedFault> for MockError {
    fn from(fault: InjectedFault) -> Self {
        Self::Injected(fault)
    }
}

/// A user-supplied error that a stub, sequence step or chaos policy raises
///
/// The original error value is kept behind an `Arc` so the same configured
/// fault can be raised on every call, and recovered with [`downcast_ref`].
///
/// [`downcast_ref`]: InjectedFault::downcast_ref
#[derive(Clone)]
pub struct InjectedFault(Arc<dyn StdError + Send + Sync + 'static>);

impl InjectedFault {
    /// Wrap an error value
    #[must_use]
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Fault carrying only a message
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(MessageFault(message.into()))
    }

    /// Check the concrete type of the wrapped error
    #[must_use]
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.0.is::<E>()
    }

    /// Borrow the wrapped error as its concrete type
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Whether two handles point at the same configured fault
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for InjectedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for InjectedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl StdError for InjectedFault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// Plain-message fault behind [`InjectedFault::message`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MessageFault(pub String);
