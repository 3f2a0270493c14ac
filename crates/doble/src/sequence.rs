//! Cross-mock call ordering
//!
//! A [`SequenceToken`] hands out steps in bind order and then requires calls
//! to arrive in exactly that order. Stubs on different mocks may share one
//! token; the order is global to the token, not per mock.

use crate::result::{MockError, MockResult};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct SequenceState {
    next_step_to_assign: AtomicUsize,
    next_step_expected: AtomicUsize,
}

/// Shared ordering token
///
/// Cloning shares the same counters. Both counters are atomic, so binding
/// and recording may race across threads without losing steps.
///
/// # Example
///
/// ```
/// use doble::SequenceToken;
///
/// let token = SequenceToken::new();
/// let open = token.register_step();
/// let close = token.register_step();
///
/// assert!(token.record(close, "Close").is_err());
/// assert!(token.record(open, "Open").is_ok());
/// assert!(token.record(close, "Close").is_ok());
/// ```
#[derive(Clone, Default)]
pub struct SequenceToken {
    state: Arc<SequenceState>,
}

impl SequenceToken {
    /// Create a fresh token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next step
    pub fn register_step(&self) -> usize {
        self.state.next_step_to_assign.fetch_add(1, Ordering::SeqCst)
    }

    /// Accept `step` if it is the one expected next, then advance
    ///
    /// # Errors
    ///
    /// Returns [`MockError::OutOfSequence`] naming the expected step, the
    /// actual step and `signature`. The expectation does not advance.
    pub fn record(&self, step: usize, signature: &str) -> MockResult<()> {
        self.state
            .next_step_expected
            .compare_exchange(step, step + 1, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| {
                tracing::trace!(step, signature, "sequence step recorded");
            })
            .map_err(|expected| MockError::OutOfSequence {
                expected,
                actual: step,
                signature: signature.to_string(),
            })
    }

    /// Step the token waits for
    #[must_use]
    pub fn next_expected(&self) -> usize {
        self.state.next_step_expected.load(Ordering::SeqCst)
    }

    /// Steps handed out so far
    #[must_use]
    pub fn steps_registered(&self) -> usize {
        self.state.next_step_to_assign.load(Ordering::SeqCst)
    }

    /// Whether every registered step has been recorded
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.next_expected() == self.steps_registered()
    }

    /// Whether two handles share the same counters
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for SequenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceToken")
            .field("steps_registered", &self.steps_registered())
            .field("next_expected", &self.next_expected())
            .finish()
    }
}

/// A stub's place in a token's order
#[derive(Debug, Clone)]
pub struct SequenceBinding {
    /// Shared token
    pub token: SequenceToken,
    /// Step assigned at bind time
    pub step: usize,
}

impl SequenceBinding {
    /// Bind to the next step of `token`
    #[must_use]
    pub fn bind(token: &SequenceToken) -> Self {
        Self {
            token: token.clone(),
            step: token.register_step(),
        }
    }

    /// Record this binding's step
    ///
    /// # Errors
    ///
    /// Returns [`MockError::OutOfSequence`] when called out of order.
    pub fn record(&self, signature: &str) -> MockResult<()> {
        self.token.record(self.step, signature)
    }
}
