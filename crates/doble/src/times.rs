//! Call-count constraints for verification.

use crate::result::{MockError, MockResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed interval `[min, max]` of acceptable call counts
///
/// `max` of `None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Times {
    min: usize,
    max: Option<usize>,
}

impl Times {
    /// `[0, 0]`
    #[must_use]
    pub const fn never() -> Self {
        Self {
            min: 0,
            max: Some(0),
        }
    }

    /// `[1, 1]`
    #[must_use]
    pub const fn once() -> Self {
        Self::exactly(1)
    }

    /// `[n, n]`
    #[must_use]
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    /// `[1, ∞)`
    #[must_use]
    pub const fn at_least_once() -> Self {
        Self::at_least(1)
    }

    /// `[n, ∞)`
    #[must_use]
    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    /// `[0, 1]`
    #[must_use]
    pub const fn at_most_once() -> Self {
        Self::at_most(1)
    }

    /// `[0, n]`
    #[must_use]
    pub const fn at_most(n: usize) -> Self {
        Self {
            min: 0,
            max: Some(n),
        }
    }

    /// `[from, to]`
    ///
    /// # Errors
    ///
    /// Returns a misuse error when `from > to`.
    pub fn between(from: usize, to: usize) -> MockResult<Self> {
        if from > to {
            return Err(MockError::misuse(format!(
                "Times::between lower bound {from} exceeds upper bound {to}"
            )));
        }
        Ok(Self {
            min: from,
            max: Some(to),
        })
    }

    /// Lower bound
    #[must_use]
    pub const fn min(&self) -> usize {
        self.min
    }

    /// Upper bound, `None` when unbounded
    #[must_use]
    pub const fn max(&self) -> Option<usize> {
        self.max
    }

    /// Whether `count` lies within the interval
    #[must_use]
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl Default for Times {
    fn default() -> Self {
        Self::at_least_once()
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        "time"
    } else {
        "times"
    }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (0, Some(0)) => f.write_str("never"),
            (1, Some(1)) => f.write_str("once"),
            (min, Some(max)) if min == max => write!(f, "exactly {min} {}", plural(min)),
            (min, None) => write!(f, "at least {min} {}", plural(min)),
            (0, Some(max)) => write!(f, "at most {max} {}", plural(max)),
            (min, Some(max)) => write!(f, "between {min} and {max} times"),
        }
    }
}
