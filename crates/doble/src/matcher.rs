//! Argument Matchers
//!
//! An expected argument is either a literal (structural equality) or an
//! [`ArgumentMatcher`]: a predicate guarded by a type-compatibility check.
//! The type check runs first; the predicate alone decides whether `null`
//! passes, so `It::any` accepts null while `It::is_not_null` rejects it.
//!
//! ## Example
//!
//! ```
//! use doble::{args, It, Range, Value};
//!
//! let expected = args![It::any::<i64>(), It::is_in_range(1, 10, Range::Inclusive), "x"];
//! assert!(expected[0].matches(&Value::Null));
//! assert!(expected[1].matches(&Value::from(10)));
//! assert!(!expected[2].matches(&Value::from("y")));
//! ```

use crate::result::{MockError, MockResult};
use crate::value::{EventHandler, Value, ValueKind, ValueType};
use std::fmt;
use std::rc::Rc;

/// Classification of a matcher's predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatcherKind {
    /// Wildcard over a type
    Any,
    /// User predicate
    Predicate,
    /// Membership (or non-membership) in a set of values
    SetMembership,
    /// Rejects null
    NotNull,
    /// Regular expression over strings
    Regex,
    /// Bounded range
    Range,
}

/// Range bound handling for [`It::is_in_range`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Range {
    /// Both bounds included
    Inclusive,
    /// Both bounds excluded
    Exclusive,
}

/// Predicate over one observed argument
#[derive(Clone)]
pub struct ArgumentMatcher {
    expected: ValueKind,
    kind: MatcherKind,
    predicate: Rc<dyn Fn(&Value) -> bool>,
    description: String,
}

impl ArgumentMatcher {
    /// Create a matcher from its parts
    pub fn new<F>(
        expected: ValueKind,
        kind: MatcherKind,
        description: impl Into<String>,
        predicate: F,
    ) -> Self
    where
        F: Fn(&Value) -> bool + 'static,
    {
        Self {
            expected,
            kind,
            predicate: Rc::new(predicate),
            description: description.into(),
        }
    }

    /// Replace the human-readable description
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Type-check, then evaluate the predicate
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        self.expected.accepts(value) && (self.predicate)(value)
    }

    /// Expected type
    #[must_use]
    pub const fn expected_kind(&self) -> ValueKind {
        self.expected
    }

    /// Predicate classification
    #[must_use]
    pub const fn kind(&self) -> MatcherKind {
        self.kind
    }

    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentMatcher")
            .field("expected", &self.expected)
            .field("kind", &self.kind)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Matcher constructors
#[derive(Debug, Clone, Copy)]
pub struct It;

impl It {
    /// Any value of type `T`, including null
    #[must_use]
    pub fn any<T: ValueType>() -> ArgumentMatcher {
        ArgumentMatcher::new(T::KIND, MatcherKind::Any, format!("any::<{}>()", T::KIND), |_| true)
    }

    /// Any value at all
    #[must_use]
    pub fn any_value() -> ArgumentMatcher {
        Self::any::<Value>()
    }

    /// Non-null `T` satisfying `predicate`
    pub fn is<T, F>(predicate: F) -> ArgumentMatcher
    where
        T: ValueType,
        F: Fn(&T) -> bool + 'static,
    {
        ArgumentMatcher::new(
            T::KIND,
            MatcherKind::Predicate,
            format!("is::<{}>(..)", T::KIND),
            move |value| T::from_value(value).is_some_and(|typed| predicate(&typed)),
        )
    }

    /// Raw predicate over the value; sees null
    pub fn is_value<F>(predicate: F) -> ArgumentMatcher
    where
        F: Fn(&Value) -> bool + 'static,
    {
        ArgumentMatcher::new(ValueKind::Any, MatcherKind::Predicate, "is(..)", predicate)
    }

    /// Equal to one of `values`
    pub fn is_in<I, V>(values: I) -> ArgumentMatcher
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let set: Vec<Value> = values.into_iter().map(Into::into).collect();
        let description = format!("is_in([{}])", crate::value::render_joined(&set));
        ArgumentMatcher::new(
            ValueKind::Any,
            MatcherKind::SetMembership,
            description,
            move |value| set.contains(value),
        )
    }

    /// Equal to none of `values`
    pub fn is_not_in<I, V>(values: I) -> ArgumentMatcher
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let set: Vec<Value> = values.into_iter().map(Into::into).collect();
        let description = format!("is_not_in([{}])", crate::value::render_joined(&set));
        ArgumentMatcher::new(
            ValueKind::Any,
            MatcherKind::SetMembership,
            description,
            move |value| !set.contains(value),
        )
    }

    /// Any non-null `T`
    #[must_use]
    pub fn is_not_null<T: ValueType>() -> ArgumentMatcher {
        ArgumentMatcher::new(
            T::KIND,
            MatcherKind::NotNull,
            format!("is_not_null::<{}>()", T::KIND),
            |value| !value.is_null(),
        )
    }

    /// String matching `pattern`
    ///
    /// # Errors
    ///
    /// Returns a misuse error if `pattern` does not compile.
    pub fn is_regex(pattern: &str) -> MockResult<ArgumentMatcher> {
        let regex = regex::Regex::new(pattern)
            .map_err(|e| MockError::misuse(format!("invalid regex {pattern:?}: {e}")))?;
        Ok(ArgumentMatcher::new(
            ValueKind::Str,
            MatcherKind::Regex,
            format!("is_regex({pattern:?})"),
            move |value| value.as_str().is_some_and(|s| regex.is_match(s)),
        ))
    }

    /// Value ordered between `low` and `high`
    ///
    /// Ints and floats compare against each other; strings compare
    /// lexicographically. Unordered values never match.
    pub fn is_in_range(low: impl Into<Value>, high: impl Into<Value>, range: Range) -> ArgumentMatcher {
        use std::cmp::Ordering::{Equal, Greater, Less};

        let low = low.into();
        let high = high.into();
        let description = match range {
            Range::Inclusive => format!("is_in_range([{low}, {high}])"),
            Range::Exclusive => format!("is_in_range(({low}, {high}))"),
        };
        ArgumentMatcher::new(ValueKind::Any, MatcherKind::Range, description, move |value| {
            let (Some(above), Some(below)) = (value.compare(&low), value.compare(&high)) else {
                return false;
            };
            match range {
                Range::Inclusive => matches!(above, Greater | Equal) && matches!(below, Less | Equal),
                Range::Exclusive => above == Greater && below == Less,
            }
        })
    }
}

/// One expected argument slot
#[derive(Debug, Clone)]
pub enum Arg {
    /// Structural equality
    Literal(Value),
    /// Predicate matcher
    Matcher(ArgumentMatcher),
}

impl Arg {
    /// Check one observed argument against this slot
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Literal(expected) => expected == value,
            Self::Matcher(matcher) => matcher.matches(value),
        }
    }

    /// Whether this slot is a literal
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Matcher(matcher) => write!(f, "{matcher}"),
        }
    }
}

/// Check a full argument list against expected slots
///
/// Counts must agree; indices in `ignored` (out parameters) always pass.
pub(crate) fn args_match(expected: &[Arg], observed: &[Value], ignored: &[usize]) -> bool {
    expected.len() == observed.len()
        && expected
            .iter()
            .zip(observed)
            .enumerate()
            .all(|(i, (slot, value))| ignored.contains(&i) || slot.matches(value))
}

impl From<ArgumentMatcher> for Arg {
    fn from(matcher: ArgumentMatcher) -> Self {
        Self::Matcher(matcher)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

macro_rules! impl_literal_arg {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::Literal(Value::from(value))
                }
            }
        )*
    };
}

impl_literal_arg!(i8, i16, i32, i64, u8, u16, u32, bool, f32, f64, &str, String, EventHandler);

impl<T: Into<Value>> From<Vec<T>> for Arg {
    fn from(items: Vec<T>) -> Self {
        Self::Literal(Value::from(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        Self::Literal(Value::from(value))
    }
}

/// Build a `Vec<Arg>` of expected arguments from literals and matchers
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::Arg>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::from($arg)),+]
    };
}
