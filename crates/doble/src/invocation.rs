//! Invocation log
//!
//! Every call routed through a mock is appended here before anything else
//! happens to it, including calls that go on to fail.

use crate::value::{write_joined, Value};
use std::fmt;

/// One observed call
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    sequence_number: usize,
    signature: String,
    args: Vec<Value>,
}

impl Invocation {
    /// Position in the log at append time
    #[must_use]
    pub const fn sequence_number(&self) -> usize {
        self.sequence_number
    }

    /// Method, accessor or event key
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Observed arguments
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.signature)?;
        write_joined(f, &self.args)?;
        f.write_str(")")
    }
}

/// Append-only record of calls on one mock
#[derive(Debug, Clone, Default)]
pub struct InvocationLog {
    entries: Vec<Invocation>,
    verified: Vec<bool>,
    appended: usize,
}

impl InvocationLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call
    pub fn append(&mut self, signature: &str, args: Vec<Value>) -> &Invocation {
        let index = self.entries.len();
        self.entries.push(Invocation {
            sequence_number: self.appended,
            signature: signature.to_string(),
            args,
        });
        self.verified.push(false);
        self.appended += 1;
        &self.entries[index]
    }

    /// All recorded calls, oldest first
    #[must_use]
    pub fn entries(&self) -> &[Invocation] {
        &self.entries
    }

    /// Number of recorded calls
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no calls were recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices of calls satisfying `predicate`
    pub fn matching<F>(&self, predicate: F) -> Vec<usize>
    where
        F: Fn(&Invocation) -> bool,
    {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, invocation)| predicate(invocation))
            .map(|(i, _)| i)
            .collect()
    }

    /// Mark calls as accounted for by a verification
    pub fn mark_verified(&mut self, indices: &[usize]) {
        for &i in indices {
            if let Some(flag) = self.verified.get_mut(i) {
                *flag = true;
            }
        }
    }

    /// Calls no verification has accounted for
    #[must_use]
    pub fn unverified(&self) -> Vec<&Invocation> {
        self.entries
            .iter()
            .zip(&self.verified)
            .filter(|(_, verified)| !**verified)
            .map(|(invocation, _)| invocation)
            .collect()
    }

    /// Drop every recorded call
    pub fn clear(&mut self) {
        self.entries.clear();
        self.verified.clear();
    }

    /// Render the log one call per line
    #[must_use]
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "No invocations performed.".to_string();
        }
        self.entries
            .iter()
            .map(|invocation| format!("    {invocation}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[test]
    fn test_append_preserves_order() {
        let mut log = InvocationLog::new();
        log.append("Open", values!["a.txt"]);
        log.append("Close", values![]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[0].signature(), "Open");
        assert_eq!(log.entries()[1].sequence_number(), 1);
    }

    #[test]
    fn test_sequence_numbers_survive_clear() {
        let mut log = InvocationLog::new();
        log.append("A", values![]);
        log.clear();
        assert!(log.is_empty());
        let second = log.append("B", values![]);
        assert_eq!(second.sequence_number(), 1);
    }

    #[test]
    fn test_unverified_tracking() {
        let mut log = InvocationLog::new();
        log.append("A", values![1]);
        log.append("B", values![2]);
        let hits = log.matching(|i| i.signature() == "A");
        assert_eq!(hits, vec![0]);
        log.mark_verified(&hits);
        let rest = log.unverified();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].signature(), "B");
    }

    #[test]
    fn test_render() {
        let mut log = InvocationLog::new();
        assert_eq!(log.render(), "No invocations performed.");
        log.append("set_Name", values!["a"]);
        assert_eq!(log.render(), "    set_Name(\"a\")");
    }
}
