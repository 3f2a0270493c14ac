//! Verification Engine
//!
//! Post-hoc queries over an invocation log. Calls are counted with the same
//! per-argument algorithm that selects stubs, so matchers work as expected
//! arguments here too.

use crate::invocation::{Invocation, InvocationLog};
use crate::matcher::{args_match, Arg};
use crate::result::{MockError, MockResult};
use crate::setup::StubHandle;
use crate::times::Times;
use crate::value::render_joined;

/// Indices of logged calls to `signature` whose arguments satisfy `expected`
#[must_use]
pub fn matching_calls(entries: &[Invocation], signature: &str, expected: &[Arg]) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, invocation)| {
            invocation.signature() == signature && args_match(expected, invocation.args(), &[])
        })
        .map(|(i, _)| i)
        .collect()
}

/// Compare an observed count against `times`
///
/// # Errors
///
/// Returns [`MockError::VerificationFailed`] carrying the expected
/// description, the actual count and the rendered log.
pub fn check_count(
    log: &InvocationLog,
    signature: &str,
    expected: &[Arg],
    times: Times,
    actual: usize,
) -> MockResult<()> {
    if times.accepts(actual) {
        return Ok(());
    }
    Err(MockError::VerificationFailed {
        signature: signature.to_string(),
        args: render_joined(expected),
        expected: times.to_string(),
        actual,
        performed: log.render(),
    })
}

/// Fail if any logged call was never accounted for by a verification
///
/// # Errors
///
/// Returns [`MockError::UnverifiedCalls`] listing the calls.
pub fn check_all_verified(log: &InvocationLog) -> MockResult<()> {
    let unverified = log.unverified();
    if unverified.is_empty() {
        return Ok(());
    }
    let calls = unverified
        .iter()
        .map(|invocation| format!("    {invocation}"))
        .collect::<Vec<_>>()
        .join("\n");
    Err(MockError::UnverifiedCalls { calls })
}

/// Fail if any stub marked verifiable was never matched
///
/// # Errors
///
/// Returns [`MockError::UnmatchedSetups`] listing the stubs.
pub fn check_verifiable_setups(stubs: &[StubHandle]) -> MockResult<()> {
    let unmatched: Vec<String> = stubs
        .iter()
        .filter(|stub| stub.is_verifiable() && stub.match_count() == 0)
        .map(|stub| format!("    {stub}"))
        .collect();
    if unmatched.is_empty() {
        Ok(())
    } else {
        Err(MockError::UnmatchedSetups {
            setups: unmatched.join("\n"),
        })
    }
}
