//! Assertion helpers
//!
//! Each check returns `Ok(())` or an [`E2eError::Assertion`] carrying the
//! message plus expected/actual renderings, so the runner can report it as an
//! assertion failure rather than a harness error.

use std::fmt::Debug;

use crate::error::{AssertionFailure, E2eError, E2eResult};

fn fail(message: &str, expected: Option<String>, actual: Option<String>) -> E2eError {
    E2eError::Assertion(AssertionFailure {
        message: message.to_string(),
        expected,
        actual,
    })
}

pub fn equals<A, E>(actual: A, expected: E, message: &str) -> E2eResult<()>
where
    A: PartialEq<E> + Debug,
    E: Debug,
{
    if actual == expected {
        Ok(())
    } else {
        Err(fail(
            message,
            Some(format!("{:?}", expected)),
            Some(format!("{:?}", actual)),
        ))
    }
}

pub fn not_equals<A, E>(actual: A, unexpected: E, message: &str) -> E2eResult<()>
where
    A: PartialEq<E> + Debug,
    E: Debug,
{
    if actual != unexpected {
        Ok(())
    } else {
        Err(fail(
            message,
            Some(format!("not {:?}", unexpected)),
            Some(format!("{:?}", actual)),
        ))
    }
}

pub fn is_true(condition: bool, message: &str) -> E2eResult<()> {
    if condition {
        Ok(())
    } else {
        Err(fail(message, Some("true".into()), Some("false".into())))
    }
}

pub fn is_false(condition: bool, message: &str) -> E2eResult<()> {
    if !condition {
        Ok(())
    } else {
        Err(fail(message, Some("false".into()), Some("true".into())))
    }
}

/// Fails when the value is absent (notNull)
pub fn is_some<T: Debug>(value: &Option<T>, message: &str) -> E2eResult<()> {
    match value {
        Some(_) => Ok(()),
        None => Err(fail(message, None, Some("None".into()))),
    }
}

/// Fails when a value is present (isNull)
pub fn is_none<T: Debug>(value: &Option<T>, message: &str) -> E2eResult<()> {
    match value {
        None => Ok(()),
        Some(v) => Err(fail(message, Some("None".into()), Some(format!("{:?}", v)))),
    }
}

pub fn contains(haystack: &str, needle: &str, message: &str) -> E2eResult<()> {
    if haystack.contains(needle) {
        Ok(())
    } else {
        Err(fail(
            message,
            Some(format!("text containing {:?}", needle)),
            Some(haystack.to_string()),
        ))
    }
}

pub fn less_than<T: PartialOrd + Debug>(actual: T, bound: T, message: &str) -> E2eResult<()> {
    if actual < bound {
        Ok(())
    } else {
        Err(fail(
            message,
            Some(format!("< {:?}", bound)),
            Some(format!("{:?}", actual)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(result: E2eResult<()>) -> AssertionFailure {
        match result {
            Err(E2eError::Assertion(f)) => f,
            other => panic!("expected assertion failure, got {:?}", other),
        }
    }

    #[test]
    fn equals_reports_both_sides() {
        assert!(equals(200u16, 200u16, "status").is_ok());
        let f = failure(equals(401u16, 200u16, "Expected status code 200"));
        assert_eq!(f.expected.as_deref(), Some("200"));
        assert_eq!(f.actual.as_deref(), Some("401"));
        assert_eq!(f.message, "Expected status code 200");
    }

    #[test]
    fn equals_across_str_types() {
        let owned = String::from("OK");
        assert!(equals(owned.as_str(), "OK", "status text").is_ok());
        assert!(equals(Some("a"), Some("a"), "opt").is_ok());
    }

    #[test]
    fn not_equals_and_booleans() {
        assert!(not_equals("t1", "t2", "timestamps").is_ok());
        assert!(not_equals(1, 1, "same").is_err());
        assert!(is_true(true, "t").is_ok());
        assert!(is_true(false, "t").is_err());
        assert!(is_false(false, "f").is_ok());
        assert!(is_false(true, "f").is_err());
    }

    #[test]
    fn optional_checks() {
        assert!(is_some(&Some(1), "present").is_ok());
        assert!(is_some::<u8>(&None, "present").is_err());
        assert!(is_none::<u8>(&None, "absent").is_ok());
        let f = failure(is_none(&Some("tok"), "token should be cleared"));
        assert_eq!(f.actual.as_deref(), Some("\"tok\""));
    }

    #[test]
    fn contains_and_less_than() {
        assert!(contains("User not found", "not found", "msg").is_ok());
        let f = failure(contains("oops", "error", "body mentions error"));
        assert_eq!(f.actual.as_deref(), Some("oops"));
        assert!(less_than(120u128, 3000u128, "fast").is_ok());
        assert!(less_than(3000u128, 3000u128, "fast").is_err());
    }
}
