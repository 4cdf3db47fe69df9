//! Claim validator chain.
//!
//! A [`ClaimValidator`] holds an ordered list of [`ClaimAssertion`]s and
//! evaluates them against decoded claims. The first failing assertion stops
//! the chain.
//!
//! # Example
//!
//! ```ignore
//! use indieauth_core::token::claims::{ClaimAssertion, ClaimValidator, Operator};
//!
//! let validator = ClaimValidator::new(UnknownOperatorPolicy::FailClosed)
//!     .with(ClaimAssertion::lazy("exp", Operator::Gt, || unix_now().into()))
//!     .with(ClaimAssertion::new("iss", Operator::Eq, issuer.into()))
//!     .with(ClaimAssertion::present("jti"));
//!
//! validator.validate(&claims)?;
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::jwt::Claims;
use crate::config::UnknownOperatorPolicy;
use crate::error::AuthError;

/// Errors produced by the chain.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    /// A required claim is absent.
    #[error("claim `{claim}` is missing")]
    Missing {
        /// Claim name.
        claim: String,
    },

    /// The claim does not satisfy the assertion.
    #[error("claim `{claim}` failed `{actual} {operator} {expected}`")]
    Failed {
        claim: String,
        operator: Operator,
        actual: Value,
        expected: Value,
    },

    /// The operator is not one the chain can evaluate.
    #[error("unknown operator `{operator}` for claim `{claim}`")]
    UnknownOperator { claim: String, operator: String },
}

impl From<ClaimError> for AuthError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::Missing { .. } | ClaimError::Failed { .. } => {
                AuthError::unauthorized(err.to_string())
            }
            ClaimError::UnknownOperator { .. } => AuthError::server_error(err.to_string()),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Anything else; evaluated according to [`UnknownOperatorPolicy`].
    Other(String),
}

impl Operator {
    /// Parses `==`, `!=`, `<`, `<=`, `>`, `>=`.
    #[must_use]
    pub fn parse(op: &str) -> Self {
        match op {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Other(op) => op,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected value, either fixed or computed when the assertion runs.
#[derive(Clone)]
pub enum Expected {
    Value(Value),
    Lazy(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl Expected {
    fn resolve(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Lazy(thunk) => thunk(),
        }
    }
}

impl fmt::Debug for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// One `claim <op> expected` check. Without a comparison it only requires
/// the claim to be present.
#[derive(Debug, Clone)]
pub struct ClaimAssertion {
    pub claim: String,
    pub comparison: Option<(Operator, Expected)>,
}

impl ClaimAssertion {
    /// Requires `claim` to be present.
    #[must_use]
    pub fn present(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
            comparison: None,
        }
    }

    /// Requires `claim <operator> expected`.
    #[must_use]
    pub fn new(claim: impl Into<String>, operator: Operator, expected: Value) -> Self {
        Self {
            claim: claim.into(),
            comparison: Some((operator, Expected::Value(expected))),
        }
    }

    /// Requires `claim <operator> thunk()`, evaluating `thunk` at check time.
    #[must_use]
    pub fn lazy(
        claim: impl Into<String>,
        operator: Operator,
        thunk: impl Fn() -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            claim: claim.into(),
            comparison: Some((operator, Expected::Lazy(Arc::new(thunk)))),
        }
    }
}

/// Ordered, short-circuiting list of assertions.
#[derive(Debug, Clone, Default)]
pub struct ClaimValidator {
    assertions: Vec<ClaimAssertion>,
    unknown_operator: UnknownOperatorPolicy,
}

impl ClaimValidator {
    #[must_use]
    pub fn new(unknown_operator: UnknownOperatorPolicy) -> Self {
        Self {
            assertions: Vec::new(),
            unknown_operator,
        }
    }

    /// Appends an assertion.
    #[must_use]
    pub fn with(mut self, assertion: ClaimAssertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Runs every assertion in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`ClaimError`] encountered.
    pub fn validate(&self, claims: &Claims) -> Result<(), ClaimError> {
        for assertion in &self.assertions {
            self.check(assertion, claims)?;
        }
        Ok(())
    }

    fn check(&self, assertion: &ClaimAssertion, claims: &Claims) -> Result<(), ClaimError> {
        let Some(actual) = claims.get(&assertion.claim) else {
            return Err(ClaimError::Missing {
                claim: assertion.claim.clone(),
            });
        };

        let Some((operator, expected)) = &assertion.comparison else {
            return Ok(());
        };

        let expected = expected.resolve();
        let satisfied = match operator {
            Operator::Eq => actual == &expected,
            Operator::Ne => actual != &expected,
            Operator::Lt => compare(actual, &expected) == Some(Ordering::Less),
            Operator::Le => matches!(
                compare(actual, &expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt => compare(actual, &expected) == Some(Ordering::Greater),
            Operator::Ge => matches!(
                compare(actual, &expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Other(op) => match self.unknown_operator {
                UnknownOperatorPolicy::FailClosed => {
                    return Err(ClaimError::UnknownOperator {
                        claim: assertion.claim.clone(),
                        operator: op.clone(),
                    });
                }
                UnknownOperatorPolicy::Warn => {
                    tracing::warn!(
                        claim = %assertion.claim,
                        operator = %op,
                        "Unknown claim operator, assertion skipped"
                    );
                    true
                }
            },
        };

        if satisfied {
            Ok(())
        } else {
            Err(ClaimError::Failed {
                claim: assertion.claim.clone(),
                operator: operator.clone(),
                actual: actual.clone(),
                expected,
            })
        }
    }
}

/// Orders two numbers or two strings; anything else is incomparable.
fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
