// vim: tw=80
//! Errors raised by the engine.

use std::{any::Any, fmt};
use thiserror::Error;

use crate::verify::Times;

/// Broad classification of an [`Error`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The caller misused the API.  Never retried.
    Usage,
    /// A verification did not hold.
    Assertion,
    /// A fault inside the captured block that most likely stems from matcher
    /// misuse.
    Hint,
    /// An internal invariant was violated.
    Fatal,
}

/// The message of a panic that escaped a captured block.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CapturedPanic(pub String);

impl CapturedPanic {
    pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_owned()
        };
        CapturedPanic(msg)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("No mock invocation was captured.  Call a mock method inside the block")]
    NoInvocationCaptured,

    #[error("No current invocation on this thread to stub")]
    NoCurrentInvocation,

    #[error("Inconsistent matcher use: {matchers} matchers for {args} arguments.  Use matchers for all arguments or for none")]
    InconsistentMatchers { matchers: usize, args: usize },

    #[error("{count} argument matchers were created but never consumed by a mock call")]
    UnconsumedMatchers { count: usize },

    #[error("Method name must not be empty")]
    EmptyMethodName,

    #[error("{class} does not declare method {method}")]
    UndeclaredMethod { class: &'static str, method: String },

    #[error("Ended a capture that was never started")]
    NoOpenCapture,

    #[error("{call}: stubbed value is not a {expected}")]
    ReturnTypeMismatch { call: String, expected: &'static str },

    #[error("{call}: expected to be called {expected}, but was called {actual} times{details}")]
    CallCount {
        call: String,
        expected: Times,
        actual: usize,
        details: Details
    },

    #[error("{}", ordering_message(.expected, .matched, .exclusive, .recorded))]
    Ordering {
        expected: Vec<String>,
        matched: usize,
        exclusive: bool,
        recorded: Vec<String>
    },

    #[error("{} verifications failed:\n{}", .0.len(), join(.0))]
    Aggregate(Vec<Error>),

    #[error("A panic occurred inside the captured block.  This is usually caused by a placeholder returned from an argument matcher, or by a matcher whose type does not match the parameter's type")]
    ProbableMatcherMisuse {
        #[source]
        source: CapturedPanic
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoInvocationCaptured
            | Error::NoCurrentInvocation
            | Error::InconsistentMatchers{..}
            | Error::UnconsumedMatchers{..}
            | Error::EmptyMethodName
            | Error::UndeclaredMethod{..}
            | Error::ReturnTypeMismatch{..} => ErrorKind::Usage,
            Error::CallCount{..}
            | Error::Ordering{..}
            | Error::Aggregate(_) => ErrorKind::Assertion,
            Error::ProbableMatcherMisuse{..} => ErrorKind::Hint,
            Error::NoOpenCapture => ErrorKind::Fatal,
        }
    }
}

/// Extra lines appended to a count failure: the recorded calls to the same
/// method whose arguments did not match, with each matcher's explanation.
#[derive(Debug, Default)]
pub struct Details(pub Vec<String>);

impl fmt::Display for Details {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for line in &self.0 {
            write!(f, "\n  {}", line)?;
        }
        Ok(())
    }
}

fn join(errors: &[Error]) -> String {
    errors.iter()
        .enumerate()
        .map(|(i, e)| format!("  {}) {}", i + 1, e))
        .collect::<Vec<_>>()
        .join("\n")
}

fn ordering_message(expected: &[String], matched: &usize, exclusive: &bool,
                    recorded: &[String]) -> String
{
    let mode = if *exclusive { "contiguously in order" } else { "in order" };
    format!("Expected calls {}: [{}]\nMatched the first {} of {}\nRecorded calls: [{}]",
        mode, expected.join(", "), matched, expected.len(),
        recorded.join(", "))
}
