// vim: tw=80
//! The record of a single call on a mock.

use std::{
    fmt,
    sync::{Arc, OnceLock}
};

use crate::{
    Error,
    matcher::Arg,
    mock::MockState,
    value::AnyValue
};

/// Identifies a mockable method: its name plus its type signature.
///
/// Stub queues and per-method invocation lists are grouped by `MethodKey`.
/// Overloads that share a name are told apart by `signature`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MethodKey {
    pub name: &'static str,
    pub signature: &'static str,
}

impl MethodKey {
    pub const fn new(name: &'static str, signature: &'static str) -> Self {
        MethodKey{name, signature}
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// What a dispatched call produced.
#[derive(Clone, Debug)]
pub enum Outcome {
    Returned(AnyValue),
    Threw(AnyValue),
}

/// An immutable record of one call: who was called, which method, and with
/// what arguments.  The outcome is filled in once, after dispatch.
pub struct Invocation {
    receiver: Arc<MockState>,
    method: MethodKey,
    args: Vec<Arg>,
    outcome: OnceLock<Outcome>,
}

impl Invocation {
    pub fn new(receiver: Arc<MockState>, method: MethodKey, args: Vec<Arg>)
        -> Result<Self, Error>
    {
        if method.name.is_empty() {
            return Err(Error::EmptyMethodName);
        }
        Ok(Invocation {
            receiver,
            method,
            args,
            outcome: OnceLock::new()
        })
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Fetch argument `i` as a `T`, if it is a literal of that type.
    pub fn arg<T: crate::Value + Clone>(&self, i: usize) -> Option<T> {
        self.args.get(i)?.value().and_then(|v| crate::value::cloned(&**v))
    }

    pub fn method(&self) -> &MethodKey {
        &self.method
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.get()
    }

    pub fn receiver(&self) -> &Arc<MockState> {
        &self.receiver
    }

    /// Does this invocation target the very same mock instance as `other`?
    pub fn same_receiver(&self, other: &Invocation) -> bool {
        Arc::ptr_eq(&self.receiver, &other.receiver)
    }

    /// Record what the call produced.  Only the first report sticks.
    pub(crate) fn set_outcome(&self, outcome: Outcome) {
        let _ = self.outcome.set(outcome);
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("receiver", &format_args!("{}", self.receiver))
            .field("method", &self.method)
            .field("args", &self.args)
            .field("outcome", &self.outcome.get())
            .finish()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}(", self.receiver, self.method)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:?}", arg)?;
        }
        f.write_str(")")
    }
}
