// vim: tw=80
//! The contract between a mock object and the engine.
//!
//! Generating mock objects is not this crate's business.  Whatever builds
//! them, by hand or by macro, gives each instance a [`MockState`] and routes
//! every mocked method through [`MockState::invoke`], then acts on the
//! returned [`Call`].
//!
//! # Examples
//! ```
//! use mockrec::*;
//! use std::sync::Arc;
//!
//! trait Greeter {
//!     fn greet(&self, name: String) -> String;
//! }
//!
//! const GREET: MethodKey = MethodKey::new("greet", "fn(String) -> String");
//!
//! struct MockGreeter(Arc<MockState>);
//!
//! impl Greeter for MockGreeter {
//!     fn greet(&self, name: String) -> String {
//!         self.0.invoke(GREET, args![name.clone()])
//!             .complete(|| format!("Hello, {}", name),
//!                       |d| d.target::<Arc<dyn Greeter + Send + Sync>>()
//!                           .map(|g| g.greet(name.clone()))
//!                           .unwrap_or_default())
//!     }
//! }
//!
//! let mock = MockGreeter(MockState::new("MockGreeter", [GREET]));
//! when(|| mock.greet("Bill".to_owned())).unwrap()
//!     .then_return("Hi, Bill".to_owned());
//! assert_eq!("Hi, Bill", mock.greet("Bill".to_owned()));
//! ```

use std::{
    any::type_name,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        atomic::{AtomicUsize, Ordering}
    }
};

use crate::{
    Error,
    config::FailurePolicy,
    context::Context,
    invocation::{Invocation, MethodKey, Outcome},
    matcher::Arg,
    recorder::lock,
    stub::{Delegation, StubStore, Verdict},
    value::{AnyValue, Value, cloned, value}
};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Engine-side state of one mock instance: its identity, the methods it
/// declares, and its stubs.
pub struct MockState {
    id: usize,
    class: &'static str,
    methods: Vec<MethodKey>,
    store: Mutex<StubStore>,
}

impl MockState {
    pub fn new<I>(class: &'static str, methods: I) -> Arc<Self>
        where I: IntoIterator<Item = MethodKey>
    {
        Arc::new(MockState {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            class,
            methods: methods.into_iter().collect(),
            store: Mutex::new(StubStore::default()),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn class(&self) -> &'static str {
        self.class
    }

    /// The methods this mock can intercept.
    pub fn methods(&self) -> &[MethodKey] {
        &self.methods
    }

    pub fn declares(&self, method: &MethodKey) -> bool {
        self.methods.contains(method)
    }

    /// Discard all stubbing and do-actions.
    pub fn reset(&self) {
        *self.store() = StubStore::default();
        tracing::debug!(mock = %self, "stubs reset");
    }

    pub(crate) fn store(&self) -> MutexGuard<'_, StubStore> {
        lock(&self.store)
    }

    /// Route a call through the engine.
    ///
    /// # Panics
    ///
    /// On engine misuse, such as mixing matchers and literal arguments.
    /// Inside a capture the panic payload is the [`Error`] itself, so that
    /// [`when`](crate::when) and friends can return it.
    pub fn invoke(self: &Arc<Self>, method: MethodKey, args: Vec<Arg>) -> Call
    {
        match self.try_invoke(method, args) {
            Ok(call) => call,
            Err(e) => raise(e)
        }
    }

    /// Like [`invoke`](#method.invoke), but returns misuse as an `Err`.
    ///
    /// Matching do-actions run here, before the caller completes the returned
    /// [`Call`], so they never see the call's outcome.
    pub fn try_invoke(self: &Arc<Self>, method: MethodKey, args: Vec<Arg>)
        -> Result<Call, Error>
    {
        let ctx = Context::current();
        let invocation = ctx.record(self, method, args)?;
        if ctx.is_capturing() {
            return Ok(Call{invocation, verdict: Verdict::Monitored});
        }
        let config = ctx.recorder().config();
        let (verdict, actions) = {
            let mut store = self.store();
            let verdict = store.resolve(&invocation, config.matcher_failure);
            let actions = store.actions_for(&invocation,
                                            config.matcher_failure);
            (verdict, actions)
        };
        tracing::debug!(call = %invocation, verdict = verdict.name(),
                        actions = actions.len(), "resolved");
        for action in actions {
            match config.do_action_failure {
                FailurePolicy::Propagate => action(&invocation),
                FailurePolicy::Swallow => {
                    let r = panic::catch_unwind(AssertUnwindSafe(|| {
                        action(&invocation)
                    }));
                    if r.is_err() {
                        tracing::warn!(call = %invocation,
                                       "do-action panicked; ignoring");
                    }
                }
            }
        }
        Ok(Call{invocation, verdict})
    }
}

impl fmt::Debug for MockState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MockState")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for MockState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.id)
    }
}

/// Implemented by mock objects, to expose their engine state.
pub trait Mock {
    fn mock_state(&self) -> &Arc<MockState>;

    /// Discard all stubbing on this mock.
    fn checkpoint(&self) {
        self.mock_state().reset();
    }
}

/// Unwind payload of a stubbed throw from a method that can't return an
/// error.
#[derive(Debug)]
pub struct Thrown(pub AnyValue);

/// Report engine misuse from inside mock glue.
fn raise(e: Error) -> ! {
    if Context::current().is_capturing() {
        panic::panic_any(e)
    } else {
        panic!("{}", e)
    }
}

/// One dispatched call, waiting for the mock to act on its [`Verdict`].
#[must_use = "a Call must be completed to record its outcome"]
pub struct Call {
    invocation: Arc<Invocation>,
    verdict: Verdict,
}

impl Call {
    pub fn invocation(&self) -> &Arc<Invocation> {
        &self.invocation
    }

    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    /// Record the outcome and hand it back.
    pub fn returned<T: Value + Clone>(self, v: T) -> T {
        self.invocation.set_outcome(Outcome::Returned(value(v.clone())));
        v
    }

    fn downcast<T: Value + Clone>(&self, v: &AnyValue) -> T {
        match cloned::<T>(&**v) {
            Some(t) => t,
            None => raise(Error::ReturnTypeMismatch {
                call: self.invocation.to_string(),
                expected: type_name::<T>()
            })
        }
    }

    fn throw(self, e: AnyValue) -> ! {
        self.invocation.set_outcome(Outcome::Threw(e.clone()));
        panic::resume_unwind(Box::new(Thrown(e)))
    }

    /// Act on the verdict for a method that can't fail.
    ///
    /// `original` runs the real implementation and `delegate` forwards to a
    /// delegate object.  Unstubbed and captured calls return `T::default()`.
    /// A stubbed throw unwinds with a [`Thrown`] payload.
    pub fn complete<T, O, D>(self, original: O, delegate: D) -> T
        where T: Value + Clone + Default,
              O: FnOnce() -> T,
              D: FnOnce(&Delegation) -> T
    {
        match self.verdict.clone() {
            Verdict::Monitored => T::default(),
            Verdict::Unstubbed => self.returned(T::default()),
            Verdict::CallOriginal => {
                let v = original();
                self.returned(v)
            },
            Verdict::Delegate(d) => {
                let v = delegate(&d);
                self.returned(v)
            },
            Verdict::Return(v) => {
                let v = self.downcast::<T>(&v);
                self.returned(v)
            },
            Verdict::Throw(e) => self.throw(e),
            Verdict::Answer(f) => match (f.0)(&self.invocation) {
                Outcome::Returned(v) => {
                    let v = self.downcast::<T>(&v);
                    self.returned(v)
                },
                Outcome::Threw(e) => self.throw(e)
            }
        }
    }

    /// Act on the verdict for a method returning `Result<T, E>`.  Stubbed
    /// throws become `Err`; everything else behaves as in
    /// [`complete`](#method.complete).
    pub fn complete_fallible<T, E, O, D>(self, original: O, delegate: D)
        -> Result<T, E>
        where T: Value + Clone + Default,
              E: Value + Clone,
              O: FnOnce() -> Result<T, E>,
              D: FnOnce(&Delegation) -> Result<T, E>
    {
        let r = match self.verdict.clone() {
            Verdict::Monitored => return Ok(T::default()),
            Verdict::Unstubbed => Ok(T::default()),
            Verdict::CallOriginal => original(),
            Verdict::Delegate(d) => delegate(&d),
            Verdict::Return(v) => Ok(self.downcast::<T>(&v)),
            Verdict::Throw(e) => Err(self.downcast::<E>(&e)),
            Verdict::Answer(f) => match (f.0)(&self.invocation) {
                Outcome::Returned(v) => Ok(self.downcast::<T>(&v)),
                Outcome::Threw(e) => Err(self.downcast::<E>(&e))
            }
        };
        let outcome = match &r {
            Ok(v) => Outcome::Returned(value(v.clone())),
            Err(e) => Outcome::Threw(value(e.clone()))
        };
        self.invocation.set_outcome(outcome);
        r
    }
}
