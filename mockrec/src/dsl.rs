// vim: tw=80
//! The fluent entry points: [`when`], [`assert_called`] and
//! [`assert_called_multi`].
//!
//! Each one runs a block of code in a capture.  Calls made on mocks inside
//! the block are neither stubbed nor recorded in the history; instead they
//! become templates for stubbing or verification.

use fragile::Fragile;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc
};

use crate::{
    Error,
    context::Context,
    error::CapturedPanic,
    invocation::{Invocation, Outcome},
    stub::{Stub, StubEntry},
    value::{Value, value},
    verify::{MultiVerifier, Verifier}
};

impl Context {
    /// Run `f` inside a capture frame and return the calls it made on mocks.
    ///
    /// A panic inside `f` that did not come from the engine is reported as
    /// [`Error::ProbableMatcherMisuse`].
    pub fn capture<R, F: FnOnce() -> R>(&self, f: F)
        -> Result<Vec<Arc<Invocation>>, Error>
    {
        self.ensure_consistency()?;
        self.start_capture();
        let r = panic::catch_unwind(AssertUnwindSafe(f));
        let frame = self.end_capture()?;
        match r {
            Ok(_) => {
                self.ensure_consistency()?;
                Ok(frame)
            },
            Err(payload) => {
                self.clear_matchers();
                match payload.downcast::<Error>() {
                    Ok(e) => Err(*e),
                    Err(payload) => Err(Error::ProbableMatcherMisuse {
                        source: CapturedPanic::from_payload(&*payload)
                    })
                }
            }
        }
    }

    pub fn when<R, F: FnOnce() -> R>(&self, f: F) -> Result<Stubber, Error> {
        let template = self.capture(f)?
            .pop()
            .ok_or(Error::NoInvocationCaptured)?;
        Ok(Stubber::new(template))
    }

    /// Stub the last call recorded on this thread.
    pub fn stub_current(&self) -> Result<Stubber, Error> {
        self.current_invocation()
            .map(Stubber::new)
            .ok_or(Error::NoCurrentInvocation)
    }

    pub fn assert_called<R, F: FnOnce() -> R>(&self, f: F)
        -> Result<Verifier, Error>
    {
        let template = self.capture(f)?
            .pop()
            .ok_or(Error::NoInvocationCaptured)?;
        Ok(Verifier::new(template, self.recorder().clone()))
    }

    pub fn assert_called_multi<R, F: FnOnce() -> R>(&self, f: F)
        -> Result<MultiVerifier, Error>
    {
        let templates = self.capture(f)?;
        if templates.is_empty() {
            return Err(Error::NoInvocationCaptured);
        }
        Ok(MultiVerifier::new(templates, self.recorder().clone()))
    }
}

/// Stub the mock call made inside `f`, on the current thread's context.
///
/// If `f` calls more than one mock method, the last call is stubbed.
pub fn when<R, F: FnOnce() -> R>(f: F) -> Result<Stubber, Error> {
    Context::current().when(f)
}

/// Verify the call count of the mock call made inside `f`.
pub fn assert_called<R, F: FnOnce() -> R>(f: F) -> Result<Verifier, Error> {
    Context::current().assert_called(f)
}

/// Verify every mock call made inside `f`: their counts, or their order.
pub fn assert_called_multi<R, F: FnOnce() -> R>(f: F)
    -> Result<MultiVerifier, Error>
{
    Context::current().assert_called_multi(f)
}

/// Adds stub entries for one captured call.
///
/// The first `then_*` call replaces whatever was stubbed before for the same
/// method and argument pattern; later ones in the same chain queue up behind
/// it.  Each live call consumes the head of the queue, except that the last
/// entry is never consumed.
pub struct Stubber {
    template: Arc<Invocation>,
    fresh: bool,
}

impl Stubber {
    pub fn new(template: Arc<Invocation>) -> Self {
        Stubber{template, fresh: true}
    }

    fn add(&mut self, stub: Stub) -> &mut Self {
        let method = *self.template.method();
        {
            let pattern = self.template.args();
            let mut store = self.template.receiver().store();
            if self.fresh {
                store.restub(method, pattern);
            }
            tracing::debug!(call = %self.template, ?stub, "stubbed");
            store.push(method, pattern, StubEntry{stub, retained: false});
        }
        self.fresh = false;
        self
    }

    /// Return `v`.
    pub fn then_return<T: Value>(&mut self, v: T) -> &mut Self {
        self.add(Stub::Return(value(v)))
    }

    /// Throw `e`: return it as the `Err` of a fallible method, or unwind with
    /// it otherwise.
    pub fn then_throw<E: Value>(&mut self, e: E) -> &mut Self {
        self.add(Stub::Throw(value(e)))
    }

    /// Run the mock's real implementation.
    pub fn then_call_original(&mut self) -> &mut Self {
        self.add(Stub::CallOriginal)
    }

    /// Forward the call to `target`.
    pub fn then_delegate<D: Any + Send + Sync>(&mut self, target: D)
        -> &mut Self
    {
        self.add(Stub::Delegate(Arc::new(target)))
    }

    /// Compute the return value from the call.
    pub fn then_answer<T, F>(&mut self, f: F) -> &mut Self
        where T: Value, F: Fn(&Invocation) -> T + Send + Sync + 'static
    {
        let answer = move |inv: &Invocation| Outcome::Returned(value(f(inv)));
        self.add(Stub::Answer(Arc::new(answer)))
    }

    /// Compute the whole outcome, return or throw, from the call.
    pub fn then_answer_outcome<F>(&mut self, f: F) -> &mut Self
        where F: Fn(&Invocation) -> Outcome + Send + Sync + 'static
    {
        self.add(Stub::Answer(Arc::new(f)))
    }

    /// Single-threaded version of [`then_answer`](#method.then_answer), for
    /// closures that aren't `Send`.
    ///
    /// It is a runtime error for the mock to be called from a different
    /// thread than the one that stubbed it.
    pub fn then_answer_st<T, F>(&mut self, f: F) -> &mut Self
        where T: Value, F: Fn(&Invocation) -> T + 'static
    {
        let fragile = Fragile::new(f);
        let answer = move |inv: &Invocation| {
            Outcome::Returned(value((fragile.get())(inv)))
        };
        self.add(Stub::Answer(Arc::new(answer)))
    }

    /// Mark the most recently added entry as retained: it will answer every
    /// matching call from now on and is never consumed.
    pub fn retained(&mut self) -> &mut Self {
        let method = *self.template.method();
        self.template.receiver().store()
            .retain_last(method, self.template.args());
        self
    }

    /// Run `f` on every call matching this pattern, in addition to whatever
    /// the call's stubs do.  Do-actions are never consumed, and every matching
    /// one runs, in registration order.
    ///
    /// Actions run before the mock completes the call, so
    /// [`Invocation::outcome`] is always `None` inside one.
    pub fn then_do<F>(&mut self, f: F) -> &mut Self
        where F: Fn(&Invocation) + Send + Sync + 'static
    {
        let method = *self.template.method();
        tracing::debug!(call = %self.template, "do-action added");
        self.template.receiver().store()
            .add_do_action(method, self.template.args(), Arc::new(f));
        self
    }

    /// Single-threaded version of [`then_do`](#method.then_do).
    pub fn then_do_st<F>(&mut self, f: F) -> &mut Self
        where F: Fn(&Invocation) + 'static
    {
        let fragile = Fragile::new(f);
        self.then_do(move |inv: &Invocation| (fragile.get())(inv))
    }
}
