// vim: tw=80
//! Per-thread engine state.
//!
//! A [`Context`] owns everything that is scoped to one thread of test code:
//! the stack of pending argument matchers, the stack of open capture frames,
//! and a weak handle to the most recently recorded invocation.  Mock glue finds the calling
//! thread's context with [`Context::with_current`].  Unless a context has been
//! [entered](Context::enter), each thread lazily gets its own context attached
//! to [`Recorder::global`].

use std::{
    cell::RefCell,
    marker::PhantomData,
    mem,
    rc::Rc,
    sync::{Arc, Weak}
};

use crate::{
    Error,
    invocation::{Invocation, MethodKey},
    matcher::{Arg, ArgMatcher},
    mock::MockState,
    recorder::Recorder,
};

thread_local! {
    static ENTERED: RefCell<Vec<Rc<Context>>> = const {
        RefCell::new(Vec::new())
    };
    static FALLBACK: RefCell<Option<Rc<Context>>> = const {
        RefCell::new(None)
    };
}

type Frame = Vec<Arc<Invocation>>;

pub struct Context {
    recorder: Recorder,
    matchers: RefCell<Vec<Arc<dyn ArgMatcher>>>,
    frames: RefCell<Vec<Frame>>,
    // Weak, so a pooled thread's fallback context doesn't keep the last mock
    // alive after the history forgets it
    current: RefCell<Weak<Invocation>>,
}

/// Makes a [`Context`] current for its thread until dropped.
#[must_use = "the context is only current while the guard is alive"]
pub struct ContextGuard {
    // Entering is per-thread, so the guard must stay on its thread
    _not_send: PhantomData<Rc<()>>
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        ENTERED.with(|e| e.borrow_mut().pop());
    }
}

impl Context {
    pub fn new(recorder: Recorder) -> Rc<Self> {
        Rc::new(Context {
            recorder,
            matchers: RefCell::new(Vec::new()),
            frames: RefCell::new(Vec::new()),
            current: RefCell::new(Weak::new()),
        })
    }

    /// The calling thread's context: the most recently entered one, or else
    /// the thread's fallback context on the global recorder.
    pub fn current() -> Rc<Context> {
        if let Some(ctx) = ENTERED.with(|e| e.borrow().last().cloned()) {
            return ctx;
        }
        FALLBACK.with(|f| {
            f.borrow_mut()
                .get_or_insert_with(|| Context::new(Recorder::global()))
                .clone()
        })
    }

    pub fn with_current<R, F: FnOnce(&Context) -> R>(f: F) -> R {
        let ctx = Self::current();
        f(&ctx)
    }

    /// Make this context current for the calling thread.  Entries nest; the
    /// previous context is restored when the guard drops.
    pub fn enter(self: &Rc<Self>) -> ContextGuard {
        ENTERED.with(|e| e.borrow_mut().push(self.clone()));
        ContextGuard{_not_send: PhantomData}
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub(crate) fn push_matcher(&self, m: Arc<dyn ArgMatcher>) {
        self.matchers.borrow_mut().push(m);
    }

    pub(crate) fn clear_matchers(&self) {
        self.matchers.borrow_mut().clear();
    }

    /// Fail if any matcher was created but not consumed by a mock call.  The
    /// stale matchers are discarded so they can't leak into the next call.
    pub fn ensure_consistency(&self) -> Result<(), Error> {
        let stale = mem::take(&mut *self.matchers.borrow_mut());
        if stale.is_empty() {
            Ok(())
        } else {
            Err(Error::UnconsumedMatchers{count: stale.len()})
        }
    }

    /// The last invocation recorded on this thread, captured or not.
    ///
    /// Only available while something else still holds it: the history for
    /// an ordinary call, or the capture's caller for a captured one.  After
    /// [`Recorder::reset`] an ordinary call is forgotten here too.
    pub fn current_invocation(&self) -> Option<Arc<Invocation>> {
        self.current.borrow().upgrade()
    }

    /// Is a capture open on this context?
    pub fn is_capturing(&self) -> bool {
        !self.frames.borrow().is_empty()
    }

    /// Record a call on `receiver`.
    ///
    /// Any pending matchers replace the literal arguments positionally; there
    /// must be exactly one per argument.  The invocation goes to the innermost
    /// open capture frame if there is one, or to the shared history otherwise.
    /// Either way it becomes this thread's current invocation.
    pub fn record(&self, receiver: &Arc<MockState>, method: MethodKey,
                  args: Vec<Arg>) -> Result<Arc<Invocation>, Error>
    {
        if method.name.is_empty() {
            return Err(Error::EmptyMethodName);
        }
        if !receiver.declares(&method) {
            return Err(Error::UndeclaredMethod {
                class: receiver.class(),
                method: method.name.to_owned()
            });
        }
        let matchers = mem::take(&mut *self.matchers.borrow_mut());
        let args = if matchers.is_empty() {
            args
        } else if matchers.len() != args.len() {
            return Err(Error::InconsistentMatchers {
                matchers: matchers.len(),
                args: args.len()
            });
        } else {
            matchers.into_iter().map(Arg::Matcher).collect()
        };
        let inv = Arc::new(Invocation::new(receiver.clone(), method, args)?);
        {
            let mut frames = self.frames.borrow_mut();
            let depth = frames.len();
            if let Some(top) = frames.last_mut() {
                tracing::trace!(call = %inv, depth, "captured");
                top.push(inv.clone());
            } else {
                tracing::trace!(call = %inv, "recorded");
                self.recorder.append(inv.clone());
            }
        }
        *self.current.borrow_mut() = Arc::downgrade(&inv);
        Ok(inv)
    }

    /// Open a capture frame.  Until it is closed, calls recorded on this
    /// thread are diverted into the frame and mocks don't act on their stubs.
    pub fn start_capture(&self) {
        self.frames.borrow_mut().push(Frame::new());
    }

    /// Close the innermost capture frame and return what it captured.
    pub fn end_capture(&self) -> Result<Vec<Arc<Invocation>>, Error> {
        let mut frames = self.frames.borrow_mut();
        let frame = frames.pop().ok_or(Error::NoOpenCapture)?;
        if frames.is_empty() {
            // Release the stack's storage; threads may be pooled
            *frames = Vec::new();
        }
        Ok(frame)
    }
}
