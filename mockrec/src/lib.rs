// vim: tw=80
//! The behavioral core of a mock object library.
//!
//! Mockrec records every call made on a mock object, decides what each call
//! should do, and lets tests assert afterwards how the mock was called.  It
//! does not generate mock objects itself.  A mock is any object that owns a
//! [`MockState`] and routes its methods through [`MockState::invoke`]; it may
//! be written by hand, as in the examples below, or generated by a macro.
//!
//! # User Guide
//!
//! * [`Getting started`](#getting-started)
//! * [`Stubbing`](#stubbing)
//! * [`Matching arguments`](#matching-arguments)
//! * [`Verification`](#verification)
//! * [`Threads`](#threads)
//! * [`Crate features`](#crate-features)
//!
//! ## Getting Started
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
//! impl MockGreeter {
//!     fn new() -> Self {
//!         MockGreeter(MockState::new("MockGreeter", [GREET]))
//!     }
//! }
//!
//! impl Greeter for MockGreeter {
//!     fn greet(&self, name: String) -> String {
//!         self.0.invoke(GREET, args![name])
//!             .complete(String::new, |_| String::new())
//!     }
//! }
//!
//! let mock = MockGreeter::new();
//! when(|| mock.greet("Bill".to_owned())).unwrap()
//!     .then_return("Hi, Bill".to_owned());
//! assert_eq!("Hi, Bill", mock.greet("Bill".to_owned()));
//! assert_called(|| mock.greet("Bill".to_owned())).unwrap()
//!     .was_called(1).unwrap();
//! ```
//!
//! The block passed to [`when`] or [`assert_called`] is run in a *capture*:
//! calls made inside it are not dispatched and not recorded in the history.
//! Instead they become the template that is stubbed or verified.
//!
//! ## Stubbing
//!
//! A [`Stubber`] queues up entries for one method and argument pattern.  Each
//! live call consumes the head of the queue, except for the last entry, which
//! keeps answering indefinitely.  Starting a new `when` for the same pattern
//! discards whatever was queued for it before.
//!
//! ```
//! # use mockrec::*;
//! # use std::sync::Arc;
//! # const NEXT: MethodKey = MethodKey::new("next", "fn() -> u32");
//! # struct MockCounter(Arc<MockState>);
//! # impl MockCounter {
//! #     fn next(&self) -> u32 {
//! #         self.0.invoke(NEXT, args![]).complete(|| 0, |_| 0)
//! #     }
//! # }
//! let mock = MockCounter(MockState::new("MockCounter", [NEXT]));
//! when(|| mock.next()).unwrap()
//!     .then_return(1u32)
//!     .then_return(2u32);
//! assert_eq!(1, mock.next());
//! assert_eq!(2, mock.next());
//! assert_eq!(2, mock.next());
//! ```
//!
//! Besides canned values, a stub can [throw](Stubber::then_throw), [run the
//! real implementation](Stubber::then_call_original), [forward to another
//! object](Stubber::then_delegate), or [compute an
//! answer](Stubber::then_answer).  [Do-actions](Stubber::then_do) run on every
//! matching call in addition to whatever the stub does.
//!
//! ## Matching arguments
//!
//! Inside a capture, the factories in [`matcher`] can stand in for literal
//! arguments.  They are built on [`predicates`](https://docs.rs/predicates),
//! and [`matcher::pred`] accepts any [`Predicate`].  Matchers are
//! all-or-nothing: if a call uses one, it must use them for every argument.
//!
//! ```
//! # use mockrec::*;
//! # use mockrec::matcher::*;
//! # use std::sync::Arc;
//! # const ADD: MethodKey = MethodKey::new("add", "fn(u32, u32) -> u32");
//! # struct MockAdder(Arc<MockState>);
//! # impl MockAdder {
//! #     fn add(&self, x: u32, y: u32) -> u32 {
//! #         self.0.invoke(ADD, args![x, y]).complete(|| x + y, |_| 0)
//! #     }
//! # }
//! let mock = MockAdder(MockState::new("MockAdder", [ADD]));
//! when(|| mock.add(any(), gt(10u32))).unwrap().then_return(99u32);
//! assert_eq!(99, mock.add(1, 11));
//! assert_eq!(0, mock.add(1, 10));
//! ```
//!
//! ## Verification
//!
//! [`Verifier`] checks how many times one call occurred, and
//! [`MultiVerifier`] checks several calls at once, including their relative
//! order.  Failures are returned as [`Error`]s with a readable description.
//!
//! ## Threads
//!
//! Mocks may be shared between threads and called concurrently.  The
//! capture and matcher state is per thread, though: a call must be captured,
//! stubbed and verified on one thread.  By default every thread records into
//! [`Recorder::global`].  Tests that need an isolated history can create
//! their own [`Recorder`] and [enter](Context::enter) a [`Context`] for it.
//!
//! ## Crate features
//!
//! * `fail_soft` - Swallow panics from do-actions and argument matchers by
//!   default, instead of propagating them.  See [`Config`].

mod config;
mod context;
mod dsl;
mod error;
mod invocation;
pub mod matcher;
mod mock;
mod recorder;
mod stub;
mod value;
mod verify;

pub use config::{Config, FailurePolicy};
pub use context::{Context, ContextGuard};
pub use dsl::{Stubber, assert_called, assert_called_multi, when};
pub use error::{CapturedPanic, Details, Error, ErrorKind};
pub use invocation::{Invocation, MethodKey, Outcome};
pub use matcher::{Arg, ArgMatcher, PredicateMatcher, args_match};
pub use mock::{Call, Mock, MockState, Thrown};
pub use recorder::Recorder;
pub use stub::{
    Action,
    Answer,
    AnswerFn,
    Delegation,
    Stub,
    StubEntry,
    StubQueue,
    StubStore,
    Verdict
};
pub use value::{AnyValue, Value, cloned, value};
pub use verify::{
    MultiVerifier,
    Times,
    Verifier,
    call_count,
    ordered_match,
    satisfies
};

pub use predicates::prelude::{Predicate, predicate};

/// Build the literal argument list of a mock call.
///
/// # Examples
/// ```
/// # use mockrec::*;
/// let args = args![42u32, "foo".to_owned()];
/// assert_eq!(2, args.len());
/// assert!(args.iter().all(|a| !a.is_matcher()));
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($a:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::lit($a)),+]
    };
}
