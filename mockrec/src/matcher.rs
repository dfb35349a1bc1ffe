// vim: tw=80
//! Argument matchers and the rules for comparing argument patterns.
//!
//! A matcher factory such as [`eq`] or [`any`] is called in place of a
//! literal argument while building a call expression inside
//! [`when`](crate::when) or [`assert_called`](crate::assert_called).  It
//! pushes a matcher onto the calling thread's matcher stack and returns a
//! placeholder of the parameter's type.  When the mock records the call, the
//! pending matchers replace the placeholders positionally.  Either every
//! argument of a call uses a matcher, or none does.
//!
//! # Examples
//! ```
//! # use mockrec::*;
//! # use std::sync::Arc;
//! use mockrec::matcher::*;
//! # const GREET: MethodKey = MethodKey::new("greet", "fn(String) -> String");
//! # struct MockGreeter(Arc<MockState>);
//! # impl MockGreeter {
//! #     fn greet(&self, name: String) -> String {
//! #         self.0.invoke(GREET, args![name]).complete(String::new, |_| String::new())
//! #     }
//! # }
//! # let mock = MockGreeter(MockState::new("MockGreeter", [GREET]));
//! when(|| mock.greet(any())).unwrap().then_return("Hi".to_owned());
//! assert_eq!("Hi", mock.greet("Bill".to_owned()));
//! ```

use predicates::prelude::*;
use predicates_tree::CaseTreeExt;
use std::{
    any::type_name,
    fmt,
    marker::PhantomData,
    panic::{self, AssertUnwindSafe},
    sync::Arc
};

use crate::{
    config::FailurePolicy,
    context::Context,
    value::{AnyValue, Value}
};

/// A predicate over one argument position.
pub trait ArgMatcher: fmt::Display + Send + Sync {
    fn matches(&self, value: &dyn Value) -> bool;

    /// Why `value` does not match, if it doesn't.
    fn explain(&self, value: &dyn Value) -> Option<String> {
        if self.matches(value) {
            None
        } else {
            Some(format!("{:?} does not satisfy {}", value, self))
        }
    }

    /// A key that identifies what this matcher accepts, if that can be known.
    /// Two matchers with equal keys are interchangeable when deciding whether
    /// a new stubbing replaces an old one.  Matchers built from arbitrary
    /// closures have no key, and are only ever the same as themselves.
    fn identity(&self) -> Option<&str> {
        None
    }
}

/// Adapts any [`Predicate`] over a concrete type into an [`ArgMatcher`].
/// Values of any other type never match.
pub struct PredicateMatcher<T, P> {
    pred: P,
    name: Option<String>,
    identity: Option<String>,
    _t: PhantomData<fn(&T) -> bool>
}

impl<T, P> PredicateMatcher<T, P>
    where T: Value, P: Predicate<T> + Send + Sync + 'static
{
    pub fn new(pred: P) -> Self {
        PredicateMatcher{pred, name: None, identity: None, _t: PhantomData}
    }

    /// Override the description used in failure messages.
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declare the matcher's [`identity`](ArgMatcher::identity).  `key` must
    /// capture everything the predicate depends on.
    pub fn identified_by<S: Into<String>>(mut self, key: S) -> Self {
        self.identity = Some(key.into());
        self
    }
}

impl<T, P> fmt::Display for PredicateMatcher<T, P>
    where P: Predicate<T>
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.name {
            Some(n) => f.write_str(n),
            None => write!(f, "{}", self.pred)
        }
    }
}

impl<T, P> ArgMatcher for PredicateMatcher<T, P>
    where T: Value, P: Predicate<T> + Send + Sync + 'static
{
    fn matches(&self, value: &dyn Value) -> bool {
        match value.downcast_ref::<T>() {
            Ok(v) => self.pred.eval(v),
            Err(_) => false
        }
    }

    fn explain(&self, value: &dyn Value) -> Option<String> {
        match value.downcast_ref::<T>() {
            Ok(v) => self.pred.find_case(false, v)
                .map(|case| format!("{}", case.tree())),
            Err(_) => Some(format!("{:?} is not a {}", value, type_name::<T>()))
        }
    }

    fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}

/// One element of an argument pattern: a literal value or a matcher.
#[derive(Clone)]
pub enum Arg {
    Value(AnyValue),
    Matcher(Arc<dyn ArgMatcher>),
}

impl Arg {
    /// A literal argument.
    pub fn lit<T: Value>(v: T) -> Self {
        Arg::Value(Arc::new(v))
    }

    pub fn value(&self) -> Option<&AnyValue> {
        match self {
            Arg::Value(v) => Some(v),
            Arg::Matcher(_) => None
        }
    }

    pub fn is_matcher(&self) -> bool {
        matches!(self, Arg::Matcher(_))
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Arg::Value(v) => write!(f, "{:?}", v),
            Arg::Matcher(m) => write!(f, "<{}>", m)
        }
    }
}

fn eval(m: &dyn ArgMatcher, v: &dyn Value, policy: FailurePolicy) -> bool {
    match policy {
        FailurePolicy::Propagate => m.matches(v),
        FailurePolicy::Swallow => {
            panic::catch_unwind(AssertUnwindSafe(|| m.matches(v)))
                .unwrap_or_else(|_| {
                    tracing::warn!(matcher = %m, "argument matcher panicked; treating as a mismatch");
                    false
                })
        }
    }
}

/// Does the live argument list `actual` satisfy `pattern`?
///
/// True iff the lengths agree and every position either holds a matcher that
/// accepts the live value, or a literal equal to it.
pub fn args_match(pattern: &[Arg], actual: &[Arg], policy: FailurePolicy)
    -> bool
{
    pattern.len() == actual.len() &&
    pattern.iter().zip(actual.iter()).all(|(p, a)| match (p, a) {
        (Arg::Matcher(m), Arg::Value(v)) => eval(&**m, &**v, policy),
        (Arg::Value(p), Arg::Value(v)) => p.dyn_eq(&**v),
        _ => same_arg(p, a)
    })
}

/// Explain, position by position, why `actual` fails `pattern`.
pub(crate) fn explain_mismatch(pattern: &[Arg], actual: &[Arg])
    -> Vec<String>
{
    if pattern.len() != actual.len() {
        return vec![format!("expected {} arguments, got {}", pattern.len(),
                            actual.len())];
    }
    pattern.iter().zip(actual.iter()).enumerate()
        .filter_map(|(i, (p, a))| {
            let why = match (p, a) {
                (Arg::Matcher(m), Arg::Value(v)) => m.explain(&**v),
                (Arg::Value(p), Arg::Value(v)) if !p.dyn_eq(&**v) =>
                    Some(format!("{:?} != {:?}", v, p)),
                _ => None
            };
            why.map(|w| format!("arg {}: {}", i, w))
        }).collect()
}

fn same_arg(a: &Arg, b: &Arg) -> bool {
    match (a, b) {
        (Arg::Value(x), Arg::Value(y)) => x.dyn_eq(&**y),
        (Arg::Matcher(x), Arg::Matcher(y)) => Arc::ptr_eq(x, y) ||
            matches!((x.identity(), y.identity()), (Some(a), Some(b)) if a == b),
        _ => false
    }
}

/// Are two argument patterns the same pattern?  Literals compare by value and
/// matchers by their [`identity`](ArgMatcher::identity).  Used to decide
/// whether a new stubbing replaces an existing one.
pub fn same_pattern(a: &[Arg], b: &[Arg]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| same_arg(x, y))
}

fn push<M: ArgMatcher + 'static>(m: M) {
    Context::with_current(|ctx| ctx.push_matcher(Arc::new(m)));
}

fn key<T: Value, V: fmt::Debug + ?Sized>(op: &str, v: &V) -> String {
    format!("{} {} {:?}", type_name::<T>(), op, v)
}

/// Match any value of type `T`.
pub fn any<T: Value + Default>() -> T {
    push(PredicateMatcher::<T, _>::new(predicate::always())
         .named(format!("any {}", type_name::<T>()))
         .identified_by(format!("{} any", type_name::<T>())));
    T::default()
}

/// Match values equal to `v`.
pub fn eq<T: Value + PartialEq + Clone>(v: T) -> T {
    push(PredicateMatcher::<T, _>::new(predicate::eq(v.clone()))
         .identified_by(key::<T, _>("==", &v)));
    v
}

/// Match values not equal to `v`.
pub fn ne<T: Value + PartialEq + Clone>(v: T) -> T {
    push(PredicateMatcher::<T, _>::new(predicate::ne(v.clone()))
         .identified_by(key::<T, _>("!=", &v)));
    v
}

/// Match values greater than `v`.
pub fn gt<T: Value + PartialOrd + Clone>(v: T) -> T {
    push(PredicateMatcher::<T, _>::new(predicate::gt(v.clone()))
         .identified_by(key::<T, _>(">", &v)));
    v
}

/// Match values greater than or equal to `v`.
pub fn ge<T: Value + PartialOrd + Clone>(v: T) -> T {
    push(PredicateMatcher::<T, _>::new(predicate::ge(v.clone()))
         .identified_by(key::<T, _>(">=", &v)));
    v
}

/// Match values less than `v`.
pub fn lt<T: Value + PartialOrd + Clone>(v: T) -> T {
    push(PredicateMatcher::<T, _>::new(predicate::lt(v.clone()))
         .identified_by(key::<T, _>("<", &v)));
    v
}

/// Match values less than or equal to `v`.
pub fn le<T: Value + PartialOrd + Clone>(v: T) -> T {
    push(PredicateMatcher::<T, _>::new(predicate::le(v.clone()))
         .identified_by(key::<T, _>("<=", &v)));
    v
}

/// Match values contained in `iter`.
pub fn in_iter<T, I>(iter: I) -> T
    where T: Value + PartialEq + Default, I: IntoIterator<Item = T>
{
    let values: Vec<T> = iter.into_iter().collect();
    let id = key::<T, _>("in", &values[..]);
    push(PredicateMatcher::<T, _>::new(predicate::in_iter(values))
         .identified_by(id));
    T::default()
}

/// Match values for which `f` returns true.  `name` describes the matcher in
/// failure messages.  Two `function` matchers never count as the same
/// pattern, whatever their names.
pub fn function<T, F>(name: &str, f: F) -> T
    where T: Value + Default, F: Fn(&T) -> bool + Send + Sync + 'static
{
    push(PredicateMatcher::<T, _>::new(predicate::function(f)).named(name));
    T::default()
}

/// Match values accepted by an arbitrary [`Predicate`].
pub fn pred<T, P>(p: P) -> T
    where T: Value + Default, P: Predicate<T> + Send + Sync + 'static
{
    push(PredicateMatcher::<T, P>::new(p));
    T::default()
}
