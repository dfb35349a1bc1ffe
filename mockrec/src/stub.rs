// vim: tw=80
//! Per-instance stub storage and stub resolution.
//!
//! Each mock owns one [`StubStore`].  Within it, every method has a list of
//! [`StubQueue`]s, one per distinct argument pattern, plus a list of
//! do-actions.  A live call is resolved against the most recently stubbed
//! queue whose pattern matches its arguments.
//!
//! Queue consumption: the head entry answers the call.  It is removed unless
//! it is retained or it is the last entry left, so the final entry of a queue
//! keeps answering once the earlier one-shot entries are used up.

use std::{
    any::Any,
    collections::{VecDeque, hash_map::HashMap},
    fmt,
    sync::Arc
};

use crate::{
    config::FailurePolicy,
    invocation::{Invocation, MethodKey, Outcome},
    matcher::{Arg, args_match, same_pattern},
    value::AnyValue
};

/// Computes the outcome of a call from the call itself.
pub type Answer = Arc<dyn Fn(&Invocation) -> Outcome + Send + Sync>;

/// A side effect run on every matching call.
pub type Action = Arc<dyn Fn(&Invocation) + Send + Sync>;

/// What a stubbed call should do.
#[derive(Clone)]
pub enum Stub {
    Return(AnyValue),
    Throw(AnyValue),
    CallOriginal,
    Delegate(Arc<dyn Any + Send + Sync>),
    Answer(Answer),
}

impl fmt::Debug for Stub {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stub::Return(v) => write!(f, "Return({:?})", v),
            Stub::Throw(e) => write!(f, "Throw({:?})", e),
            Stub::CallOriginal => f.write_str("CallOriginal"),
            Stub::Delegate(_) => f.write_str("Delegate"),
            Stub::Answer(_) => f.write_str("Answer"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StubEntry {
    pub stub: Stub,
    /// Retained entries are never consumed
    pub retained: bool,
}

#[derive(Debug)]
pub struct StubQueue {
    pattern: Vec<Arg>,
    entries: VecDeque<StubEntry>,
}

impl StubQueue {
    fn new(pattern: Vec<Arg>) -> Self {
        StubQueue{pattern, entries: VecDeque::new()}
    }

    pub fn pattern(&self) -> &[Arg] {
        &self.pattern
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hand out the head entry if `want` accepts it, consuming it unless it
    /// is retained or the only one left.
    fn take_if<F: Fn(&Stub) -> bool>(&mut self, want: F) -> Option<Stub> {
        let head = self.entries.front()?;
        if !want(&head.stub) {
            return None;
        }
        let stub = head.stub.clone();
        if !head.retained && self.entries.len() >= 2 {
            self.entries.pop_front();
        }
        Some(stub)
    }
}

struct DoAction {
    pattern: Vec<Arg>,
    action: Action,
}

/// The target of a delegated call, along with the call's arguments.
#[derive(Clone)]
pub struct Delegation {
    target: Arc<dyn Any + Send + Sync>,
    args: Vec<Arg>,
}

impl Delegation {
    /// The delegate object, if it has type `T`.
    pub fn target<T: Any>(&self) -> Option<&T> {
        self.target.downcast_ref::<T>()
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }
}

impl fmt::Debug for Delegation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Delegation")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// A choice cached between a verdict query and the dispatch that acts on it.
enum Pending {
    CallOriginal,
    Delegate(Delegation),
}

/// How a mock should handle one live call.
#[derive(Clone, Debug)]
pub enum Verdict {
    /// The call was captured by `when` or `assert_called`.  Stubs are not
    /// consulted and no side effects run.
    Monitored,
    CallOriginal,
    Delegate(Delegation),
    Throw(AnyValue),
    Return(AnyValue),
    Answer(AnswerFn),
    /// No stub matched.
    Unstubbed,
}

/// Debug-printable wrapper around an [`Answer`].
#[derive(Clone)]
pub struct AnswerFn(pub Answer);

impl fmt::Debug for AnswerFn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("AnswerFn")
    }
}

impl Verdict {
    pub fn name(&self) -> &'static str {
        match self {
            Verdict::Monitored => "monitored",
            Verdict::CallOriginal => "call original",
            Verdict::Delegate(_) => "delegate",
            Verdict::Throw(_) => "throw",
            Verdict::Return(_) => "return",
            Verdict::Answer(_) => "answer",
            Verdict::Unstubbed => "unstubbed",
        }
    }
}

#[derive(Default)]
pub struct StubStore {
    queues: HashMap<MethodKey, Vec<StubQueue>>,
    do_actions: HashMap<MethodKey, Vec<DoAction>>,
    pending: Option<Pending>,
}

impl StubStore {
    /// Discard every entry stubbed for exactly this pattern, and make it the
    /// most recently stubbed pattern of its method.
    pub(crate) fn restub(&mut self, method: MethodKey, pattern: &[Arg]) {
        let queues = self.queues.entry(method).or_default();
        queues.retain(|q| !same_pattern(&q.pattern, pattern));
        queues.push(StubQueue::new(pattern.to_vec()));
    }

    /// Append an entry to the queue for this pattern, creating it if needed.
    pub(crate) fn push(&mut self, method: MethodKey, pattern: &[Arg],
                       entry: StubEntry)
    {
        let queues = self.queues.entry(method).or_default();
        let i = match queues.iter()
            .rposition(|q| same_pattern(&q.pattern, pattern))
        {
            Some(i) => i,
            None => {
                queues.push(StubQueue::new(pattern.to_vec()));
                queues.len() - 1
            }
        };
        queues[i].entries.push_back(entry);
    }

    /// Mark the most recently added entry for this pattern as retained.
    pub(crate) fn retain_last(&mut self, method: MethodKey, pattern: &[Arg]) {
        if let Some(entry) = self.queues.get_mut(&method)
            .and_then(|qs| qs.iter_mut()
                      .rfind(|q| same_pattern(&q.pattern, pattern)))
            .and_then(|q| q.entries.back_mut())
        {
            entry.retained = true;
        }
    }

    pub(crate) fn add_do_action(&mut self, method: MethodKey,
                                pattern: &[Arg], action: Action)
    {
        self.do_actions.entry(method)
            .or_default()
            .push(DoAction{pattern: pattern.to_vec(), action});
    }

    /// The queues stubbed for `method`, oldest first.
    pub fn queues(&self, method: &MethodKey) -> &[StubQueue] {
        self.queues.get(method).map(Vec::as_slice).unwrap_or_default()
    }

    fn queue_for(&mut self, inv: &Invocation, policy: FailurePolicy)
        -> Option<&mut StubQueue>
    {
        self.queues.get_mut(inv.method())?
            .iter_mut()
            .rev()
            .find(|q| args_match(&q.pattern, inv.args(), policy))
    }

    fn take_if<F>(&mut self, inv: &Invocation, policy: FailurePolicy, want: F)
        -> Option<Stub>
        where F: Fn(&Stub) -> bool
    {
        self.queue_for(inv, policy)?.take_if(want)
    }

    /// Should this call run the real implementation?  If so, the choice is
    /// cached for [`take_pending`](#method.take_pending).
    pub fn should_call_original(&mut self, inv: &Invocation,
                                policy: FailurePolicy) -> bool
    {
        debug_assert!(self.pending.is_none(), "pending choice was never taken");
        let hit = self.take_if(inv, policy,
                               |s| matches!(s, Stub::CallOriginal))
            .is_some();
        if hit {
            self.pending = Some(Pending::CallOriginal);
        }
        hit
    }

    /// Should this call be forwarded to a delegate?  If so, the delegate and
    /// the call's arguments are cached for [`take_pending`](#method.take_pending).
    pub fn should_delegate(&mut self, inv: &Invocation, policy: FailurePolicy)
        -> bool
    {
        debug_assert!(self.pending.is_none(), "pending choice was never taken");
        match self.take_if(inv, policy, |s| matches!(s, Stub::Delegate(_))) {
            Some(Stub::Delegate(target)) => {
                let args = inv.args().to_vec();
                self.pending = Some(Pending::Delegate(Delegation{target, args}));
                true
            },
            _ => false
        }
    }

    /// Take the choice cached by the last positive `should_*` query, leaving
    /// the slot empty.
    fn take_pending(&mut self) -> Option<Verdict> {
        self.pending.take().map(|p| match p {
            Pending::CallOriginal => Verdict::CallOriginal,
            Pending::Delegate(d) => Verdict::Delegate(d)
        })
    }

    pub fn throwable_for(&mut self, inv: &Invocation, policy: FailurePolicy)
        -> Option<AnyValue>
    {
        match self.take_if(inv, policy, |s| matches!(s, Stub::Throw(_))) {
            Some(Stub::Throw(e)) => Some(e),
            _ => None
        }
    }

    /// A canned value or an answer for this call.
    pub fn returnable_for(&mut self, inv: &Invocation, policy: FailurePolicy)
        -> Option<Stub>
    {
        self.take_if(inv, policy,
                     |s| matches!(s, Stub::Return(_) | Stub::Answer(_)))
    }

    /// Decide what a live call should do, asking in dispatch order: run the
    /// original, delegate, throw, then return.
    pub fn resolve(&mut self, inv: &Invocation, policy: FailurePolicy)
        -> Verdict
    {
        if self.should_call_original(inv, policy) ||
            self.should_delegate(inv, policy)
        {
            if let Some(verdict) = self.take_pending() {
                return verdict;
            }
        }
        if let Some(e) = self.throwable_for(inv, policy) {
            return Verdict::Throw(e);
        }
        match self.returnable_for(inv, policy) {
            Some(Stub::Return(v)) => Verdict::Return(v),
            Some(Stub::Answer(f)) => Verdict::Answer(AnswerFn(f)),
            _ => Verdict::Unstubbed
        }
    }

    /// Every side effect registered for a pattern matching this call, in
    /// registration order.
    pub fn actions_for(&self, inv: &Invocation, policy: FailurePolicy)
        -> Vec<Action>
    {
        self.do_actions.get(inv.method())
            .into_iter()
            .flatten()
            .filter(|d| args_match(&d.pattern, inv.args(), policy))
            .map(|d| d.action.clone())
            .collect()
    }
}
