// vim: tw=80
//! Checking recorded calls against captured templates.

use std::{
    fmt,
    ops::Range,
    sync::Arc
};

use crate::{
    Error,
    config::FailurePolicy,
    error::Details,
    invocation::Invocation,
    matcher::{args_match, explain_mismatch},
    recorder::Recorder
};

/// How many calls are acceptable: a half-open range of call counts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Times {
    range: Range<usize>
}

impl Times {
    pub fn exactly(n: usize) -> Self {
        Times{range: n..n.saturating_add(1)}
    }

    pub fn never() -> Self {
        Self::exactly(0)
    }

    pub fn at_least(n: usize) -> Self {
        Times{range: n..usize::MAX}
    }

    pub fn at_most(n: usize) -> Self {
        Times{range: 0..n.saturating_add(1)}
    }

    /// Any count within `range`.
    pub fn between(range: Range<usize>) -> Self {
        Times{range}
    }

    pub fn contains(&self, count: usize) -> bool {
        self.range.contains(&count)
    }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (start, end) = (self.range.start, self.range.end);
        if end == usize::MAX {
            write!(f, "at least {} times", start)
        } else if end == start + 1 {
            write!(f, "exactly {} times", start)
        } else if start == 0 {
            write!(f, "at most {} times", end.saturating_sub(1))
        } else {
            write!(f, "between {} and {} times", start, end.saturating_sub(1))
        }
    }
}

/// Does the recorded call `actual` satisfy `template`?  Same receiver, same
/// method, and matching arguments.
pub fn satisfies(template: &Invocation, actual: &Invocation,
                 policy: FailurePolicy) -> bool
{
    template.same_receiver(actual) &&
        template.method() == actual.method() &&
        args_match(template.args(), actual.args(), policy)
}

/// Count the entries of `history` that satisfy `template`.
pub fn call_count(template: &Invocation, history: &[Arc<Invocation>],
                  policy: FailurePolicy) -> usize
{
    history.iter().filter(|h| satisfies(template, h, policy)).count()
}

/// Check that `templates` are satisfied, in order, by `history`.
///
/// A single forward pass advances a pointer into `templates` each time the
/// next history entry satisfies the template it points at.  Non-exclusive
/// matching skips over unrelated entries.  Exclusive matching resets the
/// pointer on any unrelated entry, and requires the run to start with the
/// first entry, so `templates` must be a contiguous prefix of `history`.
///
/// On failure, returns the greatest number of templates matched.
pub fn ordered_match(history: &[Arc<Invocation>],
                     templates: &[Arc<Invocation>],
                     exclusive: bool,
                     policy: FailurePolicy) -> Result<(), usize>
{
    let mut next = 0;
    let mut best = 0;
    for inv in history {
        if next == templates.len() {
            break;
        }
        if satisfies(&templates[next], inv, policy) {
            next += 1;
            best = best.max(next);
        } else if exclusive {
            next = 0;
            break;
        }
    }
    if next == templates.len() {
        Ok(())
    } else {
        Err(best)
    }
}

fn check_count(template: &Invocation, recorder: &Recorder, times: &Times)
    -> Result<(), Error>
{
    let policy = recorder.config().matcher_failure;
    let receiver = template.receiver();
    let recorded = recorder.invocations_of(receiver.class(), template.method());
    let actual = call_count(template, &recorded, policy);
    if times.contains(actual) {
        tracing::debug!(call = %template, actual, "count verified");
        return Ok(());
    }
    let details = recorded.iter()
        .filter(|h| template.same_receiver(h) &&
                !args_match(template.args(), h.args(), policy))
        .map(|h| {
            let why = explain_mismatch(template.args(), h.args());
            format!("{}: {}", h, why.join("; "))
        }).collect();
    tracing::debug!(call = %template, actual, expected = %times,
                    "count verification failed");
    Err(Error::CallCount {
        call: template.to_string(),
        expected: times.clone(),
        actual,
        details: Details(details)
    })
}

/// Verifies how often one captured call occurred.
pub struct Verifier {
    template: Arc<Invocation>,
    recorder: Recorder,
}

impl Verifier {
    pub fn new(template: Arc<Invocation>, recorder: Recorder) -> Self {
        Verifier{template, recorder}
    }

    /// Recorded calls satisfying the template, with their outcomes.
    pub fn invocations(&self) -> Vec<Arc<Invocation>> {
        let policy = self.recorder.config().matcher_failure;
        let receiver = self.template.receiver();
        self.recorder.invocations_of(receiver.class(), self.template.method())
            .into_iter()
            .filter(|h| satisfies(&self.template, h, policy))
            .collect()
    }

    pub fn call_count(&self) -> usize {
        let policy = self.recorder.config().matcher_failure;
        let receiver = self.template.receiver();
        let recorded = self.recorder.invocations_of(receiver.class(),
                                                    self.template.method());
        call_count(&self.template, &recorded, policy)
    }

    pub fn times(&self, times: Times) -> Result<(), Error> {
        check_count(&self.template, &self.recorder, &times)
    }

    /// Require exactly `n` calls.
    pub fn was_called(&self, n: usize) -> Result<(), Error> {
        self.times(Times::exactly(n))
    }

    pub fn was_called_once(&self) -> Result<(), Error> {
        self.was_called(1)
    }

    pub fn never(&self) -> Result<(), Error> {
        self.times(Times::never())
    }

    pub fn at_least(&self, n: usize) -> Result<(), Error> {
        self.times(Times::at_least(n))
    }

    pub fn at_most(&self, n: usize) -> Result<(), Error> {
        self.times(Times::at_most(n))
    }

    pub fn between(&self, range: Range<usize>) -> Result<(), Error> {
        self.times(Times::between(range))
    }
}

/// Verifies several captured calls at once: each one's count, or their
/// relative order.
pub struct MultiVerifier {
    templates: Vec<Arc<Invocation>>,
    recorder: Recorder,
}

impl MultiVerifier {
    pub fn new(templates: Vec<Arc<Invocation>>, recorder: Recorder) -> Self {
        MultiVerifier{templates, recorder}
    }

    pub fn templates(&self) -> &[Arc<Invocation>] {
        &self.templates
    }

    /// Check every template's count.  A single failure is returned as is;
    /// several are gathered into one [`Error::Aggregate`].
    pub fn each(&self, times: Times) -> Result<(), Error> {
        let mut failures: Vec<Error> = self.templates.iter()
            .filter_map(|t| check_count(t, &self.recorder, &times).err())
            .collect();
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(Error::Aggregate(failures))
        }
    }

    pub fn each_called(&self, n: usize) -> Result<(), Error> {
        self.each(Times::exactly(n))
    }

    pub fn each_never(&self) -> Result<(), Error> {
        self.each(Times::never())
    }

    pub fn each_at_least(&self, n: usize) -> Result<(), Error> {
        self.each(Times::at_least(n))
    }

    pub fn each_at_most(&self, n: usize) -> Result<(), Error> {
        self.each(Times::at_most(n))
    }

    /// The templates occurred in order, possibly with other calls between
    /// them.
    pub fn in_order(&self) -> Result<(), Error> {
        self.ordered(false)
    }

    /// The templates occurred in order with no other call on the same mocks
    /// before or between them.
    pub fn in_exclusive_order(&self) -> Result<(), Error> {
        self.ordered(true)
    }

    fn ordered(&self, exclusive: bool) -> Result<(), Error> {
        let policy = self.recorder.config().matcher_failure;
        // Only calls on the mocks being verified are relevant
        let history: Vec<_> = self.recorder.invocations()
            .into_iter()
            .filter(|h| self.templates.iter().any(|t| t.same_receiver(h)))
            .collect();
        match ordered_match(&history, &self.templates, exclusive, policy) {
            Ok(()) => {
                tracing::debug!(calls = self.templates.len(), exclusive,
                                "order verified");
                Ok(())
            },
            Err(matched) => Err(Error::Ordering {
                expected: self.templates.iter().map(|t| t.to_string())
                    .collect(),
                matched,
                exclusive,
                recorded: history.iter().map(|h| h.to_string()).collect()
            })
        }
    }
}
