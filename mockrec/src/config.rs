// vim: tw=80
//! Engine configuration.

use cfg_if::cfg_if;

/// What to do when user code run by the engine panics: a do-action, or an
/// argument matcher.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailurePolicy {
    /// Let the panic unwind into the caller.
    Propagate,
    /// Log the panic and carry on.  A panicking matcher counts as a mismatch.
    Swallow,
}

cfg_if! {
    if #[cfg(feature = "fail_soft")] {
        impl Default for FailurePolicy {
            fn default() -> Self {
                FailurePolicy::Swallow
            }
        }
    } else {
        impl Default for FailurePolicy {
            fn default() -> Self {
                FailurePolicy::Propagate
            }
        }
    }
}

/// Settings shared by every [`Context`](crate::Context) attached to one
/// [`Recorder`](crate::Recorder).
///
/// # Examples
/// ```
/// # use mockrec::*;
/// let config = Config::default()
///     .do_action_failure(FailurePolicy::Swallow);
/// let recorder = Recorder::with_config(config);
/// assert_eq!(FailurePolicy::Swallow, recorder.config().do_action_failure);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Config {
    /// Panics raised by do-actions
    pub do_action_failure: FailurePolicy,
    /// Panics raised by argument matchers
    pub matcher_failure: FailurePolicy,
}

impl Config {
    pub fn do_action_failure(mut self, policy: FailurePolicy) -> Self {
        self.do_action_failure = policy;
        self
    }

    pub fn matcher_failure(mut self, policy: FailurePolicy) -> Self {
        self.matcher_failure = policy;
        self
    }
}
