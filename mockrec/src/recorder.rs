// vim: tw=80
//! The shared invocation history.

use lazy_static::lazy_static;
use std::{
    collections::hash_map::HashMap,
    sync::{Arc, Mutex, MutexGuard}
};

use crate::{
    config::Config,
    invocation::{Invocation, MethodKey},
};

lazy_static! {
    static ref GLOBAL: Recorder = Recorder::new();
}

/// Every call recorded outside of a capture, grouped by mock class and method,
/// plus one list of all of them in call order.
#[derive(Default)]
struct History {
    by_class: HashMap<&'static str, HashMap<MethodKey, Vec<Arc<Invocation>>>>,
    all: Vec<Arc<Invocation>>,
}

struct Shared {
    history: Mutex<History>,
    config: Config,
}

/// A handle to a shared invocation history.
///
/// Clones share the same history.  All access to the history is serialized by
/// a single lock; recording is not meant to be fast, only correct.
#[derive(Clone)]
pub struct Recorder {
    shared: Arc<Shared>
}

/// Lock a mutex, ignoring poison.  A panicking test must not break every other
/// test that shares the lock.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let shared = Shared {
            history: Mutex::new(History::default()),
            config
        };
        Recorder{shared: Arc::new(shared)}
    }

    /// The process-wide recorder used by threads that haven't entered a
    /// [`Context`](crate::Context) of their own.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    pub fn config(&self) -> Config {
        self.shared.config
    }

    pub(crate) fn append(&self, inv: Arc<Invocation>) {
        let mut history = lock(&self.shared.history);
        let class = inv.receiver().class();
        history.by_class.entry(class)
            .or_default()
            .entry(*inv.method())
            .or_default()
            .push(inv.clone());
        history.all.push(inv);
    }

    /// Forget every recorded call.  Open captures are unaffected.
    pub fn reset(&self) {
        let mut history = lock(&self.shared.history);
        history.by_class.clear();
        history.all.clear();
        tracing::debug!("history reset");
    }

    /// All recorded calls, in call order.
    pub fn invocations(&self) -> Vec<Arc<Invocation>> {
        lock(&self.shared.history).all.clone()
    }

    /// Recorded calls of `method` on any instance of `class`, in call order.
    pub fn invocations_of(&self, class: &str, method: &MethodKey)
        -> Vec<Arc<Invocation>>
    {
        lock(&self.shared.history).by_class.get(class)
            .and_then(|methods| methods.get(method))
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.history).all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}
