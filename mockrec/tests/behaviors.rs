// vim: tw=80
//! Stubs that do more than return a canned value: throwing, running the real
//! implementation, delegating, computed answers and do-actions.

use mockrec::*;
use mockrec::matcher::any;
use std::{
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    sync::{Arc, Mutex}
};

#[derive(Clone, Debug, PartialEq)]
enum StoreError {
    NotFound(u32),
    Full
}

trait Store {
    fn get(&self, key: u32) -> Result<String, StoreError>;
    fn put(&self, key: u32, value: String) -> bool;
}

struct RealStore;

impl Store for RealStore {
    fn get(&self, key: u32) -> Result<String, StoreError> {
        Ok(format!("real {}", key))
    }

    fn put(&self, key: u32, _value: String) -> bool {
        key % 2 == 0
    }
}

const GET: MethodKey =
    MethodKey::new("get", "fn(u32) -> Result<String, StoreError>");
const PUT: MethodKey = MethodKey::new("put", "fn(u32, String) -> bool");

struct MockStore(Arc<MockState>);

impl MockStore {
    fn new() -> Self {
        MockStore(MockState::new("MockStore", [GET, PUT]))
    }
}

impl Store for MockStore {
    fn get(&self, key: u32) -> Result<String, StoreError> {
        self.0.invoke(GET, args![key])
            .complete_fallible(
                || Err(StoreError::NotFound(key)),
                |d| match d.target::<RealStore>() {
                    Some(real) => real.get(key),
                    None => Err(StoreError::NotFound(key))
                })
    }

    fn put(&self, key: u32, value: String) -> bool {
        self.0.invoke(PUT, args![key, value.clone()])
            .complete(|| false,
                      |d| d.target::<RealStore>()
                          .map(|real| real.put(key, value.clone()))
                          .unwrap_or_default())
    }
}

/// Run `f` with a history of its own, and the given config.
fn with_config<F: FnOnce()>(config: Config, f: F) {
    let ctx = Context::new(Recorder::with_config(config));
    let _guard = ctx.enter();
    f()
}

mod throw {
    use super::*;

    #[test]
    fn fallible() {
        let mock = MockStore::new();
        when(|| mock.get(1)).unwrap().then_throw(StoreError::Full);
        assert_eq!(Err(StoreError::Full), mock.get(1));
        assert_eq!(Ok(String::new()), mock.get(2));
    }

    #[test]
    fn fallible_then_return() {
        let mock = MockStore::new();
        when(|| mock.get(1)).unwrap()
            .then_throw(StoreError::Full)
            .then_return("one".to_owned());
        assert_eq!(Err(StoreError::Full), mock.get(1));
        assert_eq!(Ok("one".to_owned()), mock.get(1));
        assert_eq!(Ok("one".to_owned()), mock.get(1));
    }

    #[test]
    fn infallible() {
        let mock = MockStore::new();
        when(|| mock.put(1, "x".to_owned())).unwrap()
            .then_throw("disk on fire".to_owned());
        let r = panic::catch_unwind(AssertUnwindSafe(|| {
            mock.put(1, "x".to_owned())
        }));
        let thrown = r.unwrap_err().downcast::<Thrown>().unwrap();
        assert_eq!(Some("disk on fire".to_owned()),
                   cloned::<String>(&*thrown.0));
    }

    #[test]
    #[should_panic(expected = "stubbed value is not a")]
    fn wrong_error_type() {
        let mock = MockStore::new();
        when(|| mock.get(1)).unwrap().then_throw(42u32);
        let _ = mock.get(1);
    }
}

mod call_original {
    use super::*;

    #[test]
    fn fallible() {
        let mock = MockStore::new();
        when(|| mock.get(3)).unwrap().then_call_original();
        assert_eq!(Err(StoreError::NotFound(3)), mock.get(3));
    }

    #[test]
    fn then_return() {
        let mock = MockStore::new();
        when(|| mock.put(1, "x".to_owned())).unwrap()
            .then_return(true)
            .then_call_original();
        assert!(mock.put(1, "x".to_owned()));
        assert!(!mock.put(1, "x".to_owned()));
    }
}

mod delegate {
    use super::*;

    #[test]
    fn forwards() {
        let mock = MockStore::new();
        when(|| mock.get(any())).unwrap().then_delegate(RealStore);
        assert_eq!(Ok("real 5".to_owned()), mock.get(5));
        assert_eq!(Ok("real 6".to_owned()), mock.get(6));
    }

    #[test]
    fn sees_arguments() {
        let mock = MockStore::new();
        when(|| mock.put(any(), any())).unwrap().then_delegate(RealStore);
        assert!(mock.put(2, "two".to_owned()));
        assert!(!mock.put(3, "three".to_owned()));
    }

    #[test]
    fn wrong_target_type() {
        let mock = MockStore::new();
        when(|| mock.get(1)).unwrap().then_delegate(42u32);
        assert_eq!(Err(StoreError::NotFound(1)), mock.get(1));
    }
}

mod answer {
    use super::*;

    #[test]
    fn computes_from_arguments() {
        let mock = MockStore::new();
        when(|| mock.get(any())).unwrap()
            .then_answer(|inv: &Invocation| {
                format!("key {}", inv.arg::<u32>(0).unwrap_or_default())
            });
        assert_eq!(Ok("key 7".to_owned()), mock.get(7));
        assert_eq!(Ok("key 8".to_owned()), mock.get(8));
    }

    #[test]
    fn outcome() {
        let mock = MockStore::new();
        when(|| mock.get(any())).unwrap()
            .then_answer_outcome(|inv: &Invocation| {
                let key = inv.arg::<u32>(0).unwrap_or_default();
                if key % 2 == 0 {
                    Outcome::Returned(value("even".to_owned()))
                } else {
                    Outcome::Threw(value(StoreError::NotFound(key)))
                }
            });
        assert_eq!(Ok("even".to_owned()), mock.get(2));
        assert_eq!(Err(StoreError::NotFound(3)), mock.get(3));
    }

    #[test]
    fn st() {
        let mock = MockStore::new();
        let prefix = Rc::new("local".to_owned());
        when(|| mock.get(1)).unwrap()
            .then_answer_st(move |_: &Invocation| (*prefix).clone());
        assert_eq!(Ok("local".to_owned()), mock.get(1));
    }
}

mod do_action {
    use super::*;

    #[test]
    fn every_matching_action_runs_in_order() {
        let mock = MockStore::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l1 = log.clone();
        let l2 = log.clone();
        when(|| mock.get(any())).unwrap()
            .then_do(move |inv: &Invocation| {
                l1.lock().unwrap().push(inv.arg::<u32>(0).unwrap())
            });
        when(|| mock.get(1)).unwrap()
            .then_do(move |_: &Invocation| l2.lock().unwrap().push(100));
        let _ = mock.get(1);
        let _ = mock.get(2);
        assert_eq!(vec![1, 100, 2], *log.lock().unwrap());
    }

    #[test]
    fn alongside_return() {
        let mock = MockStore::new();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        when(|| mock.get(3)).unwrap()
            .then_return("three".to_owned())
            .then_do(move |_: &Invocation| *h.lock().unwrap() += 1);
        assert_eq!(Ok("three".to_owned()), mock.get(3));
        assert_eq!(Ok("three".to_owned()), mock.get(3));
        assert_eq!(2, *hits.lock().unwrap());
    }

    #[test]
    fn runs_before_the_outcome_is_known() {
        with_config(Config::default(), || {
            let mock = MockStore::new();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let s = seen.clone();
            when(|| mock.get(3)).unwrap()
                .then_return("three".to_owned())
                .then_do(move |inv: &Invocation| {
                    s.lock().unwrap().push(inv.outcome().is_some())
                });
            assert_eq!(Ok("three".to_owned()), mock.get(3));
            assert_eq!(vec![false], *seen.lock().unwrap());
            let calls = Context::current().recorder().invocations();
            assert!(matches!(calls[0].outcome(), Some(Outcome::Returned(_))));
        });
    }

    #[test]
    fn not_run_while_capturing() {
        let mock = MockStore::new();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        when(|| mock.get(3)).unwrap()
            .then_do(move |_: &Invocation| *h.lock().unwrap() += 1);
        when(|| mock.get(3)).unwrap().then_return("three".to_owned());
        assert_eq!(0, *hits.lock().unwrap());
    }

    #[test]
    fn st() {
        let mock = MockStore::new();
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let l = log.clone();
        when(|| mock.put(any(), any())).unwrap()
            .then_do_st(move |inv: &Invocation| {
                l.borrow_mut().push(inv.arg::<String>(1).unwrap())
            });
        mock.put(1, "one".to_owned());
        assert_eq!(vec!["one".to_owned()], *log.borrow());
    }

    #[test]
    fn swallowed() {
        let config = Config::default()
            .do_action_failure(FailurePolicy::Swallow);
        with_config(config, || {
            let mock = MockStore::new();
            when(|| mock.get(1)).unwrap()
                .then_return("one".to_owned())
                .then_do(|_: &Invocation| panic!("action failed"));
            assert_eq!(Ok("one".to_owned()), mock.get(1));
        });
    }

    #[test]
    #[should_panic(expected = "action failed")]
    fn propagated() {
        let config = Config::default()
            .do_action_failure(FailurePolicy::Propagate);
        with_config(config, || {
            let mock = MockStore::new();
            when(|| mock.get(1)).unwrap()
                .then_do(|_: &Invocation| panic!("action failed"));
            let _ = mock.get(1);
        });
    }
}

#[test]
fn outcomes_are_recorded() {
    with_config(Config::default(), || {
        let mock = MockStore::new();
        when(|| mock.get(1)).unwrap().then_return("one".to_owned());
        when(|| mock.get(2)).unwrap().then_throw(StoreError::Full);
        let _ = mock.get(1);
        let _ = mock.get(2);
        let calls = Context::current().recorder().invocations();
        assert_eq!(2, calls.len());
        match calls[0].outcome() {
            Some(Outcome::Returned(v)) =>
                assert_eq!(Some("one".to_owned()), cloned::<String>(&**v)),
            other => panic!("Unexpected outcome {:?}", other)
        }
        match calls[1].outcome() {
            Some(Outcome::Threw(e)) =>
                assert_eq!(Some(StoreError::Full),
                           cloned::<StoreError>(&**e)),
            other => panic!("Unexpected outcome {:?}", other)
        }
    });
}
