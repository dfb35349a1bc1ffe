// vim: tw=80
//! Argument matchers in stubbing and verification, and their misuse.

use mockrec::*;
use mockrec::matcher::*;
use predicates::prelude::PredicateBooleanExt;
use std::{error::Error as _, sync::Arc};

const ADD: MethodKey = MethodKey::new("add", "fn(u32, u32) -> u32");
const LEN: MethodKey = MethodKey::new("len", "fn(String) -> usize");

struct MockCalc(Arc<MockState>);

impl MockCalc {
    fn new() -> Self {
        MockCalc(MockState::new("MockCalc", [ADD, LEN]))
    }

    fn add(&self, x: u32, y: u32) -> u32 {
        self.0.invoke(ADD, args![x, y]).complete(|| x + y, |_| 0)
    }

    fn len(&self, s: String) -> usize {
        self.0.invoke(LEN, args![s.clone()]).complete(|| s.len(), |_| 0)
    }
}

fn err<T>(r: Result<T, Error>) -> Error {
    match r {
        Ok(_) => panic!("Shouldn't get here!"),
        Err(e) => e
    }
}

#[test]
fn any_and_gt() {
    let mock = MockCalc::new();
    when(|| mock.add(any(), gt(10))).unwrap().then_return(99u32);
    assert_eq!(99, mock.add(1, 11));
    assert_eq!(0, mock.add(1, 10));
}

#[test]
fn comparisons() {
    let mock = MockCalc::new();
    when(|| mock.add(le(4), ge(5))).unwrap().then_return(1u32);
    when(|| mock.add(gt(5), ne(0))).unwrap().then_return(2u32);
    when(|| mock.add(eq(9), lt(10))).unwrap().then_return(3u32);
    assert_eq!(1, mock.add(4, 5));
    assert_eq!(2, mock.add(6, 1));
    assert_eq!(3, mock.add(9, 9));
    assert_eq!(2, mock.add(9, 10));
    assert_eq!(0, mock.add(5, 5));
}

#[test]
fn in_iter_and_function() {
    let mock = MockCalc::new();
    when(|| mock.len(in_iter(vec!["a".to_owned(), "b".to_owned()])))
        .unwrap()
        .then_return(100usize);
    when(|| mock.len(function("long", |s: &String| s.len() > 5))).unwrap()
        .then_return(200usize);
    assert_eq!(100, mock.len("b".to_owned()));
    assert_eq!(200, mock.len("abcdefg".to_owned()));
    assert_eq!(0, mock.len("c".to_owned()));
}

#[test]
fn arbitrary_predicate() {
    let mock = MockCalc::new();
    let between = predicate::ge(3u32).and(predicate::le(5u32));
    when(|| mock.add(pred(between), any())).unwrap().then_return(7u32);
    assert_eq!(7, mock.add(4, 0));
    assert_eq!(0, mock.add(6, 0));
}

#[test]
fn verification() {
    let ctx = Context::new(Recorder::new());
    let _guard = ctx.enter();
    let mock = MockCalc::new();
    mock.add(1, 2);
    mock.add(3, 20);
    mock.add(5, 30);
    assert_called(|| mock.add(any(), gt(10))).unwrap().was_called(2).unwrap();
    assert_called(|| mock.add(any(), any())).unwrap().was_called(3).unwrap();
}

#[test]
fn mismatch_details() {
    let ctx = Context::new(Recorder::new());
    let _guard = ctx.enter();
    let mock = MockCalc::new();
    mock.add(1, 2);
    let e = err(assert_called(|| mock.add(any(), gt(10))).unwrap()
                .was_called(1));
    let msg = e.to_string();
    assert!(msg.contains("but was called 0 times"), "{}", msg);
    assert!(msg.contains("arg 1:"), "{}", msg);
}

mod misuse {
    use super::*;

    #[test]
    fn mixed_matchers_and_literals() {
        let mock = MockCalc::new();
        when(|| mock.add(3, 5)).unwrap().then_return(8u32);
        let e = err(when(|| mock.add(any(), 5)));
        assert!(matches!(e, Error::InconsistentMatchers{matchers: 1, args: 2}),
                "{:?}", e);
        assert_eq!(ErrorKind::Usage, e.kind());
        // Nothing was stubbed, and the matcher stack is clean again
        assert_eq!(8, mock.add(3, 5));
        when(|| mock.add(1, 1)).unwrap().then_return(2u32);
        assert_eq!(2, mock.add(1, 1));
    }

    #[test]
    fn unconsumed_matcher() {
        let mock = MockCalc::new();
        let _ = eq(3u32);
        let e = err(when(|| mock.add(1, 2)));
        assert!(matches!(e, Error::UnconsumedMatchers{count: 1}), "{:?}", e);
        // The stale matcher was discarded
        when(|| mock.add(1, 2)).unwrap().then_return(3u32);
        assert_eq!(3, mock.add(1, 2));
    }

    #[test]
    fn panic_in_captured_block() {
        let mock = MockCalc::new();
        let e = err(when(|| mock.add(any::<Option<u32>>().unwrap(), 1)));
        assert!(matches!(e, Error::ProbableMatcherMisuse{..}), "{:?}", e);
        assert_eq!(ErrorKind::Hint, e.kind());
        let source = e.source().unwrap().to_string();
        assert!(source.contains("None"), "{}", source);
        when(|| mock.add(1, 1)).unwrap().then_return(2u32);
        assert_eq!(2, mock.add(1, 1));
    }

    #[test]
    fn panicking_matcher_swallowed() {
        let config = Config::default().matcher_failure(FailurePolicy::Swallow);
        let ctx = Context::new(Recorder::with_config(config));
        let _guard = ctx.enter();
        let mock = MockCalc::new();
        when(|| mock.add(function("boom", |_: &u32| -> bool {
            panic!("matcher exploded")
        }), any())).unwrap().then_return(1u32);
        assert_eq!(0, mock.add(1, 1));
    }

    #[test]
    #[should_panic(expected = "matcher exploded")]
    fn panicking_matcher_propagated() {
        let config = Config::default()
            .matcher_failure(FailurePolicy::Propagate);
        let ctx = Context::new(Recorder::with_config(config));
        let _guard = ctx.enter();
        let mock = MockCalc::new();
        when(|| mock.add(function("boom", |_: &u32| -> bool {
            panic!("matcher exploded")
        }), any())).unwrap().then_return(1u32);
        mock.add(1, 1);
    }
}
