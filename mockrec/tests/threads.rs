// vim: tw=80
//! Mocks shared between threads.

use mockrec::*;
use static_assertions::{assert_impl_all, assert_not_impl_any};
use std::{rc::Rc, sync::Arc, thread};

assert_impl_all!(MockState: Send, Sync);
assert_impl_all!(Recorder: Send, Sync, Clone);
assert_impl_all!(Error: Send, Sync, std::error::Error);
assert_not_impl_any!(ContextGuard: Send);
assert_not_impl_any!(Context: Sync);

const NEXT: MethodKey = MethodKey::new("next", "fn(u32) -> u32");

struct MockCounter(Arc<MockState>);

impl MockCounter {
    fn new() -> Self {
        MockCounter(MockState::new("MockCounter", [NEXT]))
    }

    fn next(&self, x: u32) -> u32 {
        self.0.invoke(NEXT, args![x]).complete(|| x + 1, |_| 0)
    }
}

#[test]
fn concurrent_calls_are_all_recorded() {
    let recorder = Recorder::new();
    let ctx = Context::new(recorder.clone());
    let _guard = ctx.enter();
    let mock = Arc::new(MockCounter::new());
    when(|| mock.next(matcher::any())).unwrap().then_call_original();

    let handles = (0..8).map(|i| {
        let mock = mock.clone();
        let recorder = recorder.clone();
        thread::spawn(move || {
            let ctx = Context::new(recorder);
            let _guard = ctx.enter();
            for _ in 0..10 {
                assert_eq!(i + 1, mock.next(i));
            }
        })
    }).collect::<Vec<_>>();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(80, recorder.len());
    assert_called(|| mock.next(3)).unwrap().was_called(10).unwrap();
    assert_called(|| mock.next(matcher::any())).unwrap()
        .was_called(80).unwrap();
}

#[test]
fn consumption_is_serialized() {
    let mock = Arc::new(MockCounter::new());
    when(|| mock.next(0)).unwrap()
        .then_return(1u32)
        .then_return(2u32)
        .then_return(3u32);
    let handles = (0..3).map(|_| {
        let mock = mock.clone();
        thread::spawn(move || mock.next(0))
    }).collect::<Vec<_>>();
    let mut got = handles.into_iter()
        .map(|h| h.join().unwrap())
        .collect::<Vec<_>>();
    got.sort_unstable();
    assert_eq!(vec![1, 2, 3], got);
    assert_eq!(3, mock.next(0));
}

#[test]
fn matchers_are_per_thread() {
    let mock = MockCounter::new();
    let _ = matcher::eq(5u32);
    // Another thread's pending matcher does not leak into this one
    thread::spawn(|| {
        let mock = MockCounter::new();
        when(|| mock.next(1)).unwrap().then_return(7u32);
        assert_eq!(7, mock.next(1));
    }).join().unwrap();
    assert!(when(|| mock.next(1)).is_err());
}

#[test]
fn st_answer_from_another_thread() {
    let mock = Arc::new(MockCounter::new());
    let local = Rc::new(9u32);
    when(|| mock.next(0)).unwrap()
        .then_answer_st(move |_: &Invocation| *local);
    assert_eq!(9, mock.next(0));
    let m = mock.clone();
    let r = thread::spawn(move || m.next(0)).join();
    assert!(r.is_err());
}
