//! Integration tests for rxsubject
//!
//! End-to-end scenarios across subscriptions, subscribers and subjects.

use std::{cell::RefCell, rc::Rc};

use futures::executor::LocalPool;
use rxsubject::prelude::*;

type Log<Err = &'static str> = Rc<RefCell<Vec<Notification<i32, Err>>>>;

fn recorder<Err: 'static>(log: &Log<Err>) -> PartialObserver<i32, Err> {
  let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
  PartialObserver::new()
    .on_next(move |v| l1.borrow_mut().push(Notification::Next(v)))
    .on_error(move |e| l2.borrow_mut().push(Notification::Error(e)))
    .on_complete(move || l3.borrow_mut().push(Notification::Complete))
}

#[test]
fn subject_end_to_end() {
  let s = Subject::<i32, ()>::new();
  let obs_a = Rc::new(RefCell::new(vec![]));
  let obs_b = Rc::new(RefCell::new(vec![]));

  let c_a = obs_a.clone();
  s.subscribe(move |v| c_a.borrow_mut().push(v));
  s.next(1);
  let c_b = obs_b.clone();
  s.subscribe(move |v| c_b.borrow_mut().push(v));
  s.next(2);
  s.complete();

  let third: Log<()> = Rc::default();
  let subscription = s.subscribe(recorder(&third));

  assert_eq!(*obs_a.borrow(), vec![1, 2]);
  assert_eq!(*obs_b.borrow(), vec![2]);
  assert_eq!(*third.borrow(), vec![Notification::Complete]);
  assert!(subscription.is_closed());
}

#[test]
fn subject_error_is_terminal_for_everyone() {
  let s = Subject::<i32, &str>::new();
  let (a, b): (Log, Log) = (Rc::default(), Rc::default());
  s.subscribe(recorder(&a));
  s.subscribe(recorder(&b));

  s.error("E");
  s.next(1);
  s.complete();

  let late: Log = Rc::default();
  s.subscribe(recorder(&late));

  for log in [&a, &b, &late] {
    assert_eq!(*log.borrow(), vec![Notification::Error("E")]);
  }
}

#[test]
fn behavior_subject_scenario() {
  let s = BehaviorSubject::<i32, ()>::new(5);
  let first = Rc::new(RefCell::new(vec![]));
  let c_first = first.clone();
  s.subscribe(move |v| c_first.borrow_mut().push(v));
  assert_eq!(*first.borrow(), vec![5]);

  s.next(9);
  let second = Rc::new(RefCell::new(vec![]));
  let c_second = second.clone();
  s.subscribe(move |v| c_second.borrow_mut().push(v));
  assert_eq!(*second.borrow(), vec![9]);

  s.unsubscribe();
  assert_eq!(
    s.value(),
    Err(GetValueError::Unsubscribed(ObjectUnsubscribedError))
  );
}

#[test]
fn replay_subject_scenario() {
  let s = ReplaySubject::<i32, ()>::with_buffer_size(2);
  s.next(1);
  s.next(2);
  s.next(3);

  let seen = Rc::new(RefCell::new(vec![]));
  let c_seen = seen.clone();
  s.subscribe(move |v| c_seen.borrow_mut().push(v));
  s.next(4);

  assert_eq!(*seen.borrow(), vec![2, 3, 4]);
}

#[test]
fn async_subject_scenario() {
  let s = AsyncSubject::<i32, &str>::new();
  let before: Log = Rc::default();
  s.subscribe(recorder(&before));

  s.next(1);
  s.next(2);
  s.complete();
  s.next(3);

  let after: Log = Rc::default();
  s.subscribe(recorder(&after));

  let expected = vec![Notification::Next(2), Notification::Complete];
  assert_eq!(*before.borrow(), expected);
  assert_eq!(*after.borrow(), expected);
}

#[test]
fn subscription_idempotence_and_late_add() {
  let runs = Rc::new(RefCell::new(0));
  let c_runs = runs.clone();
  let s = Subscription::with_teardown(move || *c_runs.borrow_mut() += 1);

  s.unsubscribe().unwrap();
  s.unsubscribe().unwrap();
  assert_eq!(*runs.borrow(), 1);

  let late = Rc::new(RefCell::new(false));
  let c_late = late.clone();
  s.add(Teardown::from_fn(move || *c_late.borrow_mut() = true));
  assert!(*late.borrow());
  assert_eq!(s.finalizer_count(), 0);
}

#[test]
fn unsubscribing_the_root_tears_down_the_tree() {
  let root = Subscription::new();
  let log = Rc::new(RefCell::new(vec![]));

  let subject = Subject::<i32, ()>::new();
  let c_log = log.clone();
  let inner = subject.subscribe(move |v| c_log.borrow_mut().push(v));
  root.add(&inner);
  let c_log = log.clone();
  root.add(Teardown::from_fn(move || c_log.borrow_mut().push(-1)));

  subject.next(1);
  root.unsubscribe().unwrap();
  subject.next(2);

  assert_eq!(*log.borrow(), vec![1, -1]);
  assert!(inner.is_closed());
  assert!(!subject.observed());
}

#[test]
fn teardown_failures_are_aggregated() {
  let root = Subscription::new();
  let child = Subscription::with_fallible_teardown(|| Err("child failed".into()));
  root.add(&child);
  root.add(Teardown::from_fn(|| panic!("finalizer panicked")));
  let ran_last = Rc::new(RefCell::new(false));
  let c_ran_last = ran_last.clone();
  root.add(Teardown::from_fn(move || *c_ran_last.borrow_mut() = true));

  let err = root.unsubscribe().unwrap_err();
  let messages: Vec<_> = err.errors.iter().map(|e| e.to_string()).collect();
  assert_eq!(
    messages,
    vec![
      "child failed".to_string(),
      "teardown panicked: finalizer panicked".to_string()
    ]
  );
  assert!(*ran_last.borrow());
  assert!(root.is_closed() && child.is_closed());
}

#[test]
fn hooks_run_on_the_configured_scheduler() {
  let mut pool = LocalPool::new();
  let reported = Rc::new(RefCell::new(vec![]));
  let stopped = Rc::new(RefCell::new(vec![]));
  let (c_reported, c_stopped) = (reported.clone(), stopped.clone());
  let config = RuntimeConfig::builder()
    .scheduler(LocalPoolScheduler::new(pool.spawner()))
    .on_unhandled_error(move |e| c_reported.borrow_mut().push(e.to_string()))
    .on_stopped_notification(move |n, _| c_stopped.borrow_mut().push(n.kind))
    .build();

  let subject = Subject::<i32, String>::with_config(config.clone());
  subject.subscribe(|_: i32| {});
  subject.error("lost".to_string());

  let subscriber = SafeSubscriber::<i32, ()>::new(|_: i32| {}, config);
  subscriber.complete();
  subscriber.next(1);

  assert!(reported.borrow().is_empty());
  assert!(stopped.borrow().is_empty());
  pool.run_until_stalled();

  assert_eq!(*reported.borrow(), vec!["uncaught error: \"lost\"".to_string()]);
  assert_eq!(*stopped.borrow(), vec![NotificationKind::Next]);
}

#[test]
fn anonymous_subject_pipes_through() {
  let input = Subject::<i32, ()>::new();
  let output = Subject::<i32, ()>::new();

  // whatever goes in comes out doubled
  let c_output = output.clone();
  input.subscribe(move |v: i32| c_output.next(v * 2));

  let piped = Subject::<i32, ()>::create(input, output.as_observable());
  let seen = Rc::new(RefCell::new(vec![]));
  let c_seen = seen.clone();
  piped.subscribe(move |v| c_seen.borrow_mut().push(v));

  piped.next(1);
  piped.next(2);
  assert_eq!(*seen.borrow(), vec![2, 4]);
}

#[test]
fn guard_unsubscribes_when_dropped() {
  let subject = Subject::<i32, ()>::new();
  let seen = Rc::new(RefCell::new(vec![]));
  {
    let c_seen = seen.clone();
    let _guard = subject
      .subscribe(move |v| c_seen.borrow_mut().push(v))
      .unsubscribe_when_dropped();
    subject.next(1);
  }
  subject.next(2);
  assert_eq!(*seen.borrow(), vec![1]);
  assert_eq!(subject.subscriber_count(), 0);
}

#[test]
fn legacy_next_context_lets_callbacks_unsubscribe() {
  let config = RuntimeConfig::builder()
    .use_deprecated_next_context(true)
    .build();
  let subject = Subject::<i32, ()>::with_config(config);
  let seen = Rc::new(RefCell::new(vec![]));
  let c_seen = seen.clone();
  subject.subscribe(ContextObserver::new().on_next(move |v: i32, ctx: &Subscription| {
    c_seen.borrow_mut().push(v);
    if v == 2 {
      ctx.unsubscribe().unwrap();
    }
  }));

  subject.next(1);
  subject.next(2);
  subject.next(3);
  assert_eq!(*seen.borrow(), vec![1, 2]);
  assert!(!subject.observed());
}
