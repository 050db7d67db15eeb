//! Hot observables that are also observers.
//!
//! A [`Subject`] multicasts every notification pushed into it to the
//! subscribers registered at that moment. The buffered variants layer a
//! replay policy on top of it:
//!
//! - [`AsyncSubject`] emits only the last value, on completion.
//! - [`BehaviorSubject`] always has a current value and hands it to every new
//!   subscriber.
//! - [`ReplaySubject`] replays a window of past values.
//!
//! [`AnonymousSubject`] splits the observer side from the observable side.
//!
//! All of them are cheap `Clone` handles; clones share the same state.
//!
//! # Re-entrancy
//!
//! No internal borrow is held while subscribers run, so a subscriber may
//! subscribe, unsubscribe or emit into the subject from its own callbacks.
//! `next` delivers to the subscribers registered when it was called; changes
//! made during that delivery take effect from the next emission on.

use std::{
  cell::RefCell,
  fmt::{Debug, Formatter},
  rc::Rc,
};

use crate::{
  config::RuntimeConfig,
  error::ObjectUnsubscribedError,
  observable::Observable,
  observer::Observer,
  subscriber::{ObserverArg, Subscriber},
  subscription::Subscription,
};

/// Implements the lifecycle accessors, `try_subscribe` and [`Observer`] for a
/// buffered subject wrapping a `subject: Subject<Item, Err>` field. The type
/// must provide inherent `next`, `error` and `complete`.
macro_rules! impl_subject_delegates {
  ($ty:ident) => {
    impl<Item, Err> $ty<Item, Err> {
      #[inline]
      pub fn is_closed(&self) -> bool { self.subject.is_closed() }

      #[inline]
      pub fn is_stopped(&self) -> bool { self.subject.is_stopped() }

      #[inline]
      pub fn has_error(&self) -> bool { self.subject.has_error() }

      #[inline]
      pub fn observed(&self) -> bool { self.subject.observed() }

      #[inline]
      pub fn subscriber_count(&self) -> usize { self.subject.subscriber_count() }

      #[inline]
      pub fn config(&self) -> &$crate::config::RuntimeConfig { self.subject.config() }

      /// Closes the subject without notifying its subscribers.
      #[inline]
      pub fn unsubscribe(&self) { self.subject.unsubscribe() }
    }

    impl<Item: Clone + 'static, Err: Clone + 'static> $ty<Item, Err> {
      pub fn try_subscribe(
        &self,
        observer: impl Into<$crate::subscriber::ObserverArg<Item, Err>>,
      ) -> Result<$crate::subscription::Subscription, $crate::error::ObjectUnsubscribedError>
      where
        Err: std::fmt::Debug,
      {
        self.subject.check_open()?;
        Ok($crate::observable::Observable::subscribe(self, observer))
      }
    }

    impl<Item: Clone + 'static, Err: Clone + 'static> $crate::observer::Observer<Item, Err>
      for $ty<Item, Err>
    {
      #[inline]
      fn next(&mut self, value: Item) { $ty::next(self, value) }

      #[inline]
      fn error(&mut self, err: Err) { $ty::error(self, err) }

      #[inline]
      fn complete(&mut self) { $ty::complete(self) }
    }

    impl<Item, Err> std::fmt::Debug for $ty<Item, Err> {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple(stringify!($ty)).field(&self.subject).finish()
      }
    }
  };
}

mod anonymous_subject;
mod async_subject;
mod behavior_subject;
mod replay_subject;
mod subscribers;

pub use anonymous_subject::AnonymousSubject;
pub use async_subject::AsyncSubject;
pub use behavior_subject::BehaviorSubject;
pub use replay_subject::{ReplaySubject, ReplaySubjectBuilder};
use subscribers::{broadcast_complete, broadcast_error, broadcast_value, Subscribers};

/// A hot observable that multicasts to many subscribers.
///
/// ```rust
/// use std::{cell::RefCell, rc::Rc};
///
/// use rxsubject::prelude::*;
///
/// let subject = Subject::<i32, ()>::new();
/// let seen = Rc::new(RefCell::new(vec![]));
///
/// let c_seen = seen.clone();
/// subject.subscribe(move |v| c_seen.borrow_mut().push(v));
/// subject.next(1);
/// subject.next(2);
/// subject.complete();
/// subject.next(3);
///
/// assert_eq!(*seen.borrow(), vec![1, 2]);
/// ```
pub struct Subject<Item, Err> {
  inner: Rc<SubjectInner<Item, Err>>,
}

struct SubjectInner<Item, Err> {
  state: RefCell<SubjectState<Item, Err>>,
  config: RuntimeConfig,
}

struct SubjectState<Item, Err> {
  closed: bool,
  is_stopped: bool,
  thrown: Option<Err>,
  observers: Subscribers<Subscriber<Item, Err>>,
}

/// What a subscriber arriving now should be told.
pub(crate) enum Finalized<Err> {
  Open,
  Errored(Err),
  Completed,
}

impl<Item, Err> Clone for Subject<Item, Err> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<Item, Err> Subject<Item, Err> {
  pub fn new() -> Self { Self::with_config(RuntimeConfig::default()) }

  pub fn with_config(config: RuntimeConfig) -> Self {
    let state = SubjectState {
      closed: false,
      is_stopped: false,
      thrown: None,
      observers: Subscribers::default(),
    };
    Self { inner: Rc::new(SubjectInner { state: RefCell::new(state), config }) }
  }

  /// Whether [`unsubscribe`](Self::unsubscribe) was called.
  #[inline]
  pub fn is_closed(&self) -> bool { self.inner.state.borrow().closed }

  /// Whether the subject errored, completed or was unsubscribed.
  #[inline]
  pub fn is_stopped(&self) -> bool { self.inner.state.borrow().is_stopped }

  #[inline]
  pub fn has_error(&self) -> bool { self.inner.state.borrow().thrown.is_some() }

  /// Whether anybody is subscribed.
  #[inline]
  pub fn observed(&self) -> bool { !self.inner.state.borrow().observers.is_empty() }

  #[inline]
  pub fn subscriber_count(&self) -> usize { self.inner.state.borrow().observers.len() }

  #[inline]
  pub fn config(&self) -> &RuntimeConfig { &self.inner.config }

  /// Closes the subject without notifying its subscribers. Every later
  /// emission or subscription fails with [`ObjectUnsubscribedError`].
  pub fn unsubscribe(&self) {
    let observers = {
      let mut state = self.inner.state.borrow_mut();
      state.closed = true;
      state.is_stopped = true;
      state.observers.take_all()
    };
    tracing::trace!("subject closed, dropped {} observers", observers.len());
  }

  pub(crate) fn check_open(&self) -> Result<(), ObjectUnsubscribedError> {
    if self.is_closed() {
      Err(ObjectUnsubscribedError)
    } else {
      Ok(())
    }
  }

  pub(crate) fn report_closed(&self, err: ObjectUnsubscribedError) {
    self.inner.config.report_unhandled_error(err.into());
  }

  /// Registers `subscriber` and returns the subscription that removes it
  /// again.
  pub(crate) fn register(&self, subscriber: &Subscriber<Item, Err>) -> Subscription
  where
    Item: 'static,
    Err: 'static,
  {
    let id = self.inner.state.borrow_mut().observers.add(subscriber.clone());
    tracing::trace!(id, "subscriber registered");
    let weak = Rc::downgrade(&self.inner);
    Subscription::with_teardown(move || {
      if let Some(inner) = weak.upgrade() {
        let removed = inner.state.borrow_mut().observers.remove(id);
        drop(removed);
      }
    })
  }
}

impl<Item, Err: Clone> Subject<Item, Err> {
  /// The error the subject terminated with, kept even after `unsubscribe`.
  pub(crate) fn thrown(&self) -> Option<Err> { self.inner.state.borrow().thrown.clone() }

  pub(crate) fn finalized(&self) -> Finalized<Err> {
    let state = self.inner.state.borrow();
    match (&state.thrown, state.is_stopped) {
      (Some(err), _) => Finalized::Errored(err.clone()),
      (None, true) => Finalized::Completed,
      (None, false) => Finalized::Open,
    }
  }
}

impl<Item: Clone + 'static, Err: Clone + 'static> Subject<Item, Err> {
  /// Builds an [`AnonymousSubject`] that pushes into `destination` and
  /// subscribes to `source`.
  pub fn create(
    destination: impl Observer<Item, Err> + 'static,
    source: impl Observable<Item, Err> + 'static,
  ) -> AnonymousSubject<Item, Err> {
    let config = source.runtime_config();
    AnonymousSubject::new(Some(Box::new(destination)), Some(Rc::new(source)), config)
  }

  /// A view of this subject that can only be subscribed to.
  pub fn as_observable(&self) -> AnonymousSubject<Item, Err> {
    AnonymousSubject::new(None, Some(Rc::new(self.clone())), self.inner.config.clone())
  }

  /// Multicasts `value`. Does nothing once the subject has stopped.
  pub fn try_next(&self, value: Item) -> Result<(), ObjectUnsubscribedError> {
    self.check_open()?;
    self.inner.config.error_context(|| {
      let snapshot = {
        let mut state = self.inner.state.borrow_mut();
        if state.is_stopped {
          return;
        }
        state.observers.snapshot()
      };
      broadcast_value(&snapshot, value);
    });
    Ok(())
  }

  /// Stores `err`, then delivers it to every current subscriber. Only the
  /// first terminal notification has any effect.
  pub fn try_error(&self, err: Err) -> Result<(), ObjectUnsubscribedError> {
    self.check_open()?;
    self.inner.config.error_context(|| {
      let observers = {
        let mut state = self.inner.state.borrow_mut();
        if state.is_stopped {
          return;
        }
        state.is_stopped = true;
        state.thrown = Some(err.clone());
        state.observers.take_all()
      };
      tracing::trace!("subject errored, notifying {} observers", observers.len());
      broadcast_error(observers.into_iter().map(|(_, o)| o), err);
    });
    Ok(())
  }

  pub fn try_complete(&self) -> Result<(), ObjectUnsubscribedError> {
    self.check_open()?;
    self.inner.config.error_context(|| {
      let observers = {
        let mut state = self.inner.state.borrow_mut();
        if state.is_stopped {
          return;
        }
        state.is_stopped = true;
        state.observers.take_all()
      };
      tracing::trace!("subject completed, notifying {} observers", observers.len());
      broadcast_complete(observers.into_iter().map(|(_, o)| o));
    });
    Ok(())
  }

  /// Like [`try_next`](Self::try_next), reporting a closed subject to the
  /// unhandled-error hook.
  pub fn next(&self, value: Item) {
    if let Err(err) = self.try_next(value) {
      self.report_closed(err);
    }
  }

  pub fn error(&self, err: Err) {
    if let Err(err) = self.try_error(err) {
      self.report_closed(err);
    }
  }

  pub fn complete(&self) {
    if let Err(err) = self.try_complete() {
      self.report_closed(err);
    }
  }

  /// Subscribes like [`Observable::subscribe`], failing if the subject was
  /// unsubscribed.
  pub fn try_subscribe(
    &self,
    observer: impl Into<ObserverArg<Item, Err>>,
  ) -> Result<Subscription, ObjectUnsubscribedError>
  where
    Err: Debug,
  {
    self.check_open()?;
    Ok(self.subscribe(observer))
  }

  /// Replays the terminal notification to a late subscriber, or registers
  /// it.
  pub(crate) fn inner_subscribe(&self, subscriber: &Subscriber<Item, Err>) -> Subscription {
    match self.finalized() {
      Finalized::Errored(err) => {
        subscriber.error(err);
        Subscription::closed()
      }
      Finalized::Completed => {
        subscriber.complete();
        Subscription::closed()
      }
      Finalized::Open => self.register(subscriber),
    }
  }
}

impl<Item, Err> Default for Subject<Item, Err> {
  fn default() -> Self { Self::new() }
}

impl<Item: Clone + 'static, Err: Clone + 'static> Observer<Item, Err> for Subject<Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) { Subject::next(self, value) }

  #[inline]
  fn error(&mut self, err: Err) { Subject::error(self, err) }

  #[inline]
  fn complete(&mut self) { Subject::complete(self) }
}

impl<Item: Clone + 'static, Err: Clone + 'static> Observable<Item, Err> for Subject<Item, Err> {
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>) -> Subscription {
    match self.check_open() {
      Ok(()) => self.inner_subscribe(&subscriber),
      Err(err) => {
        self.report_closed(err);
        Subscription::closed()
      }
    }
  }

  fn runtime_config(&self) -> RuntimeConfig { self.inner.config.clone() }
}

impl<Item, Err> Debug for Subject<Item, Err> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let state = self.inner.state.borrow();
    f.debug_struct("Subject")
      .field("closed", &state.closed)
      .field("is_stopped", &state.is_stopped)
      .field("has_error", &state.thrown.is_some())
      .field("subscriber_count", &state.observers.len())
      .finish()
  }
}

#[cfg(test)]
mod test {
  use std::cell::RefCell;

  use super::*;
  use crate::{
    scheduler::LocalPoolScheduler,
    subscriber::{Notification, PartialObserver},
  };

  type Log = Rc<RefCell<Vec<Notification<i32, &'static str>>>>;

  fn recorder(log: &Log) -> PartialObserver<i32, &'static str> {
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    PartialObserver::new()
      .on_next(move |v| l1.borrow_mut().push(Notification::Next(v)))
      .on_error(move |e| l2.borrow_mut().push(Notification::Error(e)))
      .on_complete(move || l3.borrow_mut().push(Notification::Complete))
  }

  #[test]
  fn multicasts_in_subscription_order() {
    let order = Rc::new(RefCell::new(vec![]));
    let subject = Subject::<i32, ()>::new();
    let (o1, o2) = (order.clone(), order.clone());
    subject.subscribe(move |v| o1.borrow_mut().push(("a", v)));
    subject.subscribe(move |v| o2.borrow_mut().push(("b", v)));

    subject.next(1);
    assert_eq!(*order.borrow(), vec![("a", 1), ("b", 1)]);
    assert_eq!(subject.subscriber_count(), 2);
  }

  #[test]
  fn next_without_subscribers_is_a_noop() {
    let subject = Subject::<i32, ()>::new();
    subject.next(1);
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    subject.subscribe(move |v| c_seen.borrow_mut().push(v));
    subject.next(2);
    assert_eq!(*seen.borrow(), vec![2]);
  }

  #[test]
  fn error_reaches_current_and_late_subscribers() {
    let subject = Subject::<i32, &str>::new();
    let early: Log = Rc::default();
    subject.subscribe(recorder(&early));
    subject.next(1);
    subject.error("boom");
    subject.error("again");
    subject.complete();
    subject.next(2);

    let late: Log = Rc::default();
    let subscription = subject.subscribe(recorder(&late));

    assert_eq!(
      *early.borrow(),
      vec![Notification::Next(1), Notification::Error("boom")]
    );
    assert_eq!(*late.borrow(), vec![Notification::Error("boom")]);
    assert!(subscription.is_closed());
    assert!(subject.has_error());
    assert!(!subject.observed());
  }

  #[test]
  fn unsubscribing_removes_the_subscriber() {
    let subject = Subject::<i32, ()>::new();
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    let subscription = subject.subscribe(move |v| c_seen.borrow_mut().push(v));
    subject.next(1);
    subscription.unsubscribe().unwrap();
    subject.next(2);
    assert_eq!(*seen.borrow(), vec![1]);
    assert_eq!(subject.subscriber_count(), 0);
  }

  #[test]
  fn subscribe_during_next_waits_for_the_next_emission() {
    let subject = Subject::<i32, ()>::new();
    let inner_seen = Rc::new(RefCell::new(vec![]));
    let (c_subject, c_inner_seen) = (subject.clone(), inner_seen.clone());
    subject.subscribe(move |v: i32| {
      if v == 1 {
        let seen = c_inner_seen.clone();
        c_subject.subscribe(move |v| seen.borrow_mut().push(v));
      }
    });

    subject.next(1);
    assert!(inner_seen.borrow().is_empty());
    subject.next(2);
    assert_eq!(*inner_seen.borrow(), vec![2]);
  }

  #[test]
  fn unsubscribe_during_next_keeps_current_emission() {
    let subject = Subject::<i32, ()>::new();
    let seen = Rc::new(RefCell::new(vec![]));
    let victim: Rc<RefCell<Option<Subscription>>> = Rc::default();

    let c_victim = victim.clone();
    subject.subscribe(move |_: i32| {
      if let Some(s) = c_victim.borrow_mut().take() {
        s.unsubscribe().unwrap();
      }
    });
    let c_seen = seen.clone();
    *victim.borrow_mut() = Some(subject.subscribe(move |v| c_seen.borrow_mut().push(v)));

    subject.next(1);
    subject.next(2);
    // the subscriber itself drops values once it is closed
    assert!(seen.borrow().is_empty());
    assert_eq!(subject.subscriber_count(), 1);
  }

  #[test]
  fn subscribe_during_complete_sees_terminal_state() {
    let subject = Subject::<i32, &str>::new();
    let late: Log = Rc::default();
    let (c_subject, c_late) = (subject.clone(), late.clone());
    subject.subscribe(
      PartialObserver::new().on_complete(move || {
        c_subject.subscribe(recorder(&c_late));
      }),
    );
    subject.complete();
    assert_eq!(*late.borrow(), vec![Notification::Complete]);
    assert_eq!(subject.subscriber_count(), 0);
  }

  #[test]
  fn emitting_from_a_subscriber_is_delivered() {
    let subject = Subject::<i32, ()>::new();
    let seen = Rc::new(RefCell::new(vec![]));
    let (c_subject, c_seen) = (subject.clone(), seen.clone());
    subject.subscribe(move |v: i32| {
      c_seen.borrow_mut().push(v);
      if v < 3 {
        c_subject.next(v + 1);
      }
    });
    subject.next(1);
    assert_eq!(*seen.borrow(), vec![1, 2, 3]);
  }

  #[test]
  fn closed_subject_rejects_operations() {
    let subject = Subject::<i32, ()>::new();
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    subject.subscribe(move |v| c_seen.borrow_mut().push(v));
    subject.unsubscribe();

    assert!(subject.is_closed());
    assert!(!subject.observed());
    assert_eq!(subject.try_next(1), Err(ObjectUnsubscribedError));
    assert_eq!(subject.try_complete(), Err(ObjectUnsubscribedError));
    assert!(subject.try_subscribe(|_: i32| {}).is_err());
    assert!(seen.borrow().is_empty());
  }

  #[test]
  fn closed_subject_reports_through_config() {
    let mut pool = futures::executor::LocalPool::new();
    let reported = Rc::new(RefCell::new(vec![]));
    let c_reported = reported.clone();
    let config = RuntimeConfig::builder()
      .scheduler(LocalPoolScheduler::new(pool.spawner()))
      .on_unhandled_error(move |e| c_reported.borrow_mut().push(e.to_string()))
      .build();
    let subject = Subject::<i32, ()>::with_config(config);
    subject.unsubscribe();
    subject.next(1);
    assert!(reported.borrow().is_empty());

    pool.run_until_stalled();
    assert_eq!(*reported.borrow(), vec!["object unsubscribed".to_string()]);
  }

  #[test]
  fn consumer_panic_does_not_break_broadcast() {
    let reported = Rc::new(RefCell::new(vec![]));
    let c_reported = reported.clone();
    let config = RuntimeConfig::builder()
      .on_unhandled_error(move |e| c_reported.borrow_mut().push(e.to_string()))
      .build();
    let subject = Subject::<i32, ()>::with_config(config);
    let seen = Rc::new(RefCell::new(vec![]));
    subject.subscribe(|_: i32| panic!("first one breaks"));
    let c_seen = seen.clone();
    subject.subscribe(move |v| c_seen.borrow_mut().push(v));

    subject.next(1);
    assert_eq!(*seen.borrow(), vec![1]);
    assert_eq!(
      *reported.borrow(),
      vec!["consumer callback panicked: first one breaks".to_string()]
    );
  }

  #[test]
  fn as_observable_only_subscribes() {
    let subject = Subject::<i32, ()>::new();
    let observable = subject.as_observable();
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    observable.subscribe(move |v| c_seen.borrow_mut().push(v));
    observable.next(5);
    subject.next(1);
    assert_eq!(*seen.borrow(), vec![1]);
  }
}
