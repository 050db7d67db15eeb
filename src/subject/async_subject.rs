use std::{cell::RefCell, rc::Rc};

use super::{Finalized, Subject};
use crate::{
  config::RuntimeConfig,
  error::ObjectUnsubscribedError,
  observable::Observable,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// A subject that only emits the last value it received, and only once it
/// completes.
///
/// Subscribers arriving after completion get the same value followed by
/// `complete`. If the subject errors, nobody receives a value.
///
/// ```rust
/// use std::{cell::RefCell, rc::Rc};
///
/// use rxsubject::prelude::*;
///
/// let subject = AsyncSubject::<i32, ()>::new();
/// let seen = Rc::new(RefCell::new(vec![]));
/// let c_seen = seen.clone();
/// subject.subscribe(move |v| c_seen.borrow_mut().push(v));
///
/// subject.next(1);
/// subject.next(2);
/// assert!(seen.borrow().is_empty());
/// subject.complete();
/// assert_eq!(*seen.borrow(), vec![2]);
/// ```
pub struct AsyncSubject<Item, Err> {
  subject: Subject<Item, Err>,
  state: Rc<RefCell<AsyncState<Item>>>,
}

struct AsyncState<Item> {
  value: Option<Item>,
  is_complete: bool,
}

impl<Item, Err> Clone for AsyncSubject<Item, Err> {
  fn clone(&self) -> Self { Self { subject: self.subject.clone(), state: self.state.clone() } }
}

impl<Item, Err> AsyncSubject<Item, Err> {
  pub fn new() -> Self { Self::with_config(RuntimeConfig::default()) }

  pub fn with_config(config: RuntimeConfig) -> Self {
    Self {
      subject: Subject::with_config(config),
      state: Rc::new(RefCell::new(AsyncState { value: None, is_complete: false })),
    }
  }
}

impl<Item, Err> Default for AsyncSubject<Item, Err> {
  fn default() -> Self { Self::new() }
}

impl<Item: Clone + 'static, Err: Clone + 'static> AsyncSubject<Item, Err> {
  /// Remembers `value` as the candidate for completion. Nothing is emitted.
  pub fn try_next(&self, value: Item) -> Result<(), ObjectUnsubscribedError> {
    self.subject.check_open()?;
    if !self.subject.is_stopped() {
      self.state.borrow_mut().value = Some(value);
    }
    Ok(())
  }

  pub fn try_error(&self, err: Err) -> Result<(), ObjectUnsubscribedError> {
    self.subject.try_error(err)
  }

  /// Emits the remembered value, if any, then completes.
  pub fn try_complete(&self) -> Result<(), ObjectUnsubscribedError> {
    self.subject.check_open()?;
    let value = {
      let mut state = self.state.borrow_mut();
      if state.is_complete {
        return Ok(());
      }
      state.is_complete = true;
      state.value.clone()
    };
    if let Some(value) = value {
      self.subject.try_next(value)?;
    }
    self.subject.try_complete()
  }

  pub fn next(&self, value: Item) {
    if let Err(err) = self.try_next(value) {
      self.subject.report_closed(err);
    }
  }

  pub fn error(&self, err: Err) {
    if let Err(err) = self.try_error(err) {
      self.subject.report_closed(err);
    }
  }

  pub fn complete(&self) {
    if let Err(err) = self.try_complete() {
      self.subject.report_closed(err);
    }
  }
}

impl_subject_delegates!(AsyncSubject);

impl<Item: Clone + 'static, Err: Clone + 'static> Observable<Item, Err> for AsyncSubject<Item, Err> {
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>) -> Subscription {
    if let Err(err) = self.subject.check_open() {
      self.subject.report_closed(err);
      return Subscription::closed();
    }
    let (value, is_complete) = {
      let state = self.state.borrow();
      (state.value.clone(), state.is_complete)
    };
    match self.subject.finalized() {
      Finalized::Errored(err) => {
        subscriber.error(err);
        Subscription::closed()
      }
      Finalized::Open if !is_complete => self.subject.register(&subscriber),
      _ => {
        if let Some(value) = value {
          subscriber.next(value);
        }
        subscriber.complete();
        Subscription::closed()
      }
    }
  }

  fn runtime_config(&self) -> RuntimeConfig { self.subject.config().clone() }
}

#[cfg(test)]
mod test {
  use std::{cell::RefCell, rc::Rc};

  use super::*;
  use crate::subscriber::{Notification, PartialObserver};

  type Log = Rc<RefCell<Vec<Notification<i32, &'static str>>>>;

  fn recorder(log: &Log) -> PartialObserver<i32, &'static str> {
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    PartialObserver::new()
      .on_next(move |v| l1.borrow_mut().push(Notification::Next(v)))
      .on_error(move |e| l2.borrow_mut().push(Notification::Error(e)))
      .on_complete(move || l3.borrow_mut().push(Notification::Complete))
  }

  #[test]
  fn emits_last_value_on_complete() {
    let subject = AsyncSubject::<i32, &str>::new();
    let early: Log = Rc::default();
    subject.subscribe(recorder(&early));

    subject.next(1);
    subject.next(2);
    subject.complete();
    subject.next(3);
    subject.complete();

    let late: Log = Rc::default();
    subject.subscribe(recorder(&late));

    let expected = vec![Notification::Next(2), Notification::Complete];
    assert_eq!(*early.borrow(), expected);
    assert_eq!(*late.borrow(), expected);
  }

  #[test]
  fn completes_without_value() {
    let subject = AsyncSubject::<i32, &str>::new();
    let log: Log = Rc::default();
    subject.subscribe(recorder(&log));
    subject.complete();
    assert_eq!(*log.borrow(), vec![Notification::Complete]);
  }

  #[test]
  fn error_drops_the_value() {
    let subject = AsyncSubject::<i32, &str>::new();
    let early: Log = Rc::default();
    subject.subscribe(recorder(&early));
    subject.next(1);
    subject.error("bad");
    subject.complete();

    let late: Log = Rc::default();
    subject.subscribe(recorder(&late));

    assert_eq!(*early.borrow(), vec![Notification::Error("bad")]);
    assert_eq!(*late.borrow(), vec![Notification::Error("bad")]);
  }

  #[test]
  fn subscriber_arriving_during_completion_gets_the_value() {
    let subject = AsyncSubject::<i32, &str>::new();
    let late: Log = Rc::default();
    let (c_subject, c_late) = (subject.clone(), late.clone());
    subject.subscribe(move |_| {
      c_subject.subscribe(recorder(&c_late));
    });

    subject.next(7);
    subject.complete();
    assert_eq!(
      *late.borrow(),
      vec![Notification::Next(7), Notification::Complete]
    );
  }

  #[test]
  fn closed_subject_rejects_values() {
    let subject = AsyncSubject::<i32, ()>::new();
    subject.unsubscribe();
    assert_eq!(subject.try_next(1), Err(ObjectUnsubscribedError));
    assert_eq!(subject.try_complete(), Err(ObjectUnsubscribedError));
  }
}
