use std::{cell::RefCell, rc::Rc};

use super::Subject;
use crate::{
  config::RuntimeConfig,
  error::{GetValueError, ObjectUnsubscribedError},
  observable::Observable,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// A subject that always holds a current value.
///
/// Every new subscriber receives the current value right away, then the
/// values that follow.
///
/// ```rust
/// use std::{cell::RefCell, rc::Rc};
///
/// use rxsubject::prelude::*;
///
/// let subject = BehaviorSubject::<i32, ()>::new(42);
/// let seen = Rc::new(RefCell::new(vec![]));
/// let c_seen = seen.clone();
/// subject.subscribe(move |v| c_seen.borrow_mut().push(v));
/// subject.next(1);
///
/// assert_eq!(*seen.borrow(), vec![42, 1]);
/// assert_eq!(subject.value(), Ok(1));
/// ```
pub struct BehaviorSubject<Item, Err> {
  subject: Subject<Item, Err>,
  value: Rc<RefCell<Item>>,
}

impl<Item, Err> Clone for BehaviorSubject<Item, Err> {
  fn clone(&self) -> Self { Self { subject: self.subject.clone(), value: self.value.clone() } }
}

impl<Item, Err> BehaviorSubject<Item, Err> {
  #[inline]
  pub fn new(value: Item) -> Self { Self::with_config(value, RuntimeConfig::default()) }

  pub fn with_config(value: Item, config: RuntimeConfig) -> Self {
    Self { subject: Subject::with_config(config), value: Rc::new(RefCell::new(value)) }
  }
}

impl<Item: Clone + 'static, Err: Clone + 'static> BehaviorSubject<Item, Err> {
  /// The current value.
  ///
  /// Fails with the stored error if the subject errored, or with
  /// [`ObjectUnsubscribedError`] if it was unsubscribed.
  pub fn value(&self) -> Result<Item, GetValueError<Err>> {
    if let Some(err) = self.subject.thrown() {
      return Err(GetValueError::Errored(err));
    }
    self.subject.check_open()?;
    Ok(self.value.borrow().clone())
  }

  /// Stores `value` as the current value and multicasts it.
  ///
  /// The current value is updated even after the subject stopped, it just
  /// isn't delivered to anybody.
  pub fn try_next(&self, value: Item) -> Result<(), ObjectUnsubscribedError> {
    self.subject.check_open()?;
    *self.value.borrow_mut() = value.clone();
    self.subject.try_next(value)
  }

  pub fn try_error(&self, err: Err) -> Result<(), ObjectUnsubscribedError> {
    self.subject.try_error(err)
  }

  pub fn try_complete(&self) -> Result<(), ObjectUnsubscribedError> { self.subject.try_complete() }

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

impl_subject_delegates!(BehaviorSubject);

impl<Item: Clone + 'static, Err: Clone + 'static> Observable<Item, Err>
  for BehaviorSubject<Item, Err>
{
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>) -> Subscription {
    let subscription = self.subject.actual_subscribe(subscriber.clone());
    if !subscription.is_closed() {
      let value = self.value.borrow().clone();
      subscriber.next(value);
    }
    subscription
  }

  fn runtime_config(&self) -> RuntimeConfig { self.subject.config().clone() }
}
