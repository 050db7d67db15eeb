use std::{
  cell::{Cell, RefCell},
  collections::VecDeque,
  fmt::{Debug, Formatter},
  rc::Rc,
};

use crate::{
  config::RuntimeConfig,
  observable::Observable,
  observer::{BoxedObserver, Observer},
  subscriber::{Notification, Subscriber},
  subscription::Subscription,
};

/// A subject whose observer side and observable side are unrelated.
///
/// Notifications are forwarded to `destination`, subscriptions go to
/// `source`. Either may be missing: without a destination notifications are
/// dropped, without a source every subscription is closed right away.
///
/// A notification pushed while the destination is still handling an earlier
/// one (the destination emitting back into this subject) is queued and
/// delivered, in order, once the running call returns.
///
/// Built by [`Subject::create`] and [`Subject::as_observable`].
///
/// [`Subject::create`]: crate::subject::Subject::create
/// [`Subject::as_observable`]: crate::subject::Subject::as_observable
pub struct AnonymousSubject<Item, Err> {
  destination: Rc<Destination<Item, Err>>,
  has_destination: bool,
  source: Option<Rc<dyn Observable<Item, Err>>>,
  config: RuntimeConfig,
}

struct Destination<Item, Err> {
  observer: RefCell<Option<BoxedObserver<Item, Err>>>,
  queue: RefCell<VecDeque<Notification<Item, Err>>>,
  delivering: Cell<bool>,
}

impl<Item, Err> Destination<Item, Err> {
  fn deliver(&self, notification: Notification<Item, Err>) {
    self.queue.borrow_mut().push_back(notification);
    if self.delivering.replace(true) {
      return;
    }
    let _delivering = DeliveringGuard(self);

    loop {
      let notification = self.queue.borrow_mut().pop_front();
      let Some(notification) = notification else { break };
      // a missing destination ignores everything
      let mut observer = self.observer.borrow_mut();
      match notification {
        Notification::Next(value) => observer.next(value),
        Notification::Error(err) => observer.error(err),
        Notification::Complete => observer.complete(),
      }
    }
  }
}

/// Clears the delivery flag, dropping what a panicking delivery left queued.
struct DeliveringGuard<'a, Item, Err>(&'a Destination<Item, Err>);

impl<Item, Err> Drop for DeliveringGuard<'_, Item, Err> {
  fn drop(&mut self) {
    if std::thread::panicking() {
      self.0.queue.borrow_mut().clear();
    }
    self.0.delivering.set(false);
  }
}

impl<Item, Err> Clone for AnonymousSubject<Item, Err> {
  fn clone(&self) -> Self {
    Self {
      destination: self.destination.clone(),
      has_destination: self.has_destination,
      source: self.source.clone(),
      config: self.config.clone(),
    }
  }
}

impl<Item, Err> AnonymousSubject<Item, Err> {
  pub fn new(
    destination: Option<BoxedObserver<Item, Err>>,
    source: Option<Rc<dyn Observable<Item, Err>>>,
    config: RuntimeConfig,
  ) -> Self {
    let has_destination = destination.is_some();
    let destination = Rc::new(Destination {
      observer: RefCell::new(destination),
      queue: RefCell::new(VecDeque::new()),
      delivering: Cell::new(false),
    });
    Self { destination, has_destination, source, config }
  }

  #[inline]
  pub fn has_destination(&self) -> bool { self.has_destination }

  #[inline]
  pub fn has_source(&self) -> bool { self.source.is_some() }

  pub fn next(&self, value: Item) { self.destination.deliver(Notification::Next(value)) }

  pub fn error(&self, err: Err) { self.destination.deliver(Notification::Error(err)) }

  pub fn complete(&self) { self.destination.deliver(Notification::Complete) }
}

impl<Item, Err> Observer<Item, Err> for AnonymousSubject<Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) { AnonymousSubject::next(self, value) }

  #[inline]
  fn error(&mut self, err: Err) { AnonymousSubject::error(self, err) }

  #[inline]
  fn complete(&mut self) { AnonymousSubject::complete(self) }
}

impl<Item, Err> Observable<Item, Err> for AnonymousSubject<Item, Err> {
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>) -> Subscription {
    match &self.source {
      Some(source) => source.subscribe_with(subscriber),
      None => Subscription::closed(),
    }
  }

  fn runtime_config(&self) -> RuntimeConfig { self.config.clone() }
}

impl<Item, Err> Debug for AnonymousSubject<Item, Err> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AnonymousSubject")
      .field("has_destination", &self.has_destination())
      .field("has_source", &self.has_source())
      .finish()
  }
}
