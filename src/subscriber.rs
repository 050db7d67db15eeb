//! Observer adapters with terminal-state gating.
//!
//! A [`Subscriber`] wraps exactly one destination observer and is itself a
//! [`Subscription`]. It forwards `next` until the first `error` or
//! `complete`, forwards that terminal notification, then unsubscribes
//! itself. Anything arriving after it stopped goes to the
//! stopped-notification hook of its [`RuntimeConfig`] instead.
//!
//! Delivery is trampolined: a notification that arrives while the
//! destination is still running (an observer emitting into its own
//! subscriber) is queued and delivered right after the running call
//! returns, preserving order.

use std::{
  any::Any,
  cell::{Cell, RefCell},
  collections::VecDeque,
  fmt::{Debug, Formatter},
  rc::{Rc, Weak},
};

use crate::{
  config::{NotificationKind, RuntimeConfig, StoppedNotification},
  error::{RxError, UnsubscriptionError},
  observer::{BoxedObserver, Observer},
  subscription::{Subscription, Teardown, TeardownHandle},
};

mod safe_subscriber;
pub use safe_subscriber::{ContextObserver, ObserverArg, PartialObserver, SafeSubscriber};

/// One event travelling to a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<Item, Err> {
  Next(Item),
  Error(Err),
  Complete,
}

pub struct Subscriber<Item, Err> {
  subscription: Subscription,
  inner: Rc<SubscriberInner<Item, Err>>,
}

struct SubscriberInner<Item, Err> {
  is_stopped: Cell<bool>,
  delivering: Cell<bool>,
  destination: RefCell<Option<BoxedObserver<Item, Err>>>,
  queue: RefCell<VecDeque<Notification<Item, Err>>>,
  config: RuntimeConfig,
}

impl<Item, Err> SubscriberInner<Item, Err> {
  /// Runs as the initial teardown of the subscriber's own subscription.
  fn stop(&self) {
    self.is_stopped.set(true);
    if !self.delivering.get() {
      self.release();
    }
  }

  fn release(&self) {
    let destination = self.destination.borrow_mut().take();
    self.queue.borrow_mut().clear();
    drop(destination);
  }
}

impl<Item, Err> Clone for Subscriber<Item, Err> {
  fn clone(&self) -> Self {
    Self {
      subscription: self.subscription.clone(),
      inner: self.inner.clone(),
    }
  }
}

impl<Item: 'static, Err: 'static> Subscriber<Item, Err> {
  /// Wraps `destination`.
  pub fn new(destination: impl Observer<Item, Err> + 'static, config: RuntimeConfig) -> Self {
    Self::from_fn(|_| Box::new(destination), config)
  }

  /// Wraps another subscriber. Unsubscribing `destination` also
  /// unsubscribes the new subscriber.
  pub fn chained(destination: Subscriber<Item, Err>) -> Self {
    let config = destination.inner.config.clone();
    let parent = destination.subscription.clone();
    let subscriber = Self::new(destination, config);
    parent.add(&subscriber.subscription);
    subscriber
  }

  /// A subscriber that ignores values and completion and reports errors as
  /// unhandled.
  pub fn empty(config: RuntimeConfig) -> Self
  where
    Err: Debug,
  {
    Self::new(EmptyObserver { config: config.clone() }, config)
  }

  /// Builds a [`SafeSubscriber`] from three callbacks, using the default
  /// configuration.
  pub fn create(
    next: impl FnMut(Item) + 'static,
    error: impl FnMut(Err) + 'static,
    complete: impl FnMut() + 'static,
  ) -> Self
  where
    Err: Debug,
  {
    let observer = PartialObserver::new()
      .on_next(next)
      .on_error(error)
      .on_complete(complete);
    SafeSubscriber::new(observer, RuntimeConfig::default()).into()
  }

  /// Builds the subscriber with a destination that may need the
  /// subscriber's own subscription.
  pub(crate) fn from_fn(
    make_destination: impl FnOnce(&Subscription) -> BoxedObserver<Item, Err>,
    config: RuntimeConfig,
  ) -> Self {
    let inner = Rc::new(SubscriberInner {
      is_stopped: Cell::new(false),
      delivering: Cell::new(false),
      destination: RefCell::new(None),
      queue: RefCell::new(VecDeque::new()),
      config,
    });
    let weak: Weak<SubscriberInner<Item, Err>> = Rc::downgrade(&inner);
    let subscription = Subscription::with_teardown(move || {
      if let Some(inner) = weak.upgrade() {
        inner.stop();
      }
    });
    *inner.destination.borrow_mut() = Some(make_destination(&subscription));
    Self { subscription, inner }
  }

  pub fn next(&self, value: Item) {
    if self.inner.is_stopped.get() {
      self.stopped_notification(NotificationKind::Next, Some(Box::new(value)));
    } else {
      self.deliver(Notification::Next(value));
    }
  }

  pub fn error(&self, err: Err) {
    if self.inner.is_stopped.replace(true) {
      self.stopped_notification(NotificationKind::Error, Some(Box::new(err)));
    } else {
      self.deliver(Notification::Error(err));
    }
  }

  pub fn complete(&self) {
    if self.inner.is_stopped.replace(true) {
      self.stopped_notification(NotificationKind::Complete, None);
    } else {
      self.deliver(Notification::Complete);
    }
  }

  fn stopped_notification(&self, kind: NotificationKind, payload: Option<Box<dyn Any>>) {
    let notification = StoppedNotification { kind, payload };
    self
      .inner
      .config
      .notify_stopped(notification, &self.subscription);
  }

  fn deliver(&self, notification: Notification<Item, Err>) {
    let inner = &*self.inner;
    inner.queue.borrow_mut().push_back(notification);
    if inner.delivering.replace(true) {
      return;
    }
    let _delivering = DeliveringGuard(inner);

    loop {
      let notification = inner.queue.borrow_mut().pop_front();
      let Some(notification) = notification else { break };
      let destination = inner.destination.borrow_mut().take();
      let Some(mut destination) = destination else { continue };
      match notification {
        Notification::Next(value) => {
          destination.next(value);
          *inner.destination.borrow_mut() = Some(destination);
        }
        Notification::Error(err) => {
          let _finally = UnsubscribeOnDrop(self);
          destination.error(err);
        }
        Notification::Complete => {
          let _finally = UnsubscribeOnDrop(self);
          destination.complete();
        }
      }
    }
  }
}

impl<Item, Err> Subscriber<Item, Err> {
  /// Whether a terminal notification was accepted or the subscriber was
  /// unsubscribed.
  #[inline]
  pub fn is_stopped(&self) -> bool { self.inner.is_stopped.get() }

  #[inline]
  pub fn is_closed(&self) -> bool { self.subscription.is_closed() }

  #[inline]
  pub fn subscription(&self) -> &Subscription { &self.subscription }

  #[inline]
  pub fn config(&self) -> &RuntimeConfig { &self.inner.config }

  #[inline]
  pub fn add(&self, teardown: impl Into<Teardown>) -> TeardownHandle {
    self.subscription.add(teardown)
  }

  #[inline]
  pub fn remove(&self, child: &Subscription) { self.subscription.remove(child) }

  #[inline]
  pub fn remove_teardown(&self, handle: TeardownHandle) -> Option<Teardown> {
    self.subscription.remove_teardown(handle)
  }

  /// Stops the subscriber without notifying its destination.
  #[inline]
  pub fn unsubscribe(&self) -> Result<(), UnsubscriptionError> { self.subscription.unsubscribe() }
}

struct DeliveringGuard<'a, Item, Err>(&'a SubscriberInner<Item, Err>);

impl<Item, Err> Drop for DeliveringGuard<'_, Item, Err> {
  fn drop(&mut self) {
    self.0.delivering.set(false);
    if self.0.is_stopped.get() {
      self.0.release();
    }
  }
}

/// Unsubscribes the subscriber once the terminal callback returned, even if
/// it unwinds.
struct UnsubscribeOnDrop<'a, Item, Err>(&'a Subscriber<Item, Err>);

impl<Item, Err> Drop for UnsubscribeOnDrop<'_, Item, Err> {
  fn drop(&mut self) {
    if let Err(err) = self.0.subscription.unsubscribe() {
      self
        .0
        .inner
        .config
        .report_unhandled_error(RxError::Unsubscription(err));
    }
  }
}

impl<Item: 'static, Err: 'static> Observer<Item, Err> for Subscriber<Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) { Subscriber::next(self, value) }

  #[inline]
  fn error(&mut self, err: Err) { Subscriber::error(self, err) }

  #[inline]
  fn complete(&mut self) { Subscriber::complete(self) }
}

impl<Item, Err> From<Subscriber<Item, Err>> for Teardown {
  #[inline]
  fn from(s: Subscriber<Item, Err>) -> Self { Teardown::Subscription(s.subscription) }
}

impl<Item, Err> From<&Subscriber<Item, Err>> for Teardown {
  #[inline]
  fn from(s: &Subscriber<Item, Err>) -> Self { Teardown::Subscription(s.subscription.clone()) }
}

impl<Item, Err> Debug for Subscriber<Item, Err> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscriber")
      .field("subscription", &self.subscription)
      .field("is_stopped", &self.inner.is_stopped.get())
      .finish()
  }
}

/// Destination of [`Subscriber::empty`].
struct EmptyObserver {
  config: RuntimeConfig,
}

impl<Item, Err: Debug> Observer<Item, Err> for EmptyObserver {
  fn next(&mut self, _: Item) {}

  fn error(&mut self, err: Err) {
    self
      .config
      .report_unhandled_error(RxError::Uncaught(format!("{:?}", err)));
  }

  fn complete(&mut self) {}
}
