//! The producer side of a stream, seen only through `subscribe`.
//!
//! Anything that can accept a [`Subscriber`] is an [`Observable`]. Subjects
//! implement it, and [`create`] turns a plain subscribe function into one.

use std::fmt::Debug;

use crate::{
  config::RuntimeConfig,
  subscriber::{ObserverArg, SafeSubscriber, Subscriber},
  subscription::Subscription,
};

mod create;
pub use create::{create, Create};

pub trait Observable<Item, Err> {
  /// Connects `subscriber` to the producer and returns the resources the
  /// producer allocated for it.
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>) -> Subscription;

  /// Configuration handed to subscribers created by [`subscribe`].
  ///
  /// [`subscribe`]: Observable::subscribe
  fn runtime_config(&self) -> RuntimeConfig;

  /// Subscribes an already built subscriber and returns its subscription.
  /// Whatever the producer allocated is released together with it.
  fn subscribe_with(&self, subscriber: Subscriber<Item, Err>) -> Subscription {
    let teardown = self.actual_subscribe(subscriber.clone());
    subscriber.add(teardown);
    subscriber.subscription().clone()
  }

  /// Subscribes a callback, a [`PartialObserver`] or a [`ContextObserver`].
  ///
  /// [`PartialObserver`]: crate::subscriber::PartialObserver
  /// [`ContextObserver`]: crate::subscriber::ContextObserver
  fn subscribe(&self, observer: impl Into<ObserverArg<Item, Err>>) -> Subscription
  where
    Self: Sized,
    Item: 'static,
    Err: Debug + 'static,
  {
    let subscriber = SafeSubscriber::new(observer, self.runtime_config());
    self.subscribe_with(subscriber.into_subscriber())
  }
}

impl<Item, Err, T> Observable<Item, Err> for std::rc::Rc<T>
where
  T: Observable<Item, Err> + ?Sized,
{
  #[inline]
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>) -> Subscription {
    (**self).actual_subscribe(subscriber)
  }

  #[inline]
  fn runtime_config(&self) -> RuntimeConfig { (**self).runtime_config() }
}
