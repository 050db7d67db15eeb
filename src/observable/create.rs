use std::marker::PhantomData;

use super::Observable;
use crate::{
  config::RuntimeConfig,
  subscriber::Subscriber,
  subscription::{Subscription, Teardown},
};

/// Observable created from a subscribe function.
///
/// This struct is created by [`create`].
pub struct Create<F, Item, Err> {
  f: F,
  config: RuntimeConfig,
  _marker: PhantomData<fn(Item, Err)>,
}

/// Creates an observable that runs `f` for every subscriber. The teardown `f`
/// returns is released when the subscriber unsubscribes.
///
/// ```rust
/// use std::{cell::RefCell, rc::Rc};
///
/// use rxsubject::prelude::*;
///
/// let seen = Rc::new(RefCell::new(vec![]));
/// let c_seen = seen.clone();
/// create(|subscriber: Subscriber<i32, ()>| {
///   subscriber.next(1);
///   subscriber.next(2);
///   subscriber.complete();
/// })
/// .subscribe(move |v| c_seen.borrow_mut().push(v));
/// assert_eq!(*seen.borrow(), vec![1, 2]);
/// ```
pub fn create<Item, Err, F, T>(f: F) -> Create<F, Item, Err>
where
  F: Fn(Subscriber<Item, Err>) -> T,
  T: Into<Teardown>,
{
  Create { f, config: RuntimeConfig::default(), _marker: PhantomData }
}

impl<F, Item, Err> Create<F, Item, Err> {
  /// Uses `config` for subscribers created through `subscribe`.
  pub fn with_config(mut self, config: RuntimeConfig) -> Self {
    self.config = config;
    self
  }
}

impl<F: Clone, Item, Err> Clone for Create<F, Item, Err> {
  fn clone(&self) -> Self {
    Self { f: self.f.clone(), config: self.config.clone(), _marker: PhantomData }
  }
}

impl<F, Item, Err, T> Observable<Item, Err> for Create<F, Item, Err>
where
  F: Fn(Subscriber<Item, Err>) -> T,
  T: Into<Teardown>,
{
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>) -> Subscription {
    let teardown: Teardown = (self.f)(subscriber).into();
    match teardown {
      Teardown::Empty => Subscription::closed(),
      Teardown::Subscription(s) => s,
      teardown => {
        let s = Subscription::new();
        s.add(teardown);
        s
      }
    }
  }

  fn runtime_config(&self) -> RuntimeConfig { self.config.clone() }
}
