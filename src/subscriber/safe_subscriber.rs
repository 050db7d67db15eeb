use std::{
  fmt::Debug,
  ops::Deref,
  panic::{catch_unwind, AssertUnwindSafe},
};

use super::Subscriber;
use crate::{config::RuntimeConfig, error::RxError, observer::Observer, subscription::Subscription};

type NextFn<Item> = Box<dyn FnMut(Item, &Subscription)>;
type ErrorFn<Err> = Box<dyn FnMut(Err, &Subscription)>;
type CompleteFn = Box<dyn FnMut(&Subscription)>;

/// What a consumer may hand to `subscribe`.
pub enum ObserverArg<Item, Err> {
  /// A bare `next` callback.
  Callback(Box<dyn FnMut(Item)>),
  Partial(PartialObserver<Item, Err>),
  /// Legacy form whose callbacks also see a subscription handle.
  Context(ContextObserver<Item, Err>),
}

impl<Item, Err, F> From<F> for ObserverArg<Item, Err>
where
  F: FnMut(Item) + 'static,
{
  fn from(f: F) -> Self { ObserverArg::Callback(Box::new(f)) }
}

impl<Item, Err> From<PartialObserver<Item, Err>> for ObserverArg<Item, Err> {
  fn from(o: PartialObserver<Item, Err>) -> Self { ObserverArg::Partial(o) }
}

impl<Item, Err> From<ContextObserver<Item, Err>> for ObserverArg<Item, Err> {
  fn from(o: ContextObserver<Item, Err>) -> Self { ObserverArg::Context(o) }
}

/// An observer where every callback is optional.
///
/// ```rust
/// use rxsubject::prelude::*;
///
/// let subject = Subject::<i32, String>::new();
/// subject.subscribe(
///   PartialObserver::new()
///     .on_next(|v: i32| println!("{v}"))
///     .on_error(|e: String| eprintln!("{e}")),
/// );
/// ```
pub struct PartialObserver<Item, Err> {
  next: Option<Box<dyn FnMut(Item)>>,
  error: Option<Box<dyn FnMut(Err)>>,
  complete: Option<Box<dyn FnMut()>>,
}

impl<Item, Err> Default for PartialObserver<Item, Err> {
  fn default() -> Self { Self { next: None, error: None, complete: None } }
}

impl<Item, Err> PartialObserver<Item, Err> {
  pub fn new() -> Self { Self::default() }

  pub fn on_next(mut self, f: impl FnMut(Item) + 'static) -> Self {
    self.next = Some(Box::new(f));
    self
  }

  pub fn on_error(mut self, f: impl FnMut(Err) + 'static) -> Self {
    self.error = Some(Box::new(f));
    self
  }

  pub fn on_complete(mut self, f: impl FnMut() + 'static) -> Self {
    self.complete = Some(Box::new(f));
    self
  }
}

/// A partial observer whose callbacks receive a subscription handle.
///
/// With `use_deprecated_next_context` enabled the handle is the subscriber
/// itself, so a callback can unsubscribe it. Otherwise the handle is a
/// detached subscription owned by the observer.
pub struct ContextObserver<Item, Err> {
  next: Option<NextFn<Item>>,
  error: Option<ErrorFn<Err>>,
  complete: Option<CompleteFn>,
}

impl<Item, Err> Default for ContextObserver<Item, Err> {
  fn default() -> Self { Self { next: None, error: None, complete: None } }
}

impl<Item, Err> ContextObserver<Item, Err> {
  pub fn new() -> Self { Self::default() }

  pub fn on_next(mut self, f: impl FnMut(Item, &Subscription) + 'static) -> Self {
    self.next = Some(Box::new(f));
    self
  }

  pub fn on_error(mut self, f: impl FnMut(Err, &Subscription) + 'static) -> Self {
    self.error = Some(Box::new(f));
    self
  }

  pub fn on_complete(mut self, f: impl FnMut(&Subscription) + 'static) -> Self {
    self.complete = Some(Box::new(f));
    self
  }
}

/// A [`Subscriber`] over consumer supplied callbacks.
///
/// The callbacks are normalised once into a single internal observer.
/// Panics raised by them never reach the producer: they are reported to the
/// unhandled-error hook (or, in legacy synchronous mode, re-raised at the
/// end of the emission).
pub struct SafeSubscriber<Item, Err>(Subscriber<Item, Err>);

impl<Item: 'static, Err: Debug + 'static> SafeSubscriber<Item, Err> {
  pub fn new(observer: impl Into<ObserverArg<Item, Err>>, config: RuntimeConfig) -> Self {
    let observer = observer.into();
    let consumer_config = config.clone();
    let subscriber = Subscriber::from_fn(
      move |own| {
        let consumer = ConsumerObserver::normalize(observer, own, consumer_config);
        Box::new(consumer)
      },
      config,
    );
    SafeSubscriber(subscriber)
  }
}

impl<Item, Err> SafeSubscriber<Item, Err> {
  pub fn into_subscriber(self) -> Subscriber<Item, Err> { self.0 }
}

impl<Item, Err> Deref for SafeSubscriber<Item, Err> {
  type Target = Subscriber<Item, Err>;

  fn deref(&self) -> &Self::Target { &self.0 }
}

impl<Item, Err> From<SafeSubscriber<Item, Err>> for Subscriber<Item, Err> {
  fn from(s: SafeSubscriber<Item, Err>) -> Self { s.0 }
}

/// The canonical form every [`ObserverArg`] is turned into.
struct ConsumerObserver<Item, Err> {
  next: Option<NextFn<Item>>,
  error: Option<ErrorFn<Err>>,
  complete: Option<CompleteFn>,
  context: Subscription,
  config: RuntimeConfig,
}

impl<Item: 'static, Err: 'static> ConsumerObserver<Item, Err> {
  fn normalize(observer: ObserverArg<Item, Err>, own: &Subscription, config: RuntimeConfig) -> Self {
    match observer {
      ObserverArg::Callback(mut f) => Self {
        next: Some(Box::new(move |v, _: &Subscription| f(v))),
        error: None,
        complete: None,
        context: own.clone(),
        config,
      },
      ObserverArg::Partial(PartialObserver { next, error, complete }) => Self {
        next: next.map(|mut f| Box::new(move |v, _: &Subscription| f(v)) as NextFn<Item>),
        error: error.map(|mut f| Box::new(move |e, _: &Subscription| f(e)) as ErrorFn<Err>),
        complete: complete.map(|mut f| Box::new(move |_: &Subscription| f()) as CompleteFn),
        context: own.clone(),
        config,
      },
      ObserverArg::Context(ContextObserver { next, error, complete }) => {
        let context =
          if config.use_deprecated_next_context() { own.clone() } else { Subscription::new() };
        Self { next, error, complete, context, config }
      }
    }
  }
}

impl<Item, Err> ConsumerObserver<Item, Err> {
  fn guarded(config: &RuntimeConfig, f: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
      config.handle_consumer_panic(payload);
    }
  }
}

impl<Item, Err: Debug> Observer<Item, Err> for ConsumerObserver<Item, Err> {
  fn next(&mut self, value: Item) {
    let Self { next, context, config, .. } = self;
    if let Some(next) = next {
      Self::guarded(config, || next(value, context));
    }
  }

  fn error(&mut self, err: Err) {
    let Self { error, context, config, .. } = self;
    match error {
      Some(error) => Self::guarded(config, || error(err, context)),
      None => config.report_unhandled_error(RxError::Uncaught(format!("{:?}", err))),
    }
  }

  fn complete(&mut self) {
    let Self { complete, context, config, .. } = self;
    if let Some(complete) = complete {
      Self::guarded(config, || complete(context));
    }
  }
}
