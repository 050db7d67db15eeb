//! Runtime configuration threaded through subscribers and subjects.
//!
//! There is no process-wide configuration. Every [`Subscriber`] and every
//! subject holds a [`RuntimeConfig`] handle given to it at construction, so
//! tests can run with isolated hooks side by side.
//!
//! [`Subscriber`]: crate::subscriber::Subscriber

use std::{
  any::Any,
  cell::{Cell, RefCell},
  fmt::{Debug, Formatter},
  panic::resume_unwind,
  rc::Rc,
};

use crate::{
  error::{panic_message, RxError},
  scheduler::{ImmediateScheduler, Scheduler},
  subscription::Subscription,
};

/// Called with errors nobody handled.
pub type UnhandledErrorHook = Rc<dyn Fn(RxError)>;

/// Called when a notification reaches a subscriber that has already stopped.
pub type StoppedNotificationHook = Rc<dyn Fn(StoppedNotification, &Subscription)>;

/// Which notification arrived after a subscriber stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
  Next,
  Error,
  Complete,
}

/// A notification that was diverted because its subscriber had stopped.
///
/// `payload` carries the value (for `Next`) or the error (for `Error`).
pub struct StoppedNotification {
  pub kind: NotificationKind,
  pub payload: Option<Box<dyn Any>>,
}

impl Debug for StoppedNotification {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StoppedNotification")
      .field("kind", &self.kind)
      .field("has_payload", &self.payload.is_some())
      .finish()
  }
}

/// Shared handle to the hooks and legacy switches of the runtime.
///
/// ```rust
/// use std::{cell::RefCell, rc::Rc};
///
/// use rxsubject::prelude::*;
///
/// let reported = Rc::new(RefCell::new(vec![]));
/// let c_reported = reported.clone();
/// let config = RuntimeConfig::builder()
///   .on_unhandled_error(move |err| c_reported.borrow_mut().push(err.to_string()))
///   .build();
///
/// let subject = Subject::<i32, String>::with_config(config);
/// subject.subscribe(|_: i32| {});
/// subject.error("boom".to_string());
/// assert_eq!(*reported.borrow(), vec!["uncaught error: \"boom\"".to_string()]);
/// ```
#[derive(Clone, Default)]
pub struct RuntimeConfig(Rc<ConfigInner>);

struct ConfigInner {
  on_unhandled_error: Option<UnhandledErrorHook>,
  on_stopped_notification: Option<StoppedNotificationHook>,
  scheduler: Rc<dyn Scheduler>,
  use_deprecated_synchronous_error_handling: bool,
  use_deprecated_next_context: bool,
  error_context: ErrorContext,
}

impl Default for ConfigInner {
  fn default() -> Self {
    Self {
      on_unhandled_error: None,
      on_stopped_notification: None,
      scheduler: Rc::new(ImmediateScheduler),
      use_deprecated_synchronous_error_handling: false,
      use_deprecated_next_context: false,
      error_context: ErrorContext::default(),
    }
  }
}

/// Nesting depth of emissions plus the first panic captured inside them.
#[derive(Default)]
struct ErrorContext {
  depth: Cell<usize>,
  captured: RefCell<Option<Box<dyn Any + Send>>>,
}

impl Debug for RuntimeConfig {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RuntimeConfig")
      .field("on_unhandled_error", &self.0.on_unhandled_error.is_some())
      .field("on_stopped_notification", &self.0.on_stopped_notification.is_some())
      .field(
        "use_deprecated_synchronous_error_handling",
        &self.0.use_deprecated_synchronous_error_handling,
      )
      .field("use_deprecated_next_context", &self.0.use_deprecated_next_context)
      .finish()
  }
}

impl RuntimeConfig {
  pub fn builder() -> RuntimeConfigBuilder { RuntimeConfigBuilder::default() }

  #[inline]
  pub fn use_deprecated_synchronous_error_handling(&self) -> bool {
    self.0.use_deprecated_synchronous_error_handling
  }

  #[inline]
  pub fn use_deprecated_next_context(&self) -> bool { self.0.use_deprecated_next_context }

  /// Hands `err` to the unhandled-error hook on the configured scheduler.
  /// Without a hook the error is logged.
  pub fn report_unhandled_error(&self, err: RxError) {
    let hook = self.0.on_unhandled_error.clone();
    self.0.scheduler.schedule(Box::new(move || match hook {
      Some(hook) => hook(err),
      None => tracing::error!("unhandled error: {}", err),
    }));
  }

  /// Hands a diverted notification to the stopped-notification hook, if any.
  pub fn notify_stopped(&self, notification: StoppedNotification, subscriber: &Subscription) {
    if let Some(hook) = self.0.on_stopped_notification.clone() {
      let subscriber = subscriber.clone();
      self
        .0
        .scheduler
        .schedule(Box::new(move || hook(notification, &subscriber)));
    }
  }

  /// Routes a panic raised by consumer code.
  ///
  /// In legacy synchronous mode the panic is captured and re-raised when the
  /// outermost [`error_context`](Self::error_context) returns (immediately if
  /// there is none); otherwise it is reported as
  /// [`RxError::ConsumerPanic`].
  pub fn handle_consumer_panic(&self, payload: Box<dyn Any + Send>) {
    if !self.0.use_deprecated_synchronous_error_handling {
      self.report_unhandled_error(RxError::ConsumerPanic(panic_message(&*payload)));
      return;
    }
    let ctx = &self.0.error_context;
    if ctx.depth.get() == 0 {
      resume_unwind(payload);
    }
    let mut captured = ctx.captured.borrow_mut();
    if captured.is_none() {
      *captured = Some(payload);
    }
  }

  /// Runs `f` as an emission. Only does bookkeeping in legacy synchronous
  /// mode, where a panic captured during `f` is re-raised on exit of the
  /// outermost context.
  pub fn error_context<R>(&self, f: impl FnOnce() -> R) -> R {
    if !self.0.use_deprecated_synchronous_error_handling {
      return f();
    }
    let ctx = &self.0.error_context;
    ctx.depth.set(ctx.depth.get() + 1);
    let _depth = DepthGuard(&ctx.depth);
    let r = f();
    if ctx.depth.get() == 1 {
      let captured = ctx.captured.borrow_mut().take();
      if let Some(payload) = captured {
        resume_unwind(payload);
      }
    }
    r
  }
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
  fn drop(&mut self) { self.0.set(self.0.get() - 1); }
}

/// Builder for [`RuntimeConfig`].
#[derive(Default)]
pub struct RuntimeConfigBuilder {
  inner: ConfigInner,
}

impl RuntimeConfigBuilder {
  pub fn on_unhandled_error(mut self, hook: impl Fn(RxError) + 'static) -> Self {
    self.inner.on_unhandled_error = Some(Rc::new(hook));
    self
  }

  pub fn on_stopped_notification(
    mut self,
    hook: impl Fn(StoppedNotification, &Subscription) + 'static,
  ) -> Self {
    self.inner.on_stopped_notification = Some(Rc::new(hook));
    self
  }

  pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
    self.inner.scheduler = Rc::new(scheduler);
    self
  }

  pub fn use_deprecated_synchronous_error_handling(mut self, enabled: bool) -> Self {
    self.inner.use_deprecated_synchronous_error_handling = enabled;
    self
  }

  pub fn use_deprecated_next_context(mut self, enabled: bool) -> Self {
    self.inner.use_deprecated_next_context = enabled;
    self
  }

  pub fn build(self) -> RuntimeConfig { RuntimeConfig(Rc::new(self.inner)) }
}
