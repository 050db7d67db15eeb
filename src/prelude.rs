//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Configuration
pub use crate::config::{NotificationKind, RuntimeConfig, StoppedNotification};
// Errors
pub use crate::error::{
  BoxError, GetValueError, ObjectUnsubscribedError, RxError, UnsubscriptionError,
};
// Observable boundary
pub use crate::observable::{create, Create, Observable};
// Observer trait
pub use crate::observer::{BoxedObserver, Observer};
// Schedulers and clocks
pub use crate::scheduler::{
  Duration, ImmediateScheduler, Instant, LocalPoolScheduler, Scheduler, SystemClock,
  TimestampProvider, VirtualClock,
};
// Subject
pub use crate::subject::*;
// Subscriber
pub use crate::subscriber::{
  ContextObserver, Notification, ObserverArg, PartialObserver, SafeSubscriber, Subscriber,
};
// Subscription
pub use crate::subscription::*;
