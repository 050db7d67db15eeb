//! Deferral of diagnostic callbacks and time sources.
//!
//! Nothing in the subscription or subject core is asynchronous. A
//! [`Scheduler`] is only used to push unhandled-error reports and
//! stopped-notification hooks out of the emitting call stack, and a
//! [`TimestampProvider`] is the clock a
//! [`ReplaySubject`](crate::subject::ReplaySubject) uses for its window.

use std::{cell::Cell, rc::Rc};

pub use std::time::Duration;
#[cfg(not(target_arch = "wasm32"))]
pub use std::time::Instant;

#[cfg(target_arch = "wasm32")]
pub use web_time::Instant;

mod local_pool;
pub use local_pool::LocalPoolScheduler;

#[cfg(feature = "tokio-scheduler")]
mod tokio_local;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_local::TokioLocalScheduler;

// ============================================================================
// Scheduler
// ============================================================================

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Orders deferred tasks and decides when they run.
pub trait Scheduler {
  fn schedule(&self, task: Task);
}

/// Runs every task synchronously, on the caller's stack.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  #[inline]
  fn schedule(&self, task: Task) { task() }
}

impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
  #[inline]
  fn schedule(&self, task: Task) { (**self).schedule(task) }
}

// ============================================================================
// Time
// ============================================================================

/// Source of the current time.
pub trait TimestampProvider {
  fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl TimestampProvider for SystemClock {
  #[inline]
  fn now(&self) -> Instant { Instant::now() }
}

impl<T: TimestampProvider + ?Sized> TimestampProvider for Rc<T> {
  #[inline]
  fn now(&self) -> Instant { (**self).now() }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the subject under test.
///
/// ```rust
/// use rxsubject::scheduler::{Duration, TimestampProvider, VirtualClock};
///
/// let clock = VirtualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_millis(30));
/// assert_eq!(clock.now() - start, Duration::from_millis(30));
/// ```
#[derive(Clone, Debug)]
pub struct VirtualClock(Rc<Cell<Instant>>);

impl VirtualClock {
  pub fn new() -> Self { Self(Rc::new(Cell::new(Instant::now()))) }

  pub fn advance(&self, by: Duration) { self.0.set(self.0.get() + by); }
}

impl Default for VirtualClock {
  fn default() -> Self { Self::new() }
}

impl TimestampProvider for VirtualClock {
  #[inline]
  fn now(&self) -> Instant { self.0.get() }
}
