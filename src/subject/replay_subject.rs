use std::{cell::RefCell, collections::VecDeque, marker::PhantomData, rc::Rc};

use super::Subject;
use crate::{
  config::RuntimeConfig,
  error::ObjectUnsubscribedError,
  observable::Observable,
  scheduler::{Duration, Instant, SystemClock, TimestampProvider},
  subscriber::Subscriber,
  subscription::Subscription,
};

/// A subject that replays past values to new subscribers.
///
/// The replay window is bounded by a number of values, by how long ago they
/// were emitted, or both. A subscriber arriving after the subject stopped
/// still receives the retained values before the terminal notification.
///
/// ```rust
/// use std::{cell::RefCell, rc::Rc};
///
/// use rxsubject::prelude::*;
///
/// let subject = ReplaySubject::<i32, ()>::with_buffer_size(2);
/// subject.next(1);
/// subject.next(2);
/// subject.next(3);
///
/// let seen = Rc::new(RefCell::new(vec![]));
/// let c_seen = seen.clone();
/// subject.subscribe(move |v| c_seen.borrow_mut().push(v));
/// subject.next(4);
/// assert_eq!(*seen.borrow(), vec![2, 3, 4]);
/// ```
pub struct ReplaySubject<Item, Err> {
  subject: Subject<Item, Err>,
  buffer: Rc<RefCell<ReplayBuffer<Item>>>,
}

struct ReplayBuffer<Item> {
  /// Values with the instant they leave the window, if there is one.
  entries: VecDeque<(Item, Option<Instant>)>,
  buffer_size: Option<usize>,
  window_time: Option<Duration>,
  clock: Rc<dyn TimestampProvider>,
}

impl<Item> ReplayBuffer<Item> {
  fn push(&mut self, value: Item) {
    let expires = self.window_time.map(|window| self.clock.now() + window);
    self.entries.push_back((value, expires));
  }

  fn trim(&mut self) {
    if let Some(size) = self.buffer_size {
      while self.entries.len() > size {
        self.entries.pop_front();
      }
    }
    if self.window_time.is_some() {
      let now = self.clock.now();
      while matches!(self.entries.front(), Some((_, Some(expires))) if *expires <= now) {
        self.entries.pop_front();
      }
    }
  }
}

/// Builder for [`ReplaySubject`]. Both bounds default to unbounded.
pub struct ReplaySubjectBuilder<Item, Err> {
  buffer_size: Option<usize>,
  window_time: Option<Duration>,
  clock: Rc<dyn TimestampProvider>,
  config: RuntimeConfig,
  _marker: PhantomData<fn(Item, Err)>,
}

impl<Item, Err> Default for ReplaySubjectBuilder<Item, Err> {
  fn default() -> Self {
    Self {
      buffer_size: None,
      window_time: None,
      clock: Rc::new(SystemClock),
      config: RuntimeConfig::default(),
      _marker: PhantomData,
    }
  }
}

impl<Item, Err> ReplaySubjectBuilder<Item, Err> {
  /// Keeps at most `size` values; a size of zero keeps one.
  pub fn buffer_size(mut self, size: usize) -> Self {
    self.buffer_size = Some(size.max(1));
    self
  }

  /// Keeps values for `window`, at least one millisecond.
  pub fn window_time(mut self, window: Duration) -> Self {
    self.window_time = Some(window.max(Duration::from_millis(1)));
    self
  }

  /// Time source used to age values.
  pub fn clock(mut self, clock: impl TimestampProvider + 'static) -> Self {
    self.clock = Rc::new(clock);
    self
  }

  pub fn config(mut self, config: RuntimeConfig) -> Self {
    self.config = config;
    self
  }

  pub fn build(self) -> ReplaySubject<Item, Err> {
    let Self { buffer_size, window_time, clock, config, .. } = self;
    let buffer = ReplayBuffer { entries: VecDeque::new(), buffer_size, window_time, clock };
    ReplaySubject { subject: Subject::with_config(config), buffer: Rc::new(RefCell::new(buffer)) }
  }
}

impl<Item, Err> Clone for ReplaySubject<Item, Err> {
  fn clone(&self) -> Self { Self { subject: self.subject.clone(), buffer: self.buffer.clone() } }
}

impl<Item, Err> ReplaySubject<Item, Err> {
  /// Replays every value ever emitted.
  pub fn new() -> Self { Self::builder().build() }

  /// Replays the last `size` values.
  pub fn with_buffer_size(size: usize) -> Self { Self::builder().buffer_size(size).build() }

  pub fn builder() -> ReplaySubjectBuilder<Item, Err> { ReplaySubjectBuilder::default() }

  /// Number of values a subscriber arriving now would receive.
  pub fn buffered_len(&self) -> usize {
    let mut buffer = self.buffer.borrow_mut();
    buffer.trim();
    buffer.entries.len()
  }
}

impl<Item, Err> Default for ReplaySubject<Item, Err> {
  fn default() -> Self { Self::new() }
}

impl<Item: Clone + 'static, Err: Clone + 'static> ReplaySubject<Item, Err> {
  /// Records `value` unless the subject stopped, then multicasts it.
  pub fn try_next(&self, value: Item) -> Result<(), ObjectUnsubscribedError> {
    self.subject.check_open()?;
    {
      let mut buffer = self.buffer.borrow_mut();
      if !self.subject.is_stopped() {
        buffer.push(value.clone());
      }
      buffer.trim();
    }
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

impl_subject_delegates!(ReplaySubject);

impl<Item: Clone + 'static, Err: Clone + 'static> Observable<Item, Err>
  for ReplaySubject<Item, Err>
{
  fn actual_subscribe(&self, subscriber: Subscriber<Item, Err>) -> Subscription {
    if let Err(err) = self.subject.check_open() {
      self.subject.report_closed(err);
      return Subscription::closed();
    }
    let replay: Vec<Item> = {
      let mut buffer = self.buffer.borrow_mut();
      buffer.trim();
      buffer.entries.iter().map(|(value, _)| value.clone()).collect()
    };
    for value in replay {
      if subscriber.is_closed() {
        break;
      }
      subscriber.next(value);
    }
    self.subject.inner_subscribe(&subscriber)
  }

  fn runtime_config(&self) -> RuntimeConfig { self.subject.config().clone() }
}

#[cfg(test)]
mod test {
  use std::{cell::RefCell, rc::Rc};

  use super::*;
  use crate::{
    scheduler::VirtualClock,
    subscriber::{Notification, PartialObserver, SafeSubscriber},
  };

  type Log = Rc<RefCell<Vec<Notification<i32, &'static str>>>>;

  fn recorder(log: &Log) -> PartialObserver<i32, &'static str> {
    let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
    PartialObserver::new()
      .on_next(move |v| l1.borrow_mut().push(Notification::Next(v)))
      .on_error(move |e| l2.borrow_mut().push(Notification::Error(e)))
      .on_complete(move || l3.borrow_mut().push(Notification::Complete))
  }

  #[test]
  fn replays_everything_by_default() {
    let subject = ReplaySubject::<i32, &str>::new();
    subject.next(1);
    subject.next(2);
    let log: Log = Rc::default();
    subject.subscribe(recorder(&log));
    subject.next(3);
    assert_eq!(
      *log.borrow(),
      vec![Notification::Next(1), Notification::Next(2), Notification::Next(3)]
    );
  }

  #[test]
  fn buffer_size_bounds_the_replay() {
    let subject = ReplaySubject::<i32, &str>::with_buffer_size(2);
    subject.next(1);
    subject.next(2);
    subject.next(3);
    assert_eq!(subject.buffered_len(), 2);

    let log: Log = Rc::default();
    subject.subscribe(recorder(&log));
    assert_eq!(
      *log.borrow(),
      vec![Notification::Next(2), Notification::Next(3)]
    );
  }

  #[test]
  fn zero_buffer_size_keeps_one() {
    let subject = ReplaySubject::<i32, ()>::with_buffer_size(0);
    subject.next(1);
    subject.next(2);
    assert_eq!(subject.buffered_len(), 1);
  }

  #[test]
  fn window_time_drops_old_values() {
    let clock = VirtualClock::new();
    let subject: ReplaySubject<i32, &str> = ReplaySubject::builder()
      .window_time(Duration::from_millis(100))
      .clock(clock.clone())
      .build();

    subject.next(1);
    clock.advance(Duration::from_millis(60));
    subject.next(2);
    clock.advance(Duration::from_millis(40));
    // 1 is exactly at the edge of the window and is gone
    let log: Log = Rc::default();
    subject.subscribe(recorder(&log));
    assert_eq!(*log.borrow(), vec![Notification::Next(2)]);

    clock.advance(Duration::from_millis(60));
    assert_eq!(subject.buffered_len(), 0);
  }

  #[test]
  fn size_and_window_combine() {
    let clock = VirtualClock::new();
    let subject: ReplaySubject<i32, ()> = ReplaySubject::builder()
      .buffer_size(2)
      .window_time(Duration::from_secs(1))
      .clock(clock.clone())
      .build();
    subject.next(1);
    subject.next(2);
    subject.next(3);
    assert_eq!(subject.buffered_len(), 2);
    clock.advance(Duration::from_secs(2));
    assert_eq!(subject.buffered_len(), 0);
  }

  #[test]
  fn replays_before_terminal_notification() {
    let subject = ReplaySubject::<i32, &str>::new();
    subject.next(1);
    subject.error("bad");
    subject.next(2);

    let log: Log = Rc::default();
    let subscription = subject.subscribe(recorder(&log));
    assert!(subscription.is_closed());
    assert_eq!(
      *log.borrow(),
      vec![Notification::Next(1), Notification::Error("bad")]
    );
  }

  #[test]
  fn replay_stops_when_subscriber_closes() {
    let subject = ReplaySubject::<i32, ()>::new();
    subject.next(1);
    subject.next(2);
    subject.next(3);

    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    let slot: Rc<RefCell<Option<Subscriber<i32, ()>>>> = Rc::default();
    let c_slot = slot.clone();
    let subscriber = SafeSubscriber::new(
      move |v: i32| {
        c_seen.borrow_mut().push(v);
        if v == 2 {
          if let Some(s) = c_slot.borrow().as_ref() {
            s.unsubscribe().unwrap();
          }
        }
      },
      RuntimeConfig::default(),
    )
    .into_subscriber();
    *slot.borrow_mut() = Some(subscriber.clone());
    subject.subscribe_with(subscriber);

    assert_eq!(*seen.borrow(), vec![1, 2]);
    assert_eq!(subject.subscriber_count(), 0);
    slot.borrow_mut().take();
  }
}
