use std::rc::Rc;

use smallvec::SmallVec;

use crate::subscriber::Subscriber;

/// Subscribers container with ID-based removal.
///
/// Emissions never iterate the live list. `next` works on a snapshot that is
/// cached until the list changes, and terminal notifications take the whole
/// list out first, so observers may subscribe or unsubscribe from inside
/// their callbacks.
pub(crate) struct Subscribers<Ob> {
  next_id: usize,
  items: SmallVec<[(usize, Ob); 2]>,
  snapshot: Option<Rc<[Ob]>>,
}

impl<Ob> Default for Subscribers<Ob> {
  fn default() -> Self { Self { next_id: 0, items: SmallVec::new(), snapshot: None } }
}

impl<Ob> Subscribers<Ob> {
  /// Add an observer and return its unique ID.
  pub fn add(&mut self, observer: Ob) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.items.push((id, observer));
    self.snapshot = None;
    id
  }

  /// Remove an observer by ID.
  pub fn remove(&mut self, id: usize) -> Option<Ob> {
    let pos = self.items.iter().position(|(i, _)| *i == id)?;
    self.snapshot = None;
    Some(self.items.remove(pos).1)
  }

  #[inline]
  pub fn len(&self) -> usize { self.items.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  /// Takes every observer out, leaving the container empty.
  pub fn take_all(&mut self) -> SmallVec<[(usize, Ob); 2]> {
    self.snapshot = None;
    std::mem::take(&mut self.items)
  }
}

impl<Ob: Clone> Subscribers<Ob> {
  /// The current observers in subscription order.
  pub fn snapshot(&mut self) -> Rc<[Ob]> {
    if let Some(snapshot) = &self.snapshot {
      return snapshot.clone();
    }
    let snapshot: Rc<[Ob]> = self.items.iter().map(|(_, ob)| ob.clone()).collect();
    self.snapshot = Some(snapshot.clone());
    snapshot
  }
}

/// Broadcast value to all observers with optimal cloning.
///
/// The value is cloned for every observer except the last one, which
/// receives the moved value.
pub(crate) fn broadcast_value<Item, Err>(observers: &[Subscriber<Item, Err>], value: Item)
where
  Item: Clone + 'static,
  Err: 'static,
{
  let mut iter = observers.iter().peekable();
  while let Some(observer) = iter.next() {
    if iter.peek().is_some() {
      observer.next(value.clone());
    } else {
      observer.next(value);
      break;
    }
  }
}

/// Broadcast error to drained observers, cloning for all but the last.
pub(crate) fn broadcast_error<Item, Err>(
  observers: impl IntoIterator<Item = Subscriber<Item, Err>>,
  err: Err,
) where
  Item: 'static,
  Err: Clone + 'static,
{
  let mut iter = observers.into_iter().peekable();
  while let Some(observer) = iter.next() {
    if iter.peek().is_some() {
      observer.error(err.clone());
    } else {
      observer.error(err);
      break;
    }
  }
}

pub(crate) fn broadcast_complete<Item, Err>(
  observers: impl IntoIterator<Item = Subscriber<Item, Err>>,
) where
  Item: 'static,
  Err: 'static,
{
  for observer in observers {
    observer.complete();
  }
}
