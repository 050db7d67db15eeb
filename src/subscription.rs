//! Disposable resource nodes.
//!
//! A [`Subscription`] owns an ordered list of finalizers and knows the
//! parents it was added to. Unsubscribing detaches the node from its
//! parents, then runs the initial teardown and every finalizer exactly once,
//! collecting their failures into a single [`UnsubscriptionError`].
//!
//! Parents hold their children strongly (children are finalizers), children
//! hold their parents through `Weak` links keyed by node id, so the graph
//! never forms a reference cycle.

use std::{
  cell::RefCell,
  fmt::{Debug, Formatter},
  panic::{catch_unwind, AssertUnwindSafe},
  rc::{Rc, Weak},
  sync::atomic::{AtomicUsize, Ordering},
};

use smallvec::SmallVec;

use crate::error::{panic_message, BoxError, TeardownPanic, UnsubscriptionError};

mod guard;
pub use guard::SubscriptionGuard;

type TeardownFn = Box<dyn FnOnce() -> Result<(), BoxError>>;

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Teardown
// ============================================================================

/// Something a [`Subscription`] runs when it is unsubscribed.
pub enum Teardown {
  Empty,
  Fn(TeardownFn),
  Subscription(Subscription),
  Unsubscribable(Box<dyn Unsubscribable>),
}

/// Any disposable resource that is not itself a [`Subscription`].
pub trait Unsubscribable {
  fn unsubscribe(&mut self) -> Result<(), BoxError>;
}

impl Teardown {
  /// Wraps an infallible callback.
  pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
    Teardown::Fn(Box::new(move || {
      f();
      Ok(())
    }))
  }

  /// Wraps a callback that may fail.
  pub fn try_from_fn(f: impl FnOnce() -> Result<(), BoxError> + 'static) -> Self {
    Teardown::Fn(Box::new(f))
  }

  pub fn from_unsubscribable(u: impl Unsubscribable + 'static) -> Self {
    Teardown::Unsubscribable(Box::new(u))
  }

  /// Runs the teardown, appending every failure to `errors`.
  fn execute(self, errors: &mut Vec<BoxError>) {
    match self {
      Teardown::Empty => {}
      Teardown::Subscription(s) => {
        if let Err(err) = s.unsubscribe() {
          errors.extend(err.errors);
        }
      }
      Teardown::Fn(f) => push_outcome(errors, catch_unwind(AssertUnwindSafe(f))),
      Teardown::Unsubscribable(mut u) => {
        push_outcome(errors, catch_unwind(AssertUnwindSafe(|| u.unsubscribe())))
      }
    }
  }
}

fn push_outcome(
  errors: &mut Vec<BoxError>,
  outcome: std::thread::Result<Result<(), BoxError>>,
) {
  match outcome {
    Ok(Ok(())) => {}
    Ok(Err(err)) => match err.downcast::<UnsubscriptionError>() {
      Ok(nested) => errors.extend(nested.errors),
      Err(err) => errors.push(err),
    },
    Err(payload) => errors.push(Box::new(TeardownPanic(panic_message(&*payload)))),
  }
}

impl From<Subscription> for Teardown {
  #[inline]
  fn from(s: Subscription) -> Self { Teardown::Subscription(s) }
}

impl From<&Subscription> for Teardown {
  #[inline]
  fn from(s: &Subscription) -> Self { Teardown::Subscription(s.clone()) }
}

impl From<()> for Teardown {
  #[inline]
  fn from(_: ()) -> Self { Teardown::Empty }
}

impl<T: Into<Teardown>> From<Option<T>> for Teardown {
  fn from(t: Option<T>) -> Self { t.map_or(Teardown::Empty, Into::into) }
}

impl Debug for Teardown {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Teardown::Empty => f.write_str("Teardown::Empty"),
      Teardown::Fn(_) => f.write_str("Teardown::Fn"),
      Teardown::Subscription(s) => f.debug_tuple("Teardown::Subscription").field(s).finish(),
      Teardown::Unsubscribable(_) => f.write_str("Teardown::Unsubscribable"),
    }
  }
}

// ============================================================================
// Subscription
// ============================================================================

/// A node of the cancellation tree.
///
/// Clones are handles to the same node.
///
/// ```rust
/// use std::{cell::RefCell, rc::Rc};
///
/// use rxsubject::subscription::{Subscription, Teardown};
///
/// let log = Rc::new(RefCell::new(vec![]));
/// let (l1, l2) = (log.clone(), log.clone());
///
/// let parent = Subscription::with_teardown(move || l1.borrow_mut().push("parent"));
/// let child = Subscription::with_teardown(move || l2.borrow_mut().push("child"));
/// parent.add(&child);
///
/// parent.unsubscribe().unwrap();
/// assert!(child.is_closed());
/// assert_eq!(*log.borrow(), vec!["parent", "child"]);
/// ```
#[derive(Clone)]
pub struct Subscription(Rc<Node>);

struct Node {
  id: usize,
  state: RefCell<NodeState>,
}

#[derive(Default)]
struct NodeState {
  closed: bool,
  initial_teardown: Option<TeardownFn>,
  parents: SmallVec<[(usize, Weak<Node>); 1]>,
  next_finalizer_id: usize,
  finalizers: Vec<(usize, Teardown)>,
}

/// Identifies a finalizer registered with [`Subscription::add`], so it can be
/// taken back out with [`Subscription::remove_teardown`].
///
/// Handles of teardowns that were ignored or ran immediately match nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownHandle {
  node: usize,
  slot: Option<usize>,
}

impl Subscription {
  /// A new open subscription.
  pub fn new() -> Self { Self::from_state(NodeState::default()) }

  /// A new open subscription running `f` first when unsubscribed.
  pub fn with_teardown(f: impl FnOnce() + 'static) -> Self {
    Self::with_fallible_teardown(move || {
      f();
      Ok(())
    })
  }

  pub fn with_fallible_teardown(f: impl FnOnce() -> Result<(), BoxError> + 'static) -> Self {
    Self::from_state(NodeState { initial_teardown: Some(Box::new(f)), ..Default::default() })
  }

  /// An already closed subscription, for subscribe calls that finished
  /// synchronously.
  pub fn closed() -> Self { Self::from_state(NodeState { closed: true, ..Default::default() }) }

  fn from_state(state: NodeState) -> Self {
    let id = NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed);
    Subscription(Rc::new(Node { id, state: RefCell::new(state) }))
  }

  #[inline]
  pub fn is_closed(&self) -> bool { self.0.state.borrow().closed }

  /// Number of finalizers waiting for unsubscription.
  #[inline]
  pub fn finalizer_count(&self) -> usize { self.0.state.borrow().finalizers.len() }

  /// Whether two handles point to the same node.
  #[inline]
  pub fn ptr_eq(&self, other: &Subscription) -> bool { Rc::ptr_eq(&self.0, &other.0) }

  /// Registers `teardown` to run when this subscription is unsubscribed.
  ///
  /// If this subscription is already closed the teardown runs right away;
  /// failures are then logged, use [`try_add`](Self::try_add) to receive
  /// them.
  pub fn add(&self, teardown: impl Into<Teardown>) -> TeardownHandle {
    self.try_add(teardown).unwrap_or_else(|err| {
      tracing::warn!("teardown added to a closed subscription failed: {}", err);
      self.detached_handle()
    })
  }

  /// Like [`add`](Self::add), but returns the failures of a teardown that ran
  /// immediately because this subscription was already closed.
  pub fn try_add(
    &self,
    teardown: impl Into<Teardown>,
  ) -> Result<TeardownHandle, UnsubscriptionError> {
    let teardown = teardown.into();
    match &teardown {
      Teardown::Empty => return Ok(self.detached_handle()),
      Teardown::Subscription(s) if self.ptr_eq(s) => return Ok(self.detached_handle()),
      _ => {}
    }

    if self.is_closed() {
      let mut errors = vec![];
      teardown.execute(&mut errors);
      return if errors.is_empty() {
        Ok(self.detached_handle())
      } else {
        Err(UnsubscriptionError::new(errors))
      };
    }

    if let Teardown::Subscription(child) = &teardown {
      if child.is_closed() {
        return Ok(self.detached_handle());
      }
      if child.has_parent(self) {
        return Ok(self.handle_of(child));
      }
      child.add_parent(self);
    }
    let mut state = self.0.state.borrow_mut();
    let slot = state.next_finalizer_id;
    state.next_finalizer_id += 1;
    state.finalizers.push((slot, teardown));
    Ok(TeardownHandle { node: self.0.id, slot: Some(slot) })
  }

  /// Stops tracking `child`. It is not unsubscribed.
  pub fn remove(&self, child: &Subscription) {
    self
      .0
      .state
      .borrow_mut()
      .finalizers
      .retain(|(_, t)| !matches!(t, Teardown::Subscription(s) if s.ptr_eq(child)));
    child.remove_parent(self);
  }

  /// Takes back the finalizer `handle` refers to without running it.
  ///
  /// Returns `None` if it already ran, was removed before, or belongs to
  /// another subscription.
  pub fn remove_teardown(&self, handle: TeardownHandle) -> Option<Teardown> {
    let slot = handle.slot.filter(|_| handle.node == self.0.id)?;
    let teardown = {
      let mut state = self.0.state.borrow_mut();
      let pos = state.finalizers.iter().position(|(id, _)| *id == slot)?;
      state.finalizers.remove(pos).1
    };
    if let Teardown::Subscription(child) = &teardown {
      child.remove_parent(self);
    }
    Some(teardown)
  }

  /// Releases this node. Idempotent.
  ///
  /// Every finalizer is attempted even if earlier ones fail; all failures
  /// are returned together.
  pub fn unsubscribe(&self) -> Result<(), UnsubscriptionError> {
    let (parents, initial_teardown, finalizers) = {
      let mut state = self.0.state.borrow_mut();
      if state.closed {
        return Ok(());
      }
      state.closed = true;
      (
        std::mem::take(&mut state.parents),
        state.initial_teardown.take(),
        std::mem::take(&mut state.finalizers),
      )
    };
    tracing::trace!(id = self.0.id, finalizers = finalizers.len(), "unsubscribe");

    for (_, parent) in parents {
      if let Some(parent) = parent.upgrade() {
        Subscription(parent).remove(self);
      }
    }

    let mut errors = vec![];
    if let Some(f) = initial_teardown {
      Teardown::Fn(f).execute(&mut errors);
    }
    for (_, teardown) in finalizers {
      teardown.execute(&mut errors);
    }

    if errors.is_empty() {
      Ok(())
    } else {
      tracing::debug!(id = self.0.id, count = errors.len(), "teardown errors aggregated");
      Err(UnsubscriptionError::new(errors))
    }
  }

  fn detached_handle(&self) -> TeardownHandle { TeardownHandle { node: self.0.id, slot: None } }

  fn handle_of(&self, child: &Subscription) -> TeardownHandle {
    let slot = self
      .0
      .state
      .borrow()
      .finalizers
      .iter()
      .find(|(_, t)| matches!(t, Teardown::Subscription(s) if s.ptr_eq(child)))
      .map(|(id, _)| *id);
    TeardownHandle { node: self.0.id, slot }
  }

  fn has_parent(&self, parent: &Subscription) -> bool {
    let id = parent.0.id;
    self.0.state.borrow().parents.iter().any(|(p, _)| *p == id)
  }

  fn add_parent(&self, parent: &Subscription) {
    let link = (parent.0.id, Rc::downgrade(&parent.0));
    self.0.state.borrow_mut().parents.push(link);
  }

  fn remove_parent(&self, parent: &Subscription) {
    let id = parent.0.id;
    self.0.state.borrow_mut().parents.retain(|(p, _)| *p != id);
  }
}

impl Default for Subscription {
  fn default() -> Self { Self::new() }
}

impl Debug for Subscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let state = self.0.state.borrow();
    f.debug_struct("Subscription")
      .field("id", &self.0.id)
      .field("closed", &state.closed)
      .field("parents", &state.parents.len())
      .field("finalizers", &state.finalizers.len())
      .finish()
  }
}
