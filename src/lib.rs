//! # rxsubject: Subscriptions and Subjects for Reactive Extensions
//!
//! The multicast core of [Reactive Extensions](http://reactivex.io/): a
//! cancellation tree of [`Subscription`]s, terminal-state gated
//! [`Subscriber`]s, and the [`Subject`] family.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::{cell::RefCell, rc::Rc};
//!
//! use rxsubject::prelude::*;
//!
//! let subject = Subject::<i32, ()>::new();
//! let (a, b) = (Rc::new(RefCell::new(vec![])), Rc::new(RefCell::new(vec![])));
//!
//! let c_a = a.clone();
//! subject.subscribe(move |v| c_a.borrow_mut().push(v));
//! subject.next(1);
//! let c_b = b.clone();
//! subject.subscribe(move |v| c_b.borrow_mut().push(v));
//! subject.next(2);
//! subject.complete();
//!
//! assert_eq!(*a.borrow(), vec![1, 2]);
//! assert_eq!(*b.borrow(), vec![2]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Subscription`] | Disposable resource node, the unit of cancellation |
//! | [`Subscriber`] | An [`Observer`] with terminal-state gating |
//! | [`Subject`] | A hot [`Observable`] that is also an [`Observer`] |
//! | [`RuntimeConfig`] | Error hooks and legacy switches, passed explicitly |
//!
//! Everything is single threaded: handles are `Rc` based and every
//! notification runs to completion before the call returns.
//!
//! ## Feature Flags
//!
//! - **`tokio-scheduler`**: `scheduler::TokioLocalScheduler`, which defers
//!   error reports onto a tokio `LocalSet`.
//!
//! [`Subscription`]: subscription::Subscription
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subject`]: subject::Subject
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`RuntimeConfig`]: config::RuntimeConfig
pub mod config;
pub mod error;
pub mod observable;
pub mod observer;
pub mod prelude;
pub mod scheduler;
pub mod subject;
pub mod subscriber;
pub mod subscription;

pub use crate::scheduler::{Duration, Instant};

#[cfg(all(doctest, not(target_arch = "wasm32")))]
mod __markdown_doctests {
  mod readme {
    #![doc = include_str!("../README.md")]
  }
}
