//! Error types raised by subscriptions and subjects.

use thiserror::Error;

/// Error returned by a fallible teardown.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Every error raised while running the teardown chain of a
/// [`Subscription`](crate::subscription::Subscription).
///
/// Errors are collected in the order the finalizers ran. Nested aggregates
/// coming from child subscriptions are flattened into this list.
#[derive(Debug, Error)]
#[error("{}", aggregate_message(.errors))]
pub struct UnsubscriptionError {
  pub errors: Vec<BoxError>,
}

impl UnsubscriptionError {
  pub fn new(errors: Vec<BoxError>) -> Self { Self { errors } }

  #[inline]
  pub fn len(&self) -> usize { self.errors.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.errors.is_empty() }
}

fn aggregate_message(errors: &[BoxError]) -> String {
  let mut message = format!("{} errors occurred during unsubscription:", errors.len());
  for (idx, err) in errors.iter().enumerate() {
    message.push_str(&format!("\n{}) {}", idx + 1, err));
  }
  message
}

/// Raised when an operation needs a live subject but the subject has been
/// unsubscribed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Default)]
#[error("object unsubscribed")]
pub struct ObjectUnsubscribedError;

/// Failure of [`BehaviorSubject::value`](crate::subject::BehaviorSubject::value).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GetValueError<Err> {
  /// The subject terminated with this error.
  #[error("the subject has errored")]
  Errored(Err),
  #[error(transparent)]
  Unsubscribed(#[from] ObjectUnsubscribedError),
}

/// Errors handed to the unhandled-error reporter of a
/// [`RuntimeConfig`](crate::config::RuntimeConfig).
#[derive(Debug, Error)]
pub enum RxError {
  #[error(transparent)]
  Unsubscription(#[from] UnsubscriptionError),
  #[error(transparent)]
  ObjectUnsubscribed(#[from] ObjectUnsubscribedError),
  /// A consumer supplied `next`/`error`/`complete` callback panicked.
  #[error("consumer callback panicked: {0}")]
  ConsumerPanic(String),
  /// An error reached an observer that has no error handler.
  #[error("uncaught error: {0}")]
  Uncaught(String),
}

/// Turns a panic payload into a readable message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}

/// Panic raised by a teardown, recorded as an unsubscription error entry.
#[derive(Debug, Error)]
#[error("teardown panicked: {0}")]
pub struct TeardownPanic(pub String);

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn aggregate_message_lists_every_error() {
    let err = UnsubscriptionError::new(vec!["first".into(), "second".into()]);
    assert_eq!(err.len(), 2);
    assert_eq!(
      err.to_string(),
      "2 errors occurred during unsubscription:\n1) first\n2) second"
    );
  }

  #[test]
  fn get_value_messages() {
    let errored = GetValueError::Errored("boom");
    assert_eq!(errored.to_string(), "the subject has errored");
    let unsubscribed: GetValueError<&str> = ObjectUnsubscribedError.into();
    assert_eq!(unsubscribed, GetValueError::Unsubscribed(ObjectUnsubscribedError));
    assert_eq!(unsubscribed.to_string(), "object unsubscribed");
    let boxed: BoxError = Box::new(unsubscribed);
    assert_eq!(boxed.to_string(), "object unsubscribed");
  }

  #[test]
  fn panic_payloads() {
    let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
    assert_eq!(panic_message(&*payload), "boom");
    let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
    assert_eq!(panic_message(&*payload), "bang");
    let payload: Box<dyn std::any::Any + Send> = Box::new(7);
    assert_eq!(panic_message(&*payload), "non-string panic payload");
  }
}
