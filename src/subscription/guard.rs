use super::Subscription;

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be unsubscribed. Teardown failures at that point are logged.
///
/// If you want to drop it immediately, wrap it in its own scope
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard(Option<Subscription>);

impl SubscriptionGuard {
  /// Wraps an existing subscription with a guard to enable RAII behavior for
  /// it.
  pub fn new(subscription: Subscription) -> SubscriptionGuard {
    SubscriptionGuard(Some(subscription))
  }

  /// Gives the subscription back without unsubscribing it.
  pub fn into_inner(mut self) -> Subscription {
    match self.0.take() {
      Some(subscription) => subscription,
      None => Subscription::closed(),
    }
  }
}

impl Subscription {
  /// Activates "RAII" behavior for this subscription. That means
  /// `unsubscribe()` will be called automatically as soon as the returned
  /// value goes out of scope.
  ///
  /// **Attention:** If you don't assign the return value to a variable,
  /// `unsubscribe()` is called immediately, which is probably not what you
  /// want!
  pub fn unsubscribe_when_dropped(self) -> SubscriptionGuard { SubscriptionGuard::new(self) }
}

impl Drop for SubscriptionGuard {
  fn drop(&mut self) {
    if let Some(Err(err)) = self.0.take().map(|s| s.unsubscribe()) {
      tracing::warn!("unsubscribe on guard drop failed: {}", err);
    }
  }
}
