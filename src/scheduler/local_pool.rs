use futures::{executor::LocalSpawner, task::LocalSpawnExt};

use super::{Scheduler, Task};

/// Defers tasks onto a `futures` [`LocalPool`](futures::executor::LocalPool).
///
/// Tasks run the next time the owning pool is driven, e.g. with
/// `run_until_stalled`.
#[derive(Clone)]
pub struct LocalPoolScheduler {
  spawner: LocalSpawner,
}

impl LocalPoolScheduler {
  pub fn new(spawner: LocalSpawner) -> Self { Self { spawner } }
}

impl Scheduler for LocalPoolScheduler {
  fn schedule(&self, task: Task) {
    if let Err(err) = self.spawner.spawn_local(async move { task() }) {
      tracing::warn!("local pool is shut down, dropping deferred task: {}", err);
    }
  }
}
