use super::{Scheduler, Task};

/// Defers tasks with `tokio::task::spawn_local`.
///
/// Must be used from inside a `LocalSet` (or a `current_thread` runtime
/// driving one).
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioLocalScheduler;

impl Scheduler for TokioLocalScheduler {
  fn schedule(&self, task: Task) {
    let _handle = tokio::task::spawn_local(async move { task() });
  }
}
