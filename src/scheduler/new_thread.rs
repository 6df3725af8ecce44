use std::{
  sync::atomic::{AtomicUsize, Ordering},
  thread,
};

use super::{Executor, Job};
use crate::error::LaneError;

static THREAD_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Runs every job on a freshly spawned thread named `{prefix}-{seq}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThread {
  prefix: String,
}

impl NewThread {
  pub fn new(prefix: impl Into<String>) -> Self { NewThread { prefix: prefix.into() } }
}

impl Default for NewThread {
  fn default() -> Self { NewThread::new("rxflow-thread") }
}

impl Executor for NewThread {
  fn execute(&self, job: Job) -> Result<(), LaneError> {
    let name = format!("{}-{}", self.prefix, THREAD_SEQ.fetch_add(1, Ordering::Relaxed));
    match thread::Builder::new().name(name.clone()).spawn(job) {
      Ok(_) => Ok(()),
      Err(e) => Err(LaneError::Spawn { name, reason: e.to_string() }),
    }
  }
}
