//! Execution units behind the scheduling bridge and the interval timer.
//!
//! An [`Executor`] accepts a [`Job`] and runs it on some thread. [`Lane`]
//! runs its jobs one at a time in submission order on a single named worker;
//! [`NewThread`] starts a fresh named thread per job.

use std::panic::{self, AssertUnwindSafe};

use crate::{
  async_result::{promise, AsyncResult},
  error::{BoxError, Error, LaneError},
  rc::MutArc,
};

mod lane;
mod new_thread;

pub use lane::Lane;
pub use new_thread::NewThread;

/// A unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run a unit of work on an unspecified thread.
pub trait Executor {
  /// Accepts `job` for execution or reports why it cannot.
  fn execute(&self, job: Job) -> Result<(), LaneError>;

  /// Runs `work` and exposes its outcome as an [`AsyncResult`].
  ///
  /// A returned `Err` keeps its original cause, a panic resolves the result
  /// with [`Error::Panicked`] and a refused job with [`Error::Lane`].
  fn submit<T, E, F>(&self, work: F) -> AsyncResult<T>
  where
    Self: Sized,
    T: Send + 'static,
    E: Into<BoxError>,
    F: FnOnce() -> Result<T, E> + Send + 'static,
  {
    let (promise, result) = promise();
    let promise = MutArc::own(Some(promise));
    let c_promise = promise.clone();
    let job = Box::new(move || {
      let outcome = match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(cause)) => Err(Error::failed(cause)),
        Err(payload) => Err(Error::from_panic(payload)),
      };
      let promise = c_promise.rc_deref_mut().take();
      if let Some(promise) = promise {
        promise.complete(outcome);
      }
    });
    if let Err(err) = self.execute(job) {
      let promise = promise.rc_deref_mut().take();
      if let Some(promise) = promise {
        promise.complete(Err(err.into()));
      }
    }
    result
  }
}

/// What a bounded lane does when its queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RejectionPolicy {
  /// Refuse the job with [`LaneError::Rejected`].
  #[default]
  Abort,
  /// Block the submitting thread until the queue has room.
  ///
  /// The lane's own worker is never blocked on its own queue; a job it
  /// submits to itself while the queue is full is refused like `Abort`.
  Block,
}

/// Construction options for a [`Lane`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneConfig {
  /// Prefix of the worker thread name, completed with a sequence number.
  pub name_prefix: String,
  /// Maximum number of queued jobs; `None` for no limit.
  pub queue_bound: Option<usize>,
  pub rejection: RejectionPolicy,
}

impl Default for LaneConfig {
  fn default() -> Self {
    LaneConfig {
      name_prefix: "rxflow-lane".to_owned(),
      queue_bound: None,
      rejection: RejectionPolicy::Abort,
    }
  }
}

impl LaneConfig {
  pub fn new() -> Self { Self::default() }

  pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.name_prefix = prefix.into();
    self
  }

  /// Limits the queue to `bound` jobs. A bound of zero is treated as one.
  pub fn queue_bound(mut self, bound: usize) -> Self {
    self.queue_bound = Some(bound.max(1));
    self
  }

  pub fn unbounded(mut self) -> Self {
    self.queue_bound = None;
    self
  }

  pub fn rejection(mut self, policy: RejectionPolicy) -> Self {
    self.rejection = policy;
    self
  }
}
