//! Result slot for a unit of work running elsewhere.
//!
//! [`promise`] creates a connected pair: the [`Promise`] travels with the work
//! and is completed exactly once, the [`AsyncResult`] stays with the caller,
//! who can poll it, block on it, await it, or hand it a pair of callbacks.

use std::{
  fmt::{Debug, Formatter},
  future::Future,
  mem,
  pin::Pin,
  sync::{Arc, Condvar, Mutex},
  task::{Context, Poll, Waker},
  time::{Duration, Instant},
};

use crate::{error::Error, rc::lock};

type Callback<T> = Box<dyn FnOnce(Result<T, Error>) + Send>;

enum State<T> {
  Pending { callback: Option<Callback<T>>, waker: Option<Waker> },
  Ready(Result<T, Error>),
  Taken,
}

struct Slot<T> {
  state: Mutex<State<T>>,
  settled: Condvar,
}

impl<T> Slot<T> {
  fn settle(&self, result: Result<T, Error>) {
    let mut state = lock(&self.state);
    match mem::replace(&mut *state, State::Taken) {
      State::Pending { callback: Some(callback), .. } => {
        drop(state);
        callback(result);
      }
      State::Pending { callback: None, waker } => {
        *state = State::Ready(result);
        drop(state);
        self.settled.notify_all();
        if let Some(waker) = waker {
          waker.wake();
        }
      }
      settled => *state = settled,
    }
  }
}

/// Creates a connected promise / result pair.
pub fn promise<T>() -> (Promise<T>, AsyncResult<T>) {
  let slot = Arc::new(Slot {
    state: Mutex::new(State::Pending { callback: None, waker: None }),
    settled: Condvar::new(),
  });
  (Promise { slot: Some(slot.clone()) }, AsyncResult { slot })
}

/// Write side of the slot.
///
/// Dropping a promise without completing it resolves the result with
/// [`Error::Abandoned`].
pub struct Promise<T> {
  slot: Option<Arc<Slot<T>>>,
}

impl<T> Promise<T> {
  pub fn complete(mut self, result: Result<T, Error>) {
    if let Some(slot) = self.slot.take() {
      slot.settle(result);
    }
  }
}

impl<T> Drop for Promise<T> {
  fn drop(&mut self) {
    if let Some(slot) = self.slot.take() {
      slot.settle(Err(Error::Abandoned));
    }
  }
}

/// Read side of the slot.
pub struct AsyncResult<T> {
  slot: Arc<Slot<T>>,
}

impl<T> AsyncResult<T> {
  /// An already resolved result.
  pub fn ready(result: Result<T, Error>) -> Self {
    let (promise, async_result) = promise();
    promise.complete(result);
    async_result
  }

  /// Returns `true` once the work has finished, successfully or not.
  pub fn is_done(&self) -> bool {
    !matches!(*lock(&self.slot.state), State::Pending { .. })
  }

  /// Blocks for at most `window` and reports whether the work finished.
  pub fn wait_timeout(&self, window: Duration) -> bool {
    let deadline = Instant::now() + window;
    let mut state = lock(&self.slot.state);
    while matches!(*state, State::Pending { .. }) {
      let now = Instant::now();
      if now >= deadline {
        return false;
      }
      state = match self.slot.settled.wait_timeout(state, deadline - now) {
        Ok((state, _)) => state,
        Err(poisoned) => poisoned.into_inner().0,
      };
    }
    true
  }

  /// Blocks until the work finishes.
  ///
  /// A failure is returned as the [`Error`] the work produced, not wrapped
  /// in a second layer.
  pub fn get(self) -> Result<T, Error> {
    let mut state = lock(&self.slot.state);
    loop {
      match mem::replace(&mut *state, State::Taken) {
        State::Ready(result) => return result,
        State::Taken => return Err(Error::Abandoned),
        pending => {
          *state = pending;
          state = self.slot.settled.wait(state).unwrap_or_else(|poisoned| poisoned.into_inner());
        }
      }
    }
  }

  /// Routes the outcome to exactly one of `success` or `failure`.
  ///
  /// Runs immediately on the calling thread when the work already finished,
  /// otherwise on the thread that completes it.
  pub fn on_complete<S, F>(self, success: S, failure: F)
  where
    S: FnOnce(T) + Send + 'static,
    F: FnOnce(Error) + Send + 'static,
  {
    let callback = move |result: Result<T, Error>| match result {
      Ok(value) => success(value),
      Err(error) => failure(error),
    };
    let mut state = lock(&self.slot.state);
    match mem::replace(&mut *state, State::Taken) {
      State::Ready(result) => {
        drop(state);
        callback(result);
      }
      State::Pending { waker, .. } => {
        *state = State::Pending { callback: Some(Box::new(callback)), waker };
      }
      State::Taken => {
        drop(state);
        callback(Err(Error::Abandoned));
      }
    }
  }
}

impl<T> Future for AsyncResult<T> {
  type Output = Result<T, Error>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut state = lock(&self.slot.state);
    match mem::replace(&mut *state, State::Taken) {
      State::Ready(result) => Poll::Ready(result),
      State::Pending { callback, .. } => {
        *state = State::Pending { callback, waker: Some(cx.waker().clone()) };
        Poll::Pending
      }
      State::Taken => Poll::Ready(Err(Error::Abandoned)),
    }
  }
}

impl<T> Debug for AsyncResult<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AsyncResult").field("done", &self.is_done()).finish()
  }
}
