//! Error types carried by `on_error` and by [`AsyncResult`].
//!
//! Every failure is terminal for the subscription it happens in; nothing in
//! the crate retries.
//!
//! [`AsyncResult`]: crate::async_result::AsyncResult

use std::{any::Any, error::Error as StdError, time::Duration};

use thiserror::Error;

/// Any failure cause that can cross threads.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The error delivered through [`Subscriber::on_error`] and returned by
/// [`AsyncResult::get`].
///
/// [`Subscriber::on_error`]: crate::subscriber::Subscriber::on_error
/// [`AsyncResult::get`]: crate::async_result::AsyncResult::get
#[derive(Debug, Error)]
pub enum Error {
  /// Producing or transforming an element failed.
  #[error("{0}")]
  Failed(BoxError),

  /// A producer, operator or unit of work panicked.
  #[error("panicked: {0}")]
  Panicked(String),

  /// A lane or executor could not run the work.
  #[error(transparent)]
  Lane(#[from] LaneError),

  /// The unit of work was dropped before it produced a result.
  #[error("the unit of work was dropped before it completed")]
  Abandoned,
}

impl Error {
  /// Wraps `cause` as a production failure.
  ///
  /// A cause that already is an [`Error`] is returned as is, so failures
  /// that travel through several executors keep their original shape.
  pub fn failed(cause: impl Into<BoxError>) -> Self {
    match cause.into().downcast::<Error>() {
      Ok(err) => *err,
      Err(cause) => Error::Failed(cause),
    }
  }

  /// Returns the original failure cause when it has type `E`.
  pub fn cause<E: StdError + 'static>(&self) -> Option<&E> {
    match self {
      Error::Failed(cause) => cause.downcast_ref::<E>(),
      _ => None,
    }
  }

  pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let message = match payload.downcast::<String>() {
      Ok(msg) => *msg,
      Err(payload) => match payload.downcast::<&'static str>() {
        Ok(msg) => (*msg).to_owned(),
        Err(_) => "non-string panic payload".to_owned(),
      },
    };
    Error::Panicked(message)
  }
}

impl From<BoxError> for Error {
  fn from(cause: BoxError) -> Self { Error::failed(cause) }
}

/// Failures of the execution units behind the scheduling bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaneError {
  /// The lane queue is full and the rejection policy is `Abort`.
  #[error("lane `{lane}` rejected work: queue is full")]
  Rejected { lane: String },

  /// The lane worker is gone and accepts no more work.
  #[error("lane `{lane}` has shut down")]
  ShutDown { lane: String },

  /// Waiting for the lane to drain exceeded the wait window.
  #[error("gave up after {window:?} waiting for lane `{lane}` to drain")]
  DrainTimeout { lane: String, window: Duration },

  /// The operating system refused to start a worker thread.
  #[error("could not start thread `{name}`: {reason}")]
  Spawn { name: String, reason: String },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Error, PartialEq)]
  #[error("disk on fire")]
  struct DiskOnFire;

  #[rxflow_macro::test]
  fn failed_keeps_original_cause() {
    let err = Error::failed(DiskOnFire);
    assert_eq!(err.cause::<DiskOnFire>(), Some(&DiskOnFire));
    assert_eq!(err.to_string(), "disk on fire");
  }

  #[rxflow_macro::test]
  fn failed_does_not_double_wrap() {
    let inner = Error::Lane(LaneError::ShutDown { lane: "l-0".into() });
    let err = Error::failed(inner);
    assert!(matches!(err, Error::Lane(LaneError::ShutDown { .. })));
  }

  #[rxflow_macro::test]
  fn failed_from_message() {
    let err = Error::failed("bad element");
    assert!(matches!(err, Error::Failed(_)));
    assert_eq!(err.to_string(), "bad element");
  }

  #[rxflow_macro::test]
  fn panic_payloads() {
    let err = Error::from_panic(Box::new("static"));
    assert!(matches!(err, Error::Panicked(ref m) if m == "static"));
    let err = Error::from_panic(Box::new(String::from("owned")));
    assert!(matches!(err, Error::Panicked(ref m) if m == "owned"));
    let err = Error::from_panic(Box::new(7_u8));
    assert!(matches!(err, Error::Panicked(_)));
  }
}
