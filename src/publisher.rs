//! The Publisher role and the operator methods every Publisher gets.

use std::{marker::PhantomData, ops::Add, sync::Arc, time::Duration};

use crate::{
  error::BoxError,
  ops::{
    map::{MapOp, TryMapOp},
    publish_on::PublishOnOp,
    subscribe_on::SubscribeOnOp,
    sum::SumOp,
    take::TakeOp,
  },
  scheduler::LaneConfig,
  subscriber::Subscriber,
};

pub mod from_iter;
pub mod interval;

pub use from_iter::{from_iter, from_iter_on_demand, try_from_iter, FromIter};
pub use interval::{interval, interval_on, Interval};

/// Producer of a signal stream.
///
/// Every call to [`Publisher::subscribe`] starts an independent subscription:
/// the subscriber first receives `on_subscribe` with a fresh
/// [`Subscription`], and everything else flows through its handlers. Nothing
/// is returned and nothing is raised; failures arrive as `on_error`.
///
/// [`Subscription`]: crate::subscription::Subscription
pub trait Publisher<T> {
  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + Send + 'static;
}

impl<T, P> Publisher<T> for Arc<P>
where
  P: Publisher<T> + ?Sized,
{
  #[inline]
  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + Send + 'static,
  {
    (**self).subscribe(subscriber)
  }
}

/// Operators, available on every [`Publisher`].
pub trait PublisherExt<T>: Publisher<T> + Sized {
  /// Applies `f` to every element.
  ///
  /// # Example
  ///
  /// ```
  /// use rxflow::prelude::*;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let seen = Arc::new(Mutex::new(vec![]));
  /// let c_seen = seen.clone();
  /// from_iter(vec![1, 2, 3])
  ///   .map(|v| v * 10)
  ///   .subscribe(lambda(move |v: i32| c_seen.lock().unwrap().push(v)));
  /// assert_eq!(*seen.lock().unwrap(), vec![10, 20, 30]);
  /// ```
  fn map<R, F>(self, f: F) -> MapOp<Self, F, T>
  where
    F: Fn(T) -> R,
  {
    MapOp { source: self, func: Arc::new(f), _item: PhantomData }
  }

  /// Like [`PublisherExt::map`] for a transform that can fail.
  ///
  /// The first `Err` cancels upstream and terminates the stream with
  /// [`Error::Failed`](crate::error::Error::Failed) carrying the cause.
  fn try_map<R, E, F>(self, f: F) -> TryMapOp<Self, F, T>
  where
    F: Fn(T) -> Result<R, E>,
    E: Into<BoxError>,
  {
    TryMapOp { source: self, func: Arc::new(f), _item: PhantomData }
  }

  /// Emits the total of all elements once upstream completes.
  ///
  /// An empty stream sums to `T::default()`. Errors are forwarded as they
  /// are and no total is emitted.
  ///
  /// # Example
  ///
  /// ```
  /// use rxflow::prelude::*;
  /// use std::sync::{Arc, Mutex};
  ///
  /// let total = Arc::new(Mutex::new(0));
  /// let c_total = total.clone();
  /// from_iter(1..=5)
  ///   .sum()
  ///   .subscribe(lambda(move |v: i32| *c_total.lock().unwrap() = v));
  /// assert_eq!(*total.lock().unwrap(), 15);
  /// ```
  fn sum(self) -> SumOp<Self>
  where
    T: Default + Add<Output = T>,
  {
    SumOp { source: self }
  }

  /// Forwards the first `count` elements.
  ///
  /// The next element to arrive cancels upstream and completes the stream.
  /// An upstream that terminates earlier is forwarded as is.
  fn take(self, count: u64) -> TakeOp<Self> { TakeOp { source: self, count } }

  /// Runs `subscribe` on the upstream, and with it every signal a
  /// synchronous upstream emits, on a lane of its own.
  fn subscribe_on(self, config: LaneConfig) -> SubscribeOnOp<Self> {
    SubscribeOnOp { source: Arc::new(self), config, wait: None }
  }

  /// Like [`PublisherExt::subscribe_on`], then waits at most `window` for the
  /// lane to go idle before returning.
  ///
  /// When the window passes first, upstream is cancelled and the stream
  /// terminates with [`LaneError::DrainTimeout`].
  ///
  /// [`LaneError::DrainTimeout`]: crate::error::LaneError::DrainTimeout
  fn subscribe_on_blocking(self, config: LaneConfig, window: Duration) -> SubscribeOnOp<Self> {
    SubscribeOnOp { source: Arc::new(self), config, wait: Some(window) }
  }

  /// Delivers `on_next`, `on_error` and `on_complete` to the downstream from
  /// a lane of its own, in the order upstream emitted them.
  ///
  /// # Example
  ///
  /// ```
  /// use rxflow::{prelude::*, subscriber::probe::probe};
  /// use std::time::Duration;
  ///
  /// let (probe, subscriber) = probe::<u8>();
  /// from_iter(vec![1, 2, 3])
  ///   .publish_on(LaneConfig::new().name_prefix("consumer"))
  ///   .subscribe(subscriber);
  /// assert!(probe.wait_for_terminal(Duration::from_secs(5)));
  /// assert_eq!(probe.items(), vec![1, 2, 3]);
  /// ```
  fn publish_on(self, config: LaneConfig) -> PublishOnOp<Self> {
    PublishOnOp { source: self, config }
  }
}

impl<T, P> PublisherExt<T> for P where P: Publisher<T> {}
