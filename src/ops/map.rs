use std::{marker::PhantomData, sync::Arc};

use super::delegate::DelegatingSubscriber;
use crate::{
  error::{BoxError, Error},
  publisher::Publisher,
  subscriber::{Relay, Subscriber},
};

/// Publisher returned by [`PublisherExt::map`](crate::publisher::PublisherExt::map).
pub struct MapOp<P, F, T> {
  pub(crate) source: P,
  pub(crate) func: Arc<F>,
  pub(crate) _item: PhantomData<fn(T)>,
}

impl<T, R, P, F> Publisher<R> for MapOp<P, F, T>
where
  P: Publisher<T>,
  F: Fn(T) -> R + Send + Sync + 'static,
  R: 'static,
{
  fn subscribe<S>(&self, downstream: S)
  where
    S: Subscriber<R> + Send + 'static,
  {
    let func = self.func.clone();
    self.source.subscribe(DelegatingSubscriber::with_state(
      downstream,
      (),
      move |_, relay: &mut Relay<S, R>, item: T| relay.next(func(item)),
    ));
  }
}

/// Publisher returned by
/// [`PublisherExt::try_map`](crate::publisher::PublisherExt::try_map).
pub struct TryMapOp<P, F, T> {
  pub(crate) source: P,
  pub(crate) func: Arc<F>,
  pub(crate) _item: PhantomData<fn(T)>,
}

impl<T, R, E, P, F> Publisher<R> for TryMapOp<P, F, T>
where
  P: Publisher<T>,
  F: Fn(T) -> Result<R, E> + Send + Sync + 'static,
  E: Into<BoxError>,
  R: 'static,
{
  fn subscribe<S>(&self, downstream: S)
  where
    S: Subscriber<R> + Send + 'static,
  {
    let func = self.func.clone();
    self.source.subscribe(DelegatingSubscriber::with_state(
      downstream,
      (),
      move |_, relay: &mut Relay<S, R>, item: T| match func(item) {
        Ok(mapped) => relay.next(mapped),
        Err(cause) => {
          relay.cancel_upstream();
          relay.error(Error::failed(cause));
        }
      },
    ));
  }
}

impl<P: Clone, F, T> Clone for MapOp<P, F, T> {
  fn clone(&self) -> Self {
    MapOp { source: self.source.clone(), func: self.func.clone(), _item: PhantomData }
  }
}

impl<P: Clone, F, T> Clone for TryMapOp<P, F, T> {
  fn clone(&self) -> Self {
    TryMapOp { source: self.source.clone(), func: self.func.clone(), _item: PhantomData }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
  };

  use crate::{
    error::Error,
    prelude::*,
    subscriber::probe::{probe, Signal},
    subscription::{Demand, Subscription, SubscriptionRef},
  };

  #[rxflow_macro::test]
  fn transforms_each_element() {
    let (probe, subscriber) = probe::<String>();
    from_iter(vec![1, 2, 3]).map(|v: i32| format!("#{v}")).subscribe(subscriber);
    assert_eq!(probe.items(), vec!["#1", "#2", "#3"]);
    assert!(probe.is_complete());
  }

  #[rxflow_macro::test]
  fn composition_matches_fused_transform() {
    let f = |v: i32| v * 3;
    let g = |v: i32| v - 1;
    let (chained, subscriber) = probe::<i32>();
    from_iter(0..50).map(f).map(g).subscribe(subscriber);
    let (fused, subscriber) = probe::<i32>();
    from_iter(0..50).map(move |v| g(f(v))).subscribe(subscriber);
    assert_eq!(chained.signals(), fused.signals());
  }

  #[rxflow_macro::test]
  fn forwards_upstream_error() {
    let (probe, subscriber) = probe::<i32>();
    try_from_iter(vec![Ok(1), Err("broken")]).map(|v: i32| v + 1).subscribe(subscriber);
    assert_eq!(probe.items(), vec![2]);
    assert!(matches!(probe.take_error(), Some(Error::Failed(_))));
  }

  #[rxflow_macro::test]
  fn panicking_transform_becomes_error() {
    let (probe, subscriber) = probe::<i32>();
    from_iter(vec![1, 0, 2]).map(|v: i32| 10 / v).subscribe(subscriber);
    assert_eq!(probe.items(), vec![10]);
    assert!(matches!(probe.take_error(), Some(Error::Panicked(_))));
  }

  #[derive(Debug)]
  struct Negative(i32);

  impl fmt::Display for Negative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} is negative", self.0) }
  }

  impl std::error::Error for Negative {}

  #[derive(Default)]
  struct Spy {
    cancelled: AtomicUsize,
  }

  impl Subscription for Spy {
    fn request(&self, _n: Demand) {}

    fn cancel(&self) { self.cancelled.fetch_add(1, Ordering::SeqCst); }
  }

  struct Manual(std::sync::Arc<Spy>);

  impl Publisher<i32> for Manual {
    fn subscribe<S>(&self, mut subscriber: S)
    where
      S: Subscriber<i32> + Send + 'static,
    {
      let subscription: SubscriptionRef = self.0.clone();
      subscriber.on_subscribe(subscription);
      for v in [4, -1, 9] {
        subscriber.on_next(v);
      }
      subscriber.on_complete();
    }
  }

  #[rxflow_macro::test]
  fn try_map_failure_cancels_and_errors() {
    let spy = std::sync::Arc::new(Spy::default());
    let (probe, subscriber) = probe::<u32>();
    Manual(spy.clone())
      .try_map(|v: i32| u32::try_from(v).map_err(|_| Negative(v)))
      .subscribe(subscriber);
    assert_eq!(spy.cancelled.load(Ordering::SeqCst), 1);
    assert_eq!(probe.signals(), vec![Signal::Subscribe, Signal::Next(4), Signal::Error]);
    let error = probe.take_error().unwrap();
    assert_eq!(error.cause::<Negative>().map(|n| n.0), Some(-1));
  }
}
