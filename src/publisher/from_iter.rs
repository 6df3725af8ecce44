//! Publishers over an in-memory sequence.
//!
//! [`from_iter`] emits the whole sequence on the first request, whatever its
//! size. [`from_iter_on_demand`] emits exactly as many elements as have been
//! requested. Both stop between two elements once cancelled.

use std::{
  iter::Peekable,
  panic::{self, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};

use tracing::{debug, trace};

use super::Publisher;
use crate::{
  error::{BoxError, Error},
  rc::lock,
  subscriber::Subscriber,
  subscription::{Demand, DemandCounter, Subscription, Trampoline},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pacing {
  /// Any request releases everything.
  All,
  /// Only granted demand is emitted.
  OnDemand,
}

/// Publisher created by [`from_iter`], [`try_from_iter`] and
/// [`from_iter_on_demand`].
///
/// Each subscription iterates its own clone of the sequence.
#[derive(Clone)]
pub struct FromIter<I: IntoIterator, T> {
  iter: I,
  lift: fn(I::Item) -> Result<T, Error>,
  pacing: Pacing,
}

/// Emits every element of `iter`, then completes.
///
/// Any request, whatever its amount, emits the whole sequence synchronously
/// on the requesting thread.
///
/// # Example
///
/// ```
/// use rxflow::{prelude::*, subscriber::probe::probe};
///
/// let (probe, subscriber) = probe::<char>();
/// from_iter("abc".chars()).subscribe(subscriber);
/// assert_eq!(probe.items(), vec!['a', 'b', 'c']);
/// assert!(probe.is_complete());
/// ```
pub fn from_iter<I>(iter: I) -> FromIter<I, I::Item>
where
  I: IntoIterator,
{
  FromIter { iter, lift: Ok, pacing: Pacing::All }
}

/// Emits the `Ok` elements of `iter` and terminates with the first `Err`.
pub fn try_from_iter<I, T, E>(iter: I) -> FromIter<I, T>
where
  I: IntoIterator<Item = Result<T, E>>,
  E: Into<BoxError>,
{
  FromIter { iter, lift: |item| item.map_err(Error::failed), pacing: Pacing::All }
}

/// Emits elements of `iter` as they are requested and completes as soon as
/// the sequence is exhausted, requested or not.
pub fn from_iter_on_demand<I>(iter: I) -> FromIter<I, I::Item>
where
  I: IntoIterator,
{
  FromIter { iter, lift: Ok, pacing: Pacing::OnDemand }
}

impl<I, T> Publisher<T> for FromIter<I, T>
where
  I: IntoIterator + Clone,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
  T: 'static,
{
  fn subscribe<S>(&self, mut subscriber: S)
  where
    S: Subscriber<T> + Send + 'static,
  {
    let subscription = Arc::new(IterSubscription {
      slot: Mutex::new(None),
      lift: self.lift,
      pacing: self.pacing,
      armed: AtomicBool::new(false),
      demand: DemandCounter::new(),
      cancelled: AtomicBool::new(false),
      drain: Trampoline::held(),
    });
    subscriber.on_subscribe(subscription.clone());
    *lock(&subscription.slot) =
      Some(Emission { items: self.iter.clone().into_iter().peekable(), subscriber });
    subscription.drain.release(|| subscription.emit());
  }
}

struct Emission<It: Iterator, S> {
  items: Peekable<It>,
  subscriber: S,
}

enum Step {
  /// Waiting for demand.
  Idle,
  /// A terminal signal went out or the subscription was cancelled.
  Stopped,
}

struct IterSubscription<It: Iterator, T, S> {
  slot: Mutex<Option<Emission<It, S>>>,
  lift: fn(It::Item) -> Result<T, Error>,
  pacing: Pacing,
  armed: AtomicBool,
  demand: DemandCounter,
  cancelled: AtomicBool,
  drain: Trampoline,
}

impl<It, T, S> IterSubscription<It, T, S>
where
  It: Iterator,
  S: Subscriber<T>,
{
  /// Runs under the trampoline only, so the slot is never contended.
  fn emit(&self) {
    let mut slot = lock(&self.slot);
    if self.cancelled.load(Ordering::Acquire) {
      if slot.take().is_some() {
        debug!("iterator subscription cancelled");
      }
      return;
    }
    let Some(emission) = slot.as_mut() else {
      return;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| self.pump(emission))) {
      Ok(Step::Idle) => {}
      Ok(Step::Stopped) => drop(slot.take()),
      Err(payload) => {
        if let Some(mut emission) = slot.take() {
          emission.subscriber.on_error(Error::from_panic(payload));
        }
      }
    }
  }

  fn pump(&self, emission: &mut Emission<It, S>) -> Step {
    loop {
      if self.cancelled.load(Ordering::Acquire) {
        return Step::Stopped;
      }
      match self.pacing {
        Pacing::All if !self.armed.load(Ordering::Acquire) => return Step::Idle,
        Pacing::OnDemand if emission.items.peek().is_some() && !self.demand.take_one() => {
          return Step::Idle;
        }
        _ => {}
      }
      let Some(raw) = emission.items.next() else {
        trace!("iterator exhausted");
        emission.subscriber.on_complete();
        return Step::Stopped;
      };
      match (self.lift)(raw) {
        Ok(item) => emission.subscriber.on_next(item),
        Err(error) => {
          emission.subscriber.on_error(error);
          return Step::Stopped;
        }
      }
    }
  }
}

impl<It, T, S> Subscription for IterSubscription<It, T, S>
where
  It: Iterator + Send,
  It::Item: Send,
  S: Subscriber<T> + Send,
{
  fn request(&self, n: Demand) {
    match self.pacing {
      Pacing::All => self.armed.store(true, Ordering::Release),
      Pacing::OnDemand => {
        self.demand.add(n);
      }
    }
    self.drain.run(|| self.emit());
  }

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
    self.drain.run(|| self.emit());
  }
}
