//! The Subscriber role.
//!
//! A [`Subscriber`] receives `on_subscribe` exactly once, then zero or more
//! `on_next`, then at most one of `on_error` / `on_complete`. [`Relay`] is the
//! piece operators use to hold a downstream Subscriber and keep those rules
//! true no matter what arrives from upstream.

use std::{fmt::Debug, marker::PhantomData};

use tracing::{debug, trace, warn};

use crate::{
  error::Error,
  subscription::{self, Demand, SubscriptionRef},
};

pub mod probe;

/// Consumer of a signal stream.
///
/// All four handlers are required. They are never invoked concurrently for
/// one subscription, although successive calls may come from different
/// threads.
pub trait Subscriber<T> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef);

  fn on_next(&mut self, item: T);

  fn on_error(&mut self, error: Error);

  fn on_complete(&mut self);
}

impl<T, S> Subscriber<T> for Box<S>
where
  S: Subscriber<T> + ?Sized,
{
  #[inline]
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { (**self).on_subscribe(subscription) }

  #[inline]
  fn on_next(&mut self, item: T) { (**self).on_next(item) }

  #[inline]
  fn on_error(&mut self, error: Error) { (**self).on_error(error) }

  #[inline]
  fn on_complete(&mut self) { (**self).on_complete() }
}

/// Type-erased subscriber that can cross threads.
pub type BoxedSubscriber<'a, T> = Box<dyn Subscriber<T> + Send + 'a>;

// ============================================================================
// Relay
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
  Idle,
  Active,
  Done,
}

/// Owns a downstream Subscriber on behalf of an operator.
///
/// Stores the upstream subscription seen in `on_subscribe` and guards the
/// downstream against protocol slips: nothing is delivered after a terminal
/// signal, a second `on_subscribe` is cancelled, and a terminal signal that
/// arrives before `on_subscribe` is preceded by an inert subscription.
pub struct Relay<D, T> {
  downstream: D,
  upstream: Option<SubscriptionRef>,
  phase: Phase,
  _item: PhantomData<fn(T)>,
}

impl<D, T> Relay<D, T>
where
  D: Subscriber<T>,
{
  pub fn new(downstream: D) -> Self {
    Relay { downstream, upstream: None, phase: Phase::Idle, _item: PhantomData }
  }

  pub fn subscribe(&mut self, subscription: SubscriptionRef) {
    match self.phase {
      Phase::Idle => {
        self.upstream = Some(subscription.clone());
        self.phase = Phase::Active;
        self.downstream.on_subscribe(subscription);
      }
      Phase::Active => {
        warn!("second on_subscribe for one subscriber, cancelling it");
        subscription.cancel();
      }
      Phase::Done => {
        debug!("subscription arrived after the stream terminated, cancelling it");
        subscription.cancel();
      }
    }
  }

  pub fn next(&mut self, item: T) {
    match self.phase {
      Phase::Active => self.downstream.on_next(item),
      Phase::Idle => warn!("on_next before on_subscribe, dropping element"),
      Phase::Done => trace!("dropping element after terminal signal"),
    }
  }

  pub fn error(&mut self, error: Error) {
    match self.phase {
      Phase::Done => trace!(%error, "dropping error after terminal signal"),
      Phase::Idle => {
        self.phase = Phase::Done;
        self.downstream.on_subscribe(subscription::empty());
        self.downstream.on_error(error);
      }
      Phase::Active => {
        self.phase = Phase::Done;
        self.upstream = None;
        self.downstream.on_error(error);
      }
    }
  }

  pub fn complete(&mut self) {
    match self.phase {
      Phase::Done => trace!("dropping completion after terminal signal"),
      Phase::Idle => {
        self.phase = Phase::Done;
        self.downstream.on_subscribe(subscription::empty());
        self.downstream.on_complete();
      }
      Phase::Active => {
        self.phase = Phase::Done;
        self.upstream = None;
        self.downstream.on_complete();
      }
    }
  }

  /// Cancels the upstream subscription, if one has been seen.
  pub fn cancel_upstream(&self) {
    if let Some(upstream) = &self.upstream {
      upstream.cancel();
    }
  }

  #[inline]
  pub fn upstream(&self) -> Option<&SubscriptionRef> { self.upstream.as_ref() }

  #[inline]
  pub fn is_done(&self) -> bool { self.phase == Phase::Done }
}

// ============================================================================
// Closure subscriber
// ============================================================================

/// Builds a Subscriber from an `on_next` closure.
///
/// Requests [`Demand::UNBOUNDED`] on subscribe unless told otherwise. Errors
/// are logged and completion is ignored until handlers are attached with
/// [`LambdaSubscriber::with_error`] / [`LambdaSubscriber::with_complete`].
pub fn lambda<T, N>(next: N) -> LambdaSubscriber<N, fn(Error), fn()>
where
  N: FnMut(T),
{
  LambdaSubscriber { next, error: log_error, complete: ignore, demand: Demand::UNBOUNDED }
}

fn log_error(error: Error) { warn!(%error, "unhandled error signal"); }

fn ignore() {}

pub struct LambdaSubscriber<N, E, C> {
  next: N,
  error: E,
  complete: C,
  demand: Demand,
}

impl<N, E, C> LambdaSubscriber<N, E, C> {
  pub fn with_error<E2>(self, error: E2) -> LambdaSubscriber<N, E2, C>
  where
    E2: FnMut(Error),
  {
    let LambdaSubscriber { next, complete, demand, .. } = self;
    LambdaSubscriber { next, error, complete, demand }
  }

  pub fn with_complete<C2>(self, complete: C2) -> LambdaSubscriber<N, E, C2>
  where
    C2: FnMut(),
  {
    let LambdaSubscriber { next, error, demand, .. } = self;
    LambdaSubscriber { next, error, complete, demand }
  }

  /// Demand requested once, from `on_subscribe`.
  pub fn request(mut self, demand: Demand) -> Self {
    self.demand = demand;
    self
  }
}

impl<T, N, E, C> Subscriber<T> for LambdaSubscriber<N, E, C>
where
  N: FnMut(T),
  E: FnMut(Error),
  C: FnMut(),
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { subscription.request(self.demand) }

  fn on_next(&mut self, item: T) { (self.next)(item) }

  fn on_error(&mut self, error: Error) { (self.error)(error) }

  fn on_complete(&mut self) { (self.complete)() }
}

// ============================================================================
// Logging subscriber
// ============================================================================

/// Requests everything and logs every signal at `debug` level.
#[derive(Debug, Clone)]
pub struct LogSubscriber {
  label: String,
}

impl LogSubscriber {
  pub fn new(label: impl Into<String>) -> Self { LogSubscriber { label: label.into() } }
}

impl<T: Debug> Subscriber<T> for LogSubscriber {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    debug!(label = %self.label, "on_subscribe");
    subscription.request(Demand::UNBOUNDED);
  }

  fn on_next(&mut self, item: T) { debug!(label = %self.label, ?item, "on_next"); }

  fn on_error(&mut self, error: Error) { debug!(label = %self.label, %error, "on_error"); }

  fn on_complete(&mut self) { debug!(label = %self.label, "on_complete"); }
}
