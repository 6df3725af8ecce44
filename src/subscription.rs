//! The Subscription role and the demand it carries.
//!
//! A [`Subscription`] is created per `subscribe` call and handed to the
//! Subscriber through `on_subscribe`. The Subscriber opens a demand window
//! with [`Subscription::request`] and may stop the flow with
//! [`Subscription::cancel`].

use std::{
  fmt::{Debug, Formatter},
  num::NonZeroU64,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
};

mod trampoline;
pub(crate) use trampoline::Trampoline;

/// Handle linking one Subscriber to one Publisher.
///
/// Both methods may be called from any thread, including from inside the
/// Subscriber's own signal handlers.
pub trait Subscription: Send + Sync {
  /// Adds `n` to the demand of this subscription.
  fn request(&self, n: Demand);

  /// Asks the Publisher to stop emitting.
  ///
  /// Idempotent and never produces a terminal signal. Delivery is push based,
  /// so an element already in flight may still arrive.
  fn cancel(&self);
}

/// The shape in which subscriptions travel through `on_subscribe`.
pub type SubscriptionRef = Arc<dyn Subscription>;

impl Debug for dyn Subscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("dyn Subscription").finish_non_exhaustive()
  }
}

// ============================================================================
// Demand
// ============================================================================

/// A positive request amount.
///
/// Zero cannot be requested; [`Demand::UNBOUNDED`] asks for everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Demand(NonZeroU64);

impl Demand {
  pub const ONE: Demand = Demand(NonZeroU64::MIN);
  pub const UNBOUNDED: Demand = Demand(NonZeroU64::MAX);

  /// Returns `None` for zero.
  pub fn new(n: u64) -> Option<Self> { NonZeroU64::new(n).map(Demand) }

  #[inline]
  pub fn get(self) -> u64 { self.0.get() }

  #[inline]
  pub fn is_unbounded(self) -> bool { self == Demand::UNBOUNDED }
}

impl From<NonZeroU64> for Demand {
  fn from(n: NonZeroU64) -> Self { Demand(n) }
}

/// Cumulative demand granted to a Publisher.
///
/// Additions saturate at `u64::MAX`, which is treated as unbounded and is
/// never consumed.
#[derive(Debug, Default)]
pub struct DemandCounter(AtomicU64);

impl DemandCounter {
  pub fn new() -> Self { Self::default() }

  /// Adds `n` and returns the outstanding demand after the addition.
  pub fn add(&self, n: Demand) -> u64 {
    let mut current = self.0.load(Ordering::Acquire);
    loop {
      let next = current.saturating_add(n.get());
      match self.0.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => return next,
        Err(actual) => current = actual,
      }
    }
  }

  /// Consumes one unit of demand. Returns `false` when none is outstanding.
  pub fn take_one(&self) -> bool {
    let mut current = self.0.load(Ordering::Acquire);
    loop {
      match current {
        0 => return false,
        u64::MAX => return true,
        n => match self.0.compare_exchange_weak(current, n - 1, Ordering::AcqRel, Ordering::Acquire)
        {
          Ok(_) => return true,
          Err(actual) => current = actual,
        },
      }
    }
  }

  #[inline]
  pub fn outstanding(&self) -> u64 { self.0.load(Ordering::Acquire) }

  #[inline]
  pub fn is_unbounded(&self) -> bool { self.outstanding() == u64::MAX }
}

// ============================================================================
// Inert subscription
// ============================================================================

struct EmptySubscription;

impl Subscription for EmptySubscription {
  fn request(&self, _n: Demand) {}

  fn cancel(&self) {}
}

/// A subscription that ignores every call.
///
/// Handed out when a failure has to be reported before any real subscription
/// exists, so that `on_subscribe` still comes first.
pub fn empty() -> SubscriptionRef { Arc::new(EmptySubscription) }
