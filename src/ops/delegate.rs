//! Signal relaying by composition.
//!
//! An operator is a [`DelegatingSubscriber`] built from a downstream, a piece
//! of private state and the one or two hooks it cares about. Everything else
//! is forwarded through the [`Relay`], which keeps the downstream's view of the
//! stream well formed.

use crate::{
  error::Error,
  rc::MutArc,
  subscriber::{Relay, Subscriber},
  subscription::SubscriptionRef,
};

/// `on_next` hook that passes the element through.
pub type ForwardNext<D, T> = fn(&mut (), &mut Relay<D, T>, T);

/// `on_complete` hook that passes completion through.
pub type ForwardComplete<D, R, St> = fn(&mut St, &mut Relay<D, R>);

fn forward_next<D: Subscriber<T>, T>(_: &mut (), relay: &mut Relay<D, T>, item: T) {
  relay.next(item)
}

fn forward_complete<D: Subscriber<R>, R, St>(_: &mut St, relay: &mut Relay<D, R>) {
  relay.complete()
}

/// A Subscriber that forwards to a downstream Subscriber of `R`, letting the
/// owner replace the handling of `on_next` and optionally `on_complete`.
///
/// `on_subscribe` and `on_error` always forward. Hooks are not called once
/// the relay has delivered a terminal signal.
pub struct DelegatingSubscriber<D, R, St, N, C> {
  relay: Relay<D, R>,
  state: St,
  next: N,
  complete: C,
}

impl<D, R, St, N> DelegatingSubscriber<D, R, St, N, ForwardComplete<D, R, St>>
where
  D: Subscriber<R>,
{
  pub fn with_state<T>(downstream: D, state: St, next: N) -> Self
  where
    N: FnMut(&mut St, &mut Relay<D, R>, T),
  {
    DelegatingSubscriber {
      relay: Relay::new(downstream),
      state,
      next,
      complete: forward_complete::<D, R, St>,
    }
  }
}

impl<D, T> DelegatingSubscriber<D, T, (), ForwardNext<D, T>, ForwardComplete<D, T, ()>>
where
  D: Subscriber<T>,
{
  /// Forwards all four signals unchanged.
  pub fn forwarding(downstream: D) -> Self {
    DelegatingSubscriber::with_state(downstream, (), forward_next::<D, T> as ForwardNext<D, T>)
  }
}

impl<D, R, St, N, C> DelegatingSubscriber<D, R, St, N, C> {
  /// Replaces the completion hook.
  pub fn complete_with<C2>(self, complete: C2) -> DelegatingSubscriber<D, R, St, N, C2>
  where
    C2: FnMut(&mut St, &mut Relay<D, R>),
  {
    let DelegatingSubscriber { relay, state, next, .. } = self;
    DelegatingSubscriber { relay, state, next, complete }
  }
}

impl<T, D, R, St, N, C> Subscriber<T> for DelegatingSubscriber<D, R, St, N, C>
where
  D: Subscriber<R>,
  N: FnMut(&mut St, &mut Relay<D, R>, T),
  C: FnMut(&mut St, &mut Relay<D, R>),
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) { self.relay.subscribe(subscription) }

  fn on_next(&mut self, item: T) {
    if !self.relay.is_done() {
      (self.next)(&mut self.state, &mut self.relay, item)
    }
  }

  fn on_error(&mut self, error: Error) { self.relay.error(error) }

  fn on_complete(&mut self) {
    if !self.relay.is_done() {
      (self.complete)(&mut self.state, &mut self.relay)
    }
  }
}

/// A [`Relay`] reachable from several threads.
///
/// Signals go through [`SharedRelay::with`], which holds the relay for the
/// duration of one delivery. [`SharedRelay::fail`] may be called from
/// anywhere, including from inside a delivery on the same thread: the failure
/// is parked and delivered, after cancelling upstream, by whichever caller
/// releases the relay next.
pub struct SharedRelay<D, T> {
  relay: MutArc<Relay<D, T>>,
  fault: MutArc<Option<Error>>,
}

impl<D, T> Clone for SharedRelay<D, T> {
  fn clone(&self) -> Self { SharedRelay { relay: self.relay.clone(), fault: self.fault.clone() } }
}

impl<D, T> SharedRelay<D, T>
where
  D: Subscriber<T>,
{
  pub fn new(downstream: D) -> Self {
    SharedRelay { relay: MutArc::own(Relay::new(downstream)), fault: MutArc::own(None) }
  }

  pub fn with<O>(&self, f: impl FnOnce(&mut Relay<D, T>) -> O) -> O {
    let out = f(&mut self.relay.rc_deref_mut());
    self.flush();
    out
  }

  /// Terminates the stream with `error` and cancels upstream.
  ///
  /// Only the first parked failure is kept.
  pub fn fail(&self, error: Error) {
    {
      let mut fault = self.fault.rc_deref_mut();
      if fault.is_none() {
        *fault = Some(error);
      }
    }
    self.flush();
  }

  /// Delivers a parked failure unless another caller holds the relay.
  ///
  /// A failure parked while this caller held the relay is picked up on the
  /// next turn: the fault is checked again only after the relay is released.
  fn flush(&self) {
    loop {
      let Some(mut relay) = self.relay.try_rc_deref_mut() else {
        return;
      };
      let fault = self.fault.rc_deref_mut().take();
      if let Some(error) = fault {
        relay.cancel_upstream();
        relay.error(error);
      }
      drop(relay);
      let parked = self.fault.rc_deref_mut().is_some();
      if !parked {
        return;
      }
    }
  }
}

impl<D, T> Subscriber<T> for SharedRelay<D, T>
where
  D: Subscriber<T>,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.with(|relay| relay.subscribe(subscription))
  }

  fn on_next(&mut self, item: T) { self.with(|relay| relay.next(item)) }

  fn on_error(&mut self, error: Error) { self.with(|relay| relay.error(error)) }

  fn on_complete(&mut self) { self.with(|relay| relay.complete()) }
}
