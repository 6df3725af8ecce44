//! A recording Subscriber for tests and diagnostics.
//!
//! [`probe`] returns a [`ProbeSubscriber`] to hand to a Publisher and a
//! [`Probe`] that keeps observing what it received, from which thread, and
//! can block until the stream reaches a given point.

use std::{
  sync::{Arc, Condvar, Mutex},
  thread,
  time::{Duration, Instant},
};

use super::Subscriber;
use crate::{
  error::Error,
  rc::lock,
  subscription::{Demand, SubscriptionRef},
};

/// One recorded signal. Errors are kept aside, see [`Probe::take_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal<T> {
  Subscribe,
  Next(T),
  Error,
  Complete,
}

struct ProbeLog<T> {
  signals: Vec<Signal<T>>,
  threads: Vec<Option<String>>,
  error: Option<Error>,
  subscription: Option<SubscriptionRef>,
}

struct ProbeState<T> {
  log: Mutex<ProbeLog<T>>,
  changed: Condvar,
}

/// Inspection side of a probe.
pub struct Probe<T> {
  state: Arc<ProbeState<T>>,
}

/// Subscriber side of a probe.
pub struct ProbeSubscriber<T> {
  state: Arc<ProbeState<T>>,
  initial: Option<Demand>,
}

/// A probe whose subscriber requests everything on subscribe.
pub fn probe<T>() -> (Probe<T>, ProbeSubscriber<T>) { probe_with_demand(Some(Demand::UNBOUNDED)) }

/// A probe whose subscriber requests `initial` on subscribe, or nothing when
/// `None`; further demand goes through [`Probe::request`].
pub fn probe_with_demand<T>(initial: Option<Demand>) -> (Probe<T>, ProbeSubscriber<T>) {
  let state = Arc::new(ProbeState {
    log: Mutex::new(ProbeLog { signals: vec![], threads: vec![], error: None, subscription: None }),
    changed: Condvar::new(),
  });
  (Probe { state: state.clone() }, ProbeSubscriber { state, initial })
}

impl<T> ProbeSubscriber<T> {
  fn record(&self, signal: Signal<T>) {
    let mut log = lock(&self.state.log);
    log.signals.push(signal);
    log.threads.push(thread::current().name().map(str::to_owned));
    drop(log);
    self.state.changed.notify_all();
  }
}

impl<T> Subscriber<T> for ProbeSubscriber<T> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    lock(&self.state.log).subscription = Some(subscription.clone());
    self.record(Signal::Subscribe);
    if let Some(n) = self.initial {
      subscription.request(n);
    }
  }

  fn on_next(&mut self, item: T) { self.record(Signal::Next(item)) }

  fn on_error(&mut self, error: Error) {
    lock(&self.state.log).error = Some(error);
    self.record(Signal::Error);
  }

  fn on_complete(&mut self) { self.record(Signal::Complete) }
}

impl<T> Clone for Probe<T> {
  fn clone(&self) -> Self { Probe { state: self.state.clone() } }
}

impl<T> Probe<T> {
  pub fn signals(&self) -> Vec<Signal<T>>
  where
    T: Clone,
  {
    lock(&self.state.log).signals.clone()
  }

  pub fn items(&self) -> Vec<T>
  where
    T: Clone,
  {
    let log = lock(&self.state.log);
    log
      .signals
      .iter()
      .filter_map(|s| match s {
        Signal::Next(v) => Some(v.clone()),
        _ => None,
      })
      .collect()
  }

  pub fn next_count(&self) -> usize {
    let log = lock(&self.state.log);
    log.signals.iter().filter(|s| matches!(s, Signal::Next(_))).count()
  }

  /// Name of the thread each signal was delivered on, in delivery order.
  pub fn threads(&self) -> Vec<Option<String>> { lock(&self.state.log).threads.clone() }

  pub fn is_complete(&self) -> bool {
    lock(&self.state.log).signals.iter().any(|s| matches!(s, Signal::Complete))
  }

  pub fn is_errored(&self) -> bool {
    lock(&self.state.log).signals.iter().any(|s| matches!(s, Signal::Error))
  }

  pub fn is_terminated(&self) -> bool { self.is_complete() || self.is_errored() }

  pub fn take_error(&self) -> Option<Error> { lock(&self.state.log).error.take() }

  pub fn subscription(&self) -> Option<SubscriptionRef> {
    lock(&self.state.log).subscription.clone()
  }

  /// Requests `n` more through the recorded subscription.
  pub fn request(&self, n: Demand) {
    if let Some(subscription) = self.subscription() {
      subscription.request(n);
    }
  }

  pub fn cancel(&self) {
    if let Some(subscription) = self.subscription() {
      subscription.cancel();
    }
  }

  /// Blocks until a terminal signal arrives or `timeout` passes.
  pub fn wait_for_terminal(&self, timeout: Duration) -> bool {
    self.wait_until(timeout, |log| {
      log.signals.iter().any(|s| matches!(s, Signal::Complete | Signal::Error))
    })
  }

  /// Blocks until at least `n` elements arrived or `timeout` passes.
  pub fn wait_for_items(&self, n: usize, timeout: Duration) -> bool {
    self.wait_until(timeout, |log| {
      log.signals.iter().filter(|s| matches!(s, Signal::Next(_))).count() >= n
    })
  }

  fn wait_until(&self, timeout: Duration, ready: impl Fn(&ProbeLog<T>) -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    let mut log = lock(&self.state.log);
    loop {
      if ready(&log) {
        return true;
      }
      let now = Instant::now();
      if now >= deadline {
        return false;
      }
      log = match self.state.changed.wait_timeout(log, deadline - now) {
        Ok((log, _)) => log,
        Err(poisoned) => poisoned.into_inner().0,
      };
    }
  }
}
