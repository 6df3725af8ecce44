use std::sync::atomic::{AtomicUsize, Ordering};

/// Serializes the drain work of a source subscription.
///
/// Whoever bumps the counter from zero owns the drain and keeps running the
/// work until every concurrent or re-entrant caller has been accounted for.
/// Callers that arrive while a drain is active only leave a mark, so a
/// `request` issued from inside `on_next` never re-enters the emission loop.
#[derive(Debug)]
pub(crate) struct Trampoline {
  wip: AtomicUsize,
}

impl Trampoline {
  /// A trampoline whose drain is already owned by the caller.
  ///
  /// Used while `on_subscribe` runs: requests made from inside it are only
  /// recorded, and the caller drains through [`Trampoline::release`] once the
  /// subscriber has been parked where the drain can reach it.
  pub(crate) fn held() -> Self { Self { wip: AtomicUsize::new(1) } }

  pub(crate) fn run(&self, work: impl FnMut()) {
    if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
      self.drain(work);
    }
  }

  pub(crate) fn release(&self, work: impl FnMut()) { self.drain(work) }

  fn drain(&self, mut work: impl FnMut()) {
    let mut missed = 1;
    loop {
      work();
      missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if missed == 0 {
        break;
      }
    }
  }
}
