use std::{
  panic::{self, AssertUnwindSafe},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, OnceLock,
  },
  thread::{self, Thread},
  time::{Duration, Instant},
};

use tracing::{debug, warn};

use super::Publisher;
use crate::{
  error::Error,
  rc::lock,
  scheduler::{Executor, NewThread},
  subscriber::Subscriber,
  subscription::{Demand, Subscription},
};

/// Publisher created by [`interval`] and [`interval_on`].
pub struct Interval<E> {
  period: Duration,
  executor: Arc<E>,
}

impl<E> Clone for Interval<E> {
  fn clone(&self) -> Self { Interval { period: self.period, executor: self.executor.clone() } }
}

/// Emits `0, 1, 2, ...` every `period`, starting immediately, on a timer
/// thread of its own.
///
/// The first request starts the timer; the amount requested is not tracked.
/// The stream never completes: it runs until cancelled.
///
/// # Example
///
/// ```
/// use rxflow::{prelude::*, subscriber::probe::probe};
/// use std::time::Duration;
///
/// let (probe, subscriber) = probe::<u64>();
/// interval(Duration::from_millis(1)).take(3).subscribe(subscriber);
/// assert!(probe.wait_for_terminal(Duration::from_secs(5)));
/// assert_eq!(probe.items(), vec![0, 1, 2]);
/// ```
pub fn interval(period: Duration) -> Interval<NewThread> {
  interval_on(period, NewThread::new("rxflow-interval"))
}

/// Like [`interval`], with the timer loop running as one job of `executor`.
///
/// The job occupies its thread until the subscription is cancelled.
pub fn interval_on<E>(period: Duration, executor: E) -> Interval<E>
where
  E: Executor,
{
  Interval { period, executor: Arc::new(executor) }
}

impl<E> Publisher<u64> for Interval<E>
where
  E: Executor + Send + Sync + 'static,
{
  fn subscribe<S>(&self, mut subscriber: S)
  where
    S: Subscriber<u64> + Send + 'static,
  {
    let ticker = Arc::new(Ticker {
      period: self.period,
      executor: self.executor.clone(),
      subscriber: Mutex::new(None),
      parked: AtomicBool::new(false),
      armed: AtomicBool::new(false),
      started: AtomicBool::new(false),
      cancelled: AtomicBool::new(false),
      timer: OnceLock::new(),
    });
    subscriber.on_subscribe(Arc::new(IntervalSubscription(ticker.clone())));
    *lock(&ticker.subscriber) = Some(subscriber);
    ticker.parked.store(true, Ordering::SeqCst);
    if ticker.cancelled.load(Ordering::SeqCst) {
      ticker.release();
      return;
    }
    Ticker::start(&ticker);
  }
}

struct Ticker<E, S> {
  period: Duration,
  executor: Arc<E>,
  subscriber: Mutex<Option<S>>,
  parked: AtomicBool,
  armed: AtomicBool,
  started: AtomicBool,
  cancelled: AtomicBool,
  timer: OnceLock<Thread>,
}

impl<E, S> Ticker<E, S>
where
  E: Executor + Send + Sync + 'static,
  S: Subscriber<u64> + Send + 'static,
{
  /// Starts the timer once the subscriber is parked and a request arrived,
  /// whichever happens last.
  fn start(this: &Arc<Self>) {
    if !this.parked.load(Ordering::SeqCst) || !this.armed.load(Ordering::SeqCst) {
      return;
    }
    if this.started.swap(true, Ordering::SeqCst) {
      return;
    }
    let ticker = this.clone();
    if let Err(err) = this.executor.execute(Box::new(move || ticker.run())) {
      warn!(%err, "interval timer could not start");
      let subscriber = lock(&this.subscriber).take();
      if let Some(mut subscriber) = subscriber {
        subscriber.on_error(err.into());
      }
    }
  }

  fn run(&self) {
    let _ = self.timer.set(thread::current());
    debug!(period = ?self.period, "interval timer started");
    let mut due = Instant::now();
    let mut tick = 0_u64;
    'ticks: loop {
      loop {
        if self.cancelled.load(Ordering::Acquire) {
          break 'ticks;
        }
        let now = Instant::now();
        if now >= due {
          break;
        }
        thread::park_timeout(due - now);
      }
      let mut slot = lock(&self.subscriber);
      let Some(subscriber) = slot.as_mut() else {
        break;
      };
      if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_next(tick))) {
        subscriber.on_error(Error::from_panic(payload));
        break;
      }
      let Some(next) = due.checked_add(self.period) else {
        warn!(period = ?self.period, "interval period overflows the clock");
        subscriber.on_error(Error::failed("interval period overflows the clock"));
        break;
      };
      drop(slot);
      tick += 1;
      due = next;
    }
    self.release();
    debug!(ticks = tick, "interval timer stopped");
  }
}

impl<E, S> Ticker<E, S> {
  /// Drops the subscriber, breaking the cycle through its subscription.
  fn release(&self) {
    let subscriber = lock(&self.subscriber).take();
    drop(subscriber);
  }
}

struct IntervalSubscription<E, S>(Arc<Ticker<E, S>>);

impl<E, S> Subscription for IntervalSubscription<E, S>
where
  E: Executor + Send + Sync + 'static,
  S: Subscriber<u64> + Send + 'static,
{
  fn request(&self, _n: Demand) {
    self.0.armed.store(true, Ordering::SeqCst);
    Ticker::start(&self.0);
  }

  fn cancel(&self) {
    if !self.0.cancelled.swap(true, Ordering::SeqCst) {
      debug!("interval cancelled");
    }
    if !self.0.started.load(Ordering::SeqCst) {
      // no timer will ever run to release it
      self.0.release();
    } else if let Some(timer) = self.0.timer.get() {
      timer.unpark();
    }
  }
}
