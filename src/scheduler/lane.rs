use std::{
  panic::{self, AssertUnwindSafe},
  sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc::{self, Receiver, SyncSender, TrySendError},
    Arc, Condvar, Mutex,
  },
  thread::{self, ThreadId},
  time::{Duration, Instant},
};

use tracing::{debug, error, warn};

use super::{Executor, Job, LaneConfig, RejectionPolicy};
use crate::{
  error::{Error, LaneError},
  rc::lock,
};

static LANE_SEQ: AtomicUsize = AtomicUsize::new(0);

enum Queue {
  Unbounded(mpsc::Sender<Job>),
  Bounded(SyncSender<Job>),
}

/// Count of jobs queued or running, with a way to wait for it to reach zero.
#[derive(Default)]
struct Idle {
  pending: Mutex<usize>,
  settled: Condvar,
}

impl Idle {
  fn enter(&self) { *lock(&self.pending) += 1; }

  fn leave(&self) {
    let mut pending = lock(&self.pending);
    *pending = pending.saturating_sub(1);
    if *pending == 0 {
      self.settled.notify_all();
    }
  }

  fn wait(&self, window: Duration) -> bool {
    let deadline = Instant::now() + window;
    let mut pending = lock(&self.pending);
    while *pending > 0 {
      let now = Instant::now();
      if now >= deadline {
        return false;
      }
      pending = match self.settled.wait_timeout(pending, deadline - now) {
        Ok((pending, _)) => pending,
        Err(poisoned) => poisoned.into_inner().0,
      };
    }
    true
  }
}

/// A single-worker execution unit.
///
/// Jobs run one at a time, in the order they were accepted, on one named
/// thread. A panicking job is logged and the worker moves on to the next one.
/// Dropping the lane lets the worker finish what is queued and exit.
pub struct Lane {
  name: String,
  queue: Queue,
  rejection: RejectionPolicy,
  idle: Arc<Idle>,
  worker: ThreadId,
}

impl Lane {
  /// Starts the worker thread, named `{name_prefix}-{seq}`.
  pub fn new(config: &LaneConfig) -> Result<Lane, LaneError> {
    let name = format!("{}-{}", config.name_prefix, LANE_SEQ.fetch_add(1, Ordering::Relaxed));
    let (queue, jobs) = match config.queue_bound {
      None => {
        let (tx, rx) = mpsc::channel();
        (Queue::Unbounded(tx), rx)
      }
      Some(bound) => {
        let (tx, rx) = mpsc::sync_channel(bound.max(1));
        (Queue::Bounded(tx), rx)
      }
    };
    let idle = Arc::new(Idle::default());
    let c_idle = idle.clone();
    let c_name = name.clone();
    let handle = thread::Builder::new()
      .name(name.clone())
      .spawn(move || work(&c_name, jobs, &c_idle))
      .map_err(|e| LaneError::Spawn { name: name.clone(), reason: e.to_string() })?;
    debug!(lane = %name, bound = ?config.queue_bound, "lane started");
    Ok(Lane { name, queue, rejection: config.rejection, idle, worker: handle.thread().id() })
  }

  #[inline]
  pub fn name(&self) -> &str { &self.name }

  /// Returns `true` when called from this lane's worker thread.
  pub fn is_worker_thread(&self) -> bool { thread::current().id() == self.worker }

  /// Waits for at most `window` until no job is queued or running.
  pub fn drain(&self, window: Duration) -> Result<(), LaneError> {
    if self.idle.wait(window) {
      Ok(())
    } else {
      warn!(lane = %self.name, ?window, "lane did not drain in time");
      Err(LaneError::DrainTimeout { lane: self.name.clone(), window })
    }
  }

  fn shut_down(&self) -> LaneError { LaneError::ShutDown { lane: self.name.clone() } }
}

fn work(name: &str, jobs: Receiver<Job>, idle: &Idle) {
  for job in jobs {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
      error!(lane = %name, cause = %Error::from_panic(payload), "lane job panicked");
    }
    idle.leave();
  }
  debug!(lane = %name, "lane stopped");
}

impl Executor for Lane {
  fn execute(&self, job: Job) -> Result<(), LaneError> {
    self.idle.enter();
    let accepted = match &self.queue {
      Queue::Unbounded(tx) => tx.send(job).map_err(|_| self.shut_down()),
      Queue::Bounded(tx) if self.rejection == RejectionPolicy::Block && !self.is_worker_thread() => {
        tx.send(job).map_err(|_| self.shut_down())
      }
      Queue::Bounded(tx) => tx.try_send(job).map_err(|e| match e {
        TrySendError::Full(_) => LaneError::Rejected { lane: self.name.clone() },
        TrySendError::Disconnected(_) => self.shut_down(),
      }),
    };
    if let Err(err) = &accepted {
      self.idle.leave();
      warn!(lane = %self.name, %err, "job not accepted");
    }
    accepted
  }
}

impl std::fmt::Debug for Lane {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Lane").field("name", &self.name).field("rejection", &self.rejection).finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc::channel;

  use super::*;

  fn blocker() -> (Job, mpsc::Sender<()>) {
    let (tx, rx) = channel::<()>();
    (Box::new(move || drop(rx.recv())), tx)
  }

  #[rxflow_macro::test(timeout_ms = 5000)]
  fn runs_jobs_in_order_on_named_thread() {
    let lane = Lane::new(&LaneConfig::new().name_prefix("ordered")).unwrap();
    let seen = Arc::new(Mutex::new(vec![]));
    for i in 0..100 {
      let c_seen = seen.clone();
      lane
        .execute(Box::new(move || {
          let name = thread::current().name().map(str::to_owned);
          c_seen.lock().unwrap().push((i, name));
        }))
        .unwrap();
    }
    lane.drain(Duration::from_secs(5)).unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(), (0..100).collect::<Vec<_>>());
    assert!(seen.iter().all(|(_, name)| name.as_deref() == Some(lane.name())));
    assert!(lane.name().starts_with("ordered-"));
  }

  #[rxflow_macro::test(timeout_ms = 5000)]
  fn survives_panicking_job() {
    let lane = Lane::new(&LaneConfig::default()).unwrap();
    lane.execute(Box::new(|| panic!("job failure"))).unwrap();
    let (tx, rx) = channel();
    lane.execute(Box::new(move || tx.send(7).unwrap())).unwrap();
    assert_eq!(rx.recv().unwrap(), 7);
  }

  #[rxflow_macro::test(timeout_ms = 5000)]
  fn abort_rejects_when_full() {
    let lane = Lane::new(&LaneConfig::new().queue_bound(1)).unwrap();
    let (block, release) = blocker();
    lane.execute(block).unwrap();
    // give the worker time to pick up the blocking job
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
      match lane.execute(Box::new(|| {})) {
        Ok(()) => break,
        Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(1)),
        Err(err) => panic!("queue never freed: {err}"),
      }
    }
    let err = lane.execute(Box::new(|| {})).unwrap_err();
    assert!(matches!(err, LaneError::Rejected { .. }));
    release.send(()).unwrap();
    lane.drain(Duration::from_secs(5)).unwrap();
  }

  #[rxflow_macro::test(timeout_ms = 5000)]
  fn drain_times_out_on_busy_lane() {
    let lane = Lane::new(&LaneConfig::default()).unwrap();
    let (block, release) = blocker();
    lane.execute(block).unwrap();
    let err = lane.drain(Duration::from_millis(20)).unwrap_err();
    assert!(matches!(err, LaneError::DrainTimeout { .. }));
    release.send(()).unwrap();
    assert!(lane.drain(Duration::from_secs(5)).is_ok());
  }

  #[rxflow_macro::test(timeout_ms = 5000)]
  fn knows_its_worker_thread() {
    let lane = Arc::new(Lane::new(&LaneConfig::default()).unwrap());
    assert!(!lane.is_worker_thread());
    let (tx, rx) = channel();
    let c_lane = lane.clone();
    lane.execute(Box::new(move || tx.send(c_lane.is_worker_thread()).unwrap())).unwrap();
    assert!(rx.recv().unwrap());
  }

  #[rxflow_macro::test(timeout_ms = 5000)]
  fn worker_never_blocks_on_own_full_queue() {
    let config = LaneConfig::new().queue_bound(1).rejection(RejectionPolicy::Block);
    let lane = Arc::new(Lane::new(&config).unwrap());
    let (tx, rx) = channel();
    let c_lane = lane.clone();
    lane
      .execute(Box::new(move || {
        let first = c_lane.execute(Box::new(|| {}));
        let second = c_lane.execute(Box::new(|| {}));
        tx.send((first.is_ok(), second)).unwrap();
      }))
      .unwrap();
    let (first, second) = rx.recv().unwrap();
    assert!(first);
    assert!(matches!(second, Err(LaneError::Rejected { .. })));
  }

  #[rxflow_macro::test(timeout_ms = 5000)]
  fn block_waits_for_room_on_full_queue() {
    let config = LaneConfig::new().queue_bound(1).rejection(RejectionPolicy::Block);
    let lane = Arc::new(Lane::new(&config).unwrap());
    let seen = Arc::new(Mutex::new(vec![]));
    let (block, release) = blocker();
    lane.execute(block).unwrap();
    let c_seen = seen.clone();
    // returns once the worker has taken the blocking job, leaving a full queue
    lane.execute(Box::new(move || c_seen.lock().unwrap().push(1))).unwrap();

    let (done_tx, done_rx) = channel();
    let c_lane = lane.clone();
    let c_seen = seen.clone();
    let submitter = thread::spawn(move || {
      let accepted = c_lane.execute(Box::new(move || c_seen.lock().unwrap().push(2)));
      done_tx.send(accepted).unwrap();
    });
    assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

    release.send(()).unwrap();
    assert!(done_rx.recv_timeout(Duration::from_secs(2)).unwrap().is_ok());
    submitter.join().unwrap();
    lane.drain(Duration::from_secs(2)).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
  }
}
