use std::{
  fmt,
  sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc,
  },
  thread,
  time::Duration,
};

use rxflow::{
  prelude::*,
  subscriber::probe::{probe, probe_with_demand, Probe, Signal},
};

const WAIT: Duration = Duration::from_secs(5);

/// Counts what passes between a publisher and its subscriber.
#[derive(Default)]
struct Tally {
  cancels: AtomicUsize,
  nexts: AtomicUsize,
}

struct Spied<P> {
  source: P,
  tally: Arc<Tally>,
}

struct SpiedSubscription {
  inner: SubscriptionRef,
  tally: Arc<Tally>,
}

impl Subscription for SpiedSubscription {
  fn request(&self, n: Demand) { self.inner.request(n) }

  fn cancel(&self) {
    self.tally.cancels.fetch_add(1, Ordering::SeqCst);
    self.inner.cancel()
  }
}

struct SpiedSubscriber<S> {
  downstream: S,
  tally: Arc<Tally>,
}

impl<T, S: Subscriber<T>> Subscriber<T> for SpiedSubscriber<S> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let tally = self.tally.clone();
    self.downstream.on_subscribe(Arc::new(SpiedSubscription { inner: subscription, tally }))
  }

  fn on_next(&mut self, item: T) {
    self.tally.nexts.fetch_add(1, Ordering::SeqCst);
    self.downstream.on_next(item)
  }

  fn on_error(&mut self, error: Error) { self.downstream.on_error(error) }

  fn on_complete(&mut self) { self.downstream.on_complete() }
}

impl<T, P: Publisher<T>> Publisher<T> for Spied<P> {
  fn subscribe<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + Send + 'static,
  {
    self.source.subscribe(SpiedSubscriber { downstream: subscriber, tally: self.tally.clone() })
  }
}

fn assert_well_formed<T: Clone + PartialEq + fmt::Debug>(probe: &Probe<T>) {
  let signals = probe.signals();
  assert_eq!(signals.first(), Some(&Signal::Subscribe));
  let subscribes = signals.iter().filter(|s| matches!(s, Signal::Subscribe)).count();
  assert_eq!(subscribes, 1);
  let terminals =
    signals.iter().filter(|s| matches!(s, Signal::Complete | Signal::Error)).count();
  assert!(terminals <= 1);
  if terminals == 1 {
    assert!(matches!(signals.last(), Some(Signal::Complete | Signal::Error)));
  }
}

#[rxflow_macro::test(timeout_ms = 20000)]
fn subscribe_comes_first_for_every_publisher() {
  for _ in 0..3 {
    let (p, s) = probe::<i32>();
    from_iter(0..10).subscribe(s);
    assert_well_formed(&p);

    let (p, s) = probe::<i32>();
    from_iter_on_demand(0..10).map(|v| v + 1).subscribe(s);
    assert_well_formed(&p);

    let (p, s) = probe::<i32>();
    from_iter(0..10).sum().subscribe(s);
    assert_well_formed(&p);

    let (p, s) = probe::<u64>();
    interval(Duration::from_millis(1)).take(2).subscribe(s);
    assert!(p.wait_for_terminal(WAIT));
    assert_well_formed(&p);

    let (p, s) = probe::<i32>();
    from_iter(0..10).subscribe_on(LaneConfig::default()).subscribe(s);
    assert!(p.wait_for_terminal(WAIT));
    assert_well_formed(&p);

    let (p, s) = probe::<i32>();
    from_iter(0..10).publish_on(LaneConfig::default()).subscribe(s);
    assert!(p.wait_for_terminal(WAIT));
    assert_well_formed(&p);
  }
}

#[rxflow_macro::test]
fn finite_sequence_in_order_then_complete() {
  let words = vec!["alpha", "beta", "gamma", "delta"];
  let (probe, subscriber) = probe::<&str>();
  from_iter(words.clone()).subscribe(subscriber);
  let mut expected = vec![Signal::Subscribe];
  expected.extend(words.into_iter().map(Signal::Next));
  expected.push(Signal::Complete);
  assert_eq!(probe.signals(), expected);
}

#[rxflow_macro::test]
fn sum_of_one_to_five() {
  let (probe, subscriber) = probe::<i32>();
  from_iter(vec![1, 2, 3, 4, 5]).sum().subscribe(subscriber);
  assert_eq!(probe.signals(), vec![Signal::Subscribe, Signal::Next(15), Signal::Complete]);
}

#[rxflow_macro::test(timeout_ms = 20000)]
fn take_three_ticks_then_cancel() {
  let tally = Arc::new(Tally::default());
  let period = Duration::from_millis(2);
  let (probe, subscriber) = probe::<u64>();
  Spied { source: interval(period), tally: tally.clone() }.take(3).subscribe(subscriber);
  assert!(probe.wait_for_terminal(WAIT));
  assert_eq!(probe.items(), vec![0, 1, 2]);
  assert!(probe.is_complete());
  assert_eq!(tally.cancels.load(Ordering::SeqCst), 1);
  thread::sleep(period * 20);
  assert_eq!(probe.next_count(), 3);
  // the fourth tick triggers the cancel, one more may race past it
  assert!(tally.nexts.load(Ordering::SeqCst) <= 5);
}

#[rxflow_macro::test]
fn map_composition_law() {
  let f = |v: i64| v * v;
  let g = |v: i64| v - 7;
  let input: Vec<i64> = (-20..20).collect();
  let (chained, s) = probe::<i64>();
  from_iter(input.clone()).map(f).map(g).subscribe(s);
  let (fused, s) = probe::<i64>();
  from_iter(input).map(move |x| g(f(x))).subscribe(s);
  assert_eq!(chained.signals(), fused.signals());
  assert!(chained.is_complete());
}

#[rxflow_macro::test(timeout_ms = 20000)]
fn publish_on_keeps_order_on_another_thread() {
  let (probe, subscriber) = probe::<usize>();
  from_iter(0..1000_usize).publish_on(LaneConfig::new().name_prefix("sink")).subscribe(subscriber);
  assert!(probe.wait_for_terminal(WAIT));
  assert_eq!(probe.items(), (0..1000).collect::<Vec<_>>());
  let here = thread::current().name().map(str::to_owned);
  let threads = probe.threads();
  assert!(threads[1..].iter().all(|t| *t != here));
}

#[rxflow_macro::test(timeout_ms = 20000)]
fn subscribe_on_then_publish_on_thread_names() {
  let (probe, subscriber) = probe::<i32>();
  from_iter(vec![3, 1, 2])
    .subscribe_on(LaneConfig::new().name_prefix("source"))
    .publish_on(LaneConfig::new().name_prefix("sink"))
    .subscribe(subscriber);
  assert!(probe.wait_for_terminal(WAIT));
  assert_eq!(probe.items(), vec![3, 1, 2]);
  let threads = probe.threads();
  assert!(threads[0].as_deref().is_some_and(|n| n.starts_with("source-")));
  assert!(threads[1..].iter().all(|t| t.as_deref().is_some_and(|n| n.starts_with("sink-"))));
}

#[rxflow_macro::test(timeout_ms = 20000)]
fn cancel_is_idempotent_everywhere() {
  let (p, s) = probe_with_demand::<i32>(None);
  from_iter(0..3).subscribe(s);
  p.cancel();
  p.cancel();
  p.request(Demand::UNBOUNDED);
  assert_eq!(p.signals(), vec![Signal::Subscribe]);

  let (p, s) = probe_with_demand::<i32>(None);
  from_iter_on_demand(0..3).take(2).subscribe(s);
  p.cancel();
  p.cancel();
  assert_eq!(p.signals(), vec![Signal::Subscribe]);

  let (p, s) = probe::<u64>();
  interval(Duration::from_millis(1)).subscribe(s);
  assert!(p.wait_for_items(1, WAIT));
  p.cancel();
  p.cancel();
  assert!(!p.is_terminated());
}

#[rxflow_macro::test(timeout_ms = 20000)]
fn on_demand_pipeline_respects_requests() {
  let (probe, subscriber) = probe_with_demand::<i32>(Demand::new(2));
  from_iter_on_demand(1..=10).map(|v| v * 10).subscribe(subscriber);
  assert_eq!(probe.items(), vec![10, 20]);
  probe.request(Demand::new(3).unwrap());
  assert_eq!(probe.items(), vec![10, 20, 30, 40, 50]);
  assert!(!probe.is_complete());
  probe.request(Demand::UNBOUNDED);
  assert_eq!(probe.next_count(), 10);
  assert!(probe.is_complete());
}

#[rxflow_macro::test(timeout_ms = 20000)]
fn work_results_through_lane() {
  let lane = Lane::new(&LaneConfig::new().name_prefix("work")).unwrap();
  let ok = lane.submit(|| Ok::<_, BoxError>(thread::current().name().map(str::to_owned)));
  let failed = lane.submit(|| Err::<u8, _>("disk full"));
  assert!(ok.get().unwrap().is_some_and(|n| n.starts_with("work-")));
  let error = failed.get().unwrap_err();
  assert_eq!(error.to_string(), "disk full");

  let (tx, rx) = mpsc::channel();
  let c_tx = tx.clone();
  lane
    .submit(|| Ok::<_, BoxError>(21 * 2))
    .on_complete(move |v| tx.send(Ok(v)).unwrap(), move |e| c_tx.send(Err(e)).unwrap());
  assert_eq!(rx.recv_timeout(WAIT).unwrap().unwrap(), 42);
}

#[rxflow_macro::test]
fn log_subscriber_drains_a_pipeline() {
  from_iter(vec!["x", "y"]).map(str::to_uppercase).subscribe(LogSubscriber::new("letters"));
}
