use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use super::delegate::SharedRelay;
use crate::{
  error::Error,
  publisher::Publisher,
  scheduler::{Executor, Lane, LaneConfig},
  subscriber::{Relay, Subscriber},
  subscription::SubscriptionRef,
};

/// Publisher returned by
/// [`PublisherExt::publish_on`](crate::publisher::PublisherExt::publish_on).
#[derive(Clone)]
pub struct PublishOnOp<P> {
  pub(crate) source: P,
  pub(crate) config: LaneConfig,
}

impl<T, P> Publisher<T> for PublishOnOp<P>
where
  P: Publisher<T>,
  T: Send + 'static,
{
  fn subscribe<S>(&self, downstream: S)
  where
    S: Subscriber<T> + Send + 'static,
  {
    let shared = SharedRelay::new(downstream);
    match Lane::new(&self.config) {
      Ok(lane) => {
        debug!(lane = lane.name(), "publishing on lane");
        self.source.subscribe(PublishOnSubscriber { shared, lane })
      }
      Err(err) => {
        warn!(%err, "no lane to publish on");
        shared.with(|relay| relay.error(err.into()));
      }
    }
  }
}

/// Hands every signal after `on_subscribe` to the lane.
struct PublishOnSubscriber<S, T> {
  shared: SharedRelay<S, T>,
  lane: Lane,
}

impl<S, T> PublishOnSubscriber<S, T>
where
  S: Subscriber<T> + Send + 'static,
  T: Send + 'static,
{
  /// Queues `signal` on the lane. A panic while delivering it cancels
  /// upstream and ends the stream with [`Error::Panicked`].
  fn dispatch(&self, signal: impl FnOnce(&mut Relay<S, T>) + Send + 'static) {
    let shared = self.shared.clone();
    let deliver = move || {
      if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| shared.with(signal))) {
        warn!("downstream panicked on publish lane");
        shared.fail(Error::from_panic(payload));
      }
    };
    if let Err(err) = self.lane.execute(Box::new(deliver)) {
      self.shared.fail(err.into());
    }
  }
}

impl<S, T> Subscriber<T> for PublishOnSubscriber<S, T>
where
  S: Subscriber<T> + Send + 'static,
  T: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.shared.with(|relay| relay.subscribe(subscription))
  }

  fn on_next(&mut self, item: T) { self.dispatch(move |relay| relay.next(item)) }

  fn on_error(&mut self, error: Error) { self.dispatch(move |relay| relay.error(error)) }

  fn on_complete(&mut self) { self.dispatch(|relay| relay.complete()) }
}
