use std::{
  panic::{self, AssertUnwindSafe},
  sync::Arc,
  time::Duration,
};

use tracing::{debug, warn};

use super::delegate::SharedRelay;
use crate::{
  error::Error,
  publisher::Publisher,
  scheduler::{Executor, Lane, LaneConfig},
  subscriber::Subscriber,
};

/// Publisher returned by
/// [`PublisherExt::subscribe_on`](crate::publisher::PublisherExt::subscribe_on) and
/// [`PublisherExt::subscribe_on_blocking`](crate::publisher::PublisherExt::subscribe_on_blocking).
///
/// Every subscription gets a lane of its own. Only the `subscribe` call is
/// moved there; a later `request` runs wherever it is made.
pub struct SubscribeOnOp<P> {
  pub(crate) source: Arc<P>,
  pub(crate) config: LaneConfig,
  pub(crate) wait: Option<Duration>,
}

impl<P> Clone for SubscribeOnOp<P> {
  fn clone(&self) -> Self {
    SubscribeOnOp { source: self.source.clone(), config: self.config.clone(), wait: self.wait }
  }
}

impl<T, P> Publisher<T> for SubscribeOnOp<P>
where
  P: Publisher<T> + Send + Sync + 'static,
  T: 'static,
{
  fn subscribe<S>(&self, downstream: S)
  where
    S: Subscriber<T> + Send + 'static,
  {
    let shared = SharedRelay::new(downstream);
    let lane = match Lane::new(&self.config) {
      Ok(lane) => lane,
      Err(err) => {
        warn!(%err, "no lane to subscribe on");
        shared.with(|relay| relay.error(err.into()));
        return;
      }
    };
    debug!(lane = lane.name(), "subscribing upstream on lane");
    let source = self.source.clone();
    let c_shared = shared.clone();
    let start = move || {
      let guard = c_shared.clone();
      if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| source.subscribe(c_shared))) {
        warn!("upstream panicked while subscribing on lane");
        guard.fail(Error::from_panic(payload));
      }
    };
    if let Err(err) = lane.execute(Box::new(start)) {
      shared.with(|relay| relay.error(err.into()));
      return;
    }
    if let Some(window) = self.wait {
      if let Err(err) = lane.drain(window) {
        shared.fail(err.into());
      }
    }
  }
}
