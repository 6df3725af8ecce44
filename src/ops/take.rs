use tracing::debug;

use super::delegate::DelegatingSubscriber;
use crate::{
  publisher::Publisher,
  subscriber::{Relay, Subscriber},
};

/// Publisher returned by [`PublisherExt::take`](crate::publisher::PublisherExt::take).
#[derive(Clone)]
pub struct TakeOp<P> {
  pub(crate) source: P,
  pub(crate) count: u64,
}

impl<T, P> Publisher<T> for TakeOp<P>
where
  P: Publisher<T>,
  T: 'static,
{
  fn subscribe<S>(&self, downstream: S)
  where
    S: Subscriber<T> + Send + 'static,
  {
    let count = self.count;
    self.source.subscribe(DelegatingSubscriber::with_state(
      downstream,
      0_u64,
      move |seen: &mut u64, relay: &mut Relay<S, T>, item: T| {
        *seen += 1;
        if *seen <= count {
          relay.next(item);
        } else {
          debug!(count, "take limit reached, cancelling upstream");
          relay.cancel_upstream();
          relay.complete();
        }
      },
    ));
  }
}
