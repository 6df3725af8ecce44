use std::{mem, ops::Add};

use super::delegate::DelegatingSubscriber;
use crate::{
  publisher::Publisher,
  subscriber::{Relay, Subscriber},
};

/// Publisher returned by [`PublisherExt::sum`](crate::publisher::PublisherExt::sum).
#[derive(Clone)]
pub struct SumOp<P> {
  pub(crate) source: P,
}

impl<T, P> Publisher<T> for SumOp<P>
where
  P: Publisher<T>,
  T: Default + Add<Output = T> + Send + 'static,
{
  fn subscribe<S>(&self, downstream: S)
  where
    S: Subscriber<T> + Send + 'static,
  {
    let adder = DelegatingSubscriber::with_state(
      downstream,
      T::default(),
      |total: &mut T, _: &mut Relay<S, T>, item: T| *total = mem::take(total) + item,
    )
    .complete_with(|total: &mut T, relay: &mut Relay<S, T>| {
      relay.next(mem::take(total));
      relay.complete();
    });
    self.source.subscribe(adder);
  }
}
