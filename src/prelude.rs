//! Prelude module for convenient imports
//!
//! Re-exports the protocol traits, the publishers and the types needed to
//! configure lanes.

pub use crate::{
  async_result::{promise, AsyncResult, Promise},
  error::{BoxError, Error, LaneError},
  publisher::{
    from_iter, from_iter_on_demand, interval, interval_on, try_from_iter, Publisher, PublisherExt,
  },
  scheduler::{Executor, Lane, LaneConfig, NewThread, RejectionPolicy},
  subscriber::{lambda, LogSubscriber, Subscriber},
  subscription::{Demand, Subscription, SubscriptionRef},
};
