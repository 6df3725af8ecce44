//! Operators: Publisher/Subscriber pairs sitting between an upstream
//! Publisher and a downstream Subscriber.
//!
//! Each one is built from a [`delegate::DelegatingSubscriber`] or, when
//! signals cross threads, a [`delegate::SharedRelay`]. They are reached
//! through [`PublisherExt`](crate::publisher::PublisherExt).

pub mod delegate;
pub mod map;
pub mod publish_on;
pub mod subscribe_on;
pub mod sum;
pub mod take;

pub use delegate::{DelegatingSubscriber, SharedRelay};
pub use map::{MapOp, TryMapOp};
pub use publish_on::PublishOnOp;
pub use subscribe_on::SubscribeOnOp;
pub use sum::SumOp;
pub use take::TakeOp;
