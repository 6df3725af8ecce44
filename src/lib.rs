//! # rxflow: backpressure-aware Publisher/Subscriber streams
//!
//! A small engine for the Publisher / Subscriber / Subscription protocol with
//! a handful of operators on top of it.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxflow::prelude::*;
//!
//! from_iter(1..=5)
//!   .map(|v| v * 2)
//!   .sum()
//!   .subscribe(lambda(|total: i32| println!("total: {}", total)));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | Produces a stream; every `subscribe` starts an independent one |
//! | [`Subscriber`] | Receives `on_subscribe`, `on_next`*, then `on_error` or `on_complete` |
//! | [`Subscription`] | Lets the subscriber `request` more or `cancel` |
//! | [`PublisherExt`] | `map`, `try_map`, `sum`, `take`, `subscribe_on`, `publish_on` |
//! | [`Lane`] | Single-worker, strictly ordered execution unit |
//! | [`AsyncResult`] | Completion flag, blocking getter and callbacks for a unit of work |
//!
//! ## Signal rules
//!
//! For every subscription `on_subscribe` comes first and exactly once, at most
//! one terminal signal is delivered and it is the last, and no two signals are
//! ever delivered at the same time, even when operators move delivery to
//! another thread. `cancel` is idempotent and never produces a signal.
//!
//! ## Logging
//!
//! Lifecycle events are reported through [`tracing`]; the crate never installs
//! a subscriber of its own.
//!
//! [`Publisher`]: publisher::Publisher
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`PublisherExt`]: publisher::PublisherExt
//! [`Lane`]: scheduler::Lane
//! [`AsyncResult`]: async_result::AsyncResult
#[cfg(test)]
#[macro_use]
extern crate bencher;

pub mod async_result;
pub mod error;
pub mod ops;
pub mod prelude;
pub mod publisher;
pub mod rc;
pub mod scheduler;
pub mod subscriber;
pub mod subscription;

// Re-export the prelude module
pub use prelude::*;

#[cfg(doctest)]
mod readme {
  #![doc = include_str!("../README.md")]
}
