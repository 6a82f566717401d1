//! `rover-middleware` – The Nervous System
//!
//! Fans live data out from the control loop to any number of remote
//! clients without the loop ever waiting on them.
//!
//! # Modules
//!
//! - [`bus`] – topic-based publish/subscribe bus built on Tokio broadcast
//!   channels.  Slow subscribers lose old frames; publishers never block.

pub mod bus;

pub use bus::{Event, EventBus, EventPayload, Topic, TopicReceiver};
