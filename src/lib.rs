//! Live message broadcaster over an append-only log.
//!
//! Messages are appended to a log stream by [`publisher::Publisher`]. One
//! [`tailer`] task follows the stream from its tip and hands each new
//! record to the [`hub::Hub`], which offers it to every live subscriber's
//! bounded queue. Subscriptions are opened through
//! [`subscription::SubscriptionManager`] and removed when their
//! cancellation token fires.

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod hub;
pub mod message;
pub mod publisher;
pub mod resolver;
pub mod store;
pub mod subscription;
pub mod tailer;

pub use error::{Error, Result};
pub use message::Message;
pub use resolver::Resolver;
