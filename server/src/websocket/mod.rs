//! Change notification for list documents.
//!
//! Every successful write is published to the [`SubscriptionHub`]; watch
//! requests and WebSocket subscriptions wait on it instead of polling the
//! database.

mod hub;
mod protocol;

pub use hub::{DocumentReceiver, SubscriptionHub};
pub use protocol::*;
