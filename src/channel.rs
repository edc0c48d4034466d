//! Channel endpoints between the operator and the buyer population.
//!
//! The transport itself is an external collaborator; the core only sees
//! these traits. Two channels exist: a one-to-all broadcast the operator
//! publishes on, and a many-to-one queue carrying bids back. Every send is
//! fire-and-forget.
mod in_memory;

pub use self::in_memory::*;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::message::{Bid, BroadcastEvent};

/// Operator-side endpoint of the broadcast channel.
pub trait Broadcast {
    fn publish(&self, event: BroadcastEvent) -> Result<()>;

    /// A new private cursor over the stream, starting from the beginning.
    /// Each buyer holds its own; no events are lost to a late subscriber.
    fn subscribe(&self) -> Box<dyn BroadcastFeed>;
}

pub type SharedBroadcast = Arc<dyn Broadcast + Send + Sync + 'static>;

/// A buyer's view of the broadcast stream. Delivery preserves publish order.
pub trait BroadcastFeed: Send + Sync {
    /// Next unseen event, blocking up to `timeout` for one to arrive.
    /// `None` timeout blocks indefinitely.
    fn poll(&mut self, timeout: Option<Duration>) -> Result<Option<BroadcastEvent>>;
}

/// Buyer-side endpoint of the bid channel.
pub trait BidSink {
    fn send(&self, bid: Bid) -> Result<()>;
}

pub type SharedBidSink = Arc<dyn BidSink + Send + Sync + 'static>;

/// Operator-side endpoint of the bid channel. Bids are handed out one at a
/// time, in arrival order, so "first received wins" is well-defined even
/// when several buyers bid in the same window.
pub trait BidSource {
    fn poll(&self, timeout: Option<Duration>) -> Result<Option<Bid>>;
}

pub type SharedBidSource = Arc<dyn BidSource + Send + Sync + 'static>;
