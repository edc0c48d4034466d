mod coalition;
mod config;
mod run;

use std::time::Duration;

use crate::{
    auction::Ledger,
    channel::{BroadcastFeed, InMemoryBroadcast},
    config::RunConfig,
    message::BroadcastEvent,
    report::SnapshotSink,
    service::RunContext,
};

pub(crate) fn test_ctx(config: RunConfig) -> RunContext {
    let (bid_sink, bid_source) = crate::channel::new_in_memory_bid_queue();
    RunContext {
        config,
        broadcast: InMemoryBroadcast::new_shared(),
        bid_sink,
        bid_source,
        ledger: Ledger::new_shared(),
        snapshots: SnapshotSink::new_shared(),
    }
}

pub(crate) fn drain_feed(feed: &mut Box<dyn BroadcastFeed>) -> Vec<BroadcastEvent> {
    let mut events = Vec::new();
    while let Some(event) = feed
        .poll(Some(Duration::ZERO))
        .expect("in-memory poll cannot fail")
    {
        events.push(event);
    }
    events
}
