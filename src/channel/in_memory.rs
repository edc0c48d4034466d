use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use super::*;

/// In-memory broadcast: a shared, ever-growing event vector plus one cursor
/// per subscriber. Useful for tests and single-process runs.
pub struct InMemoryBroadcast {
    inner: Arc<BroadcastInner>,
}

struct BroadcastInner {
    events: Mutex<Vec<BroadcastEvent>>,
    condvar: Condvar,
}

impl InMemoryBroadcast {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BroadcastInner {
                events: Mutex::new(Vec::new()),
                condvar: Condvar::new(),
            }),
        }
    }

    pub fn new_shared() -> SharedBroadcast {
        Arc::new(Self::new())
    }
}

impl Broadcast for InMemoryBroadcast {
    fn publish(&self, event: BroadcastEvent) -> Result<()> {
        self.inner.events.lock().push(event);
        self.inner.condvar.notify_all();
        Ok(())
    }

    fn subscribe(&self) -> Box<dyn BroadcastFeed> {
        Box::new(InMemoryFeed {
            inner: self.inner.clone(),
            cursor: 0,
        })
    }
}

struct InMemoryFeed {
    inner: Arc<BroadcastInner>,
    cursor: usize,
}

impl BroadcastFeed for InMemoryFeed {
    fn poll(&mut self, timeout: Option<Duration>) -> Result<Option<BroadcastEvent>> {
        let mut events = self.inner.events.lock();

        if events.len() == self.cursor {
            match timeout {
                Some(timeout) => {
                    let _ = self.inner.condvar.wait_for(&mut events, timeout);
                }
                None => self.inner.condvar.wait(&mut events),
            }
        }

        let next = events.get(self.cursor).cloned();
        if next.is_some() {
            self.cursor += 1;
        }
        Ok(next)
    }
}

/// In-memory many-to-one bid queue. FIFO across all senders as observed by
/// the single consumer.
pub struct InMemoryBidQueue {
    queue: Mutex<VecDeque<Bid>>,
    condvar: Condvar,
}

impl InMemoryBidQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
        }
    }
}

pub fn new_in_memory_bid_queue() -> (SharedBidSink, SharedBidSource) {
    let queue = Arc::new(InMemoryBidQueue::new());
    (queue.clone(), queue)
}

impl BidSink for InMemoryBidQueue {
    fn send(&self, bid: Bid) -> Result<()> {
        self.queue.lock().push_back(bid);
        self.condvar.notify_all();
        Ok(())
    }
}

impl BidSource for InMemoryBidQueue {
    fn poll(&self, timeout: Option<Duration>) -> Result<Option<Bid>> {
        let mut queue = self.queue.lock();

        if queue.is_empty() {
            match timeout {
                Some(timeout) => {
                    let _ = self.condvar.wait_for(&mut queue, timeout);
                }
                None => self.condvar.wait(&mut queue),
            }
        }

        Ok(queue.pop_front())
    }
}
