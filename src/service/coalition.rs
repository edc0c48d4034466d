//! Coalitions
//!
//! A coalition pools the budgets of two or three buyers and bids as one
//! economic unit under its own name. Members are referenced by id through
//! a roster map rather than holding each other directly; the pooled budget
//! is recomputed from member budgets every time it is needed.
use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, warn};

use crate::{
    auction::{Amount, BuyerId, BuyerIdRef, ItemId},
    channel::{BidSink, Broadcast, BroadcastFeed, SharedBidSink},
    message::{AuctionInfo, Bid, BroadcastEvent, Confirmation},
    report::SharedSnapshotSink,
    service::{BidStatus, Buyer, LoopService, RunContext},
};

const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Membership is fixed at formation; only ids are stored here.
#[derive(Clone, Debug)]
pub struct Coalition {
    pub name: BuyerId,
    pub members: Vec<BuyerId>,
}

/// Greedy partition of the buyer population into coalitions of up to three.
/// A trailing pair still forms a coalition; a trailing singleton stays an
/// independent buyer.
pub fn form_coalitions(mut buyers: Vec<Buyer>) -> (Vec<(Coalition, Vec<Buyer>)>, Vec<Buyer>) {
    let mut groups = Vec::new();
    while buyers.len() > 1 {
        let take = buyers.len().min(3);
        let members: Vec<Buyer> = buyers.drain(..take).collect();
        let coalition = Coalition {
            name: format!("coalition-{}", groups.len() + 1),
            members: members.iter().map(|member| member.id.clone()).collect(),
        };
        groups.push((coalition, members));
    }
    (groups, buyers)
}

pub struct CoalitionService {
    coalition: Coalition,
    roster: BTreeMap<BuyerId, Buyer>,
    lots: BTreeMap<ItemId, BidStatus>,
    feed: Box<dyn BroadcastFeed>,
    bid_sink: SharedBidSink,
    snapshots: SharedSnapshotSink,
}

impl CoalitionService {
    pub fn new(ctx: &RunContext, coalition: Coalition, members: Vec<Buyer>) -> Self {
        Self {
            coalition,
            roster: members
                .into_iter()
                .map(|member| (member.id.clone(), member))
                .collect(),
            lots: BTreeMap::new(),
            feed: ctx.broadcast.subscribe(),
            bid_sink: ctx.bid_sink.clone(),
            snapshots: ctx.snapshots.clone(),
        }
    }

    pub fn pooled_budget(&self) -> Amount {
        self.coalition
            .members
            .iter()
            .filter_map(|id| self.roster.get(id))
            .map(|member| member.budget)
            .sum()
    }

    #[allow(unused)]
    pub fn member(&self, id: BuyerIdRef) -> Option<&Buyer> {
        self.roster.get(id)
    }

    pub fn handle_event(&mut self, event: BroadcastEvent) -> Result<()> {
        match event {
            BroadcastEvent::AuctionInfo(info) => self.on_auction_info(&info),
            BroadcastEvent::Confirmation(confirmation) => {
                self.on_confirmation(&confirmation);
                Ok(())
            }
        }
    }

    fn on_auction_info(&mut self, info: &AuctionInfo) -> Result<()> {
        match self.lots.get(&info.item_id) {
            Some(BidStatus::Pending) | Some(BidStatus::Closed) => return Ok(()),
            _ => {}
        }
        self.lots.insert(info.item_id, BidStatus::Open);

        if self.pooled_budget() < info.price {
            return Ok(());
        }

        debug!(
            coalition = %self.coalition.name,
            item = info.item_id,
            price = info.price,
            "bidding with pooled budget"
        );
        self.lots.insert(info.item_id, BidStatus::Pending);
        self.bid_sink.send(Bid {
            buyer_id: self.coalition.name.clone(),
            item_id: info.item_id,
        })
    }

    fn on_confirmation(&mut self, confirmation: &Confirmation) {
        if confirmation.buyer_id != self.coalition.name {
            return;
        }
        self.lots.insert(confirmation.item_id, BidStatus::Closed);

        // First member in membership order whose own budget covers the
        // price takes the lot. The pooled budget can admit a bid no single
        // member can pay for; such a purchase is not credited to anyone.
        let payer = self
            .coalition
            .members
            .iter()
            .find(|id| {
                self.roster
                    .get(*id)
                    .map_or(false, |member| member.budget >= confirmation.price)
            })
            .cloned();

        match payer.and_then(|id| self.roster.get_mut(&id)) {
            Some(member) => member.apply_purchase(
                confirmation.item_id,
                confirmation.item_kind,
                confirmation.quality,
                confirmation.price,
            ),
            None => warn!(
                coalition = %self.coalition.name,
                item = confirmation.item_id,
                price = confirmation.price,
                "no member can cover the price alone; purchase not credited"
            ),
        }
    }
}

impl LoopService for CoalitionService {
    fn run_iteration(&mut self) -> Result<()> {
        if let Some(event) = self.feed.poll(Some(POLL_TIMEOUT))? {
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        while let Some(event) = self.feed.poll(Some(Duration::ZERO))? {
            self.handle_event(event)?;
        }
        for member in self.roster.values() {
            self.snapshots.push(member.clone());
        }
        Ok(())
    }
}
