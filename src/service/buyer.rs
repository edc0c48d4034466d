//! Buyer decision engine
//!
//! Each buyer holds a budget, a species preference, an inventory, and a set
//! of adaptive acceptance thresholds. Behavior differences between buyer
//! profiles are data in [`Profile`], not code: one decision path reads the
//! numbers. The [`Buyer`] core is channel-free so it can be driven directly
//! in tests; [`BuyerService`] wraps it in a broadcast-polling loop.
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use anyhow::Result;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    auction::{Amount, BuyerId, ItemId, ItemKind, Quality},
    channel::{BidSink, Broadcast, BroadcastFeed, SharedBidSink},
    message::{AuctionInfo, Bid, BroadcastEvent, Confirmation},
    report::SharedSnapshotSink,
    service::{LoopService, RunContext},
};

/// How long a blocked feed poll waits before re-checking the stop flag.
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// One number per quality tier.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QualityTable {
    pub good: f64,
    pub normal: f64,
    pub bad: f64,
}

impl QualityTable {
    pub const fn uniform(value: f64) -> Self {
        Self {
            good: value,
            normal: value,
            bad: value,
        }
    }

    pub fn get(&self, quality: Quality) -> f64 {
        match quality {
            Quality::Good => self.good,
            Quality::Normal => self.normal,
            Quality::Bad => self.bad,
        }
    }

    pub fn set(&mut self, quality: Quality, value: f64) {
        match quality {
            Quality::Good => self.good = value,
            Quality::Normal => self.normal = value,
            Quality::Bad => self.bad = value,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Aggressive,
    Typical,
    Frugal,
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::Aggressive => write!(f, "aggressive"),
            ProfileKind::Typical => write!(f, "typical"),
            ProfileKind::Frugal => write!(f, "frugal"),
        }
    }
}

/// A buyer's behavior as data: starting budget, per-quality acceptance
/// thresholds with their floors and decay factors, the threshold used when
/// a lot carries no quality tier, the chance to pass on a bad-quality
/// preferred lot, and how steep a discount a non-preferred lot needs.
#[derive(Copy, Clone, Debug)]
pub struct Profile {
    pub kind: ProfileKind,
    pub budget: Amount,
    pub thresholds: QualityTable,
    pub minimums: QualityTable,
    pub decay: QualityTable,
    pub fallback_threshold: f64,
    pub bad_skip_chance: f64,
    /// Fraction of the acceptance threshold a non-preferred lot must drop
    /// to before it is worth picking up (0.0 means never).
    pub offprefer: QualityTable,
    pub offprefer_fallback: f64,
    /// Bid on any lot at or below the cutoff, regardless of species,
    /// quality, or current inventory.
    pub preference_blind: bool,
}

impl Profile {
    /// Deep pockets, pays the going rate for its preference, never lowers
    /// its sights on good lots.
    pub fn aggressive() -> Self {
        Self {
            kind: ProfileKind::Aggressive,
            budget: 500,
            thresholds: QualityTable::uniform(30.0),
            minimums: QualityTable {
                good: 30.0,
                normal: 10.0,
                bad: 10.0,
            },
            decay: QualityTable {
                good: 1.0,
                normal: 0.8,
                bad: 1.0,
            },
            fallback_threshold: 30.0,
            bad_skip_chance: 0.8,
            offprefer: QualityTable {
                good: 0.5,
                normal: 0.3,
                bad: 0.0,
            },
            offprefer_fallback: 0.5,
            preference_blind: false,
        }
    }

    pub fn typical() -> Self {
        Self {
            kind: ProfileKind::Typical,
            budget: 100,
            thresholds: QualityTable {
                good: 30.0,
                normal: 20.0,
                bad: 10.0,
            },
            minimums: QualityTable::uniform(10.0),
            decay: QualityTable {
                good: 0.95,
                normal: 0.8,
                bad: 1.0,
            },
            fallback_threshold: 20.0,
            bad_skip_chance: 0.5,
            offprefer: QualityTable {
                good: 0.5,
                normal: 0.3,
                bad: 0.0,
            },
            offprefer_fallback: 0.5,
            preference_blind: false,
        }
    }

    /// One fixed low cutoff, no adaptation, takes whatever is cheap enough.
    pub fn frugal() -> Self {
        Self {
            kind: ProfileKind::Frugal,
            budget: 50,
            thresholds: QualityTable::uniform(15.0),
            minimums: QualityTable::uniform(10.0),
            decay: QualityTable::uniform(1.0),
            fallback_threshold: 15.0,
            bad_skip_chance: 0.0,
            offprefer: QualityTable::uniform(1.0),
            offprefer_fallback: 1.0,
            preference_blind: true,
        }
    }

    pub fn for_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Aggressive => Self::aggressive(),
            ProfileKind::Typical => Self::typical(),
            ProfileKind::Frugal => Self::frugal(),
        }
    }
}

/// This buyer's view of one lot's auction. `Pending` blocks re-evaluation
/// on re-announcements at lower prices until a confirmation arrives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BidStatus {
    Open,
    Pending,
    Closed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Purchase {
    pub kind: ItemKind,
    pub quality: Option<Quality>,
    pub price: Amount,
}

/// The decision engine proper. Reacts to the two broadcast message kinds
/// and nothing else.
#[derive(Clone, Debug)]
pub struct Buyer {
    pub id: BuyerId,
    pub profile: Profile,
    pub preference: ItemKind,
    pub budget: Amount,
    thresholds: QualityTable,
    pub inventory: BTreeMap<ItemId, Purchase>,
    kind_counts: [u32; 3],
    lots: BTreeMap<ItemId, BidStatus>,
    rng: StdRng,
}

impl Buyer {
    pub fn new(id: BuyerId, profile: Profile, preference: ItemKind, rng: StdRng) -> Self {
        Self {
            id,
            budget: profile.budget,
            thresholds: profile.thresholds,
            profile,
            preference,
            inventory: BTreeMap::new(),
            kind_counts: [0; 3],
            lots: BTreeMap::new(),
            rng,
        }
    }

    /// The live acceptance threshold for a quality tier, falling back to
    /// the profile's mid-range default when the lot carries none.
    pub fn threshold(&self, quality: Option<Quality>) -> f64 {
        match quality {
            Some(quality) => self.thresholds.get(quality),
            None => self.profile.fallback_threshold,
        }
    }

    #[allow(unused)]
    pub fn bid_status(&self, item_id: ItemId) -> Option<BidStatus> {
        self.lots.get(&item_id).copied()
    }

    pub fn held(&self, kind: ItemKind) -> u32 {
        self.kind_counts[kind as usize]
    }

    /// Evaluate an announcement; returns the bid to send, if any.
    pub fn on_auction_info(&mut self, info: &AuctionInfo) -> Option<Bid> {
        if self.budget < info.price {
            return None;
        }
        match self.lots.get(&info.item_id) {
            Some(BidStatus::Pending) | Some(BidStatus::Closed) => return None,
            _ => {}
        }
        self.lots.insert(info.item_id, BidStatus::Open);

        if !self.wants(info) {
            return None;
        }

        debug!(buyer = %self.id, item = info.item_id, price = info.price, "bidding");
        self.lots.insert(info.item_id, BidStatus::Pending);
        Some(Bid {
            buyer_id: self.id.clone(),
            item_id: info.item_id,
        })
    }

    fn wants(&mut self, info: &AuctionInfo) -> bool {
        let price = info.price as f64;
        let threshold = self.threshold(info.quality);

        if self.profile.preference_blind {
            return price <= threshold;
        }

        if info.item_kind == self.preference {
            if info.quality == Some(Quality::Bad)
                && self.rng.random::<f64>() < self.profile.bad_skip_chance
            {
                debug!(buyer = %self.id, item = info.item_id, "passing on bad-quality lot");
                return false;
            }
            price <= threshold
        } else {
            // Worth picking up one lot of an off-preference species, but
            // only at a steep discount.
            let fraction = match info.quality {
                Some(quality) => self.profile.offprefer.get(quality),
                None => self.profile.offprefer_fallback,
            };
            self.held(info.item_kind) == 0 && price <= threshold * fraction
        }
    }

    /// React to a confirmation; ones addressed to other buyers are ignored
    /// without side effects.
    pub fn on_confirmation(&mut self, confirmation: &Confirmation) {
        if confirmation.buyer_id != self.id {
            return;
        }

        self.apply_purchase(
            confirmation.item_id,
            confirmation.item_kind,
            confirmation.quality,
            confirmation.price,
        );

        if confirmation.item_kind == self.preference {
            if let Some(quality) = confirmation.quality {
                self.decay_threshold(quality);
            }
        }
    }

    /// Book a won lot: pay, stock it, and close our view of its auction.
    pub(crate) fn apply_purchase(
        &mut self,
        item_id: ItemId,
        kind: ItemKind,
        quality: Option<Quality>,
        price: Amount,
    ) {
        self.budget = self.budget.saturating_sub(price);
        self.inventory.insert(
            item_id,
            Purchase {
                kind,
                quality,
                price,
            },
        );
        self.kind_counts[kind as usize] += 1;
        self.lots.insert(item_id, BidStatus::Closed);
        info!(
            buyer = %self.id,
            item = item_id,
            price,
            budget = self.budget,
            "purchase confirmed"
        );
    }

    fn decay_threshold(&mut self, quality: Quality) {
        let old = self.thresholds.get(quality);
        let new = (old * self.profile.decay.get(quality)).max(self.profile.minimums.get(quality));
        if new != old {
            self.thresholds.set(quality, new);
            debug!(buyer = %self.id, quality = %quality, old, new, "threshold decayed");
        }
    }
}

pub struct BuyerService {
    buyer: Buyer,
    feed: Box<dyn BroadcastFeed>,
    bid_sink: SharedBidSink,
    snapshots: SharedSnapshotSink,
}

impl BuyerService {
    pub fn new(ctx: &RunContext, buyer: Buyer) -> Self {
        Self {
            buyer,
            feed: ctx.broadcast.subscribe(),
            bid_sink: ctx.bid_sink.clone(),
            snapshots: ctx.snapshots.clone(),
        }
    }

    pub fn handle_event(&mut self, event: BroadcastEvent) -> Result<()> {
        match event {
            BroadcastEvent::AuctionInfo(info) => {
                if let Some(bid) = self.buyer.on_auction_info(&info) {
                    self.bid_sink.send(bid)?;
                }
            }
            BroadcastEvent::Confirmation(confirmation) => {
                self.buyer.on_confirmation(&confirmation);
            }
        }
        Ok(())
    }
}

impl LoopService for BuyerService {
    fn run_iteration(&mut self) -> Result<()> {
        if let Some(event) = self.feed.poll(Some(POLL_TIMEOUT))? {
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        // Drain whatever is still queued so the final snapshot reflects the
        // last confirmations of the run.
        while let Some(event) = self.feed.poll(Some(Duration::ZERO))? {
            self.handle_event(event)?;
        }
        self.snapshots.push(self.buyer.clone());
        Ok(())
    }
}
