//! Auction operator
//!
//! Runs the price clock: brings lots to auction in species rotation,
//! announces each price level, decays the price on a timer, and resolves
//! the first valid bid. Also decides when the whole run is over.
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::{rngs::StdRng, Rng};
use tracing::{debug, info};

use crate::{
    auction::{Amount, Auction, Item, ItemId, ItemKind, Pricing, Quality, TickOutcome, Transaction},
    channel::{BidSource, Broadcast},
    message::{AuctionInfo, Bid, BroadcastEvent, Confirmation},
    service::{LoopService, RunContext, ServiceControl},
};

use serde::Deserialize;

/// When the operator stops bringing new lots to auction.
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPolicy {
    /// Stop once `target` lots have been brought to auction and resolved,
    /// sold or not. The target caps attempts, not successful sales.
    Finite { target: u64 },
    /// Keep going until stock runs out or too many lots in a row go unsold.
    Unbounded { stock: u64, max_unsold_streak: u32 },
}

/// A scheduled price-decay tick, tied to the lot it was armed for.
/// Replacing (or clearing) it is the cancellation: a tick armed for a lot
/// that has since resolved never fires.
#[derive(Copy, Clone, Debug)]
struct DecayTick {
    item_id: ItemId,
    due: Instant,
}

pub struct Operator {
    ctx: RunContext,
    svc_ctl: ServiceControl,
    policy: TerminationPolicy,
    pricing: Pricing,
    tick_interval: Duration,
    quality_lots: bool,
    rng: StdRng,
    /// Round-robin cursor over the species rotation; also the source of
    /// monotonically increasing lot ids.
    lot_counter: u64,
    attempts: u64,
    unsold_streak: u32,
    stock_left: u64,
    current: Option<Auction>,
    tick: Option<DecayTick>,
}

impl Operator {
    pub fn new(ctx: &RunContext, svc_ctl: ServiceControl, rng: StdRng) -> Self {
        let policy = ctx.config.mode;
        let stock_left = match policy {
            TerminationPolicy::Unbounded { stock, .. } => stock,
            TerminationPolicy::Finite { .. } => 0,
        };
        Self {
            ctx: ctx.clone(),
            svc_ctl,
            policy,
            pricing: ctx.config.pricing,
            tick_interval: ctx.config.tick_interval(),
            quality_lots: ctx.config.quality_lots,
            rng,
            lot_counter: 0,
            attempts: 0,
            unsold_streak: 0,
            stock_left,
            current: None,
            tick: None,
        }
    }

    /// Brings the first lot to auction. Call before spawning the service.
    pub fn start(&mut self) -> Result<()> {
        self.open_next_lot()
    }

    fn may_open_next(&self) -> bool {
        match self.policy {
            TerminationPolicy::Finite { target } => self.attempts < target,
            TerminationPolicy::Unbounded {
                max_unsold_streak, ..
            } => self.stock_left > 0 && self.unsold_streak < max_unsold_streak,
        }
    }

    fn open_next_lot(&mut self) -> Result<()> {
        if !self.may_open_next() {
            info!(
                lots = self.lot_counter,
                "auction run ended, stopping all services"
            );
            self.current = None;
            self.tick = None;
            self.svc_ctl.stop_all();
            return Ok(());
        }

        let kind = ItemKind::ALL[(self.lot_counter as usize) % ItemKind::ALL.len()];
        self.lot_counter += 1;
        self.attempts += 1;
        if let TerminationPolicy::Unbounded { .. } = self.policy {
            self.stock_left -= 1;
        }

        let quality = self
            .quality_lots
            .then(|| Quality::ALL[self.rng.random_range(0..Quality::ALL.len())]);
        let item = Item {
            id: self.lot_counter,
            kind,
            quality,
        };

        let auction = Auction::open(item, self.pricing);
        self.publish_info(item, auction.current_price)?;
        self.arm_tick(item.id);
        self.current = Some(auction);
        Ok(())
    }

    fn publish_info(&self, item: Item, price: Amount) -> Result<()> {
        info!(
            item = item.id,
            kind = %item.kind,
            quality = ?item.quality,
            price,
            "auctioning lot"
        );
        self.ctx
            .broadcast
            .publish(BroadcastEvent::AuctionInfo(AuctionInfo {
                item_id: item.id,
                item_kind: item.kind,
                price,
                quality: item.quality,
            }))
    }

    fn arm_tick(&mut self, item_id: ItemId) {
        self.tick = Some(DecayTick {
            item_id,
            due: Instant::now() + self.tick_interval,
        });
    }

    /// First valid bid for the open lot wins; everything else is ignored.
    pub fn handle_bid(&mut self, bid: Bid) -> Result<()> {
        let (item, price) = match self.current.as_mut() {
            Some(auction) if auction.is_open() && auction.item.id == bid.item_id => {
                auction.mark_sold();
                (auction.item, auction.current_price)
            }
            _ => {
                debug!(?bid, "ignoring bid for a closed or unknown lot");
                return Ok(());
            }
        };

        self.tick = None;
        self.unsold_streak = 0;

        info!(item = item.id, buyer = %bid.buyer_id, price, "lot sold");
        self.ctx.ledger.record(Transaction {
            item_id: item.id,
            price,
            buyer: Some(bid.buyer_id.clone()),
        });
        self.ctx
            .broadcast
            .publish(BroadcastEvent::Confirmation(Confirmation {
                item_id: item.id,
                buyer_id: bid.buyer_id,
                price,
                item_kind: item.kind,
                quality: item.quality,
            }))?;

        self.open_next_lot()
    }

    /// One step of the price clock for the lot the tick was armed for.
    pub fn handle_tick(&mut self) -> Result<()> {
        let Some(tick) = self.tick.take() else {
            return Ok(());
        };

        let (outcome, item) = match self.current.as_mut() {
            Some(auction) if auction.is_open() && auction.item.id == tick.item_id => {
                (auction.tick(), auction.item)
            }
            // Resolved since the tick was armed; stale, nothing to do.
            _ => return Ok(()),
        };

        match outcome {
            TickOutcome::Reannounce(price) => {
                self.publish_info(item, price)?;
                self.arm_tick(item.id);
                Ok(())
            }
            TickOutcome::Expired => {
                info!(item = item.id, "lot went unsold");
                self.ctx.ledger.record(Transaction {
                    item_id: item.id,
                    price: 0,
                    buyer: None,
                });
                self.unsold_streak += 1;
                self.open_next_lot()
            }
        }
    }
}

impl LoopService for Operator {
    fn run_iteration(&mut self) -> Result<()> {
        if self.current.is_none() {
            // Run is over; wait for the stop flag to propagate.
            std::thread::sleep(Duration::from_millis(10));
            return Ok(());
        }

        let wait = match self.tick {
            Some(tick) => tick.due.saturating_duration_since(Instant::now()),
            None => self.tick_interval,
        };

        match self.ctx.bid_source.poll(Some(wait))? {
            Some(bid) => self.handle_bid(bid)?,
            None => {
                let due = self
                    .tick
                    .map(|tick| tick.due <= Instant::now())
                    .unwrap_or(false);
                if due {
                    self.handle_tick()?;
                }
            }
        }
        Ok(())
    }
}
