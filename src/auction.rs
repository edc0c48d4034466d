//! Domain model of the descending-price fish auction.
//!
//! One lot is on the clock at a time: the price starts high and drops by a
//! fixed decrement each tick until a buyer takes it or it falls below the
//! floor. The operator is the only writer of [`Auction`] and [`Ledger`]
//! state; buyers only ever see it through broadcast messages.
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub type ItemId = u64;
pub type Amount = u64;
pub type BuyerId = String;
pub type BuyerIdRef<'s> = &'s str;

/// Species a lot can belong to. Lots are auctioned in this rotation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Herring,
    Sole,
    Turbot,
}

impl ItemKind {
    pub const ALL: [ItemKind; 3] = [ItemKind::Herring, ItemKind::Sole, ItemKind::Turbot];
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Herring => write!(f, "herring"),
            ItemKind::Sole => write!(f, "sole"),
            ItemKind::Turbot => write!(f, "turbot"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Normal,
    Bad,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::Good, Quality::Normal, Quality::Bad];
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Good => write!(f, "good"),
            Quality::Normal => write!(f, "normal"),
            Quality::Bad => write!(f, "bad"),
        }
    }
}

/// A lot brought to auction. Ids are assigned by the operator and increase
/// monotonically over a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub quality: Option<Quality>,
}

/// Price constants of the clock: where it starts, where it stops, and how
/// far it drops per tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub start: Amount,
    pub floor: Amount,
    pub decrement: Amount,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            start: 30,
            floor: 10,
            decrement: 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AuctionStatus {
    Open,
    Sold,
    Expired,
}

/// What a decay tick did to an open auction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Price dropped but is still at or above the floor; announce it again.
    Reannounce(Amount),
    /// Price fell below the floor; the lot goes unsold.
    Expired,
}

/// The single lot currently on the clock.
#[derive(Copy, Clone, Debug)]
pub struct Auction {
    pub item: Item,
    pub current_price: Amount,
    pub floor_price: Amount,
    pub decrement: Amount,
    pub status: AuctionStatus,
}

impl Auction {
    pub fn open(item: Item, pricing: Pricing) -> Self {
        Self {
            item,
            current_price: pricing.start,
            floor_price: pricing.floor,
            decrement: pricing.decrement,
            status: AuctionStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == AuctionStatus::Open
    }

    /// One step of the price clock. Only meaningful while open.
    pub fn tick(&mut self) -> TickOutcome {
        self.current_price = self.current_price.saturating_sub(self.decrement);
        if self.current_price >= self.floor_price {
            TickOutcome::Reannounce(self.current_price)
        } else {
            self.status = AuctionStatus::Expired;
            TickOutcome::Expired
        }
    }

    pub fn mark_sold(&mut self) {
        self.status = AuctionStatus::Sold;
    }
}

/// One resolved lot: the price it fetched (0 when unsold) and who took it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub item_id: ItemId,
    pub price: Amount,
    pub buyer: Option<BuyerId>,
}

/// Append-only transaction log. The operator is the sole writer; reports
/// read a snapshot once the run is over.
#[derive(Default)]
pub struct Ledger(Mutex<Vec<Transaction>>);

pub type SharedLedger = Arc<Ledger>;

impl Ledger {
    pub fn new_shared() -> SharedLedger {
        Arc::new(Self::default())
    }

    pub fn record(&self, transaction: Transaction) {
        self.0.lock().push(transaction);
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.0.lock().clone()
    }
}
