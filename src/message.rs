//! The message contracts shared by the operator and every buyer.
//!
//! Two channels carry these: the operator broadcasts [`BroadcastEvent`]s to
//! all buyers, and buyers push [`Bid`]s onto the many-to-one bid channel.
//! Delivery is reliable and in order per sender; nothing is acknowledged or
//! redelivered.
use serde::{Deserialize, Serialize};

use crate::auction::{Amount, BuyerId, ItemId, ItemKind, Quality};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BroadcastEvent {
    AuctionInfo(AuctionInfo),
    Confirmation(Confirmation),
}

/// A lot is on the clock at this price. Re-broadcast at each lower price
/// until the lot sells or expires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionInfo {
    pub item_id: ItemId,
    #[serde(rename = "item_type")]
    pub item_kind: ItemKind,
    pub price: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
}

/// The lot went to `buyer_id` at `price`. Broadcast to everyone; buyers it
/// is not addressed to ignore it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub item_id: ItemId,
    pub buyer_id: BuyerId,
    pub price: Amount,
    #[serde(rename = "item_type")]
    pub item_kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
}

/// A buyer (or coalition) takes the lot at whatever price it was last
/// announced at. First bid the operator processes wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub buyer_id: BuyerId,
    pub item_id: ItemId,
}
