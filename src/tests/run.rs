//! Whole-system runs over in-memory channels with real service threads.
use std::collections::BTreeSet;

use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    auction::{Amount, ItemKind},
    channel::Broadcast,
    config::RunConfig,
    message::BroadcastEvent,
    service::{
        Buyer, BuyerService, Operator, Profile, ServiceControl, TerminationPolicy,
    },
};

use super::{drain_feed, test_ctx};

#[test]
fn finite_run_with_eager_buyers_sells_every_lot_first_announcement() -> Result<()> {
    let config = RunConfig {
        mode: TerminationPolicy::Finite { target: 3 },
        // Generous interval: every lot should sell long before a tick fires.
        tick_interval_ms: 500,
        ..RunConfig::default()
    };
    let ctx = test_ctx(config);
    let mut observer = ctx.broadcast.subscribe();
    let svc_ctl = ServiceControl::new();

    // One eager buyer per species; each takes its preference at the
    // starting price and leaves the others alone.
    let mut handles = Vec::new();
    for (i, preference) in ItemKind::ALL.into_iter().enumerate() {
        let buyer = Buyer::new(
            format!("aggressive-{}", i + 1),
            Profile::aggressive(),
            preference,
            StdRng::seed_from_u64(i as u64),
        );
        handles.push(svc_ctl.spawn_loop(BuyerService::new(&ctx, buyer)));
    }

    let mut operator = Operator::new(&ctx, svc_ctl.clone(), StdRng::seed_from_u64(0));
    operator.start()?;
    handles.push(svc_ctl.spawn_loop(operator));

    for handle in handles {
        handle.join()?
    }

    let ledger = ctx.ledger.snapshot();
    assert_eq!(ledger.len(), 3);
    assert!(ledger
        .iter()
        .all(|transaction| transaction.price == 30 && transaction.buyer.is_some()));

    // Exactly one confirmation per lot.
    let confirmed: Vec<_> = drain_feed(&mut observer)
        .into_iter()
        .filter_map(|event| match event {
            BroadcastEvent::Confirmation(confirmation) => Some(confirmation.item_id),
            _ => None,
        })
        .collect();
    assert_eq!(confirmed.len(), 3);
    assert_eq!(confirmed.iter().collect::<BTreeSet<_>>().len(), 3);

    // Every buyer's books balance: spending equals inventory value.
    let snapshots = ctx.snapshots.take();
    assert_eq!(snapshots.len(), 3);
    for buyer in snapshots {
        let spent: Amount = buyer.inventory.values().map(|purchase| purchase.price).sum();
        assert_eq!(500 - buyer.budget, spent);
        assert_eq!(buyer.inventory.len(), 1);
    }
    Ok(())
}

#[test]
fn unbounded_run_with_no_bidders_expires_lots_until_the_streak_limit() -> Result<()> {
    let config = RunConfig {
        mode: TerminationPolicy::Unbounded {
            stock: 30,
            max_unsold_streak: 3,
        },
        tick_interval_ms: 10,
        ..RunConfig::default()
    };
    let ctx = test_ctx(config);
    let mut observer = ctx.broadcast.subscribe();
    let svc_ctl = ServiceControl::new();

    let mut operator = Operator::new(&ctx, svc_ctl.clone(), StdRng::seed_from_u64(0));
    operator.start()?;
    let handle = svc_ctl.spawn_loop(operator);
    handle.join()?;

    let ledger = ctx.ledger.snapshot();
    assert_eq!(ledger.len(), 3);
    assert!(ledger
        .iter()
        .all(|transaction| transaction.price == 0 && transaction.buyer.is_none()));

    // Each lot is announced down the whole ladder, strictly decreasing.
    let lot_one_prices: Vec<_> = drain_feed(&mut observer)
        .into_iter()
        .filter_map(|event| match event {
            BroadcastEvent::AuctionInfo(info) if info.item_id == 1 => Some(info.price),
            _ => None,
        })
        .collect();
    assert_eq!(
        lot_one_prices,
        vec![30, 28, 26, 24, 22, 20, 18, 16, 14, 12, 10]
    );
    Ok(())
}
