use std::time::Duration;

use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};

use crate::{
    auction::{Amount, ItemKind},
    channel::BidSource,
    config::RunConfig,
    message::{AuctionInfo, BroadcastEvent, Confirmation},
    service::{form_coalitions, Buyer, Coalition, CoalitionService, Profile, RunContext},
};

use super::test_ctx;

fn member(id: &str, budget: Amount) -> Buyer {
    let mut buyer = Buyer::new(
        id.to_owned(),
        Profile::typical(),
        ItemKind::Herring,
        StdRng::seed_from_u64(7),
    );
    buyer.budget = budget;
    buyer
}

fn service(ctx: &RunContext, budgets: &[(&str, Amount)]) -> CoalitionService {
    let members: Vec<_> = budgets.iter().map(|(id, budget)| member(id, *budget)).collect();
    let coalition = Coalition {
        name: "coalition-1".to_owned(),
        members: members.iter().map(|m| m.id.clone()).collect(),
    };
    CoalitionService::new(ctx, coalition, members)
}

fn auction_info(item_id: u64, price: Amount) -> BroadcastEvent {
    BroadcastEvent::AuctionInfo(AuctionInfo {
        item_id,
        item_kind: ItemKind::Herring,
        price,
        quality: None,
    })
}

fn confirmation(item_id: u64, price: Amount) -> BroadcastEvent {
    BroadcastEvent::Confirmation(Confirmation {
        item_id,
        buyer_id: "coalition-1".to_owned(),
        price,
        item_kind: ItemKind::Herring,
        quality: None,
    })
}

#[test]
fn pooled_budget_admits_a_bid_no_single_member_could_make() -> Result<()> {
    let ctx = test_ctx(RunConfig::default());
    let mut service = service(&ctx, &[("a", 30), ("b", 50), ("c", 60)]);

    service.handle_event(auction_info(1, 100))?;

    let bid = ctx
        .bid_source
        .poll(Some(Duration::ZERO))?
        .expect("pooled budget of 140 covers price 100");
    assert_eq!(bid.buyer_id, "coalition-1");
    assert_eq!(bid.item_id, 1);
    Ok(())
}

#[test]
fn too_expensive_for_the_pool_means_no_bid() -> Result<()> {
    let ctx = test_ctx(RunConfig::default());
    let mut service = service(&ctx, &[("a", 30), ("b", 50)]);

    service.handle_event(auction_info(1, 100))?;

    assert_eq!(ctx.bid_source.poll(Some(Duration::ZERO))?, None);
    Ok(())
}

#[test]
fn cost_falls_on_the_first_member_who_can_cover_it() -> Result<()> {
    let ctx = test_ctx(RunConfig::default());
    let mut service = service(&ctx, &[("a", 30), ("b", 50), ("c", 60)]);

    service.handle_event(auction_info(1, 40))?;
    service.handle_event(confirmation(1, 40))?;

    assert_eq!(service.member("a").expect("member a").budget, 30);
    assert_eq!(service.member("b").expect("member b").budget, 10);
    assert_eq!(service.member("c").expect("member c").budget, 60);
    assert!(service.member("b").expect("member b").inventory.contains_key(&1));
    Ok(())
}

#[test]
fn unpayable_win_is_dropped_without_crediting_anyone() -> Result<()> {
    let ctx = test_ctx(RunConfig::default());
    let mut service = service(&ctx, &[("a", 40), ("b", 40), ("c", 40)]);

    service.handle_event(auction_info(1, 100))?;
    service.handle_event(confirmation(1, 100))?;

    for id in ["a", "b", "c"] {
        let member = service.member(id).expect("member");
        assert_eq!(member.budget, 40);
        assert!(member.inventory.is_empty());
    }
    Ok(())
}

#[test]
fn a_pending_coalition_bid_is_not_repeated_on_reannouncement() -> Result<()> {
    let ctx = test_ctx(RunConfig::default());
    let mut service = service(&ctx, &[("a", 50), ("b", 50)]);

    service.handle_event(auction_info(1, 30))?;
    assert!(ctx.bid_source.poll(Some(Duration::ZERO))?.is_some());

    service.handle_event(auction_info(1, 28))?;
    assert_eq!(ctx.bid_source.poll(Some(Duration::ZERO))?, None);
    Ok(())
}

#[test]
fn greedy_partition_groups_up_to_three_and_leaves_a_singleton_out() {
    let buyers: Vec<_> = (1..=7).map(|i| member(&format!("buyer-{i}"), 100)).collect();

    let (groups, solo) = form_coalitions(buyers);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].0.name, "coalition-1");
    assert_eq!(groups[0].0.members.len(), 3);
    assert_eq!(groups[1].0.members.len(), 3);
    assert_eq!(solo.len(), 1);
    assert_eq!(solo[0].id, "buyer-7");
}

#[test]
fn a_trailing_pair_still_forms_a_coalition() {
    let buyers: Vec<_> = (1..=2).map(|i| member(&format!("buyer-{i}"), 100)).collect();

    let (groups, solo) = form_coalitions(buyers);

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].0.members.len(), 2);
    assert!(solo.is_empty());
}

#[test]
fn a_lone_buyer_stays_independent() {
    let buyers = vec![member("buyer-1", 100)];

    let (groups, solo) = form_coalitions(buyers);

    assert!(groups.is_empty());
    assert_eq!(solo.len(), 1);
}
