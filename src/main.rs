mod auction;
mod channel;
mod config;
mod message;
mod report;
mod service;

use std::{env, fs, path::Path};

use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    auction::{ItemKind, Ledger},
    config::RunConfig,
    report::SnapshotSink,
    service::{
        form_coalitions, Buyer, BuyerService, CoalitionService, Operator, Profile, ProfileKind,
        RunContext, ServiceControl,
    },
};

fn main() -> Result<()> {
    init_logging();

    let config = match env::args().nth(1) {
        Some(path) => RunConfig::load(Path::new(&path))?,
        None => RunConfig::default(),
    };

    run(config)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(config: RunConfig) -> Result<()> {
    let seed = config.seed.unwrap_or_else(rand::random);
    info!(seed, "seeding run");
    let mut rng = StdRng::seed_from_u64(seed);

    let broadcast = channel::InMemoryBroadcast::new_shared();
    let (bid_sink, bid_source) = channel::new_in_memory_bid_queue();
    let ledger = Ledger::new_shared();
    let snapshots = SnapshotSink::new_shared();

    let ctx = RunContext {
        config: config.clone(),
        broadcast,
        bid_sink,
        bid_source,
        ledger: ledger.clone(),
        snapshots: snapshots.clone(),
    };

    let buyers = build_buyers(&config, &mut rng);

    fs::create_dir_all(&config.report_dir)?;
    report::write_setup(&config.report_dir.join("setup.csv"), &buyers)?;

    let svc_ctl = ServiceControl::new();
    ctrlc::set_handler({
        let svc_ctl = svc_ctl.clone();
        move || {
            eprintln!("Stopping all services...");
            svc_ctl.stop_all();
        }
    })?;

    let mut handles = Vec::new();
    if config.coalitions {
        let (groups, solo) = form_coalitions(buyers);
        for (coalition, members) in groups {
            handles.push(svc_ctl.spawn_loop(CoalitionService::new(&ctx, coalition, members)));
        }
        for buyer in solo {
            handles.push(svc_ctl.spawn_loop(BuyerService::new(&ctx, buyer)));
        }
    } else {
        for buyer in buyers {
            handles.push(svc_ctl.spawn_loop(BuyerService::new(&ctx, buyer)));
        }
    }

    let mut operator = Operator::new(&ctx, svc_ctl.clone(), StdRng::seed_from_u64(rng.random()));
    operator.start()?;
    handles.push(svc_ctl.spawn_loop(operator));

    for handle in handles {
        handle.join()?
    }

    report::write_transactions(&config.report_dir.join("transactions.csv"), &ledger.snapshot())?;
    report::write_inventories(&config.report_dir.join("inventory.csv"), &snapshots.take())?;
    info!(dir = %config.report_dir.display(), "run complete, reports written");

    Ok(())
}

fn build_buyers(config: &RunConfig, rng: &mut StdRng) -> Vec<Buyer> {
    let counts = [
        (ProfileKind::Aggressive, config.buyers.aggressive),
        (ProfileKind::Typical, config.buyers.typical),
        (ProfileKind::Frugal, config.buyers.frugal),
    ];

    let mut buyers = Vec::new();
    for (kind, count) in counts {
        for i in 1..=count {
            let preference = ItemKind::ALL[rng.random_range(0..ItemKind::ALL.len())];
            buyers.push(Buyer::new(
                format!("{kind}-{i}"),
                Profile::for_kind(kind),
                preference,
                StdRng::seed_from_u64(rng.random()),
            ));
        }
    }
    buyers
}

#[cfg(test)]
mod tests;
