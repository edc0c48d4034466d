//! End-of-run CSV reports: the transaction ledger, the population setup,
//! and each buyer's final inventory. Glue around core-emitted data.
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::auction::Transaction;
use crate::service::Buyer;

/// Where services deposit their final buyer states when the run stops.
#[derive(Default)]
pub struct SnapshotSink(Mutex<Vec<Buyer>>);

pub type SharedSnapshotSink = Arc<SnapshotSink>;

impl SnapshotSink {
    pub fn new_shared() -> SharedSnapshotSink {
        Arc::new(Self::default())
    }

    pub fn push(&self, buyer: Buyer) {
        self.0.lock().push(buyer);
    }

    pub fn take(&self) -> Vec<Buyer> {
        let mut buyers = std::mem::take(&mut *self.0.lock());
        buyers.sort_by(|a, b| a.id.cmp(&b.id));
        buyers
    }
}

pub fn write_transactions(path: &Path, transactions: &[Transaction]) -> Result<()> {
    let mut file = create(path)?;
    writeln!(file, "item,sell_price,buyer")?;
    for transaction in transactions {
        writeln!(
            file,
            "{},{},{}",
            transaction.item_id,
            transaction.price,
            transaction.buyer.as_deref().unwrap_or("none")
        )?;
    }
    Ok(())
}

pub fn write_setup(path: &Path, buyers: &[Buyer]) -> Result<()> {
    let mut file = create(path)?;
    writeln!(file, "buyer,profile,preference,budget")?;
    for buyer in buyers {
        writeln!(
            file,
            "{},{},{},{}",
            buyer.id, buyer.profile.kind, buyer.preference, buyer.budget
        )?;
    }
    Ok(())
}

pub fn write_inventories(path: &Path, buyers: &[Buyer]) -> Result<()> {
    let mut file = create(path)?;
    writeln!(file, "buyer,item,kind,quality,price_paid,budget_left")?;
    for buyer in buyers {
        for (item_id, purchase) in &buyer.inventory {
            writeln!(
                file,
                "{},{},{},{},{},{}",
                buyer.id,
                item_id,
                purchase.kind,
                purchase
                    .quality
                    .map(|quality| quality.to_string())
                    .unwrap_or_else(|| "none".to_owned()),
                purchase.price,
                buyer.budget
            )?;
        }
    }
    Ok(())
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("creating report file {}", path.display()))
}
