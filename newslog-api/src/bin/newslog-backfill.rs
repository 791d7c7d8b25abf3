//! Re-canonicalize stored item URLs after a canonicalization change.

use newslog_api::bootstrap::{self, Services};

fn main() -> anyhow::Result<()> {
    let config = bootstrap::init()?;
    let services = Services::open(&config)?;

    let report = services.items.renormalize_urls()?;

    println!(
        "Backfill complete: {} updated, {} skipped",
        report.updated, report.skipped
    );
    for (item_id, existing_id) in &report.conflicts {
        println!("  item {} collides with item {}", item_id, existing_id);
    }

    Ok(())
}
