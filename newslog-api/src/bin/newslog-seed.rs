//! Register the feeds listed in the seed file (idempotent).

use newslog_api::bootstrap::{self, Services};
use newslog_services::{load_seed_feeds, seed_feeds};

fn main() -> anyhow::Result<()> {
    let config = bootstrap::init()?;
    let services = Services::open(&config)?;

    let seeds = load_seed_feeds(&config.seed_feeds_path)?;
    for feed in seed_feeds(&services.registry, &seeds)? {
        println!("Seeded feed: {} ({})", feed.title, feed.feed_url);
    }

    Ok(())
}
