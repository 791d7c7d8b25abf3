//! One ingestion pass over every active feed source.
//!
//! Meant to be run from cron. Exits non-zero only when the run could not
//! start (bad configuration, unreachable database); individual feed failures
//! are logged and counted against the feed.

use anyhow::Context;
use tracing::info;

use newslog_api::bootstrap::{self, Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = bootstrap::init()?;
    let services = Services::open(&config)?;

    let report = services
        .scheduler
        .run()
        .await
        .context("Ingestion run failed")?;

    info!(
        sources = report.sources.len(),
        inserted = report.items_inserted(),
        failed = report.failed_sources(),
        "Fetch complete"
    );

    Ok(())
}
