#[cfg(feature = "sqlite")]
use std::time::Duration;

use chrono::Utc;
use log::*;
#[cfg(feature = "sqlite")]
use tokio::{task::JoinHandle, time};

use crate::traits::{PosDatabase, ReconciliationReport};

/// Spawns the reconciliation sweeper as a periodic background task. Do not await the returned handle, as it runs
/// indefinitely.
///
/// Meant to run on a long period, daily or so. Each sweep repairs what it safely can and reports the rest; see
/// [`run_reconciliation_sweep`].
#[cfg(feature = "sqlite")]
pub fn start_reconciliation_sweeper(
    db: crate::SqliteDatabase,
    retention: chrono::Duration,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🕰️ Reconciliation sweeper running every {}s", period.as_secs());
        let mut ticker = time::interval(period);
        loop {
            ticker.tick().await;
            let report = run_reconciliation_sweep(&db, retention).await;
            if report.is_clean() {
                debug!("🕰️ Reconciliation sweep complete. Ledger and stock counters agree");
            } else {
                info!("🕰️ Reconciliation sweep complete. {report}");
            }
        }
    })
}

/// Performs a single reconciliation sweep.
///
/// Three passes, each in its own transaction so that a failure in one does not block the others:
/// 1. Clamp any negative stock counter to zero, recording the deficit as an adjustment ledger entry.
/// 2. Purge reservation entries for closed orders that are older than `retention`. These should have been removed
///    when their order settled or expired; anything left is debris from interrupted cleanup.
/// 3. Compare every product's stock counter against the ledger-derived value and report mismatches. Mismatches are
///    logged, never auto-corrected, since rewriting the counter would hide whichever bug caused the drift.
///
/// A pass that fails is logged and contributes nothing to the report.
pub async fn run_reconciliation_sweep<B>(db: &B, retention: chrono::Duration) -> ReconciliationReport
where B: PosDatabase {
    let mut report = ReconciliationReport::default();
    match db.clamp_negative_stock().await {
        Ok(corrections) => {
            for correction in &corrections {
                warn!(
                    "🕰️ Product #{} was oversold by {} units. Stock clamped to zero",
                    correction.product_id, correction.deficit
                );
            }
            report.corrections = corrections;
        },
        Err(e) => error!("🕰️ Negative stock pass failed: {e}"),
    }
    let cutoff = Utc::now() - retention;
    match db.purge_stale_reservations(cutoff).await {
        Ok(purged) => {
            if purged > 0 {
                info!("🕰️ Purged {purged} stale reservation entries older than {}h", retention.num_hours());
            }
            report.purged_reservations = purged;
        },
        Err(e) => error!("🕰️ Reservation purge pass failed: {e}"),
    }
    match db.audit_stock_cache().await {
        Ok(mismatches) => {
            for mismatch in &mismatches {
                warn!("🕰️ {mismatch}");
            }
            report.mismatches = mismatches;
        },
        Err(e) => error!("🕰️ Stock audit pass failed: {e}"),
    }
    report
}
