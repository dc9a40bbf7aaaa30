#[cfg(feature = "sqlite")]
use std::time::Duration;

use chrono::Utc;
use log::*;
#[cfg(feature = "sqlite")]
use tokio::{task::JoinHandle, time};

use crate::{
    events::{EventProducers, OrderExpiredEvent},
    traits::{PosDatabase, PosDatabaseError},
};

/// Spawns the expiry sweeper as a periodic background task. Do not await the returned handle, as it runs
/// indefinitely; abort it to stop the sweeper.
///
/// Every `period`, cash orders whose redemption window has lapsed without payment are cancelled and their stock
/// holds released. The first sweep runs immediately, so a restart picks up anything that expired while the process
/// was down.
#[cfg(feature = "sqlite")]
pub fn start_expiry_sweeper(db: crate::SqliteDatabase, producers: EventProducers, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("🕰️ Expiry sweeper running every {}s", period.as_secs());
        let mut ticker = time::interval(period);
        loop {
            ticker.tick().await;
            match run_expiry_sweep(&db, &producers).await {
                Ok(0) => trace!("🕰️ Expiry sweep found nothing to do"),
                Ok(n) => debug!("🕰️ Expiry sweep cancelled {n} orders"),
                Err(e) => error!("🕰️ Expiry sweep failed: {e}"),
            }
        }
    })
}

/// Performs a single expiry sweep and returns the number of orders cancelled.
///
/// Each lapsed cash order is cancelled in its own transaction, with a failed payment attempt recorded against it and
/// its reservation entries deleted. An order that gets paid between the candidate scan and its own transaction is
/// left alone.
pub async fn run_expiry_sweep<B>(db: &B, producers: &EventProducers) -> Result<usize, PosDatabaseError>
where B: PosDatabase {
    let expired = db.expire_unpaid_orders(Utc::now()).await?;
    for order in &expired {
        info!("🕰️ Order #{} was not paid for within its redemption window and has been cancelled", order.id);
        for emitter in &producers.order_expired_producer {
            let event = OrderExpiredEvent::new(order.clone());
            emitter.publish_event(event).await;
        }
    }
    Ok(expired.len())
}
