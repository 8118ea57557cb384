use std::{sync::Arc, time::Duration};

use duka_payment_engine::rate_limit::RateLimiter;
use log::*;
use tokio::task::JoinHandle;

/// Starts the rate limit expiry worker, which drops counters for windows that have closed. Do not await the returned
/// JoinHandle, as it will run indefinitely.
pub fn start_rate_limit_expiry_worker(limiter: Arc<dyn RateLimiter>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Rate limit expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running rate limit expiry job");
            let removed = limiter.purge_expired();
            if removed > 0 {
                debug!("🕰️ {removed} expired rate limit windows removed");
            }
        }
    })
}
