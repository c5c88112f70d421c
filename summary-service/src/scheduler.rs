use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};
use tokio::time::MissedTickBehavior;

use crate::catchup::CatchUpController;
use crate::period::local_today;
use crate::warmer::CacheWarmer;

/// Drives the scheduled chain: catch-up summarize, then warm, then evict.
/// Every failure is logged and the next tick starts clean; there is no
/// persisted poison state.
pub struct Scheduler {
    catchup: CatchUpController,
    warmer: CacheWarmer,
    local_offset: UtcOffset,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        catchup: CatchUpController,
        warmer: CacheWarmer,
        local_offset: UtcOffset,
        interval: Duration,
    ) -> Self {
        Self {
            catchup,
            warmer,
            local_offset,
            interval,
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        // A slow pass must not cause a burst of compensating ticks; partial
        // upserts are individually safe and the catch-up bound handles gaps.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let today = local_today(self.local_offset);

            if let Err(e) = self.catchup.run(today).await {
                tracing::error!(error = %e, "summary pass failed; next interval will retry");
            }
            if let Err(e) = self.warmer.warm(today).await {
                tracing::error!(error = %e, "cache warm pass failed");
            }
            if let Err(e) = self.warmer.evict(OffsetDateTime::now_utc()).await {
                tracing::error!(error = %e, "cache retention sweep failed");
            }
        }
    }
}
