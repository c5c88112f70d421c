use std::sync::Arc;

use time::{Date, Duration};

use crate::store::StoreError;
use crate::summarizer::SummarizeDay;

/// Wraps the summarizer so a delayed or missed trigger cannot silently skip a
/// calendar day. Pure sequencing: it holds no data beyond the previous run's
/// logical day.
pub struct CatchUpController {
    summarizer: Arc<dyn SummarizeDay>,
    max_days: i64,
    last_run_day: Option<Date>,
}

impl CatchUpController {
    pub fn new(summarizer: Arc<dyn SummarizeDay>, max_days: i64) -> Self {
        Self {
            summarizer,
            max_days: max_days.max(0),
            last_run_day: None,
        }
    }

    /// Replay missed days (oldest first, bounded by `max_days`), then process
    /// `today`. The replay window deliberately includes the previous run's
    /// day: its last pass may have happened before that day ended, so one
    /// more upsert closes it out with the full day's readings (the merge
    /// upsert makes the recount a no-op when nothing changed). A gap larger
    /// than the bound is truncated to its most recent days; the rest needs
    /// the explicit backfill path.
    pub async fn run(&mut self, today: Date) -> Result<usize, StoreError> {
        if let Some(prev) = self.last_run_day {
            let gap = (today - prev).whole_days();
            if gap > self.max_days {
                tracing::warn!(
                    gap,
                    max_days = self.max_days,
                    "run gap exceeds catch-up bound; replaying most recent days only, \
                     use backfill_summary for the remainder"
                );
            }
            let replay = gap.clamp(0, self.max_days);
            for back in (1..=replay).rev() {
                let day = today - Duration::days(back);
                tracing::info!(day = %day, "catch-up replay for missed day");
                metrics::counter!("catch_up_replays_total").increment(1);
                self.summarizer.summarize_day(day).await?;
            }
        }

        let upserts = self.summarizer.summarize_day(today).await?;
        self.last_run_day = Some(today);
        Ok(upserts)
    }
}
