use std::str::FromStr;
use std::sync::Arc;

use solar_client::domain::{units::round2, CurvePoint, DailySummary};
use time::{Duration, OffsetDateTime, UtcOffset};

use crate::period::{
    local_today, month_window, shift_months, week_window, year_window,
};
use crate::scope::{Scope, ScopeError, ScopeResolver};
use crate::store::{ArtifactStore, CacheStore, GrantStore, StoreError, SummaryStore};
use crate::trend::{
    daily_trend, max_total_yield_kwh, merge_power_curves, trend_total_kwh, QueryResponse,
    TrendPoint,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
    Lifetime,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::Lifetime => "lifetime",
        }
    }

    /// Only day and week views go through the read-through cache; month
    /// entries are precomputed by the warmer, year/lifetime are cheap scans.
    fn cacheable(self) -> bool {
        matches!(self, Self::Day | Self::Week)
    }
}

impl FromStr for Period {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "lifetime" => Ok(Self::Lifetime),
            other => Err(QueryError::InvalidPeriod(other.to_string())),
        }
    }
}

/// Largest accepted window offset in either direction. Offsets come straight
/// from the query string; anything past this bound would walk the window math
/// off the supported calendar range, so it is rejected up front.
pub const MAX_OFFSET: i64 = 5_000;

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub principal: String,
    pub period: Period,
    /// Window offset relative to the current period: 0 = current, -1 = the
    /// previous day/week/month/year. Ignored for lifetime; bounded by
    /// `MAX_OFFSET`.
    pub offset: i64,
    pub plants: Vec<i64>,
    pub devices: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("not authorized: {0}")]
    Unauthorized(ScopeError),
    #[error("invalid period: {0:?}")]
    InvalidPeriod(String),
    #[error("offset out of range: {0}")]
    OffsetOutOfRange(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ScopeError> for QueryError {
    fn from(e: ScopeError) -> Self {
        match e {
            ScopeError::Store(store) => Self::Store(store),
            denied => Self::Unauthorized(denied),
        }
    }
}

pub struct QueryService {
    summaries: Arc<dyn SummaryStore>,
    artifacts: Arc<dyn ArtifactStore>,
    cache: Arc<dyn CacheStore>,
    scopes: ScopeResolver,
    local_offset: UtcOffset,
    cache_ttl: Duration,
}

impl QueryService {
    pub fn new(
        summaries: Arc<dyn SummaryStore>,
        artifacts: Arc<dyn ArtifactStore>,
        cache: Arc<dyn CacheStore>,
        grants: Arc<dyn GrantStore>,
        local_offset: UtcOffset,
        cache_ttl_seconds: i64,
    ) -> Self {
        Self {
            summaries,
            artifacts,
            cache,
            scopes: ScopeResolver::new(grants),
            local_offset,
            cache_ttl: Duration::seconds(cache_ttl_seconds),
        }
    }

    pub async fn query(&self, req: &QueryRequest) -> Result<QueryResponse, QueryError> {
        metrics::counter!("query_requests_total").increment(1);

        if !(-MAX_OFFSET..=MAX_OFFSET).contains(&req.offset) {
            return Err(QueryError::OffsetOutOfRange(req.offset));
        }

        let scope = self
            .scopes
            .resolve(&req.principal, &req.plants, &req.devices)
            .await?;

        let cache_key = format!("{}_{}_{}", req.period.as_str(), req.offset, scope.signature());

        if req.period.cacheable() {
            if let Some(response) = self.cached(&cache_key).await {
                metrics::counter!("query_cache_hits_total").increment(1);
                return Ok(response);
            }
            metrics::counter!("query_cache_misses_total").increment(1);
        }

        let today = local_today(self.local_offset);
        let response = match req.period {
            Period::Day => self.day_view(today, req.offset, &scope).await?,
            Period::Week => self.week_view(today, req.offset, &scope).await?,
            Period::Month => self.month_view(today, req.offset, &scope).await?,
            Period::Year => self.year_view(today, req.offset, &scope).await?,
            Period::Lifetime => self.lifetime_view(&scope).await?,
        };

        if req.period.cacheable() {
            self.write_through(&cache_key, &response).await;
        }

        Ok(response)
    }

    /// A fresh cache entry short-circuits the read path. Any cache failure
    /// (read error, stale entry, unparseable payload) degrades to a miss.
    async fn cached(&self, key: &str) -> Option<QueryResponse> {
        let entry = match self.cache.get(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        if OffsetDateTime::now_utc() - entry.cached_at > self.cache_ttl {
            return None;
        }

        match serde_json::from_str(&entry.payload) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(key, error = %e, "cache payload unparseable, recomputing");
                None
            }
        }
    }

    async fn write_through(&self, key: &str, response: &QueryResponse) {
        let payload = match serde_json::to_string(response) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(key, error = %e, "response serialization for cache failed");
                return;
            }
        };
        if let Err(e) = self.cache.put(key, &payload).await {
            tracing::warn!(key, error = %e, "cache write-through failed");
            metrics::counter!("cache_write_errors_total").increment(1);
        }
    }

    async fn scoped_window(
        &self,
        from: time::Date,
        until: time::Date,
        scope: &Scope,
    ) -> Result<Vec<DailySummary>, StoreError> {
        let rows = self.summaries.summaries_in_window(from, until).await?;
        Ok(rows.into_iter().filter(|s| scope.allows(s)).collect())
    }

    async fn day_view(
        &self,
        today: time::Date,
        offset: i64,
        scope: &Scope,
    ) -> Result<QueryResponse, QueryError> {
        let day = today + Duration::days(offset);
        let rows = self.scoped_window(day, day + Duration::days(1), scope).await?;

        let trend = daily_trend(&rows);
        let total = trend_total_kwh(&trend);

        // Merge every in-scope device's curve, summing AC/DC per aligned
        // timestamp across devices. A single unreadable artifact is skipped.
        let mut curves: Vec<Vec<CurvePoint>> = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(key) = row.curve_key.as_deref() else {
                continue;
            };
            match self.artifacts.read(key).await {
                Ok(Some(points)) => curves.push(points),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key, error = %e, "curve artifact read failed, skipping");
                }
            }
        }

        Ok(QueryResponse::new(total, trend, merge_power_curves(curves)))
    }

    async fn week_view(
        &self,
        today: time::Date,
        offset: i64,
        scope: &Scope,
    ) -> Result<QueryResponse, QueryError> {
        let (from, until) = week_window(today + Duration::weeks(offset));
        let rows = self.scoped_window(from, until, scope).await?;
        let trend = daily_trend(&rows);
        let total = trend_total_kwh(&trend);
        Ok(QueryResponse::new(total, trend, Vec::new()))
    }

    async fn month_view(
        &self,
        today: time::Date,
        offset: i64,
        scope: &Scope,
    ) -> Result<QueryResponse, QueryError> {
        let (from, until) = month_window(shift_months(today, offset as i32));
        let rows = self.scoped_window(from, until, scope).await?;
        let trend = daily_trend(&rows);
        let total = trend_total_kwh(&trend);
        Ok(QueryResponse::new(total, trend, Vec::new()))
    }

    async fn year_view(
        &self,
        today: time::Date,
        offset: i64,
        scope: &Scope,
    ) -> Result<QueryResponse, QueryError> {
        let reference = shift_months(today, (offset * 12) as i32);
        let (from, until) = year_window(reference);
        let rows = self.scoped_window(from, until, scope).await?;

        let total = max_total_yield_kwh(&rows);
        let trend = vec![TrendPoint {
            label: reference.year().to_string(),
            value_kwh: round2(total),
        }];
        Ok(QueryResponse::new(total, trend, Vec::new()))
    }

    async fn lifetime_view(&self, scope: &Scope) -> Result<QueryResponse, QueryError> {
        let rows: Vec<DailySummary> = self
            .summaries
            .all_summaries()
            .await?
            .into_iter()
            .filter(|s| scope.allows(s))
            .collect();

        let total = max_total_yield_kwh(&rows);
        let trend = vec![TrendPoint {
            label: "lifetime".to_string(),
            value_kwh: round2(total),
        }];
        Ok(QueryResponse::new(total, trend, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        MemoryArtifactStore, MemoryCacheStore, MemoryGrantStore, MemorySummaryStore,
    };
    use time::macros::datetime;
    use time::Date;

    fn summary(device: &str, plant: i64, day: Date, daily: f64, total: f64) -> DailySummary {
        DailySummary {
            device_id: device.to_string(),
            day,
            plant_id: Some(plant),
            total_yield_kwh: total,
            daily_yield_kwh: daily,
            monthly_yield_kwh: 0.0,
            curve_key: Some(crate::curve::curve_key(device, day)),
            last_refreshed: datetime!(2025-06-05 12:00:00 UTC),
        }
    }

    struct Fixture {
        summaries: Arc<MemorySummaryStore>,
        artifacts: Arc<MemoryArtifactStore>,
        cache: Arc<MemoryCacheStore>,
        service: QueryService,
    }

    fn fixture() -> Fixture {
        let summaries = Arc::new(MemorySummaryStore::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let cache = Arc::new(MemoryCacheStore::new());
        let grants = Arc::new(
            MemoryGrantStore::new()
                .grant_plants("owner@example.com", &[7])
                .grant_admin("admin@example.com"),
        );

        let service = QueryService::new(
            summaries.clone(),
            artifacts.clone(),
            cache.clone(),
            grants,
            UtcOffset::UTC,
            60,
        );

        Fixture {
            summaries,
            artifacts,
            cache,
            service,
        }
    }

    fn request(principal: &str, period: Period) -> QueryRequest {
        QueryRequest {
            principal: principal.to_string(),
            period,
            offset: 0,
            plants: Vec::new(),
            devices: Vec::new(),
        }
    }

    #[tokio::test]
    async fn requesting_plants_outside_the_grant_is_an_authorization_error() {
        let f = fixture();
        let mut req = request("owner@example.com", Period::Day);
        req.plants = vec![9];

        let res = f.service.query(&req).await;
        assert!(matches!(res, Err(QueryError::Unauthorized(ScopeError::Denied))));
    }

    #[tokio::test]
    async fn principal_without_grants_is_denied_not_given_an_empty_result() {
        let f = fixture();
        let res = f.service.query(&request("nobody@example.com", Period::Day)).await;
        assert!(matches!(
            res,
            Err(QueryError::Unauthorized(ScopeError::NoGrants))
        ));
    }

    #[tokio::test]
    async fn an_offset_past_the_calendar_bound_is_rejected_not_a_panic() {
        let f = fixture();

        let mut req = request("owner@example.com", Period::Month);
        req.offset = -3_000_000;
        assert!(matches!(
            f.service.query(&req).await,
            Err(QueryError::OffsetOutOfRange(-3_000_000))
        ));

        let mut req = request("owner@example.com", Period::Day);
        req.offset = i64::MAX;
        assert!(matches!(
            f.service.query(&req).await,
            Err(QueryError::OffsetOutOfRange(_))
        ));
    }

    #[tokio::test]
    async fn offsets_at_the_bound_are_still_served() {
        let f = fixture();
        let mut req = request("owner@example.com", Period::Year);
        req.offset = -MAX_OFFSET;
        assert!(f.service.query(&req).await.is_ok());
    }

    #[tokio::test]
    async fn day_view_sums_yields_and_merges_curves_across_devices() {
        let f = fixture();
        let today = local_today(UtcOffset::UTC);
        f.summaries.insert(summary("inv_a", 7, today, 10.0, 100.0)).await;
        f.summaries.insert(summary("inv_b", 7, today, 20.0, 200.0)).await;

        let t0 = datetime!(2025-06-05 06:00:00 UTC);
        f.artifacts
            .create_if_absent(
                &crate::curve::curve_key("inv_a", today),
                &[CurvePoint { time: t0, ac_kw: 5.0, dc_kw: 6.0 }],
            )
            .await
            .expect("seed");
        f.artifacts
            .create_if_absent(
                &crate::curve::curve_key("inv_b", today),
                &[CurvePoint { time: t0, ac_kw: 7.0, dc_kw: 8.0 }],
            )
            .await
            .expect("seed");

        let response = f
            .service
            .query(&request("owner@example.com", Period::Day))
            .await
            .expect("query");

        assert_eq!(response.total_yield, 30.0);
        assert_eq!(response.yield_unit, "kWh");
        assert_eq!(response.power_curve.len(), 1);
        assert_eq!(response.power_curve[0].ac_kw, 12.0);
        assert_eq!(response.power_curve[0].dc_kw, 14.0);
    }

    #[tokio::test]
    async fn a_miss_writes_the_response_through_to_the_cache() {
        let f = fixture();
        let today = local_today(UtcOffset::UTC);
        f.summaries.insert(summary("inv_a", 7, today, 10.0, 100.0)).await;

        f.service
            .query(&request("owner@example.com", Period::Day))
            .await
            .expect("query");

        let entry = f.cache.get("day_0_p7").await.expect("get").expect("written");
        let cached: QueryResponse = serde_json::from_str(&entry.payload).expect("payload");
        assert_eq!(cached.total_yield, 10.0);
    }

    #[tokio::test]
    async fn a_fresh_cache_entry_is_returned_without_recomputation() {
        let f = fixture();
        let sentinel = QueryResponse::new(777.0, Vec::new(), Vec::new());
        let payload = serde_json::to_string(&sentinel).expect("payload");
        f.cache
            .insert_at("day_0_p7", &payload, OffsetDateTime::now_utc() - Duration::seconds(10))
            .await;

        let response = f
            .service
            .query(&request("owner@example.com", Period::Day))
            .await
            .expect("query");
        assert_eq!(response.total_yield, 777.0);
    }

    #[tokio::test]
    async fn an_entry_past_its_ttl_is_a_miss_and_triggers_recomputation() {
        let f = fixture();
        let today = local_today(UtcOffset::UTC);
        f.summaries.insert(summary("inv_a", 7, today, 10.0, 100.0)).await;

        let sentinel = QueryResponse::new(777.0, Vec::new(), Vec::new());
        let payload = serde_json::to_string(&sentinel).expect("payload");
        // TTL is 60s; 61s is stale.
        f.cache
            .insert_at("day_0_p7", &payload, OffsetDateTime::now_utc() - Duration::seconds(61))
            .await;

        let response = f
            .service
            .query(&request("owner@example.com", Period::Day))
            .await
            .expect("query");
        assert_eq!(response.total_yield, 10.0);
    }

    #[tokio::test]
    async fn lifetime_takes_per_device_maxima_summed() {
        let f = fixture();
        let today = local_today(UtcOffset::UTC);
        f.summaries
            .insert(summary("inv_a", 7, today - Duration::days(2), 0.0, 900.0))
            .await;
        f.summaries
            .insert(summary("inv_a", 7, today - Duration::days(1), 0.0, 950.0))
            .await;
        f.summaries
            .insert(summary("inv_b", 7, today - Duration::days(1), 0.0, 600.0))
            .await;

        let response = f
            .service
            .query(&request("owner@example.com", Period::Lifetime))
            .await
            .expect("query");

        // max(inv_a) + max(inv_b) = 1550 kWh -> 1.55 MWh.
        assert_eq!(response.total_yield, 1.55);
        assert_eq!(response.yield_unit, "MWh");
        assert_eq!(response.yield_trend[0].label, "lifetime");
    }

    #[tokio::test]
    async fn admin_scope_sees_rows_from_every_plant() {
        let f = fixture();
        let today = local_today(UtcOffset::UTC);
        f.summaries.insert(summary("inv_a", 7, today, 10.0, 0.0)).await;
        f.summaries.insert(summary("inv_c", 9, today, 30.0, 0.0)).await;

        let response = f
            .service
            .query(&request("admin@example.com", Period::Day))
            .await
            .expect("query");
        assert_eq!(response.total_yield, 40.0);
    }
}
