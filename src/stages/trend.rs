use chrono::{Datelike, Months, NaiveDate};
use tracing::{info, warn};

use crate::models::TrendPoint;
use crate::range;
use crate::services::analytics_api::{AnalyticsApi, TrendQuery};

/// Length of the series drawn when the trend service is unavailable.
pub const FALLBACK_MONTHS: u32 = 12;

/// Trend series plus the failure that forced a fallback, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendOutcome {
    pub points: Vec<TrendPoint>,
    pub error: Option<String>,
}

impl TrendOutcome {
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

/// Fetches the sentiment trend for `query`. Never fails: any error is
/// replaced by [`fallback_series`] for the current month.
#[tracing::instrument(skip(api), fields(
    topic = ?query.topic,
    selected_page = query.selected_page,
    range = %query.range,
))]
pub async fn fetch_trend(api: &dyn AnalyticsApi, query: &TrendQuery) -> TrendOutcome {
    match api.sentiment_trend(query).await {
        Ok(points) => {
            info!(points = points.len(), "Trend fetched");
            TrendOutcome {
                points,
                error: None,
            }
        }
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "Trend fetch failed, using fallback series");
            TrendOutcome {
                points: fallback_series(range::today()),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Twelve zeroed monthly points, oldest first, the last one being the month
/// of `today`. Labels use the service's `MM/YYYY` bucket format.
pub fn fallback_series(today: NaiveDate) -> Vec<TrendPoint> {
    let current = today.with_day(1).unwrap_or(today);

    (0..FALLBACK_MONTHS)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .map(|month| TrendPoint::zero(month.format("%m/%Y").to_string()))
        .collect()
}
