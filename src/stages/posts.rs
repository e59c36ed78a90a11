use tracing::{info, warn};

use crate::error::Result;
use crate::models::PostPage;
use crate::services::analytics_api::{AnalyticsApi, PostQuery};

/// Fetches one page of the filtered post collection.
#[tracing::instrument(skip(api), fields(
    page = query.page,
    selected_page = query.selected_page,
    topic = ?query.topic,
    range = %query.range,
))]
pub async fn fetch_posts(api: &dyn AnalyticsApi, query: &PostQuery) -> Result<PostPage> {
    if query.range.is_inverted() {
        warn!("Start date is after end date, expecting an empty result");
    }

    let started = std::time::Instant::now();
    let mut page = api.fetch_posts(query).await?;
    page.page.get_or_insert(query.page);
    page.limit.get_or_insert(query.limit);

    info!(
        received = page.posts.len(),
        total = page.total,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Posts fetched"
    );
    Ok(page)
}
