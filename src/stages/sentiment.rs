use async_trait::async_trait;

use super::derived::DerivedStage;
use crate::error::Result;
use crate::events::Stage;
use crate::models::{Post, SentimentBucket};
use crate::services::analytics_api::AnalyticsApi;

/// Splits the collection into positive / negative / neutral texts.
pub struct SentimentStage;

#[async_trait]
impl DerivedStage for SentimentStage {
    type Output = SentimentBucket;

    const STAGE: Stage = Stage::Sentiment;

    async fn classify(
        &self,
        api: &dyn AnalyticsApi,
        posts: &[Post],
        selected_page: usize,
    ) -> Result<SentimentBucket> {
        api.classify_sentiment(posts, selected_page).await
    }

    fn empty(&self) -> SentimentBucket {
        SentimentBucket::default()
    }
}
