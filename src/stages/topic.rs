use async_trait::async_trait;

use super::derived::DerivedStage;
use crate::error::Result;
use crate::events::Stage;
use crate::models::{Post, TopicBucket};
use crate::services::analytics_api::AnalyticsApi;

/// Groups the collection into the four fixed topics.
pub struct TopicStage;

#[async_trait]
impl DerivedStage for TopicStage {
    type Output = TopicBucket;

    const STAGE: Stage = Stage::Topic;

    async fn classify(
        &self,
        api: &dyn AnalyticsApi,
        posts: &[Post],
        selected_page: usize,
    ) -> Result<TopicBucket> {
        api.classify_topics(posts, selected_page).await
    }

    fn empty(&self) -> TopicBucket {
        TopicBucket::default()
    }
}
