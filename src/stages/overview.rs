use async_trait::async_trait;

use super::derived::DerivedStage;
use crate::error::Result;
use crate::events::Stage;
use crate::models::Post;
use crate::services::analytics_api::AnalyticsApi;
use crate::store::NO_POSTS_MESSAGE;

/// Free-form summary of the collection from `/school-summary-2`.
pub struct OverviewStage;

#[async_trait]
impl DerivedStage for OverviewStage {
    type Output = String;

    const STAGE: Stage = Stage::Overview;

    async fn classify(
        &self,
        api: &dyn AnalyticsApi,
        posts: &[Post],
        _selected_page: usize,
    ) -> Result<String> {
        let text = api.summarize(posts).await?;
        Ok(text.trim().to_string())
    }

    fn empty(&self) -> String {
        NO_POSTS_MESSAGE.to_string()
    }

    /// A failed summary shows nothing; the error is reported beside it.
    fn failed(&self) -> String {
        String::new()
    }
}
