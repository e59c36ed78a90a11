use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::events::Stage;
use crate::models::Post;
use crate::services::analytics_api::AnalyticsApi;
use crate::store::Settled;

/// A classifier stage run over the post collection.
#[async_trait]
pub trait DerivedStage: Send + Sync {
    type Output: Clone + Send + Sync + 'static;

    const STAGE: Stage;

    /// Calls the remote classifier. Never invoked with an empty collection.
    async fn classify(
        &self,
        api: &dyn AnalyticsApi,
        posts: &[Post],
        selected_page: usize,
    ) -> Result<Self::Output>;

    /// Value for an empty collection.
    fn empty(&self) -> Self::Output;

    /// What a failed stage resets to. Defaults to [`DerivedStage::empty`].
    fn failed(&self) -> Self::Output {
        self.empty()
    }
}

/// Runs `stage` over `posts`. An empty collection short-circuits to the
/// stage's empty shape without touching the network.
#[tracing::instrument(skip_all, fields(stage = %S::STAGE, posts = posts.len()))]
pub async fn analyze<S: DerivedStage>(
    stage: &S,
    api: &dyn AnalyticsApi,
    posts: &[Post],
    selected_page: usize,
) -> Result<S::Output> {
    if posts.is_empty() {
        debug!("Empty input, classifier not called");
        return Ok(stage.empty());
    }
    stage.classify(api, posts, selected_page).await
}

/// Same as [`analyze`], folded into what the store should hold: the result,
/// or the error message over the stage's failure shape.
pub async fn settle<S: DerivedStage>(
    stage: &S,
    api: &dyn AnalyticsApi,
    posts: &[Post],
    selected_page: usize,
) -> Settled<S::Output> {
    let started = std::time::Instant::now();
    match analyze(stage, api, posts, selected_page).await {
        Ok(value) => {
            debug!(
                stage = %S::STAGE,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stage ready"
            );
            Settled::Ready(value)
        }
        Err(e) => {
            warn!(stage = %S::STAGE, kind = e.kind(), error = %e, "Stage failed");
            Settled::Failed {
                error: e.to_string(),
                shown: stage.failed(),
            }
        }
    }
}
