use tracing::info;

use crate::error::Result;
use crate::models::{Post, PostWordAnalysis};
use crate::services::analytics_api::AnalyticsApi;

/// Analyzes a single post: its sentiment-bearing words and the sentiment of
/// the post as a whole, requested concurrently. Either failure fails both.
#[tracing::instrument(skip(api, post), fields(post = %post.key()))]
pub async fn fetch_word_analysis(
    api: &dyn AnalyticsApi,
    post: &Post,
    selected_page: usize,
) -> Result<PostWordAnalysis> {
    let started = std::time::Instant::now();
    let (words, overall) = tokio::try_join!(
        api.word_analysis(post),
        api.classify_sentiment(std::slice::from_ref(post), selected_page),
    )?;

    info!(
        words = words.total(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Word analysis fetched"
    );
    Ok(PostWordAnalysis { words, overall })
}
