//! Counting stand-in for the analytics service used by the stage tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{PipelineError, Result};
use crate::models::{
    Post, PostPage, SentimentBucket, TopicBucket, TrendPoint, WordAnalysis, WordScore,
};
use crate::services::analytics_api::{AnalyticsApi, PostQuery, TrendQuery};

/// Answers every call from the posts it is given, or fails every call.
#[derive(Default)]
pub(crate) struct CountingApi {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingApi {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self, endpoint: &'static str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::Status {
                endpoint,
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(())
    }
}

fn texts(posts: &[Post]) -> Vec<String> {
    posts.iter().map(|p| p.text.clone()).collect()
}

#[async_trait]
impl AnalyticsApi for CountingApi {
    async fn fetch_posts(&self, _query: &PostQuery) -> Result<PostPage> {
        self.call("/posts")?;
        Ok(PostPage::default())
    }

    async fn summarize(&self, posts: &[Post]) -> Result<String> {
        self.call("/school-summary-2")?;
        Ok(format!(" {} posts ", posts.len()))
    }

    async fn classify_sentiment(
        &self,
        posts: &[Post],
        _selected_page: usize,
    ) -> Result<SentimentBucket> {
        self.call("/sentiment")?;
        Ok(SentimentBucket {
            negative: texts(posts),
            ..Default::default()
        })
    }

    async fn classify_topics(&self, posts: &[Post], _selected_page: usize) -> Result<TopicBucket> {
        self.call("/topic-modeling")?;
        Ok(TopicBucket {
            facility: texts(posts),
            ..Default::default()
        })
    }

    async fn sentiment_trend(&self, _query: &TrendQuery) -> Result<Vec<TrendPoint>> {
        self.call("/sentiment-trend")?;
        Ok(Vec::new())
    }

    async fn word_analysis(&self, post: &Post) -> Result<WordAnalysis> {
        self.call("/word-analysis")?;
        let negative = post
            .text
            .split_whitespace()
            .last()
            .map(|word| WordScore {
                word: word.to_string(),
                confidence: 0.9,
            })
            .into_iter()
            .collect();
        Ok(WordAnalysis {
            negative,
            ..Default::default()
        })
    }
}
