//! Trait and request types for the external analytics service.
//!
//! The service owns post storage and every classifier; the pipeline only
//! needs the calls on [`AnalyticsApi`].

use crate::error::Result;
use crate::models::{
    Post, PostPage, SentimentBucket, Topic, TopicBucket, TrendPoint, WordAnalysis,
};
use crate::range::DateRange;
use crate::store::FilterState;
use serde::Serialize;

/// Default page size of the primary post fetch.
pub const DEFAULT_POSTS_LIMIT: u32 = 50;

/// Parameters of `GET /posts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostQuery {
    pub page: u32,
    pub limit: u32,
    pub selected_page: usize,
    pub topic: Option<Topic>,
    pub range: DateRange,
}

impl PostQuery {
    pub fn from_filters(filters: &FilterState, page: u32, limit: u32) -> Self {
        Self::with_range(filters, page, limit, filters.range())
    }

    pub fn with_range(filters: &FilterState, page: u32, limit: u32, range: DateRange) -> Self {
        Self {
            page: page.max(1),
            limit,
            selected_page: filters.selected_page,
            topic: filters.selected_topic,
            range,
        }
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("selected_page", self.selected_page.to_string()),
            ("topic", topic_param(self.topic)),
            ("start_date", self.range.start_param()),
            ("end_date", self.range.end_param()),
        ]
    }
}

/// Parameters of `GET /sentiment-trend`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendQuery {
    pub topic: Option<Topic>,
    pub selected_page: usize,
    pub range: DateRange,
}

impl TrendQuery {
    pub fn from_filters(filters: &FilterState) -> Self {
        Self::with_range(filters, filters.range())
    }

    pub fn with_range(filters: &FilterState, range: DateRange) -> Self {
        Self {
            topic: filters.selected_topic,
            selected_page: filters.selected_page,
            range,
        }
    }

    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("topic", topic_param(self.topic)),
            ("selectedPage", self.selected_page.to_string()),
            ("start_date", self.range.start_param()),
            ("end_date", self.range.end_param()),
        ]
    }
}

/// Empty string means "all topics" to the service.
fn topic_param(topic: Option<Topic>) -> String {
    topic.map(|t| t.code().to_string()).unwrap_or_default()
}

/// Abstraction over the analytics service (post query + classifiers).
#[async_trait::async_trait]
pub trait AnalyticsApi: Send + Sync {
    async fn fetch_posts(&self, query: &PostQuery) -> Result<PostPage>;

    /// Free-form overview text for a post collection.
    async fn summarize(&self, posts: &[Post]) -> Result<String>;

    async fn classify_sentiment(&self, posts: &[Post], selected_page: usize)
        -> Result<SentimentBucket>;

    async fn classify_topics(&self, posts: &[Post], selected_page: usize) -> Result<TopicBucket>;

    /// Already-bucketed, ordered trend series for the query window.
    async fn sentiment_trend(&self, query: &TrendQuery) -> Result<Vec<TrendPoint>>;

    /// Word-level sentiment of a single post.
    async fn word_analysis(&self, post: &Post) -> Result<WordAnalysis>;
}
