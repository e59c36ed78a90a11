use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Serialize;
use tracing::debug;

use super::decode;
use crate::error::{PipelineError, Result};
use crate::fetch::{HttpClient, fetch_text};
use crate::models::{Post, PostPage, SentimentBucket, TopicBucket, TrendPoint, WordAnalysis};
use crate::services::analytics_api::{AnalyticsApi, PostQuery, TrendQuery};

pub(crate) const POSTS: &str = "/posts";
pub(crate) const SUMMARY: &str = "/school-summary-2";
pub(crate) const SENTIMENT: &str = "/sentiment";
pub(crate) const TOPICS: &str = "/topic-modeling";
pub(crate) const TREND: &str = "/sentiment-trend";
pub(crate) const WORDS: &str = "/word-analysis";

/// Classifier request body shared by `/sentiment` and `/topic-modeling`.
#[derive(Serialize)]
struct ClassifyRequest<'a> {
    data: &'a [Post],
    #[serde(rename = "selectedPage")]
    selected_page: usize,
}

pub struct HttpAnalyticsClient<C> {
    client: C,
    base_url: Url,
}

impl<C: HttpClient> HttpAnalyticsClient<C> {
    pub fn new(client: C, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| PipelineError::InvalidRequest(format!("base url '{base_url}': {e}")))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined)
            .map_err(|e| PipelineError::InvalidRequest(format!("endpoint '{joined}': {e}")))
    }

    pub(crate) fn get_request(&self, path: &str, params: &[(&'static str, String)]) -> Result<Request> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(Request::new(Method::GET, url))
    }

    pub(crate) fn post_request(&self, path: &str, body: &impl Serialize) -> Result<Request> {
        let url = self.endpoint(path)?;
        let bytes = serde_json::to_vec(body)
            .map_err(|e| PipelineError::InvalidRequest(format!("encoding {path} body: {e}")))?;

        let mut req = Request::new(Method::POST, url);
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(bytes.into());
        Ok(req)
    }
}

#[async_trait]
impl<C: HttpClient> AnalyticsApi for HttpAnalyticsClient<C> {
    async fn fetch_posts(&self, query: &PostQuery) -> Result<PostPage> {
        let req = self.get_request(POSTS, &query.params())?;
        debug!(url = %req.url(), "Fetching posts");
        let body = fetch_text(&self.client, POSTS, req).await?;
        decode::posts(&body)
    }

    async fn summarize(&self, posts: &[Post]) -> Result<String> {
        let req = self.post_request(SUMMARY, &posts)?;
        let body = fetch_text(&self.client, SUMMARY, req).await?;
        decode::overview(&body)
    }

    async fn classify_sentiment(
        &self,
        posts: &[Post],
        selected_page: usize,
    ) -> Result<SentimentBucket> {
        let req = self.post_request(
            SENTIMENT,
            &ClassifyRequest {
                data: posts,
                selected_page,
            },
        )?;
        let body = fetch_text(&self.client, SENTIMENT, req).await?;
        decode::sentiment(&body)
    }

    async fn classify_topics(&self, posts: &[Post], selected_page: usize) -> Result<TopicBucket> {
        let req = self.post_request(
            TOPICS,
            &ClassifyRequest {
                data: posts,
                selected_page,
            },
        )?;
        let body = fetch_text(&self.client, TOPICS, req).await?;
        decode::topics(&body)
    }

    async fn sentiment_trend(&self, query: &TrendQuery) -> Result<Vec<TrendPoint>> {
        let req = self.get_request(TREND, &query.params())?;
        debug!(url = %req.url(), "Fetching sentiment trend");
        let body = fetch_text(&self.client, TREND, req).await?;
        decode::trend(&body)
    }

    async fn word_analysis(&self, post: &Post) -> Result<WordAnalysis> {
        let req = self.post_request(WORDS, post)?;
        let body = fetch_text(&self.client, WORDS, req).await?;
        decode::word_analysis(&body)
    }
}
