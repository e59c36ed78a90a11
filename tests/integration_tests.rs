use async_trait::async_trait;
use campus_pulse::error::{PipelineError, Result};
use campus_pulse::events::{PipelineEvent, Stage, wait_for};
use campus_pulse::models::{
    Post, PostPage, SentimentBucket, Topic, TopicBucket, TrendPoint, WordAnalysis, WordScore,
};
use campus_pulse::orchestrator::{Orchestrator, Settings};
use campus_pulse::pages::PageCatalog;
use campus_pulse::range;
use campus_pulse::services::analytics_api::{AnalyticsApi, PostQuery, TrendQuery};
use campus_pulse::stages::trend::fallback_series;
use campus_pulse::store::{NO_POSTS_MESSAGE, RequestId, Section, Status};
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(5);

/// One scripted reply of `fetch_posts`. `None` posts means the call fails.
struct ScriptedPosts {
    delay: Duration,
    posts: Option<Vec<Post>>,
}

/// In-memory analytics service with call counters, delays and failures.
#[derive(Default)]
struct FakeApi {
    posts: Mutex<Vec<Post>>,
    script: Mutex<VecDeque<ScriptedPosts>>,
    fail_posts: AtomicBool,
    overview_delay: Duration,
    sentiment_delay: Duration,
    fail_overview: bool,
    fail_topics: bool,
    fail_trend: bool,
    fail_words: AtomicBool,
    slow_trend_topic: Option<Topic>,

    post_calls: AtomicUsize,
    summary_calls: AtomicUsize,
    sentiment_calls: AtomicUsize,
    topic_calls: AtomicUsize,
    trend_calls: AtomicUsize,
    word_calls: AtomicUsize,
    last_post_query: Mutex<Option<PostQuery>>,
    last_selected_page: Mutex<Option<usize>>,
}

impl FakeApi {
    fn with_posts(texts: &[&str]) -> Self {
        Self {
            posts: Mutex::new(texts.iter().map(|t| Post::new(*t)).collect()),
            ..Default::default()
        }
    }

    fn classifier_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
            + self.sentiment_calls.load(Ordering::SeqCst)
            + self.topic_calls.load(Ordering::SeqCst)
    }

    fn replying(&self, delay: Duration, texts: &[&str]) {
        self.script.lock().unwrap().push_back(ScriptedPosts {
            delay,
            posts: Some(texts.iter().map(|t| Post::new(*t)).collect()),
        });
    }
}

fn down(endpoint: &'static str) -> PipelineError {
    PipelineError::Status {
        endpoint,
        status: 503,
        body: "service unavailable".to_string(),
    }
}

#[async_trait]
impl AnalyticsApi for FakeApi {
    async fn fetch_posts(&self, query: &PostQuery) -> Result<PostPage> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_post_query.lock().unwrap() = Some(query.clone());

        let scripted = self.script.lock().unwrap().pop_front();
        let posts = match scripted {
            Some(ScriptedPosts { delay, posts }) => {
                tokio::time::sleep(delay).await;
                posts
            }
            None if self.fail_posts.load(Ordering::SeqCst) => None,
            None => Some(self.posts.lock().unwrap().clone()),
        };

        let posts = posts.ok_or_else(|| down("/posts"))?;
        Ok(PostPage {
            total: posts.len(),
            posts,
            ..Default::default()
        })
    }

    async fn summarize(&self, posts: &[Post]) -> Result<String> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.overview_delay).await;
        if self.fail_overview {
            return Err(down("/school-summary-2"));
        }
        Ok(format!("{} posts summarized", posts.len()))
    }

    async fn classify_sentiment(
        &self,
        posts: &[Post],
        selected_page: usize,
    ) -> Result<SentimentBucket> {
        self.sentiment_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_selected_page.lock().unwrap() = Some(selected_page);
        tokio::time::sleep(self.sentiment_delay).await;
        Ok(SentimentBucket {
            positive: posts.iter().map(|p| p.text.clone()).collect(),
            ..Default::default()
        })
    }

    async fn classify_topics(&self, posts: &[Post], _selected_page: usize) -> Result<TopicBucket> {
        self.topic_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_topics {
            return Err(PipelineError::malformed("/topic-modeling", "no data field"));
        }
        Ok(TopicBucket {
            student: posts.iter().map(|p| p.text.clone()).collect(),
            ..Default::default()
        })
    }

    async fn sentiment_trend(&self, query: &TrendQuery) -> Result<Vec<TrendPoint>> {
        self.trend_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_trend {
            return Err(down("/sentiment-trend"));
        }
        if query.topic.is_some() && query.topic == self.slow_trend_topic {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let label = query.topic.map(Topic::name).unwrap_or("all");
        Ok(vec![TrendPoint {
            day: label.to_string(),
            positive: 1,
            negative: 0,
            neutral: 2,
        }])
    }

    async fn word_analysis(&self, post: &Post) -> Result<WordAnalysis> {
        self.word_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_words.load(Ordering::SeqCst) {
            return Err(down("/word-analysis"));
        }
        Ok(WordAnalysis {
            positive: post
                .text
                .split_whitespace()
                .map(|word| WordScore {
                    word: word.to_string(),
                    confidence: 0.75,
                })
                .collect(),
            ..Default::default()
        })
    }
}

fn orchestrator(api: &Arc<FakeApi>) -> Orchestrator {
    Orchestrator::new(api.clone(), PageCatalog::default(), Settings::default())
}

async fn analysis_settled(
    rx: &mut broadcast::Receiver<PipelineEvent>,
    request: RequestId,
) -> Vec<PipelineEvent> {
    wait_for(rx, WAIT, |e| {
        matches!(e, PipelineEvent::AnalysisSettled { request: r, .. } if *r == request)
    })
    .await
    .expect("analysis did not settle")
}

async fn trend_settled(rx: &mut broadcast::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    wait_for(rx, WAIT, |e| matches!(e, PipelineEvent::TrendSettled { .. }))
        .await
        .expect("trend did not settle")
}

#[tokio::test]
async fn test_mount_runs_every_stage() {
    let api = Arc::new(FakeApi::with_posts(&["wifi is slow", "great lecturer"]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let request = orch.start().await.unwrap();
    analysis_settled(&mut events, request).await;

    let state = orch.snapshot();
    assert_eq!(state.posts.posts.len(), 2);
    assert!(!state.posts.is_loading);
    assert_eq!(state.overview.ready().map(String::as_str), Some("2 posts summarized"));
    assert_eq!(state.sentiment.ready().map(SentimentBucket::total), Some(2));
    assert_eq!(state.topics.ready().map(TopicBucket::total), Some(2));
    assert_eq!(api.post_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.classifier_calls(), 3);
}

#[tokio::test]
async fn test_mount_query_uses_normalized_default_range() {
    let api = Arc::new(FakeApi::with_posts(&["x"]));
    let orch = orchestrator(&api);

    orch.start().await.unwrap();

    let query = api.last_post_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.page, 1);
    assert_eq!(query.limit, 50);
    assert_eq!(query.range.start, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    assert_eq!(query.range.end, range::today());
}

#[tokio::test]
async fn test_empty_collection_skips_classifiers() {
    let api = Arc::new(FakeApi::with_posts(&[]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let request = orch.start().await.unwrap();
    let seen = analysis_settled(&mut events, request).await;

    assert!(matches!(
        seen.last(),
        Some(PipelineEvent::AnalysisSettled { empty: true, .. })
    ));
    let state = orch.snapshot();
    assert_eq!(state.overview.ready().map(String::as_str), Some(NO_POSTS_MESSAGE));
    assert_eq!(state.sentiment.ready(), Some(&SentimentBucket::default()));
    assert_eq!(state.topics.ready(), Some(&TopicBucket::default()));
    assert_eq!(api.classifier_calls(), 0);
}

#[tokio::test]
async fn test_trend_failure_uses_twelve_month_fallback() {
    let api = Arc::new(FakeApi {
        fail_trend: true,
        ..FakeApi::with_posts(&["x"])
    });
    let orch = orchestrator(&api);
    let mut events = orch.events();

    orch.start().await.unwrap();
    let seen = trend_settled(&mut events).await;
    assert!(matches!(
        seen.last(),
        Some(PipelineEvent::TrendSettled { fallback: true, .. })
    ));

    let state = orch.snapshot();
    assert_eq!(state.trend.status(), Status::Error);
    assert!(state.trend.error().unwrap().contains("503"));

    let points = state.trend.renderable();
    assert_eq!(points.len(), 12);
    assert!(points.iter().all(|p| p.positive + p.negative + p.neutral == 0));
    assert_eq!(points, &fallback_series(range::today()));
}

#[tokio::test]
async fn test_fast_stage_settles_before_slow_one() {
    let api = Arc::new(FakeApi {
        overview_delay: Duration::from_millis(200),
        ..FakeApi::with_posts(&["a", "b"])
    });
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let request = orch.start().await.unwrap();
    let seen = analysis_settled(&mut events, request).await;

    let settled: Vec<Stage> = seen
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StageSettled { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(settled.len(), 3);
    assert_eq!(settled.last(), Some(&Stage::Overview));

    let sentiment_at = settled.iter().position(|s| *s == Stage::Sentiment).unwrap();
    let overview_at = settled.iter().position(|s| *s == Stage::Overview).unwrap();
    assert!(sentiment_at < overview_at);
}

#[tokio::test]
async fn test_sentiment_ready_while_overview_still_loading() {
    let api = Arc::new(FakeApi {
        overview_delay: Duration::from_millis(300),
        ..FakeApi::with_posts(&["a"])
    });
    let orch = orchestrator(&api);
    let mut events = orch.events();

    orch.start().await.unwrap();
    wait_for(&mut events, WAIT, |e| {
        matches!(e, PipelineEvent::StageSettled { stage: Stage::Sentiment, .. })
    })
    .await
    .unwrap();

    let state = orch.snapshot();
    assert_eq!(state.sentiment.status(), Status::Ready);
    assert!(state.overview.is_loading());
}

#[tokio::test]
async fn test_failed_stage_leaves_siblings_ready() {
    let api = Arc::new(FakeApi {
        fail_topics: true,
        ..FakeApi::with_posts(&["a", "b", "c"])
    });
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let request = orch.start().await.unwrap();
    let seen = analysis_settled(&mut events, request).await;
    assert!(seen.iter().any(|e| matches!(
        e,
        PipelineEvent::StageSettled { stage: Stage::Topic, ok: false, .. }
    )));

    let state = orch.snapshot();
    assert_eq!(state.topics.status(), Status::Error);
    assert_eq!(state.topics.renderable(), &TopicBucket::default());
    assert!(state.topics.error().unwrap().contains("no data field"));
    assert_eq!(state.overview.status(), Status::Ready);
    assert_eq!(state.sentiment.status(), Status::Ready);

    assert!(orch.dismiss_error(Section::Topics));
    let state = orch.snapshot();
    assert_eq!(state.topics.error(), None);
    assert_eq!(state.topics.renderable(), &TopicBucket::default());
}

#[tokio::test]
async fn test_all_stages_fail_independently_of_posts() {
    let api = Arc::new(FakeApi {
        fail_overview: true,
        fail_topics: true,
        ..FakeApi::with_posts(&["a"])
    });
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let request = orch.start().await.unwrap();
    analysis_settled(&mut events, request).await;

    let state = orch.snapshot();
    assert_eq!(state.overview.status(), Status::Error);
    // the "no posts" message is reserved for a truly empty collection
    assert_eq!(state.overview.renderable(), "");
    assert!(state.overview.error().unwrap().contains("503"));
    assert_eq!(state.sentiment.status(), Status::Ready);
    assert_eq!(state.posts.posts.len(), 1);
    assert_eq!(state.posts.error, None);
}

#[tokio::test]
async fn test_failed_post_fetch_keeps_previous_collection() {
    let api = Arc::new(FakeApi::with_posts(&["kept"]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let request = orch.start().await.unwrap();
    analysis_settled(&mut events, request).await;
    let calls_before = api.classifier_calls();

    api.fail_posts.store(true, Ordering::SeqCst);
    let err = orch.search().await.unwrap_err();
    assert!(matches!(err, PipelineError::Status { status: 503, .. }));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let state = orch.snapshot();
    assert!(!state.posts.is_loading);
    assert_eq!(state.posts.posts[0].text, "kept");
    assert!(state.posts.error.as_deref().unwrap().contains("503"));
    assert_eq!(api.classifier_calls(), calls_before);
    assert_eq!(state.overview.status(), Status::Ready);

    assert!(orch.dismiss_error(Section::Posts));
    assert!(!orch.dismiss_error(Section::Posts));
}

#[tokio::test]
async fn test_stale_post_response_is_discarded() {
    let api = Arc::new(FakeApi::with_posts(&["mount"]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let request = orch.start().await.unwrap();
    analysis_settled(&mut events, request).await;

    api.replying(Duration::from_millis(300), &["old"]);
    api.replying(Duration::ZERO, &["new"]);

    let (slow, fast) = tokio::join!(orch.search(), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        orch.search().await
    });
    let (slow, fast) = (slow.unwrap(), fast.unwrap());
    assert!(slow < fast);

    analysis_settled(&mut events, fast).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let state = orch.snapshot();
    assert_eq!(state.posts.posts.len(), 1);
    assert_eq!(state.posts.posts[0].text, "new");
    assert_eq!(state.overview.ready().map(String::as_str), Some("1 posts summarized"));
    // mount cycle plus the fast one; the stale collection never reached the classifiers
    assert_eq!(api.summary_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stale_trend_response_is_discarded() {
    let api = Arc::new(FakeApi {
        slow_trend_topic: Some(Topic::Facility),
        ..FakeApi::with_posts(&["x"])
    });
    let orch = orchestrator(&api);
    let mut events = orch.events();

    orch.start().await.unwrap();
    trend_settled(&mut events).await;

    assert!(orch.select_topic(Some(Topic::Facility)));
    assert!(orch.select_topic(Some(Topic::Lecturer)));

    trend_settled(&mut events).await;
    // give the slow facility reply time to arrive and be dropped
    tokio::time::sleep(Duration::from_millis(400)).await;

    let state = orch.snapshot();
    assert_eq!(state.trend.status(), Status::Ready);
    assert_eq!(state.trend.renderable()[0].day, "lecturer");
    assert_eq!(api.trend_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_trend_follows_topic_and_dates_but_not_page() {
    let api = Arc::new(FakeApi::with_posts(&["x"]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    orch.start().await.unwrap();
    trend_settled(&mut events).await;
    assert_eq!(api.trend_calls.load(Ordering::SeqCst), 1);

    assert!(orch.select_page(1));
    assert!(!orch.select_topic(None));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(api.trend_calls.load(Ordering::SeqCst), 1);

    assert!(orch.set_start_date(NaiveDate::from_ymd_opt(2024, 1, 1)));
    trend_settled(&mut events).await;
    assert_eq!(api.trend_calls.load(Ordering::SeqCst), 2);

    // filter edits alone never refetch posts
    assert_eq!(api.post_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_classifiers_receive_selected_page() {
    let api = Arc::new(FakeApi::with_posts(&["x"]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let index = orch
        .add_page_from_link("https://www.facebook.com/newpage?ref=bookmarks")
        .unwrap();
    assert_eq!(index, 4);
    assert_eq!(orch.snapshot().selected_page_name(), Some("newpage"));

    let request = orch.start().await.unwrap();
    analysis_settled(&mut events, request).await;

    assert_eq!(*api.last_selected_page.lock().unwrap(), Some(4));
    let query = api.last_post_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.selected_page, 4);
}

#[tokio::test]
async fn test_go_to_page_updates_pagination() {
    let posts: Vec<String> = (0..5).map(|i| format!("post {i}")).collect();
    let texts: Vec<&str> = posts.iter().map(String::as_str).collect();
    let api = Arc::new(FakeApi::with_posts(&texts));
    let orch = Orchestrator::new(api.clone(), PageCatalog::default(), Settings { posts_limit: 1 });

    orch.start().await.unwrap();
    orch.go_to_page(3).await.unwrap();

    let query = api.last_post_query.lock().unwrap().clone().unwrap();
    assert_eq!(query.page, 3);
    assert_eq!(query.limit, 1);

    let state = orch.snapshot();
    assert_eq!(state.posts.page, 3);
    assert_eq!(state.posts.total_pages(), 5);
    let tokens: Vec<String> = orch.page_tokens().iter().map(ToString::to_string).collect();
    assert_eq!(tokens, vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn test_watch_reports_overview_ready() {
    let api = Arc::new(FakeApi {
        overview_delay: Duration::from_millis(50),
        ..FakeApi::with_posts(&["a"])
    });
    let orch = orchestrator(&api);
    let mut state = orch.watch();

    orch.start().await.unwrap();
    let ready = tokio::time::timeout(
        WAIT,
        state.wait_for(|s| s.overview.status() == Status::Ready),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(ready.overview.renderable(), "1 posts summarized");
}

#[tokio::test]
async fn test_shutdown_stops_listeners() {
    let api = Arc::new(FakeApi::with_posts(&["a"]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let request = orch.start().await.unwrap();
    analysis_settled(&mut events, request).await;
    orch.shutdown();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let request = orch.search().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(orch.snapshot().posts.posts.len(), 1);
    assert_eq!(api.summary_calls.load(Ordering::SeqCst), 1);
    assert!(request > RequestId(1));
}

#[tokio::test]
async fn test_filter_changes_before_start_wait_for_mount_trend() {
    let api = Arc::new(FakeApi::with_posts(&["x"]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    assert!(orch.select_topic(Some(Topic::Student)));
    assert!(orch.set_end_date(NaiveDate::from_ymd_opt(2025, 1, 1)));
    assert_eq!(orch.snapshot().trend.status(), Status::Idle);

    orch.start().await.unwrap();
    trend_settled(&mut events).await;

    let state = orch.snapshot();
    assert_eq!(state.trend.status(), Status::Ready);
    assert_eq!(state.trend.renderable()[0].day, "student");
    assert_eq!(api.trend_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_filter_changes_after_shutdown_leave_trend_settled() {
    let api = Arc::new(FakeApi::with_posts(&["x"]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    orch.start().await.unwrap();
    trend_settled(&mut events).await;
    orch.shutdown();

    assert!(orch.select_topic(Some(Topic::Program)));
    assert!(orch.set_date_range(NaiveDate::from_ymd_opt(2024, 1, 1), None));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let state = orch.snapshot();
    assert_eq!(state.trend.status(), Status::Ready);
    assert_eq!(state.trend.renderable()[0].day, "all");
    assert_eq!(api.trend_calls.load(Ordering::SeqCst), 1);

    // a restart picks the pending filters up
    orch.start().await.unwrap();
    trend_settled(&mut events).await;
    assert_eq!(orch.snapshot().trend.renderable()[0].day, "program");
    assert_eq!(api.trend_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_word_analysis_is_cached_per_post() {
    let api = Arc::new(FakeApi::with_posts(&["great lecturer"]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let request = orch.start().await.unwrap();
    analysis_settled(&mut events, request).await;
    let sentiment_before = api.sentiment_calls.load(Ordering::SeqCst);

    let post = orch.snapshot().posts.posts[0].clone();
    let first = orch.analyze_post_words(&post).await.unwrap();
    assert_eq!(first.words.positive.len(), 2);
    assert_eq!(first.overall_label(&post.text), Some("positive"));
    assert_eq!(api.word_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.sentiment_calls.load(Ordering::SeqCst), sentiment_before + 1);

    let second = orch.analyze_post_words(&post).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(api.word_calls.load(Ordering::SeqCst), 1);
    assert_eq!(api.sentiment_calls.load(Ordering::SeqCst), sentiment_before + 1);

    let state = orch.snapshot();
    let slot = state.word_analysis_for(post.key()).unwrap();
    assert_eq!(slot.ready(), Some(&first));
}

#[tokio::test]
async fn test_word_analysis_failure_is_isolated_and_retried() {
    let api = Arc::new(FakeApi::with_posts(&["wifi"]));
    let orch = orchestrator(&api);
    let mut events = orch.events();

    let request = orch.start().await.unwrap();
    analysis_settled(&mut events, request).await;

    let post = orch.snapshot().posts.posts[0].clone();
    api.fail_words.store(true, Ordering::SeqCst);
    let err = orch.analyze_post_words(&post).await.unwrap_err();
    assert!(matches!(err, PipelineError::Status { status: 503, .. }));

    let seen = wait_for(&mut events, WAIT, |e| {
        matches!(e, PipelineEvent::WordsSettled { ok: false, .. })
    })
    .await;
    assert!(seen.is_some());

    let state = orch.snapshot();
    let slot = state.word_analysis_for(post.key()).unwrap();
    assert_eq!(slot.status(), Status::Error);
    assert!(slot.error().unwrap().contains("503"));
    assert_eq!(state.overview.status(), Status::Ready);
    assert_eq!(state.sentiment.status(), Status::Ready);
    assert_eq!(state.posts.error, None);

    assert!(orch.dismiss_word_error(&post));

    api.fail_words.store(false, Ordering::SeqCst);
    orch.analyze_post_words(&post).await.unwrap();
    assert_eq!(api.word_calls.load(Ordering::SeqCst), 2);
    let state = orch.snapshot();
    assert_eq!(
        state.word_analysis_for(post.key()).unwrap().status(),
        Status::Ready
    );
}
