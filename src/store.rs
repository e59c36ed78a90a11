//! Owned dashboard state: filters, the posts slot and one result slot per
//! stage, updated only through [`Action`]s.
//!
//! Every fetch is tagged with a [`RequestId`]. A slot remembers the id of the
//! latest request it started and drops any settlement carrying an older one,
//! so a slow stale response can never overwrite a fresher result.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

use crate::models::{Post, PostWordAnalysis, SentimentBucket, Topic, TopicBucket, TrendPoint};
use crate::pagination::{self, PageToken};
use crate::range::DateRange;

/// Overview text shown whenever the fetched collection is empty.
pub const NO_POSTS_MESSAGE: &str = "No posts in the selected time range.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// User-selected filters. Only explicit filter actions change these.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FilterState {
    /// Index into the page catalog.
    pub selected_page: usize,
    /// `None` means all topics.
    pub selected_topic: Option<Topic>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl FilterState {
    pub fn range(&self) -> DateRange {
        DateRange::normalize(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Loading,
    Ready,
    Error,
}

/// State of one stage.
///
/// `value` is always renderable (last result, empty shape or fallback), but
/// it is only the stage's answer when `status` is [`Status::Ready`]; use
/// [`AnalysisResult::ready`] to branch on that.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult<T> {
    status: Status,
    value: T,
    error: Option<String>,
    #[serde(skip)]
    latest: Option<RequestId>,
}

impl<T: Default> Default for AnalysisResult<T> {
    fn default() -> Self {
        Self::idle(T::default())
    }
}

impl<T> AnalysisResult<T> {
    pub fn idle(value: T) -> Self {
        Self {
            status: Status::Idle,
            value,
            error: None,
            latest: None,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    pub fn ready(&self) -> Option<&T> {
        (self.status == Status::Ready).then_some(&self.value)
    }

    pub fn renderable(&self) -> &T {
        &self.value
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Marks the slot as loading for `request`. Refused if a newer request
    /// already owns the slot.
    fn begin(&mut self, request: RequestId) -> bool {
        if self.latest.is_some_and(|latest| latest > request) {
            return false;
        }
        self.status = Status::Loading;
        self.error = None;
        self.latest = Some(request);
        true
    }

    fn is_current(&self, request: RequestId) -> bool {
        self.latest == Some(request)
    }

    /// Applies a settlement for `request`. Returns `false` if it is stale.
    fn settle(&mut self, request: RequestId, outcome: Settled<T>) -> bool {
        if !self.is_current(request) {
            return false;
        }
        match outcome {
            Settled::Ready(value) => {
                self.status = Status::Ready;
                self.value = value;
                self.error = None;
            }
            Settled::Failed { error, shown } => {
                self.status = Status::Error;
                self.value = shown;
                self.error = Some(error);
            }
        }
        true
    }

    fn force_ready(&mut self, request: RequestId, value: T) -> bool {
        if !self.begin(request) {
            return false;
        }
        self.status = Status::Ready;
        self.value = value;
        true
    }
}

/// Result of one stage call as fed to the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    Ready(T),
    /// `shown` is what stays on screen under the error message.
    Failed { error: String, shown: T },
}

/// The primary post collection. A failed fetch keeps the previous posts.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PostsState {
    pub is_loading: bool,
    pub posts: Arc<Vec<Post>>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub error: Option<String>,
    #[serde(skip)]
    latest: Option<RequestId>,
}

impl PostsState {
    pub fn total_pages(&self) -> u32 {
        pagination::total_pages_for(self.total, self.limit)
    }

    /// The received posts, most interacted-with first. Ties keep the
    /// service's order.
    pub fn by_interactions(&self) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self.posts.iter().collect();
        posts.sort_by_key(|post| std::cmp::Reverse(post.interactions()));
        posts
    }
}

/// Section of the dashboard that can show an error banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Posts,
    Overview,
    Sentiment,
    Topics,
    Trend,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Posts => "posts",
            Section::Overview => "overview",
            Section::Sentiment => "sentiment",
            Section::Topics => "topics",
            Section::Trend => "trend",
        };
        f.write_str(name)
    }
}

/// Everything a presentation layer needs to draw the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardState {
    pub filters: FilterState,
    pub pages: Vec<String>,
    pub posts: PostsState,
    pub overview: AnalysisResult<String>,
    pub sentiment: AnalysisResult<SentimentBucket>,
    pub topics: AnalysisResult<TopicBucket>,
    pub trend: AnalysisResult<Vec<TrendPoint>>,
    /// On-demand word analysis, keyed by [`Post::key`]. Entries outlive the
    /// collection they were requested from.
    pub word_analysis: BTreeMap<String, AnalysisResult<PostWordAnalysis>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SelectPage(usize),
    SelectTopic(Option<Topic>),
    SetStartDate(Option<NaiveDate>),
    SetEndDate(Option<NaiveDate>),
    /// Appends a source page if it is not known yet and selects it.
    AddPage(String),

    PostsRequested { request: RequestId, page: u32, limit: u32 },
    PostsLoaded {
        request: RequestId,
        posts: Arc<Vec<Post>>,
        total: usize,
    },
    PostsFailed { request: RequestId, error: String },

    AnalysisStarted { request: RequestId },
    /// The collection was empty: every derived slot goes straight to its
    /// empty shape.
    AnalysisEmpty { request: RequestId },
    OverviewSettled { request: RequestId, outcome: Settled<String> },
    SentimentSettled { request: RequestId, outcome: Settled<SentimentBucket> },
    TopicsSettled { request: RequestId, outcome: Settled<TopicBucket> },

    TrendRequested { request: RequestId },
    TrendSettled { request: RequestId, outcome: Settled<Vec<TrendPoint>> },

    DismissError(Section),

    WordAnalysisRequested { request: RequestId, key: String },
    WordAnalysisSettled {
        request: RequestId,
        key: String,
        outcome: Settled<PostWordAnalysis>,
    },
    DismissWordError(String),
}

impl DashboardState {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            filters: FilterState::default(),
            pages,
            posts: PostsState::default(),
            overview: AnalysisResult::default(),
            sentiment: AnalysisResult::default(),
            topics: AnalysisResult::default(),
            trend: AnalysisResult::default(),
            word_analysis: BTreeMap::new(),
        }
    }

    pub fn word_analysis_for(&self, key: &str) -> Option<&AnalysisResult<PostWordAnalysis>> {
        self.word_analysis.get(key)
    }

    pub fn selected_page_name(&self) -> Option<&str> {
        self.pages.get(self.filters.selected_page).map(String::as_str)
    }

    /// Pagination tokens for the post list.
    pub fn page_tokens(&self) -> Vec<PageToken> {
        pagination::index_tokens(self.posts.page.max(1), self.posts.total_pages())
    }

    /// Reducer. Returns `true` if the state changed.
    pub fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::SelectPage(index) => {
                if index >= self.pages.len() || self.filters.selected_page == index {
                    return false;
                }
                self.filters.selected_page = index;
                true
            }
            Action::SelectTopic(topic) => replace(&mut self.filters.selected_topic, topic),
            Action::SetStartDate(date) => replace(&mut self.filters.start_date, date),
            Action::SetEndDate(date) => replace(&mut self.filters.end_date, date),
            Action::AddPage(name) => {
                let index = match self.pages.iter().position(|p| *p == name) {
                    Some(index) => index,
                    None => {
                        self.pages.push(name);
                        self.pages.len() - 1
                    }
                };
                self.filters.selected_page = index;
                true
            }

            Action::PostsRequested {
                request,
                page,
                limit,
            } => {
                if self.posts.latest.is_some_and(|latest| latest > request) {
                    return stale(Section::Posts, request);
                }
                self.posts.is_loading = true;
                self.posts.error = None;
                self.posts.page = page;
                self.posts.limit = limit;
                self.posts.latest = Some(request);
                true
            }
            Action::PostsLoaded {
                request,
                posts,
                total,
            } => {
                if self.posts.latest != Some(request) {
                    return stale(Section::Posts, request);
                }
                self.posts.is_loading = false;
                self.posts.total = total;
                self.posts.posts = posts;
                true
            }
            Action::PostsFailed { request, error } => {
                if self.posts.latest != Some(request) {
                    return stale(Section::Posts, request);
                }
                self.posts.is_loading = false;
                self.posts.error = Some(error);
                true
            }

            Action::AnalysisStarted { request } => {
                // the three slots always start together, so they agree on `latest`
                if !self.overview.begin(request) {
                    return stale(Section::Overview, request);
                }
                self.sentiment.begin(request);
                self.topics.begin(request);
                true
            }
            Action::AnalysisEmpty { request } => {
                if !self
                    .overview
                    .force_ready(request, NO_POSTS_MESSAGE.to_string())
                {
                    return stale(Section::Overview, request);
                }
                self.sentiment.force_ready(request, SentimentBucket::default());
                self.topics.force_ready(request, TopicBucket::default());
                true
            }
            Action::OverviewSettled { request, outcome } => {
                self.overview.settle(request, outcome) || stale(Section::Overview, request)
            }
            Action::SentimentSettled { request, outcome } => {
                self.sentiment.settle(request, outcome) || stale(Section::Sentiment, request)
            }
            Action::TopicsSettled { request, outcome } => {
                self.topics.settle(request, outcome) || stale(Section::Topics, request)
            }

            Action::TrendRequested { request } => {
                self.trend.begin(request) || stale(Section::Trend, request)
            }
            Action::TrendSettled { request, outcome } => {
                self.trend.settle(request, outcome) || stale(Section::Trend, request)
            }

            Action::DismissError(section) => {
                let slot = match section {
                    Section::Posts => &mut self.posts.error,
                    Section::Overview => &mut self.overview.error,
                    Section::Sentiment => &mut self.sentiment.error,
                    Section::Topics => &mut self.topics.error,
                    Section::Trend => &mut self.trend.error,
                };
                slot.take().is_some()
            }

            Action::WordAnalysisRequested { request, key } => {
                let slot = self.word_analysis.entry(key).or_default();
                slot.begin(request) || stale("word_analysis", request)
            }
            Action::WordAnalysisSettled {
                request,
                key,
                outcome,
            } => match self.word_analysis.get_mut(&key) {
                Some(slot) => slot.settle(request, outcome) || stale("word_analysis", request),
                None => stale("word_analysis", request),
            },
            Action::DismissWordError(key) => self
                .word_analysis
                .get_mut(&key)
                .is_some_and(|slot| slot.error.take().is_some()),
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn stale(section: impl fmt::Display, request: RequestId) -> bool {
    debug!(%section, %request, "Discarding stale response");
    false
}

/// Shared handle to the dashboard state.
///
/// Readers either take a [`Store::snapshot`] or hold a
/// [`watch::Receiver`] from [`Store::subscribe`].
pub struct Store {
    state: watch::Sender<DashboardState>,
    next_request: AtomicU64,
}

impl Store {
    pub fn new(pages: Vec<String>) -> Self {
        let (state, _) = watch::channel(DashboardState::new(pages));
        Self {
            state,
            next_request: AtomicU64::new(1),
        }
    }

    pub fn next_request(&self) -> RequestId {
        RequestId(self.next_request.fetch_add(1, Ordering::Relaxed))
    }

    /// Runs the reducer. Returns whether the action was applied; stale
    /// settlements and no-op filter changes return `false`.
    pub fn dispatch(&self, action: Action) -> bool {
        let mut changed = false;
        self.state.send_if_modified(|state| {
            changed = state.apply(action);
            changed
        });
        changed
    }

    pub fn snapshot(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub fn filters(&self) -> FilterState {
        self.state.borrow().filters.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }
}
