//! Wires the stages to the store and the event bus.
//!
//! Two listeners run for the lifetime of an [`Orchestrator`]:
//! - the analysis fan-out reacts to each accepted post collection by running
//!   the overview, sentiment and topic stages concurrently;
//! - the trend listener reacts to filter changes by fetching the trend.
//!
//! The primary fetch itself is driven by the caller through
//! [`Orchestrator::search`] and [`Orchestrator::go_to_page`], and word
//! analysis of a single post by [`Orchestrator::analyze_post_words`]. Every stage
//! settles its own slot as soon as it finishes, and older settlements are
//! dropped by the store.

use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::Result;
use crate::events::{EventBus, PipelineEvent, next_event};
use crate::models::{Post, PostWordAnalysis, Topic};
use crate::pages::{self, PageCatalog};
use crate::pagination::PageToken;
use crate::services::analytics_api::{AnalyticsApi, DEFAULT_POSTS_LIMIT, PostQuery, TrendQuery};
use crate::stages::derived::{self, DerivedStage};
use crate::stages::{OverviewStage, SentimentStage, TopicStage, posts, trend, words};
use crate::store::{Action, DashboardState, RequestId, Section, Settled, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Page size of the primary post fetch.
    pub posts_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            posts_limit: DEFAULT_POSTS_LIMIT,
        }
    }
}

/// Parts shared with the spawned listeners.
#[derive(Clone)]
struct Pipeline {
    api: Arc<dyn AnalyticsApi>,
    store: Arc<Store>,
    bus: EventBus,
}

pub struct Orchestrator {
    pipeline: Pipeline,
    settings: Settings,
    started: AtomicBool,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn AnalyticsApi>, catalog: PageCatalog, settings: Settings) -> Self {
        Self {
            pipeline: Pipeline {
                api,
                store: Arc::new(Store::new(catalog.into_names())),
                bus: EventBus::new(),
            },
            settings,
            started: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the listeners, requests the initial trend and performs the
    /// mount-time post fetch. Calling it again while running only repeats
    /// the fetch.
    pub async fn start(&self) -> Result<RequestId> {
        if !self.started.swap(true, Ordering::SeqCst) {
            // subscribe before spawning so nothing published below is missed
            let analysis = self.pipeline.bus.subscribe();
            let trends = self.pipeline.bus.subscribe();

            let handles = vec![
                tokio::spawn(run_analysis_listener(self.pipeline.clone(), analysis)),
                tokio::spawn(run_trend_listener(self.pipeline.clone(), trends)),
            ];
            if let Ok(mut listeners) = self.listeners.lock() {
                listeners.extend(handles);
            }
            info!(posts_limit = self.settings.posts_limit, "Pipeline started");

            self.request_trend();
        }
        self.search().await
    }

    /// Fetches page 1 with the current filters.
    pub async fn search(&self) -> Result<RequestId> {
        self.fetch_page(1).await
    }

    /// Fetches page `page` with the current filters.
    pub async fn go_to_page(&self, page: u32) -> Result<RequestId> {
        self.fetch_page(page).await
    }

    async fn fetch_page(&self, page: u32) -> Result<RequestId> {
        let Pipeline { api, store, bus } = &self.pipeline;

        let filters = store.filters();
        let request = store.next_request();
        let query = PostQuery::from_filters(&filters, page, self.settings.posts_limit);
        store.dispatch(Action::PostsRequested {
            request,
            page: query.page,
            limit: query.limit,
        });

        let span = info_span!("post_fetch", request = %request);
        match posts::fetch_posts(api.as_ref(), &query).instrument(span).await {
            Ok(fetched) => {
                let posts = Arc::new(fetched.posts);
                let accepted = store.dispatch(Action::PostsLoaded {
                    request,
                    posts: Arc::clone(&posts),
                    total: fetched.total,
                });
                if accepted {
                    bus.publish(PipelineEvent::PostsUpdated {
                        request,
                        posts,
                        selected_page: filters.selected_page,
                    });
                }
                Ok(request)
            }
            Err(e) => {
                error!(%request, kind = e.kind(), error = %e, "Post fetch failed");
                let message = e.to_string();
                store.dispatch(Action::PostsFailed {
                    request,
                    error: message.clone(),
                });
                bus.publish(PipelineEvent::PostsFailed {
                    request,
                    error: message,
                });
                Err(e)
            }
        }
    }

    /// Starts a trend fetch for the current filters. Without running
    /// listeners nothing would settle it, so the request is skipped and
    /// [`Orchestrator::start`] picks up the filters instead.
    fn request_trend(&self) -> Option<RequestId> {
        if !self.started.load(Ordering::SeqCst) {
            debug!("Listeners not running, trend deferred to start");
            return None;
        }

        let Pipeline { store, bus, .. } = &self.pipeline;

        let request = store.next_request();
        let query = TrendQuery::from_filters(&store.filters());
        store.dispatch(Action::TrendRequested { request });
        bus.publish(PipelineEvent::TrendRequested { request, query });
        Some(request)
    }

    /// Selects a page by catalog index. The trend does not follow page
    /// changes; the next [`Orchestrator::search`] picks it up.
    pub fn select_page(&self, index: usize) -> bool {
        let changed = self.pipeline.store.dispatch(Action::SelectPage(index));
        if !changed {
            debug!(index, "Page selection unchanged or out of range");
        }
        changed
    }

    pub fn select_topic(&self, topic: Option<Topic>) -> bool {
        self.filter_changed(Action::SelectTopic(topic))
    }

    pub fn set_start_date(&self, date: Option<NaiveDate>) -> bool {
        self.filter_changed(Action::SetStartDate(date))
    }

    pub fn set_end_date(&self, date: Option<NaiveDate>) -> bool {
        self.filter_changed(Action::SetEndDate(date))
    }

    /// Sets both bounds, requesting at most one trend fetch.
    pub fn set_date_range(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
        let store = &self.pipeline.store;
        let start_changed = store.dispatch(Action::SetStartDate(start));
        let end_changed = store.dispatch(Action::SetEndDate(end));
        let changed = start_changed || end_changed;
        if changed {
            self.request_trend();
        }
        changed
    }

    fn filter_changed(&self, action: Action) -> bool {
        let changed = self.pipeline.store.dispatch(action);
        if changed {
            self.request_trend();
        }
        changed
    }

    /// Adds the page named by a pasted link and selects it. Returns its index.
    pub fn add_page_from_link(&self, link: &str) -> Option<usize> {
        let Some(name) = pages::extract_page_name(link) else {
            warn!(link, "No page name in link");
            return None;
        };
        let store = &self.pipeline.store;
        store.dispatch(Action::AddPage(name.clone()));
        info!(page = %name, "Page added");
        Some(store.filters().selected_page)
    }

    pub fn dismiss_error(&self, section: Section) -> bool {
        self.pipeline.store.dispatch(Action::DismissError(section))
    }

    /// Analyzes the words of one post. A result already held for the post is
    /// returned without calling the service; a failure is kept in the post's
    /// slot and can be retried.
    pub async fn analyze_post_words(&self, post: &Post) -> Result<PostWordAnalysis> {
        let Pipeline { api, store, bus } = &self.pipeline;
        let key = post.key().to_string();

        let cached = store
            .snapshot()
            .word_analysis_for(&key)
            .and_then(|slot| slot.ready().cloned());
        if let Some(analysis) = cached {
            debug!(post = %key, "Word analysis cached");
            return Ok(analysis);
        }

        let request = store.next_request();
        store.dispatch(Action::WordAnalysisRequested {
            request,
            key: key.clone(),
        });

        let selected_page = store.filters().selected_page;
        let span = info_span!("word_analysis", request = %request);
        let result = words::fetch_word_analysis(api.as_ref(), post, selected_page)
            .instrument(span)
            .await;

        let outcome = match &result {
            Ok(analysis) => Settled::Ready(analysis.clone()),
            Err(e) => {
                warn!(%request, kind = e.kind(), error = %e, "Word analysis failed");
                Settled::Failed {
                    error: e.to_string(),
                    shown: PostWordAnalysis::default(),
                }
            }
        };
        let ok = result.is_ok();
        if store.dispatch(Action::WordAnalysisSettled {
            request,
            key: key.clone(),
            outcome,
        }) {
            bus.publish(PipelineEvent::WordsSettled { request, key, ok });
        }
        result
    }

    pub fn dismiss_word_error(&self, post: &Post) -> bool {
        self.pipeline
            .store
            .dispatch(Action::DismissWordError(post.key().to_string()))
    }

    pub fn snapshot(&self) -> DashboardState {
        self.pipeline.store.snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<DashboardState> {
        self.pipeline.store.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.pipeline.bus.subscribe()
    }

    pub fn page_tokens(&self) -> Vec<PageToken> {
        self.pipeline.store.snapshot().page_tokens()
    }

    /// Stops the listeners. Cycles already running finish on their own, and
    /// a later [`Orchestrator::start`] spawns fresh listeners.
    pub fn shutdown(&self) {
        self.started.store(false, Ordering::SeqCst);
        if let Ok(mut listeners) = self.listeners.lock() {
            for handle in listeners.drain(..) {
                handle.abort();
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_analysis_listener(pipeline: Pipeline, mut rx: broadcast::Receiver<PipelineEvent>) {
    while let Some(event) = next_event(&mut rx).await {
        if let PipelineEvent::PostsUpdated {
            request,
            posts,
            selected_page,
        } = event
        {
            let span = info_span!("analysis", request = %request, posts = posts.len());
            tokio::spawn(
                run_analysis(pipeline.clone(), request, posts, selected_page).instrument(span),
            );
        }
    }
}

async fn run_analysis(
    pipeline: Pipeline,
    request: RequestId,
    posts: Arc<Vec<Post>>,
    selected_page: usize,
) {
    let Pipeline { api, store, bus } = &pipeline;

    if posts.is_empty() {
        if store.dispatch(Action::AnalysisEmpty { request }) {
            info!("Empty collection, derived stages reset");
            bus.publish(PipelineEvent::AnalysisSettled {
                request,
                empty: true,
            });
        }
        return;
    }

    if !store.dispatch(Action::AnalysisStarted { request }) {
        debug!("Superseded before analysis started");
        return;
    }

    let started = std::time::Instant::now();
    let run = Run {
        api: api.as_ref(),
        store,
        bus,
        request,
        posts: &posts,
        selected_page,
    };
    tokio::join!(
        run.stage(&OverviewStage, |request, outcome| Action::OverviewSettled {
            request,
            outcome
        }),
        run.stage(&SentimentStage, |request, outcome| Action::SentimentSettled {
            request,
            outcome
        }),
        run.stage(&TopicStage, |request, outcome| Action::TopicsSettled {
            request,
            outcome
        }),
    );

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Analysis settled"
    );
    bus.publish(PipelineEvent::AnalysisSettled {
        request,
        empty: false,
    });
}

/// One analysis cycle's inputs, borrowed by each stage future.
struct Run<'a> {
    api: &'a dyn AnalyticsApi,
    store: &'a Store,
    bus: &'a EventBus,
    request: RequestId,
    posts: &'a [Post],
    selected_page: usize,
}

impl Run<'_> {
    async fn stage<S, F>(&self, stage: &S, settled: F)
    where
        S: DerivedStage,
        F: FnOnce(RequestId, Settled<S::Output>) -> Action,
    {
        let outcome = derived::settle(stage, self.api, self.posts, self.selected_page).await;
        let ok = matches!(outcome, Settled::Ready(_));
        if self.store.dispatch(settled(self.request, outcome)) {
            self.bus.publish(PipelineEvent::StageSettled {
                request: self.request,
                stage: S::STAGE,
                ok,
            });
        }
    }
}

async fn run_trend_listener(pipeline: Pipeline, mut rx: broadcast::Receiver<PipelineEvent>) {
    while let Some(event) = next_event(&mut rx).await {
        if let PipelineEvent::TrendRequested { request, query } = event {
            let span = info_span!("trend", request = %request);
            tokio::spawn(run_trend(pipeline.clone(), request, query).instrument(span));
        }
    }
}

async fn run_trend(pipeline: Pipeline, request: RequestId, query: TrendQuery) {
    let Pipeline { api, store, bus } = &pipeline;

    let outcome = trend::fetch_trend(api.as_ref(), &query).await;
    let fallback = outcome.is_fallback();
    let settled = match outcome.error {
        Some(error) => Settled::Failed {
            error,
            shown: outcome.points,
        },
        None => Settled::Ready(outcome.points),
    };

    if store.dispatch(Action::TrendSettled {
        request,
        outcome: settled,
    }) {
        bus.publish(PipelineEvent::TrendSettled { request, fallback });
    }
}
