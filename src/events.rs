//! Publish/subscribe bus connecting the pipeline stages.
//!
//! A successful post fetch publishes [`PipelineEvent::PostsUpdated`]; the
//! derived-analysis subscriber reacts to it. Filter changes publish
//! [`PipelineEvent::TrendRequested`]; the trend subscriber reacts to that.
//! Settlement events let callers wait for a cycle to finish.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{trace, warn};

use crate::models::Post;
use crate::services::analytics_api::TrendQuery;
use crate::store::RequestId;

const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Overview,
    Sentiment,
    Topic,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Overview => "overview",
            Stage::Sentiment => "sentiment",
            Stage::Topic => "topic",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    PostsUpdated {
        request: RequestId,
        posts: Arc<Vec<Post>>,
        selected_page: usize,
    },
    PostsFailed {
        request: RequestId,
        error: String,
    },
    StageSettled {
        request: RequestId,
        stage: Stage,
        ok: bool,
    },
    /// All three derived stages of `request` have settled (or were skipped
    /// because the collection was empty).
    AnalysisSettled {
        request: RequestId,
        empty: bool,
    },
    TrendRequested {
        request: RequestId,
        query: TrendQuery,
    },
    TrendSettled {
        request: RequestId,
        fallback: bool,
    },
    /// Word analysis of the post with key `key` has settled.
    WordsSettled {
        request: RequestId,
        key: String,
        ok: bool,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: PipelineEvent) {
        trace!(?event, "Publishing pipeline event");
        // no subscribers is fine: nobody is waiting on this cycle
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }
}

/// Receives the next event, skipping over lag. Returns `None` once the bus
/// is closed.
pub async fn next_event(rx: &mut broadcast::Receiver<PipelineEvent>) -> Option<PipelineEvent> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Pipeline event subscriber lagged");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Waits until `matches` accepts an event, collecting everything seen on
/// the way (the accepted event last). `None` on timeout or closed bus.
pub async fn wait_for<F>(
    rx: &mut broadcast::Receiver<PipelineEvent>,
    timeout: Duration,
    mut matches: F,
) -> Option<Vec<PipelineEvent>>
where
    F: FnMut(&PipelineEvent) -> bool,
{
    let collect = async {
        let mut seen = Vec::new();
        while let Some(event) = next_event(rx).await {
            let done = matches(&event);
            seen.push(event);
            if done {
                return Some(seen);
            }
        }
        None
    };
    tokio::time::timeout(timeout, collect).await.ok().flatten()
}
