//! Output formatting and persistence for dashboard snapshots.
//!
//! Supports pretty-printing, a log-friendly summary, JSON serialization and
//! appending the trend series to a CSV file.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{Topic, TrendPoint};
use crate::stats::{SentimentStats, TopicStats};
use crate::store::DashboardState;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Overview excerpts are cut to this many characters in the summary.
pub const EXCERPT_CHARS: usize = 50;

/// Logs the whole snapshot using Rust's debug pretty-print format.
pub fn print_pretty(state: &DashboardState) {
    debug!("{:#?}", state);
}

/// Snapshot plus the percentages the dashboard renders.
#[derive(Debug, Serialize)]
pub struct DashboardReport<'a> {
    pub page: Option<&'a str>,
    #[serde(flatten)]
    pub state: &'a DashboardState,
    pub sentiment_stats: SentimentStats,
    pub topic_stats: TopicStats,
}

impl<'a> DashboardReport<'a> {
    pub fn new(state: &'a DashboardState) -> Self {
        Self {
            page: state.selected_page_name(),
            state,
            sentiment_stats: SentimentStats::from_bucket(state.sentiment.renderable()),
            topic_stats: TopicStats::from_bucket(state.topics.renderable()),
        }
    }
}

/// Logs the snapshot as pretty-printed JSON.
pub fn print_json(state: &DashboardState) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(&DashboardReport::new(state))?);
    Ok(())
}

/// Logs one line per dashboard section.
pub fn print_summary(state: &DashboardState) {
    let posts = &state.posts;
    info!(
        page = state.selected_page_name().unwrap_or("?"),
        received = posts.posts.len(),
        total = posts.total,
        current_page = posts.page,
        total_pages = posts.total_pages(),
        "Posts"
    );
    if let Some(error) = &posts.error {
        warn!(%error, "Posts unavailable");
    }
    for post in posts.by_interactions() {
        debug!(
            interactions = post.interactions(),
            text = %truncate_text(&post.text, EXCERPT_CHARS),
            "Post"
        );
    }

    let tokens: Vec<String> = state.page_tokens().iter().map(ToString::to_string).collect();
    info!(pages = %tokens.join(" "), "Pagination");

    info!(
        status = ?state.overview.status(),
        overview = %truncate_text(state.overview.renderable(), EXCERPT_CHARS),
        "Overview"
    );

    let sentiment = SentimentStats::from_bucket(state.sentiment.renderable());
    info!(
        status = ?state.sentiment.status(),
        total = sentiment.total,
        positive = sentiment.positive.percent,
        negative = sentiment.negative.percent,
        neutral = sentiment.neutral.percent,
        "Sentiment %"
    );

    let topics = TopicStats::from_bucket(state.topics.renderable());
    for topic in Topic::ALL {
        let share = topics.get(topic);
        info!(
            %topic,
            count = share.count,
            percent = share.percent,
            "Topic"
        );
    }

    let trend = state.trend.renderable();
    info!(
        status = ?state.trend.status(),
        points = trend.len(),
        first = trend.first().map(|p| p.day.as_str()).unwrap_or(""),
        last = trend.last().map(|p| p.day.as_str()).unwrap_or(""),
        "Trend"
    );

    for (key, slot) in &state.word_analysis {
        let post = truncate_text(key, EXCERPT_CHARS);
        if let Some(error) = slot.error() {
            warn!(%post, %error, "Word analysis failed");
            continue;
        }
        let Some(analysis) = slot.ready() else {
            continue;
        };
        for (sentiment, words) in [
            ("positive", &analysis.words.positive),
            ("negative", &analysis.words.negative),
            ("neutral", &analysis.words.neutral),
        ] {
            let labels: Vec<String> = words
                .iter()
                .map(|w| format!("{} ({}%)", w.word, w.percent()))
                .collect();
            info!(%post, sentiment, words = %labels.join(", "), "Words");
        }
    }

    for (section, error) in [
        ("overview", state.overview.error()),
        ("sentiment", state.sentiment.error()),
        ("topics", state.topics.error()),
        ("trend", state.trend.error()),
    ] {
        if let Some(error) = error {
            warn!(section, %error, "Section failed");
        }
    }
}

/// Cuts `text` to `max_chars` characters, marking the cut with `...`.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// One CSV row of the trend series.
#[derive(Debug, Serialize)]
struct TrendRecord<'a> {
    recorded_at: String,
    page: &'a str,
    topic: &'a str,
    day: &'a str,
    positive: u64,
    negative: u64,
    neutral: u64,
}

/// Appends every point of a trend series as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_trend_records(
    path: &str,
    page: &str,
    topic: Option<Topic>,
    points: &[TrendPoint],
) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = points.len(), "Appending trend records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    let recorded_at = Utc::now().to_rfc3339();
    let topic = topic.map(Topic::name).unwrap_or("all");
    for point in points {
        writer.serialize(TrendRecord {
            recorded_at: recorded_at.clone(),
            page,
            topic,
            day: &point.day,
            positive: point.positive,
            negative: point.negative,
            neutral: point.neutral,
        })?;
    }
    writer.flush()?;

    Ok(())
}
