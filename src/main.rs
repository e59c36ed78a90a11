//! CLI entry point for the campus-pulse dashboard pipeline.
//!
//! Provides subcommands for running a full dashboard cycle against the
//! analytics service, fetching the sentiment trend on its own, and a few
//! offline helpers (pagination tokens, range normalization, page catalog).

use anyhow::{Context, Result, bail};
use campus_pulse::{
    config::AppConfig,
    events::{PipelineEvent, wait_for},
    infra::analytics,
    models::Topic,
    orchestrator::{Orchestrator, Settings},
    output::{append_trend_records, print_json, print_pretty, print_summary},
    pages::PageCatalog,
    pagination::index_tokens,
    range::{self, DateRange},
    services::analytics_api::TrendQuery,
    stages::trend::fetch_trend,
    store::FilterState,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "campus-pulse")]
#[command(about = "Sentiment and topic dashboard for campus confession pages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Filters shared by the commands that talk to the analytics service.
#[derive(Args)]
struct FilterArgs {
    /// Source page, by catalog index or name
    #[arg(short, long)]
    page: Option<String>,

    /// Pasted facebook link of a page that is not in the catalog
    #[arg(long, conflicts_with = "page")]
    link: Option<String>,

    /// Topic filter: facility, lecturer, student, program or LABEL_n
    #[arg(short, long)]
    topic: Option<String>,

    /// Range start (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    start: Option<String>,

    /// Range end (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    end: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch posts and run every analysis stage, then print the dashboard
    Dashboard {
        #[command(flatten)]
        filters: FilterArgs,

        /// Page of the post list to fetch
        #[arg(long, default_value_t = 1)]
        list_page: u32,

        /// Print the full state as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Seconds to wait for every stage to settle
        #[arg(long, default_value_t = 120)]
        wait_secs: u64,

        /// Also analyze the words of the N most interacted-with posts
        #[arg(long, value_name = "N", default_value_t = 0)]
        word_analysis: usize,
    },
    /// Fetch the sentiment trend only
    Trend {
        #[command(flatten)]
        filters: FilterArgs,

        /// CSV file to append the series to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Print the pagination tokens for a page position
    Pages {
        #[arg(value_name = "CURRENT")]
        current: u32,

        #[arg(value_name = "TOTAL")]
        total: u32,
    },
    /// Print the date range a query would use
    Range {
        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },
    /// List the configured source pages
    ListPages,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/campus_pulse.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("campus_pulse.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dashboard {
            filters,
            list_page,
            json,
            wait_secs,
            word_analysis,
        } => {
            let config = AppConfig::from_env()?;
            let options = DashboardOptions {
                list_page,
                json,
                wait: Duration::from_secs(wait_secs),
                word_analysis,
            };
            dashboard(&config, &filters, &options).await?;
        }
        Commands::Trend { filters, output } => {
            let config = AppConfig::from_env()?;
            trend(&config, &filters, output.as_deref()).await?;
        }
        Commands::Pages { current, total } => {
            let tokens: Vec<String> = index_tokens(current, total)
                .iter()
                .map(ToString::to_string)
                .collect();
            info!(current, total, tokens = %tokens.join(" "), "Pagination");
        }
        Commands::Range { start, end } => {
            let range = DateRange::normalize(parse_date(start)?, parse_date(end)?);
            if range.is_inverted() {
                warn!(%range, "Start is after end, queries will return nothing");
            }
            info!(start = %range.start_param(), end = %range.end_param(), "Normalized range");
        }
        Commands::ListPages => {
            let config = AppConfig::from_env()?;
            let catalog = config.page_catalog()?;
            for (index, name) in catalog.names().iter().enumerate() {
                info!(index, page = %name, "Page");
            }
            info!(total = catalog.len(), "Page catalog");
        }
    }

    Ok(())
}

#[derive(Debug)]
struct DashboardOptions {
    list_page: u32,
    json: bool,
    wait: Duration,
    word_analysis: usize,
}

/// Runs one mount cycle with the given filters and waits until the analysis
/// and the trend have both settled.
#[tracing::instrument(skip(config, args))]
async fn dashboard(config: &AppConfig, args: &FilterArgs, options: &DashboardOptions) -> Result<()> {
    let DashboardOptions {
        list_page,
        json,
        wait,
        word_analysis,
    } = *options;
    let catalog = config.page_catalog()?;
    let selected_page = resolve_page(&catalog, args.page.as_deref())?;
    let api = analytics::connect(config)?;

    let orchestrator = Orchestrator::new(
        api,
        catalog,
        Settings {
            posts_limit: config.posts_limit,
        },
    );

    if let Some(link) = &args.link {
        if orchestrator.add_page_from_link(link).is_none() {
            bail!("no page name found in link '{link}'");
        }
    } else if let Some(index) = selected_page {
        orchestrator.select_page(index);
    }
    orchestrator.select_topic(parse_topic(args.topic.as_deref())?);
    orchestrator.set_date_range(parse_date(args.start.clone())?, parse_date(args.end.clone())?);

    let mut events = orchestrator.events();
    let mut posts = orchestrator.start().await;
    if list_page > 1 && posts.is_ok() {
        posts = orchestrator.go_to_page(list_page).await;
    }

    // a failed post fetch runs no analysis, only the trend is left to wait for
    let mut analysis_pending = match &posts {
        Ok(request) => Some(*request),
        Err(e) => {
            error!(error = %e, "Post fetch failed");
            None
        }
    };
    let mut trend_pending = true;

    let settled = wait_for(&mut events, wait, |event| {
        match event {
            PipelineEvent::AnalysisSettled { request, .. }
                if analysis_pending == Some(*request) =>
            {
                analysis_pending = None;
            }
            PipelineEvent::TrendSettled { fallback, .. } => {
                if *fallback {
                    warn!("Trend service unavailable, showing empty months");
                }
                trend_pending = false;
            }
            _ => {}
        }
        analysis_pending.is_none() && !trend_pending
    })
    .await;
    if settled.is_none() {
        warn!(wait_secs = wait.as_secs(), "Timed out waiting for the pipeline to settle");
    }

    if word_analysis > 0 {
        let top: Vec<_> = orchestrator
            .snapshot()
            .posts
            .by_interactions()
            .into_iter()
            .take(word_analysis)
            .cloned()
            .collect();
        for post in &top {
            if let Err(e) = orchestrator.analyze_post_words(post).await {
                warn!(error = %e, "Word analysis unavailable");
            }
        }
    }

    let state = orchestrator.snapshot();
    print_pretty(&state);
    if json {
        print_json(&state)?;
    } else {
        print_summary(&state);
    }

    orchestrator.shutdown();
    Ok(())
}

/// Fetches the trend for the given filters outside of a dashboard cycle.
#[tracing::instrument(skip(config, args))]
async fn trend(config: &AppConfig, args: &FilterArgs, output: Option<&str>) -> Result<()> {
    let catalog = config.page_catalog()?;
    let mut names = catalog.names().to_vec();
    let selected_page = match &args.link {
        Some(link) => {
            let name = campus_pulse::pages::extract_page_name(link)
                .with_context(|| format!("no page name found in link '{link}'"))?;
            names.iter().position(|p| *p == name).unwrap_or_else(|| {
                names.push(name);
                names.len() - 1
            })
        }
        None => resolve_page(&catalog, args.page.as_deref())?.unwrap_or(0),
    };

    let filters = FilterState {
        selected_page,
        selected_topic: parse_topic(args.topic.as_deref())?,
        start_date: parse_date(args.start.clone())?,
        end_date: parse_date(args.end.clone())?,
    };
    let query = TrendQuery::from_filters(&filters);

    let api = analytics::connect(config)?;
    let outcome = fetch_trend(api.as_ref(), &query).await;
    if let Some(error) = &outcome.error {
        warn!(%error, "Trend unavailable, fallback series shown");
    }
    for point in &outcome.points {
        info!(
            day = %point.day,
            positive = point.positive,
            negative = point.negative,
            neutral = point.neutral,
            "Trend point"
        );
    }

    if let Some(path) = output {
        let page = names.get(selected_page).map(String::as_str).unwrap_or("");
        append_trend_records(path, page, filters.selected_topic, &outcome.points)
            .with_context(|| format!("writing trend to '{path}'"))?;
        info!(path, rows = outcome.points.len(), "Trend appended");
    }
    Ok(())
}

/// Catalog index for `raw`, accepted either as a number or a page name.
fn resolve_page(catalog: &PageCatalog, raw: Option<&str>) -> Result<Option<usize>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let index = match raw.trim().parse::<usize>() {
        Ok(index) if index < catalog.len() => index,
        Ok(index) => bail!("page index {index} out of range (catalog has {})", catalog.len()),
        Err(_) => catalog
            .position(raw)
            .with_context(|| format!("unknown page '{raw}'"))?,
    };
    Ok(Some(index))
}

fn parse_topic(raw: Option<&str>) -> Result<Option<Topic>> {
    match raw {
        None => Ok(None),
        Some(raw) if raw.trim().eq_ignore_ascii_case("all") => Ok(None),
        Some(raw) => Topic::parse(raw)
            .map(Some)
            .with_context(|| format!("unknown topic '{raw}'")),
    }
}

fn parse_date(raw: Option<String>) -> Result<Option<NaiveDate>> {
    raw.as_deref().map(range::parse_date_like).transpose()
}
