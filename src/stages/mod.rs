//! The units of asynchronous work the dashboard is built from.
//!
//! [`posts`] fetches the primary collection; [`overview`], [`sentiment`] and
//! [`topic`] each run one classifier over that collection through the shared
//! [`derived`] machinery; [`trend`] fetches the bucketed sentiment series on
//! its own schedule. [`words`] analyzes a single post when asked to.

pub mod derived;
pub mod overview;
pub mod posts;
pub mod sentiment;
pub mod topic;
pub mod trend;
pub mod words;

#[cfg(test)]
pub(crate) mod testing;

pub use derived::{DerivedStage, analyze};
pub use overview::OverviewStage;
pub use sentiment::SentimentStage;
pub use topic::TopicStage;
