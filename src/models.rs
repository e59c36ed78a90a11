//! Wire and domain types shared by the fetch stages, the store and the CLI.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four fixed classification categories assigned to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Facility,
    Lecturer,
    Student,
    Program,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::Facility,
        Topic::Lecturer,
        Topic::Student,
        Topic::Program,
    ];

    /// Label used by the topic classifier and the post query service.
    pub fn code(self) -> &'static str {
        match self {
            Topic::Facility => "LABEL_0",
            Topic::Lecturer => "LABEL_1",
            Topic::Student => "LABEL_2",
            Topic::Program => "LABEL_3",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Topic::Facility => "facility",
            Topic::Lecturer => "lecturer",
            Topic::Student => "student",
            Topic::Program => "program",
        }
    }

    /// Accepts either the wire code (`LABEL_1`) or the category name (`lecturer`).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::from_code(raw).or_else(|| {
            Self::ALL
                .into_iter()
                .find(|t| t.name().eq_ignore_ascii_case(raw))
        })
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A social-media post as returned by the post query service.
///
/// Only `text` and `topic` are read by the pipeline. Everything else
/// (likes, shares, timestamps, url, author) is carried through untouched so
/// the collection can be posted back to the classifiers as received.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Post {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Likes plus comments plus shares. A missing or unreadable count is 0.
    pub fn interactions(&self) -> u64 {
        ["likes", "comments", "shares"]
            .into_iter()
            .map(|field| self.count(field))
            .fold(0, u64::saturating_add)
    }

    fn count(&self, field: &str) -> u64 {
        match self.extra.get(field) {
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// Identifies a post across fetches: its url when it has one, else its text.
    pub fn key(&self) -> &str {
        match self.extra.get("url") {
            Some(serde_json::Value::String(url)) if !url.is_empty() => url,
            _ => &self.text,
        }
    }
}

/// One page of the filtered post collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostPage {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SentimentBucket {
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
    #[serde(default)]
    pub neutral: Vec<String>,
}

impl SentimentBucket {
    pub fn total(&self) -> usize {
        self.positive.len() + self.negative.len() + self.neutral.len()
    }
}

/// Posts grouped by [`Topic`]. The topic service returns whole post objects
/// in each list; those are reduced to their text on decode.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopicBucket {
    #[serde(default, deserialize_with = "text_entries")]
    pub facility: Vec<String>,
    #[serde(default, deserialize_with = "text_entries")]
    pub lecturer: Vec<String>,
    #[serde(default, deserialize_with = "text_entries")]
    pub student: Vec<String>,
    #[serde(default, deserialize_with = "text_entries")]
    pub program: Vec<String>,
}

impl TopicBucket {
    pub fn get(&self, topic: Topic) -> &[String] {
        match topic {
            Topic::Facility => &self.facility,
            Topic::Lecturer => &self.lecturer,
            Topic::Student => &self.student,
            Topic::Program => &self.program,
        }
    }

    pub fn total(&self) -> usize {
        Topic::ALL.iter().map(|t| self.get(*t).len()).sum()
    }
}

fn text_entries<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();

    values
        .into_iter()
        .map(|value| match value {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Object(mut map) => match map.remove("text") {
                Some(serde_json::Value::String(s)) => Ok(s),
                _ => Err(de::Error::custom("topic entry object has no text field")),
            },
            other => Err(de::Error::custom(format!(
                "unexpected topic entry: {other}"
            ))),
        })
        .collect()
}

/// A word the word-level classifier picked out, with its confidence in `0..=1`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WordScore {
    pub word: String,
    pub confidence: f64,
}

impl WordScore {
    /// Confidence as a whole percentage, the way the dashboard labels words.
    pub fn percent(&self) -> u32 {
        (self.confidence * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

/// Sentiment-bearing words of a single post, each list ordered by
/// descending confidence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WordAnalysis {
    #[serde(default)]
    pub positive: Vec<WordScore>,
    #[serde(default)]
    pub negative: Vec<WordScore>,
    #[serde(default)]
    pub neutral: Vec<WordScore>,
}

impl WordAnalysis {
    pub fn total(&self) -> usize {
        self.positive.len() + self.negative.len() + self.neutral.len()
    }
}

/// On-demand analysis of one post: its words plus the sentiment of the
/// whole post.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostWordAnalysis {
    pub words: WordAnalysis,
    pub overall: SentimentBucket,
}

impl PostWordAnalysis {
    /// Which sentiment list the post's own text landed in.
    pub fn overall_label(&self, text: &str) -> Option<&'static str> {
        let lists = [
            ("positive", &self.overall.positive),
            ("negative", &self.overall.negative),
            ("neutral", &self.overall.neutral),
        ];
        lists
            .into_iter()
            .find(|(_, texts)| texts.iter().any(|t| t == text))
            .map(|(label, _)| label)
    }
}

/// One time bucket of the sentiment trend series.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrendPoint {
    pub day: String,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
}

impl TrendPoint {
    pub fn zero(day: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            ..Default::default()
        }
    }
}

/// Trend point as the service sends it: capitalized keys, any count may be
/// missing or null.
#[derive(Debug, Deserialize)]
pub(crate) struct RawTrendPoint {
    #[serde(default)]
    pub day: Option<String>,
    #[serde(rename = "Positive", default)]
    pub positive: Option<u64>,
    #[serde(rename = "Negative", default)]
    pub negative: Option<u64>,
    #[serde(rename = "Neutral", default)]
    pub neutral: Option<u64>,
}

impl From<RawTrendPoint> for TrendPoint {
    fn from(raw: RawTrendPoint) -> Self {
        Self {
            day: raw.day.unwrap_or_default(),
            positive: raw.positive.unwrap_or(0),
            negative: raw.negative.unwrap_or(0),
            neutral: raw.neutral.unwrap_or(0),
        }
    }
}
