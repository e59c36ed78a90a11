//! Response decoding and shape checks for each endpoint.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::client::{POSTS, SENTIMENT, SUMMARY, TOPICS, TREND, WORDS};
use crate::error::{PipelineError, Result};
use crate::models::{
    PostPage, RawTrendPoint, SentimentBucket, TopicBucket, TrendPoint, WordAnalysis, WordScore,
};

fn parse<T: DeserializeOwned>(endpoint: &'static str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| PipelineError::malformed(endpoint, e.to_string()))
}

fn object(endpoint: &'static str, body: &str) -> Result<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PipelineError::malformed(
            endpoint,
            format!("expected a JSON object, got {}", type_name(&other)),
        )),
        Err(e) => Err(PipelineError::malformed(endpoint, e.to_string())),
    }
}

/// The classifier endpoints answer internal failures with a 200 and an
/// `{"error": ...}` body.
fn reject_embedded_error(
    endpoint: &'static str,
    map: &serde_json::Map<String, Value>,
) -> Result<()> {
    match map.get("error") {
        Some(err) => Err(PipelineError::malformed(
            endpoint,
            format!("service reported: {}", err.as_str().unwrap_or(&err.to_string())),
        )),
        None => Ok(()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub(crate) fn posts(body: &str) -> Result<PostPage> {
    let map = object(POSTS, body)?;
    if !map.contains_key("posts") {
        return Err(PipelineError::malformed(POSTS, "missing 'posts'"));
    }
    parse(POSTS, Value::Object(map))
}

/// The summary endpoint returns a JSON string; a bare text body is accepted
/// as well.
pub(crate) fn overview(body: &str) -> Result<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(text)) => Ok(text),
        Ok(Value::Object(map)) => {
            reject_embedded_error(SUMMARY, &map)?;
            Err(PipelineError::malformed(SUMMARY, "expected a string, got an object"))
        }
        Ok(other) => Err(PipelineError::malformed(
            SUMMARY,
            format!("expected a string, got {}", type_name(&other)),
        )),
        Err(_) if !body.trim().is_empty() => Ok(body.trim().to_string()),
        Err(_) => Err(PipelineError::malformed(SUMMARY, "empty body")),
    }
}

pub(crate) fn sentiment(body: &str) -> Result<SentimentBucket> {
    let map = object(SENTIMENT, body)?;
    reject_embedded_error(SENTIMENT, &map)?;
    parse(SENTIMENT, Value::Object(map))
}

pub(crate) fn topics(body: &str) -> Result<TopicBucket> {
    let mut map = object(TOPICS, body)?;
    reject_embedded_error(TOPICS, &map)?;
    match map.remove("data") {
        Some(data @ Value::Object(_)) => parse(TOPICS, data),
        Some(other) => Err(PipelineError::malformed(
            TOPICS,
            format!("'data' is {}", type_name(&other)),
        )),
        None => Err(PipelineError::malformed(TOPICS, "missing 'data'")),
    }
}

pub(crate) fn trend(body: &str) -> Result<Vec<TrendPoint>> {
    let mut map = object(TREND, body)?;
    match map.remove("data") {
        Some(data @ Value::Array(_)) => {
            let raw: Vec<RawTrendPoint> = parse(TREND, data)?;
            Ok(raw.into_iter().map(TrendPoint::from).collect())
        }
        Some(other) => Err(PipelineError::malformed(
            TREND,
            format!("'data' is {}", type_name(&other)),
        )),
        None => Err(PipelineError::malformed(TREND, "missing 'data'")),
    }
}

/// Each category maps a word to `{"confidence": .., "sentiment": ..}`. The
/// object keys carry no order, so each list is sorted here.
pub(crate) fn word_analysis(body: &str) -> Result<WordAnalysis> {
    let mut map = object(WORDS, body)?;
    reject_embedded_error(WORDS, &map)?;

    let mut category = |name: &str| -> Result<Vec<WordScore>> {
        match map.remove(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Object(words)) => {
                let mut scores = words
                    .into_iter()
                    .map(|(word, detail)| {
                        let confidence = detail
                            .get("confidence")
                            .and_then(Value::as_f64)
                            .ok_or_else(|| {
                                PipelineError::malformed(
                                    WORDS,
                                    format!("'{word}' has no numeric confidence"),
                                )
                            })?;
                        Ok(WordScore { word, confidence })
                    })
                    .collect::<Result<Vec<_>>>()?;
                scores.sort_by(|a, b| {
                    b.confidence
                        .total_cmp(&a.confidence)
                        .then_with(|| a.word.cmp(&b.word))
                });
                Ok(scores)
            }
            Some(other) => Err(PipelineError::malformed(
                WORDS,
                format!("'{name}' is {}", type_name(&other)),
            )),
        }
    };

    Ok(WordAnalysis {
        positive: category("positive")?,
        negative: category("negative")?,
        neutral: category("neutral")?,
    })
}
