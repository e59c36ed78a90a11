use serde::Serialize;

use crate::models::{SentimentBucket, Topic, TopicBucket};

/// Share of `part` in `total` as a percentage rounded to one decimal.
/// A zero total gives `0.0`, never NaN.
pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64 * 1000.0).round() / 10.0
    }
}

/// Count and percentage of one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Share {
    pub count: usize,
    pub percent: f64,
}

impl Share {
    fn of(count: usize, total: usize) -> Self {
        Self {
            count,
            percent: pct(count, total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentStats {
    pub total: usize,
    pub positive: Share,
    pub negative: Share,
    pub neutral: Share,
}

impl SentimentStats {
    pub fn from_bucket(bucket: &SentimentBucket) -> Self {
        let total = bucket.total();
        Self {
            total,
            positive: Share::of(bucket.positive.len(), total),
            negative: Share::of(bucket.negative.len(), total),
            neutral: Share::of(bucket.neutral.len(), total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TopicStats {
    pub total: usize,
    pub facility: Share,
    pub lecturer: Share,
    pub student: Share,
    pub program: Share,
}

impl TopicStats {
    pub fn from_bucket(bucket: &TopicBucket) -> Self {
        let total = bucket.total();
        let share = |topic| Share::of(bucket.get(topic).len(), total);
        Self {
            total,
            facility: share(Topic::Facility),
            lecturer: share(Topic::Lecturer),
            student: share(Topic::Student),
            program: share(Topic::Program),
        }
    }

    pub fn get(&self, topic: Topic) -> Share {
        match topic {
            Topic::Facility => self.facility,
            Topic::Lecturer => self.lecturer,
            Topic::Student => self.student,
            Topic::Program => self.program,
        }
    }
}
