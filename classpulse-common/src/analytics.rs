//! Session analytics: aggregation and session-over-session comparison
//!
//! Aggregates are pure functions over the event set for one
//! (class, session) key. They are recomputed on every read and never cached
//! authoritatively; the reduction uses sums, counts and a set only, so the
//! result is identical for any arrival order of the same events.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::signal::{SignalEvent, SignalKind};

/// Per-kind signal counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalCounts {
    pub stuck: u64,
    pub got_it: u64,
    pub pause: u64,
    pub example: u64,
}

impl SignalCounts {
    pub fn total(&self) -> u64 {
        self.stuck + self.got_it + self.pause + self.example
    }

    pub fn get(&self, kind: SignalKind) -> u64 {
        match kind {
            SignalKind::Stuck => self.stuck,
            SignalKind::GotIt => self.got_it,
            SignalKind::Pause => self.pause,
            SignalKind::ExampleRequest => self.example,
        }
    }

    pub fn bump(&mut self, kind: SignalKind) {
        match kind {
            SignalKind::Stuck => self.stuck += 1,
            SignalKind::GotIt => self.got_it += 1,
            SignalKind::Pause => self.pause += 1,
            SignalKind::ExampleRequest => self.example += 1,
        }
    }
}

/// Per-kind share of the total signal count, percent, one decimal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPercentages {
    pub stuck: f64,
    pub got_it: f64,
    pub pause: f64,
    pub example: f64,
}

/// Class-level statistics for one (class, session) key
///
/// Both confidence scales are explicit named outputs: `avg_confidence_raw`
/// is the stored wire scale (1-10), `avg_confidence` is the UI scale (1-5).
/// The halving happens here and nowhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionAggregate {
    pub class_id: String,
    pub session_number: i64,
    pub signals: SignalCounts,
    pub signal_percentages: SignalPercentages,
    /// Distinct student tokens seen; approximate, tokens are ephemeral
    pub participant_count: u64,
    pub total_signal_count: u64,
    /// Average confidence on the wire scale (1-10)
    pub avg_confidence_raw: f64,
    /// Average confidence on the UI scale (1-5)
    pub avg_confidence: f64,
    /// stuck / total signals, percent; 0 when there are no signals
    pub confusion_rate: f64,
}

impl SessionAggregate {
    /// The defined zero-event aggregate: all zeros, never NaN, not an error
    pub fn zero(class_id: &str, session_number: i64) -> Self {
        Self {
            class_id: class_id.to_string(),
            session_number,
            signals: SignalCounts::default(),
            signal_percentages: SignalPercentages::default(),
            participant_count: 0,
            total_signal_count: 0,
            avg_confidence_raw: 0.0,
            avg_confidence: 0.0,
            confusion_rate: 0.0,
        }
    }
}

/// Round to one decimal place, matching the analytics display contract
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(count as f64 / total as f64 * 100.0)
    }
}

/// Reduce the event set for one (class, session) key to its aggregate
///
/// Order-independent: sums, counts and a participant set only. Zero events
/// produce the zero aggregate.
pub fn aggregate(class_id: &str, session_number: i64, events: &[SignalEvent]) -> SessionAggregate {
    if events.is_empty() {
        return SessionAggregate::zero(class_id, session_number);
    }

    let mut counts = SignalCounts::default();
    let mut confidence_sum: i64 = 0;
    let mut participants: BTreeSet<&str> = BTreeSet::new();
    for event in events {
        counts.bump(event.kind);
        confidence_sum += event.confidence;
        participants.insert(event.student_id.as_str());
    }

    let total = counts.total();
    let avg_raw = confidence_sum as f64 / total as f64;

    SessionAggregate {
        class_id: class_id.to_string(),
        session_number,
        signals: counts,
        signal_percentages: SignalPercentages {
            stuck: percent(counts.stuck, total),
            got_it: percent(counts.got_it, total),
            pause: percent(counts.pause, total),
            example: percent(counts.example, total),
        },
        participant_count: participants.len() as u64,
        total_signal_count: total,
        avg_confidence_raw: round1(avg_raw),
        avg_confidence: round1(avg_raw / 2.0),
        confusion_rate: percent(counts.stuck, total),
    }
}

// ========================================
// Session comparison
// ========================================

/// Qualitative direction of a metric change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improved,
    Declined,
    Stable,
}

/// Which delta direction counts as improvement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

/// Declared polarity table for the compared metrics
///
/// Confidence and got-it rising is good; stuck and confusion rate rising is
/// bad. Classification reads this table, it never infers direction.
pub fn polarity_of(metric: Metric) -> Polarity {
    match metric {
        Metric::AvgConfidence | Metric::GotIt => Polarity::Positive,
        Metric::Stuck | Metric::ConfusionRate => Polarity::Negative,
    }
}

/// Metrics carried in a [`ComparisonResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    AvgConfidence,
    GotIt,
    Stuck,
    ConfusionRate,
}

/// Classify a signed delta; exactly zero is Stable
pub fn classify(delta: f64, polarity: Polarity) -> Trend {
    if delta == 0.0 {
        Trend::Stable
    } else if (delta > 0.0) == (polarity == Polarity::Positive) {
        Trend::Improved
    } else {
        Trend::Declined
    }
}

/// Signed deltas, second session minus first
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDeltas {
    /// UI scale (1-5)
    pub avg_confidence: f64,
    pub got_it: i64,
    pub stuck: i64,
    pub confusion_rate: f64,
}

/// Per-metric trend labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTrends {
    pub avg_confidence: Trend,
    pub got_it: Trend,
    pub stuck: Trend,
    pub confusion_rate: Trend,
}

/// Session-over-session comparison of two aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub class_id: String,
    pub session_a: SessionAggregate,
    pub session_b: SessionAggregate,
    pub deltas: MetricDeltas,
    pub trends: MetricTrends,
    /// Overall label; follows the confidence trend
    pub trend: Trend,
}

/// Compare two session aggregates (deltas are `b - a`)
///
/// Zero-event aggregates are ordinary inputs: every delta is defined, no
/// NaN can appear.
pub fn compare(a: &SessionAggregate, b: &SessionAggregate) -> ComparisonResult {
    let deltas = MetricDeltas {
        avg_confidence: round1(b.avg_confidence - a.avg_confidence),
        got_it: b.signals.got_it as i64 - a.signals.got_it as i64,
        stuck: b.signals.stuck as i64 - a.signals.stuck as i64,
        confusion_rate: round1(b.confusion_rate - a.confusion_rate),
    };
    let trends = MetricTrends {
        avg_confidence: classify(deltas.avg_confidence, polarity_of(Metric::AvgConfidence)),
        got_it: classify(deltas.got_it as f64, polarity_of(Metric::GotIt)),
        stuck: classify(deltas.stuck as f64, polarity_of(Metric::Stuck)),
        confusion_rate: classify(deltas.confusion_rate, polarity_of(Metric::ConfusionRate)),
    };

    ComparisonResult {
        class_id: a.class_id.clone(),
        session_a: a.clone(),
        session_b: b.clone(),
        deltas,
        trends,
        trend: trends.avg_confidence,
    }
}
