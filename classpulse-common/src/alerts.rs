//! Live alert threshold rules
//!
//! The rule table maps a signal kind to a count threshold and the advisory
//! it raises. Thresholds are tunable configuration, not hardcoded: the
//! built-in defaults preserve the classroom semantics (every 3rd stuck tap
//! is a confusion spike, every 2nd example request means demonstrate, every
//! 2nd pause tap means the class needs a break), and a config file can
//! replace any of them.
//!
//! Evaluation is pure; the runtime that serializes it per session lives in
//! the service crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::SignalCounts;
use crate::signal::SignalKind;

/// Advisory severity, ordered so that `Warning` is the highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Caution,
    Warning,
}

/// One threshold rule: fire every `multiple` signals of a kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertRule {
    pub multiple: u64,
    pub severity: Severity,
    /// Advisory text; `{count}` is substituted with the triggering count
    pub message: String,
}

/// The rule table, one optional rule per signal kind
///
/// An empty table is valid and leaves the alerting engine Idle forever.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertRules {
    pub stuck: Option<AlertRule>,
    pub got_it: Option<AlertRule>,
    pub pause: Option<AlertRule>,
    pub example: Option<AlertRule>,
}

impl AlertRules {
    /// Built-in defaults preserving the original dashboard semantics
    pub fn builtin() -> Self {
        Self {
            stuck: Some(AlertRule {
                multiple: 3,
                severity: Severity::Warning,
                message: "Confusion spike detected! Consider slowing down or reviewing."
                    .to_string(),
            }),
            got_it: None,
            pause: Some(AlertRule {
                multiple: 2,
                severity: Severity::Caution,
                message: "Students need a break. Consider a short pause.".to_string(),
            }),
            example: Some(AlertRule {
                multiple: 2,
                severity: Severity::Info,
                message: "Multiple students need an example. Time to demonstrate!".to_string(),
            }),
        }
    }

    pub fn rule_for(&self, kind: SignalKind) -> Option<&AlertRule> {
        match kind {
            SignalKind::Stuck => self.stuck.as_ref(),
            SignalKind::GotIt => self.got_it.as_ref(),
            SignalKind::Pause => self.pause.as_ref(),
            SignalKind::ExampleRequest => self.example.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        SignalKind::ALL.iter().all(|kind| self.rule_for(*kind).is_none())
    }

    /// Rules in declaration order (stuck, got_it, pause, example)
    pub fn iter(&self) -> impl Iterator<Item = (SignalKind, &AlertRule)> {
        SignalKind::ALL
            .iter()
            .filter_map(|kind| self.rule_for(*kind).map(|rule| (*kind, rule)))
    }
}

/// Advisory emitted when a threshold rule fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TipAlert {
    pub severity: Severity,
    pub message: String,
    pub signal_kind: SignalKind,
    /// The rolling count that tripped the rule
    pub count: u64,
    pub raised_at: DateTime<Utc>,
}

/// Evaluate the rule table after `observed` was folded into `counts`
///
/// Rules are scanned highest severity first (Warning > Caution > Info, ties
/// in declaration order); the first firing predicate wins. A rule fires
/// only for the kind of the event just observed, when that kind's rolling
/// count is a positive multiple of the rule's threshold. A rule with
/// `multiple == 0` is misconfigured and never fires.
pub fn evaluate(
    rules: &AlertRules,
    counts: &SignalCounts,
    observed: SignalKind,
    now: DateTime<Utc>,
) -> Option<TipAlert> {
    let mut candidates: Vec<(SignalKind, &AlertRule)> = rules.iter().collect();
    candidates.sort_by(|a, b| b.1.severity.cmp(&a.1.severity));

    for (kind, rule) in candidates {
        if kind != observed || rule.multiple == 0 {
            continue;
        }
        let count = counts.get(kind);
        if count > 0 && count % rule.multiple == 0 {
            return Some(TipAlert {
                severity: rule.severity,
                message: render_message(&rule.message, count),
                signal_kind: kind,
                count,
                raised_at: now,
            });
        }
    }
    None
}

fn render_message(template: &str, count: u64) -> String {
    template.replace("{count}", &count.to_string())
}
