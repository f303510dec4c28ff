use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::question::Difficulty;
use crate::time::utc_day;

/// Bucket label for answers whose question carries no value for a grouping tag.
pub const UNSPECIFIED: &str = "unspecified";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnalyticsError {
    #[error("range start {from} is after range end {to}")]
    InvertedRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// `numerator / denominator`, or 0 for an empty denominator.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

//
// ─── INPUT ─────────────────────────────────────────────────────────────────────
//

/// Inclusive bounds on `answered_at`. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl DateRange {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `AnalyticsError::InvertedRange` when `from` is after `to`.
    pub fn new(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Self, AnalyticsError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(AnalyticsError::InvertedRange { from, to });
            }
        }
        Ok(Self { from, to })
    }

    #[must_use]
    pub fn from(&self) -> Option<DateTime<Utc>> {
        self.from
    }

    #[must_use]
    pub fn to(&self) -> Option<DateTime<Utc>> {
        self.to
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// One answer joined with the grouping tags of its question.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFact {
    pub answered_at: DateTime<Utc>,
    pub is_correct: bool,
    pub time_spent: u32,
    pub is_flagged: bool,
    pub subject: Option<String>,
    pub system: Option<String>,
    pub difficulty: Option<Difficulty>,
}

//
// ─── OUTPUT ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_questions: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub average_time_per_question: f64,
    pub total_time_spent: u64,
    pub flagged_questions: u32,
}

/// Per-group totals for one value of a grouping tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub label: String,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub average_time: f64,
}

/// One point per UTC day with at least one answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPoint {
    pub date: NaiveDate,
    pub accuracy: f64,
    pub questions_answered: u32,
    pub time_spent: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub overall: PerformanceMetrics,
    pub by_subject: Vec<GroupStats>,
    pub by_system: Vec<GroupStats>,
    pub by_difficulty: Vec<GroupStats>,
    pub progress: Vec<ProgressPoint>,
}

//
// ─── AGGREGATION ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    total: u32,
    correct: u32,
    time: u64,
    flagged: u32,
}

impl Tally {
    fn add(&mut self, fact: &AnswerFact) {
        self.total = self.total.saturating_add(1);
        if fact.is_correct {
            self.correct = self.correct.saturating_add(1);
        }
        if fact.is_flagged {
            self.flagged = self.flagged.saturating_add(1);
        }
        self.time = self.time.saturating_add(u64::from(fact.time_spent));
    }

    fn accuracy(self) -> f64 {
        ratio(u64::from(self.correct), u64::from(self.total))
    }

    fn average_time(self) -> f64 {
        ratio(self.time, u64::from(self.total))
    }

    fn into_group(self, label: String) -> GroupStats {
        GroupStats {
            label,
            total_questions: self.total,
            correct_answers: self.correct,
            accuracy: self.accuracy(),
            average_time: self.average_time(),
        }
    }
}

fn label_or_unspecified(tag: Option<&str>) -> String {
    tag.map_or_else(|| UNSPECIFIED.to_owned(), str::to_owned)
}

fn groups(map: BTreeMap<String, Tally>) -> Vec<GroupStats> {
    map.into_iter()
        .map(|(label, tally)| tally.into_group(label))
        .collect()
}

/// Derive overall metrics, tag breakdowns and the daily series from `facts`.
///
/// Facts need not be sorted. Breakdowns are ordered by label, the series by date.
#[must_use]
pub fn aggregate(facts: &[AnswerFact]) -> AnalyticsReport {
    let mut overall = Tally::default();
    let mut by_subject: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_system: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_difficulty: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_day: BTreeMap<NaiveDate, Tally> = BTreeMap::new();

    for fact in facts {
        overall.add(fact);
        by_subject
            .entry(label_or_unspecified(fact.subject.as_deref()))
            .or_default()
            .add(fact);
        by_system
            .entry(label_or_unspecified(fact.system.as_deref()))
            .or_default()
            .add(fact);
        by_difficulty
            .entry(label_or_unspecified(fact.difficulty.map(Difficulty::as_str)))
            .or_default()
            .add(fact);
        by_day.entry(utc_day(fact.answered_at)).or_default().add(fact);
    }

    let progress = by_day
        .into_iter()
        .map(|(date, tally)| ProgressPoint {
            date,
            accuracy: tally.accuracy(),
            questions_answered: tally.total,
            time_spent: tally.time,
        })
        .collect();

    AnalyticsReport {
        overall: PerformanceMetrics {
            total_questions: overall.total,
            correct_answers: overall.correct,
            accuracy: overall.accuracy(),
            average_time_per_question: overall.average_time(),
            total_time_spent: overall.time,
            flagged_questions: overall.flagged,
        },
        by_subject: groups(by_subject),
        by_system: groups(by_system),
        by_difficulty: groups(by_difficulty),
        progress,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn fact(
        correct: bool,
        secs: u32,
        subject: Option<&str>,
        difficulty: Option<Difficulty>,
        offset_hours: i64,
    ) -> AnswerFact {
        AnswerFact {
            answered_at: fixed_now() + Duration::hours(offset_hours),
            is_correct: correct,
            time_spent: secs,
            is_flagged: false,
            subject: subject.map(str::to_owned),
            system: None,
            difficulty,
        }
    }

    #[test]
    fn empty_history_has_zero_accuracy() {
        let report = aggregate(&[]);
        assert_eq!(report.overall.total_questions, 0);
        assert_eq!(report.overall.accuracy, 0.0);
        assert_eq!(report.overall.average_time_per_question, 0.0);
        assert!(report.by_subject.is_empty());
        assert!(report.progress.is_empty());
    }

    #[test]
    fn overall_and_breakdowns() {
        let mut flagged = fact(false, 90, None, Some(Difficulty::Hard), 0);
        flagged.is_flagged = true;
        let facts = vec![
            fact(true, 30, Some("Cardiology"), Some(Difficulty::Medium), 0),
            fact(false, 60, Some("Cardiology"), Some(Difficulty::Medium), 0),
            fact(true, 20, Some("Neurology"), Some(Difficulty::Easy), 0),
            flagged,
        ];

        let report = aggregate(&facts);
        assert_eq!(report.overall.total_questions, 4);
        assert_eq!(report.overall.correct_answers, 2);
        assert!((report.overall.accuracy - 0.5).abs() < 1e-9);
        assert_eq!(report.overall.total_time_spent, 200);
        assert!((report.overall.average_time_per_question - 50.0).abs() < 1e-9);
        assert_eq!(report.overall.flagged_questions, 1);

        let labels: Vec<_> = report.by_subject.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Cardiology", "Neurology", UNSPECIFIED]);
        let cardio = &report.by_subject[0];
        assert_eq!(cardio.total_questions, 2);
        assert_eq!(cardio.correct_answers, 1);
        assert!((cardio.average_time - 45.0).abs() < 1e-9);

        assert_eq!(report.by_system.len(), 1);
        assert_eq!(report.by_system[0].label, UNSPECIFIED);
        assert_eq!(report.by_system[0].total_questions, 4);

        let diffs: Vec<_> = report.by_difficulty.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(diffs, vec!["easy", "hard", "medium"]);
    }

    #[test]
    fn group_labels_match_exactly() {
        let facts = vec![
            fact(true, 1, Some("cardiology"), None, 0),
            fact(true, 1, Some("Cardiology"), None, 0),
        ];
        assert_eq!(aggregate(&facts).by_subject.len(), 2);
    }

    #[test]
    fn progress_is_bucketed_per_utc_day() {
        // fixed_now() is 22:13 UTC, so +2h lands on the next day.
        let facts = vec![
            fact(true, 10, None, None, 2),
            fact(true, 10, None, None, 0),
            fact(false, 10, None, None, 1),
        ];
        let report = aggregate(&facts);
        assert_eq!(report.progress.len(), 2);
        assert_eq!(report.progress[0].date, utc_day(fixed_now()));
        assert_eq!(report.progress[0].questions_answered, 2);
        assert!((report.progress[0].accuracy - 0.5).abs() < 1e-9);
        assert_eq!(report.progress[1].questions_answered, 1);
        assert_eq!(report.progress[1].time_spent, 10);
    }

    #[test]
    fn date_range_is_inclusive() {
        let now = fixed_now();
        let range = DateRange::new(Some(now), Some(now + Duration::days(1))).unwrap();
        assert!(range.contains(now));
        assert!(range.contains(now + Duration::days(1)));
        assert!(!range.contains(now - Duration::seconds(1)));
        assert!(DateRange::all().contains(now));
        assert!(DateRange::new(Some(now), Some(now - Duration::days(1))).is_err());
    }
}
