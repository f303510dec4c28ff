use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{BankId, OptionId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question needs at least two options, got {0}")]
    TooFewOptions(usize),

    #[error("option text cannot be empty")]
    EmptyOptionText,

    #[error("option id cannot be empty")]
    EmptyOptionId,

    #[error("duplicate option id: {0}")]
    DuplicateOption(String),

    #[error("correct answer {0} is not one of the question's options")]
    UnknownCorrectAnswer(String),

    #[error("invalid difficulty: {0}")]
    InvalidDifficulty(String),
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(QuestionError::InvalidDifficulty(other.to_owned())),
        }
    }
}

//
// ─── OPTIONS ───────────────────────────────────────────────────────────────────
//

/// One selectable answer. `id` is what answers reference; `letter` is display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub letter: String,
    pub text: String,
}

//
// ─── DRAFT / VALIDATION ────────────────────────────────────────────────────────
//

/// Unvalidated question content as produced by ingestion or seeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub bank_id: BankId,
    pub text: String,
    /// `(option id, display letter, text)` in presentation order.
    pub options: Vec<(String, String, String)>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub subject: Option<String>,
    pub system: Option<String>,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub images: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl QuestionDraft {
    /// Validate content and options.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when text is blank, there are fewer than two
    /// options, option ids repeat, or the correct answer is not an option id.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedQuestion, QuestionError> {
        let text = self.text.trim().to_owned();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if self.options.len() < 2 {
            return Err(QuestionError::TooFewOptions(self.options.len()));
        }

        let mut seen = HashSet::with_capacity(self.options.len());
        let mut options = Vec::with_capacity(self.options.len());
        for (id, letter, option_text) in self.options {
            let id = OptionId::new(id).map_err(|_| QuestionError::EmptyOptionId)?;
            if option_text.trim().is_empty() {
                return Err(QuestionError::EmptyOptionText);
            }
            if !seen.insert(id.clone()) {
                return Err(QuestionError::DuplicateOption(id.to_string()));
            }
            options.push(QuestionOption {
                id,
                letter: letter.trim().to_owned(),
                text: option_text.trim().to_owned(),
            });
        }

        let correct_answer = OptionId::new(self.correct_answer.clone())
            .map_err(|_| QuestionError::UnknownCorrectAnswer(self.correct_answer.clone()))?;
        if !seen.contains(&correct_answer) {
            return Err(QuestionError::UnknownCorrectAnswer(correct_answer.to_string()));
        }

        let tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(ValidatedQuestion {
            bank_id: self.bank_id,
            text,
            options,
            correct_answer,
            explanation: non_blank(self.explanation),
            subject: non_blank(self.subject),
            system: non_blank(self.system),
            difficulty: self.difficulty,
            tags,
            images: self.images,
            created_at: now,
        })
    }
}

/// Question content that passed validation but has no storage identity yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub bank_id: BankId,
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub correct_answer: OptionId,
    pub explanation: Option<String>,
    pub subject: Option<String>,
    pub system: Option<String>,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            bank_id: self.bank_id,
            text: self.text,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
            subject: self.subject,
            system: self.system,
            difficulty: self.difficulty,
            tags: self.tags,
            images: self.images,
            created_at: self.created_at,
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A published question. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub bank_id: BankId,
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub correct_answer: OptionId,
    pub explanation: Option<String>,
    pub subject: Option<String>,
    pub system: Option<String>,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    #[must_use]
    pub fn has_option(&self, option: &OptionId) -> bool {
        self.options.iter().any(|o| &o.id == option)
    }

    #[must_use]
    pub fn is_correct(&self, selected: &OptionId) -> bool {
        &self.correct_answer == selected
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn draft() -> QuestionDraft {
        QuestionDraft {
            bank_id: BankId::new(1),
            text: "Which leads show an inferior STEMI?".into(),
            options: vec![
                ("a".into(), "A".into(), "I, aVL".into()),
                ("b".into(), "B".into(), "II, III, aVF".into()),
            ],
            correct_answer: "b".into(),
            explanation: Some("Inferior leads.".into()),
            subject: Some("Cardiology".into()),
            system: Some("  ".into()),
            difficulty: Difficulty::Medium,
            tags: vec!["ECG".into(), " ".into()],
            images: Vec::new(),
        }
    }

    #[test]
    fn valid_draft_assigns_id() {
        let question = draft().validate(fixed_now()).unwrap().assign_id(QuestionId::new(7));
        assert_eq!(question.id, QuestionId::new(7));
        assert_eq!(question.options.len(), 2);
        assert_eq!(question.system, None);
        assert_eq!(question.tags, vec!["ECG".to_string()]);
        assert!(question.is_correct(&OptionId::new("B").unwrap()));
        assert!(!question.is_correct(&OptionId::new("a").unwrap()));
    }

    #[test]
    fn correct_answer_must_be_an_option() {
        let mut d = draft();
        d.correct_answer = "e".into();
        assert_eq!(
            d.validate(fixed_now()).unwrap_err(),
            QuestionError::UnknownCorrectAnswer("e".into())
        );
    }

    #[test]
    fn duplicate_options_are_rejected() {
        let mut d = draft();
        d.options.push(("A".into(), "C".into(), "dup".into()));
        assert!(matches!(
            d.validate(fixed_now()),
            Err(QuestionError::DuplicateOption(_))
        ));
    }

    #[test]
    fn needs_two_options_and_text() {
        let mut d = draft();
        d.options.truncate(1);
        assert_eq!(
            d.validate(fixed_now()).unwrap_err(),
            QuestionError::TooFewOptions(1)
        );

        let mut d = draft();
        d.text = "   ".into();
        assert_eq!(d.validate(fixed_now()).unwrap_err(), QuestionError::EmptyText);
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("HARD".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("brutal".parse::<Difficulty>().is_err());
    }
}
