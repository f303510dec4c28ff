use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{AnswerId, OptionId, QuestionId, SessionId, UserId};
use crate::model::question::Question;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("option {option} does not belong to question {question}")]
    UnknownOption { question: QuestionId, option: OptionId },
}

/// An answer event ready to be appended to the answer log.
///
/// Built only through [`NewUserAnswer::grade`], so `is_correct` always matches
/// the question's stored correct option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUserAnswer {
    user_id: UserId,
    question_id: QuestionId,
    session_id: Option<SessionId>,
    selected_option: OptionId,
    is_correct: bool,
    time_spent: u32,
    is_flagged: bool,
    answered_at: DateTime<Utc>,
}

impl NewUserAnswer {
    /// Grade a selection against `question`.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::UnknownOption` when `selected` is not one of the
    /// question's option ids.
    pub fn grade(
        user_id: UserId,
        question: &Question,
        selected: OptionId,
        time_spent: u32,
        is_flagged: bool,
        session_id: Option<SessionId>,
        answered_at: DateTime<Utc>,
    ) -> Result<Self, AnswerError> {
        if !question.has_option(&selected) {
            return Err(AnswerError::UnknownOption {
                question: question.id,
                option: selected,
            });
        }
        Ok(Self {
            user_id,
            question_id: question.id,
            session_id,
            is_correct: question.is_correct(&selected),
            selected_option: selected,
            time_spent,
            is_flagged,
            answered_at,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    #[must_use]
    pub fn selected_option(&self) -> &OptionId {
        &self.selected_option
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    #[must_use]
    pub fn time_spent(&self) -> u32 {
        self.time_spent
    }

    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.is_flagged
    }

    #[must_use]
    pub fn answered_at(&self) -> DateTime<Utc> {
        self.answered_at
    }

    #[must_use]
    pub fn assign_id(self, id: AnswerId) -> UserAnswer {
        UserAnswer {
            id,
            user_id: self.user_id,
            question_id: self.question_id,
            session_id: self.session_id,
            selected_option: self.selected_option,
            is_correct: self.is_correct,
            time_spent: self.time_spent,
            is_flagged: self.is_flagged,
            answered_at: self.answered_at,
        }
    }
}

/// A stored answer event. Only `is_flagged` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAnswer {
    pub id: AnswerId,
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub session_id: Option<SessionId>,
    pub selected_option: OptionId,
    pub is_correct: bool,
    /// Whole seconds.
    pub time_spent: u32,
    pub is_flagged: bool,
    pub answered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::BankId;
    use crate::model::question::{Difficulty, QuestionDraft};
    use crate::time::fixed_now;

    fn question() -> Question {
        QuestionDraft {
            bank_id: BankId::new(1),
            text: "Most appropriate initial test for suspected meningitis?".into(),
            options: vec![
                ("a".into(), "A".into(), "CT head".into()),
                ("b".into(), "B".into(), "Lumbar puncture".into()),
                ("c".into(), "C".into(), "Blood cultures".into()),
            ],
            correct_answer: "b".into(),
            explanation: Some("LP is diagnostic.".into()),
            subject: Some("Neurology".into()),
            system: Some("Nervous".into()),
            difficulty: Difficulty::Easy,
            tags: Vec::new(),
            images: Vec::new(),
        }
        .validate(fixed_now())
        .unwrap()
        .assign_id(QuestionId::new(2))
    }

    fn grade(selected: &str) -> Result<NewUserAnswer, AnswerError> {
        NewUserAnswer::grade(
            UserId::new("u1").unwrap(),
            &question(),
            OptionId::new(selected).unwrap(),
            42,
            false,
            None,
            fixed_now(),
        )
    }

    #[test]
    fn correctness_matches_stored_answer() {
        assert!(grade("b").unwrap().is_correct());
        assert!(!grade("a").unwrap().is_correct());
        assert!(!grade("c").unwrap().is_correct());
    }

    #[test]
    fn foreign_option_is_rejected() {
        let err = grade("z").unwrap_err();
        assert!(matches!(err, AnswerError::UnknownOption { question, .. } if question == QuestionId::new(2)));
    }

    #[test]
    fn assign_id_keeps_fields() {
        let answer = grade("B").unwrap().assign_id(AnswerId::new(9));
        assert_eq!(answer.id, AnswerId::new(9));
        assert_eq!(answer.selected_option.as_str(), "b");
        assert_eq!(answer.time_spent, 42);
        assert!(answer.is_correct);
    }
}
