use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::model::{AnsweredQuestion, QuestionId, QuestionSet};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question {0} is not part of this assessment")]
    UnknownQuestion(QuestionId),

    #[error("\"{option}\" is not an option of question {question_id}")]
    InvalidOption {
        question_id: QuestionId,
        option: String,
    },
}

/// The candidate's current selection per question.
///
/// Keys are always ids of the owning `QuestionSet` and values are always one of
/// that question's options; invalid writes are rejected without touching the store.
#[derive(Debug, Clone)]
pub struct AnswerStore {
    questions: Arc<QuestionSet>,
    selected: HashMap<QuestionId, String>,
}

impl AnswerStore {
    #[must_use]
    pub fn new(questions: Arc<QuestionSet>) -> Self {
        Self {
            questions,
            selected: HashMap::new(),
        }
    }

    #[must_use]
    pub fn question_set(&self) -> &QuestionSet {
        &self.questions
    }

    /// Record (or overwrite) the answer for a question.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::UnknownQuestion` if the id is not in the set and
    /// `AnswerError::InvalidOption` if `option` is not one of the question's options.
    pub fn record(&mut self, question_id: QuestionId, option: &str) -> Result<(), AnswerError> {
        let question = self
            .questions
            .question(question_id)
            .ok_or(AnswerError::UnknownQuestion(question_id))?;
        if !question.has_option(option) {
            return Err(AnswerError::InvalidOption {
                question_id,
                option: option.to_string(),
            });
        }
        self.selected.insert(question_id, option.to_string());
        Ok(())
    }

    /// Remove the answer for a question, returning the previous selection.
    pub fn clear(&mut self, question_id: QuestionId) -> Option<String> {
        self.selected.remove(&question_id)
    }

    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> Option<&str> {
        self.selected.get(&question_id).map(String::as_str)
    }

    #[must_use]
    pub fn is_answered(&self, question_id: QuestionId) -> bool {
        self.selected.contains_key(&question_id)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.selected.len()
    }

    /// True iff every question in the set has a recorded answer.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.selected.len() == self.questions.len()
    }

    /// Ids of questions without an answer, in question order.
    #[must_use]
    pub fn unanswered(&self) -> Vec<QuestionId> {
        self.questions
            .questions()
            .iter()
            .map(|q| q.id())
            .filter(|id| !self.selected.contains_key(id))
            .collect()
    }

    /// Answered questions in question order; unanswered ones are omitted.
    #[must_use]
    pub fn answered(&self) -> Vec<AnsweredQuestion> {
        self.questions
            .questions()
            .iter()
            .filter_map(|q| {
                self.selected.get(&q.id()).map(|selected| AnsweredQuestion {
                    question_id: q.id(),
                    selected_answer: selected.clone(),
                })
            })
            .collect()
    }
}
