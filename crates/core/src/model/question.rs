use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::ids::{AssessmentId, QuestionId};
use super::options::{dedup_options, normalize_options};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionSetError {
    #[error("assessment has no questions")]
    Empty,

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("time limit must be greater than zero")]
    ZeroTimeLimit,
}

//
// ─── WIRE SHAPES ───────────────────────────────────────────────────────────────
//

/// Assessment payload as delivered by the remote API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentWire {
    pub id: AssessmentId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(alias = "timeLimit")]
    pub time_limit_seconds: u32,
    #[serde(default, alias = "passingScore")]
    pub passing_threshold: Option<u32>,
    #[serde(default)]
    pub questions: Vec<QuestionWire>,
}

/// One question as delivered by the remote API; `options` is left untyped
/// because its encoding varies between backends.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionWire {
    pub id: QuestionId,
    #[serde(alias = "question")]
    pub prompt: String,
    #[serde(default)]
    pub options: Value,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
}

impl Question {
    /// Build a question; options are trimmed and de-duplicated.
    #[must_use]
    pub fn new<I, S>(id: QuestionId, prompt: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            prompt: prompt.into(),
            options: dedup_options(options),
        }
    }

    #[must_use]
    pub fn from_wire(wire: QuestionWire) -> Self {
        Self {
            id: wire.id,
            prompt: wire.prompt,
            options: normalize_options(&wire.options),
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// A question whose options could not be decoded cannot be answered.
    #[must_use]
    pub fn is_answerable(&self) -> bool {
        !self.options.is_empty()
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// Immutable description of an assessment for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    assessment_id: AssessmentId,
    title: Option<String>,
    questions: Vec<Question>,
    positions: HashMap<QuestionId, usize>,
    time_limit_seconds: u32,
    passing_threshold: Option<u32>,
}

impl QuestionSet {
    /// # Errors
    ///
    /// Returns `QuestionSetError::Empty` when `questions` is empty,
    /// `QuestionSetError::DuplicateQuestion` when two questions share an id and
    /// `QuestionSetError::ZeroTimeLimit` when the time limit is zero.
    pub fn new(
        assessment_id: AssessmentId,
        title: Option<String>,
        questions: Vec<Question>,
        time_limit_seconds: u32,
        passing_threshold: Option<u32>,
    ) -> Result<Self, QuestionSetError> {
        if questions.is_empty() {
            return Err(QuestionSetError::Empty);
        }
        if time_limit_seconds == 0 {
            return Err(QuestionSetError::ZeroTimeLimit);
        }

        let mut positions = HashMap::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            if positions.insert(question.id(), index).is_some() {
                return Err(QuestionSetError::DuplicateQuestion(question.id()));
            }
        }

        Ok(Self {
            assessment_id,
            title: title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            questions,
            positions,
            time_limit_seconds,
            passing_threshold,
        })
    }

    /// Build a question set from the wire payload, normalizing every
    /// question's options on the way in.
    ///
    /// # Errors
    ///
    /// See [`QuestionSet::new`]. Malformed options never fail construction.
    pub fn from_wire(wire: AssessmentWire) -> Result<Self, QuestionSetError> {
        let questions = wire.questions.into_iter().map(Question::from_wire).collect();
        Self::new(
            wire.id,
            wire.title,
            questions,
            wire.time_limit_seconds,
            wire.passing_threshold,
        )
    }

    #[must_use]
    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment_id
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of questions; never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.position(id).and_then(|index| self.questions.get(index))
    }

    #[must_use]
    pub fn position(&self, id: QuestionId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.positions.contains_key(&id)
    }

    #[must_use]
    pub fn time_limit_seconds(&self) -> u32 {
        self.time_limit_seconds
    }

    #[must_use]
    pub fn passing_threshold(&self) -> Option<u32> {
        self.passing_threshold
    }
}
