use crate::model::QuestionId;

use super::answers::AnswerStore;

/// One cell of the question-number overview grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverviewCell {
    pub index: usize,
    pub question_id: QuestionId,
    pub answered: bool,
    pub current: bool,
}

/// Display cursor over the questions. Never touches answers or the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigator {
    current: usize,
    len: usize,
}

impl Navigator {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { current: 0, len }
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Move to `index`, clamped to `[0, len - 1]`. Returns the new position.
    pub fn go_to(&mut self, index: usize) -> usize {
        self.current = index.min(self.len.saturating_sub(1));
        self.current
    }

    pub fn next(&mut self) -> usize {
        self.go_to(self.current.saturating_add(1))
    }

    pub fn previous(&mut self) -> usize {
        self.go_to(self.current.saturating_sub(1))
    }

    pub fn first(&mut self) -> usize {
        self.go_to(0)
    }

    pub fn last(&mut self) -> usize {
        self.go_to(self.len.saturating_sub(1))
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.current + 1 >= self.len
    }

    #[must_use]
    pub fn overview(&self, answers: &AnswerStore) -> Vec<OverviewCell> {
        answers
            .question_set()
            .questions()
            .iter()
            .enumerate()
            .map(|(index, question)| OverviewCell {
                index,
                question_id: question.id(),
                answered: answers.is_answered(question.id()),
                current: index == self.current,
            })
            .collect()
    }
}
