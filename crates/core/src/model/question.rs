use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{DifficultyId, QuestionId, SessionId};

/// Validation errors for question payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("columnar question is missing digit grids")]
    MissingColumnarData,

    #[error("digit {value} at position {index} is not a single decimal digit")]
    DigitOutOfRange { index: usize, value: u8 },
}

/// Shape of a question's answer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Arithmetic,
    Columnar,
}

/// A single exercise question.
///
/// For columnar questions the digit grids use `None` for blanks the user must
/// fill and `Some(d)` for fixed, pre-filled digits. Every cell holds a single
/// decimal digit (0-9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub session_id: SessionId,
    pub operands: Vec<i64>,
    pub operations: Vec<String>,
    pub question_string: String,
    pub correct_answer: i64,
    pub difficulty_level_id: DifficultyId,
    #[serde(rename = "question_type")]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columnar_operands: Option<Vec<Vec<Option<u8>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columnar_result_placeholders: Option<Vec<Option<u8>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columnar_operation: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
}

impl Question {
    #[must_use]
    pub fn is_columnar(&self) -> bool {
        self.kind == QuestionKind::Columnar
    }

    /// The operation symbol used for columnar display and result synthesis.
    ///
    /// Falls back to the first entry of `operations`, then to `+`.
    #[must_use]
    pub fn columnar_symbol(&self) -> &str {
        self.columnar_operation
            .as_deref()
            .or_else(|| self.operations.first().map(String::as_str))
            .unwrap_or("+")
    }

    /// Validates the columnar invariants from the data model.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::MissingColumnarData` when a columnar question
    /// lacks either grid, or `QuestionError::DigitOutOfRange` when a fixed
    /// cell is not a single decimal digit.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if !self.is_columnar() {
            return Ok(());
        }
        let operands = self
            .columnar_operands
            .as_ref()
            .ok_or(QuestionError::MissingColumnarData)?;
        let result = self
            .columnar_result_placeholders
            .as_ref()
            .ok_or(QuestionError::MissingColumnarData)?;

        for row in operands {
            check_digits(row)?;
        }
        check_digits(result)
    }

    /// Synthesizes the human-readable equation for a columnar question,
    /// zero-padding operand and result strings to the grid widths.
    ///
    /// Returns `None` for non-columnar questions or when no operand grid is
    /// available.
    #[must_use]
    pub fn columnar_equation(&self) -> Option<String> {
        if !self.is_columnar() || self.operands.len() < 2 {
            return None;
        }
        let grids = self.columnar_operands.as_ref()?;
        let symbol = self.columnar_symbol();

        let padded: Vec<String> = self
            .operands
            .iter()
            .enumerate()
            .map(|(idx, operand)| match grids.get(idx) {
                Some(row) => format!("{operand:0width$}", width = row.len()),
                None => operand.to_string(),
            })
            .collect();

        let result = match symbol {
            "-" => self.operands[0] - self.operands[1],
            "*" => self.operands.iter().product(),
            _ => self.operands.iter().sum(),
        };
        let result = match self.columnar_result_placeholders.as_ref() {
            Some(cells) => format!("{result:0width$}", width = cells.len()),
            None => result.to_string(),
        };

        Some(format!("{} {symbol} {} = {result}", padded[0], padded[1]))
    }
}

fn check_digits(cells: &[Option<u8>]) -> Result<(), QuestionError> {
    for (index, cell) in cells.iter().enumerate() {
        if let Some(value) = *cell
            && value > 9
        {
            return Err(QuestionError::DigitOutOfRange { index, value });
        }
    }
    Ok(())
}

/// Wire payload for submitting an answer.
///
/// Plain questions carry `user_answer`; columnar questions carry the filled
/// operand and result digit grids instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub session_id: SessionId,
    pub question_id: QuestionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_filled_operands: Option<Vec<Vec<u8>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_filled_result: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn columnar_question() -> Question {
        Question {
            id: QuestionId::generate(),
            session_id: SessionId::generate(),
            operands: vec![12, 34],
            operations: vec!["+".into()],
            question_string: "12 + 34".into(),
            correct_answer: 46,
            difficulty_level_id: DifficultyId::new(1),
            kind: QuestionKind::Columnar,
            columnar_operands: Some(vec![vec![Some(1), None], vec![Some(3), Some(4)]]),
            columnar_result_placeholders: Some(vec![None, Some(6)]),
            columnar_operation: Some("+".into()),
            created_at: fixed_now(),
            user_answer: None,
            is_correct: None,
            time_spent: None,
            answered_at: None,
        }
    }

    #[test]
    fn validate_accepts_well_formed_grids() {
        assert!(columnar_question().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_grids() {
        let mut question = columnar_question();
        question.columnar_result_placeholders = None;
        assert_eq!(
            question.validate().unwrap_err(),
            QuestionError::MissingColumnarData
        );
    }

    #[test]
    fn validate_rejects_out_of_range_digit() {
        let mut question = columnar_question();
        question.columnar_operands = Some(vec![vec![Some(12)]]);
        assert!(matches!(
            question.validate().unwrap_err(),
            QuestionError::DigitOutOfRange { index: 0, value: 12 }
        ));
    }

    #[test]
    fn equation_zero_pads_to_grid_widths() {
        let mut question = columnar_question();
        question.operands = vec![5, 34];
        question.columnar_operands = Some(vec![vec![None, Some(5)], vec![Some(3), Some(4)]]);
        question.columnar_result_placeholders = Some(vec![None, None, Some(9)]);
        assert_eq!(question.columnar_equation().unwrap(), "05 + 34 = 039");
    }

    #[test]
    fn equation_supports_subtraction_and_multiplication() {
        let mut question = columnar_question();
        question.operands = vec![34, 12];
        question.columnar_operation = Some("-".into());
        question.columnar_result_placeholders = Some(vec![None, None]);
        assert_eq!(question.columnar_equation().unwrap(), "34 - 12 = 22");

        question.columnar_operation = Some("*".into());
        question.columnar_result_placeholders = Some(vec![None, None, None]);
        assert_eq!(question.columnar_equation().unwrap(), "34 * 12 = 408");
    }

    #[test]
    fn equation_is_none_for_plain_questions() {
        let mut question = columnar_question();
        question.kind = QuestionKind::Arithmetic;
        assert!(question.columnar_equation().is_none());
    }
}
