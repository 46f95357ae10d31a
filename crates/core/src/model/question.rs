use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised while authoring or rehydrating a question.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("a question needs at least {min} options, got {len}")]
    TooFewOptions { min: usize, len: usize },

    #[error("option {index} is empty")]
    EmptyOption { index: usize },

    #[error("option {option:?} appears more than once")]
    DuplicateOption { option: String },

    #[error("correct answer {answer:?} is not one of the options")]
    AnswerNotInOptions { answer: String },

    #[error("invalid {kind} value: {raw}")]
    InvalidTag { kind: &'static str, raw: String },
}

//
// ─── CLASSIFICATION ───────────────────────────────────────────────────────────
//

/// Subject area a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Mathematics,
    Reasoning,
    Technical,
    Database,
}

impl Category {
    /// Stable name used for storage and display.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Mathematics => "Mathematics",
            Category::Reasoning => "Reasoning",
            Category::Technical => "Technical",
            Category::Database => "Database",
        }
    }
}

/// Difficulty band a question is authored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

/// Where a question was adapted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionSource {
    LeetCode,
    HackerRank,
    GeeksforGeeks,
}

impl QuestionSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionSource::LeetCode => "LeetCode",
            QuestionSource::HackerRank => "HackerRank",
            QuestionSource::GeeksforGeeks => "GeeksforGeeks",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for QuestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Mathematics" => Ok(Category::Mathematics),
            "Reasoning" => Ok(Category::Reasoning),
            "Technical" => Ok(Category::Technical),
            "Database" => Ok(Category::Database),
            other => Err(QuestionError::InvalidTag {
                kind: "category",
                raw: other.to_owned(),
            }),
        }
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Difficulty::Easy),
            "Medium" => Ok(Difficulty::Medium),
            "Hard" => Ok(Difficulty::Hard),
            other => Err(QuestionError::InvalidTag {
                kind: "difficulty",
                raw: other.to_owned(),
            }),
        }
    }
}

impl FromStr for QuestionSource {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LeetCode" => Ok(QuestionSource::LeetCode),
            "HackerRank" => Ok(QuestionSource::HackerRank),
            "GeeksforGeeks" => Ok(QuestionSource::GeeksforGeeks),
            other => Err(QuestionError::InvalidTag {
                kind: "source",
                raw: other.to_owned(),
            }),
        }
    }
}

//
// ─── QUESTION TYPES ───────────────────────────────────────────────────────────
//

/// Minimum number of options a multiple-choice question must offer.
pub const MIN_OPTIONS: usize = 2;

/// Unvalidated question as submitted by an author or an import file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub category: Category,
    pub difficulty: Difficulty,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub source: Option<QuestionSource>,
}

impl QuestionDraft {
    /// Check the draft and trim its text fields.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text is blank, there are fewer than
    /// [`MIN_OPTIONS`] options, an option is blank or repeated, or the correct
    /// answer is not one of the options.
    pub fn validate(self) -> Result<ValidatedQuestion, QuestionError> {
        let text = self.question_text.trim();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        if self.options.len() < MIN_OPTIONS {
            return Err(QuestionError::TooFewOptions {
                min: MIN_OPTIONS,
                len: self.options.len(),
            });
        }

        let mut options = Vec::with_capacity(self.options.len());
        let mut seen = HashSet::with_capacity(self.options.len());
        for (index, raw) in self.options.iter().enumerate() {
            let option = raw.trim();
            if option.is_empty() {
                return Err(QuestionError::EmptyOption { index });
            }
            if !seen.insert(option) {
                return Err(QuestionError::DuplicateOption {
                    option: option.to_owned(),
                });
            }
            options.push(option.to_owned());
        }

        let answer = self.correct_answer.trim();
        if !options.iter().any(|o| o == answer) {
            return Err(QuestionError::AnswerNotInOptions {
                answer: answer.to_owned(),
            });
        }

        Ok(ValidatedQuestion {
            category: self.category,
            difficulty: self.difficulty,
            text: text.to_owned(),
            options,
            correct_answer: answer.to_owned(),
            source: self.source,
        })
    }
}

/// A question that passed validation but has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub category: Category,
    pub difficulty: Difficulty,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub source: Option<QuestionSource>,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            category: self.category,
            difficulty: self.difficulty,
            text: self.text,
            options: self.options,
            correct_answer: self.correct_answer,
            source: self.source,
        }
    }
}

/// An authored question. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    category: Category,
    difficulty: Difficulty,
    text: String,
    options: Vec<String>,
    correct_answer: String,
    source: Option<QuestionSource>,
}

impl Question {
    /// Rehydrate a question from persisted storage, re-running validation.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the stored record is no longer a valid question.
    pub fn from_persisted(
        id: QuestionId,
        category: Category,
        difficulty: Difficulty,
        text: String,
        options: Vec<String>,
        correct_answer: String,
        source: Option<QuestionSource>,
    ) -> Result<Self, QuestionError> {
        let validated = QuestionDraft {
            category,
            difficulty,
            question_text: text,
            options,
            correct_answer,
            source,
        }
        .validate()?;
        Ok(validated.assign_id(id))
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn source(&self) -> Option<QuestionSource> {
        self.source
    }

    /// Whether `answer` matches the stored correct answer.
    ///
    /// Surrounding whitespace is ignored; comparison is otherwise exact.
    #[must_use]
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer == answer.trim()
    }
}

/// Lightweight reference returned by bucket sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionRef {
    pub id: QuestionId,
    pub category: Category,
    pub difficulty: Difficulty,
}

impl From<&Question> for QuestionRef {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id(),
            category: q.category(),
            difficulty: q.difficulty(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
