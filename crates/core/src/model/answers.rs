use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A test-taker's selection for one question, as held by input state.
///
/// Input handlers normally record `Index`, but answer state may also be restored
/// from looser sources (serialized drafts, form values), so numeric and textual
/// selections are kept as-is and coerced only when a submission is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    /// Explicit "unanswered" marker.
    Unanswered,
    Index(usize),
    Number(f64),
    Text(String),
}

impl Selection {
    /// Coerce to an option index.
    ///
    /// Floats truncate toward zero; text parses its leading integer. Negative,
    /// non-finite and non-numeric selections yield `None`.
    #[must_use]
    pub fn coerce(&self) -> Option<usize> {
        match self {
            Selection::Unanswered => None,
            Selection::Index(index) => Some(*index),
            Selection::Number(value) => {
                if !value.is_finite() {
                    return None;
                }
                let truncated = value.trunc();
                if truncated < 0.0 || truncated > usize::MAX as f64 {
                    return None;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                Some(truncated as usize)
            }
            Selection::Text(text) => leading_integer(text)
                .and_then(|value| usize::try_from(value).ok()),
        }
    }

    #[must_use]
    pub fn is_unanswered(&self) -> bool {
        matches!(self, Selection::Unanswered)
    }
}

impl From<usize> for Selection {
    fn from(index: usize) -> Self {
        Selection::Index(index)
    }
}

impl From<Option<usize>> for Selection {
    fn from(index: Option<usize>) -> Self {
        index.map_or(Selection::Unanswered, Selection::Index)
    }
}

impl From<f64> for Selection {
    fn from(value: f64) -> Self {
        Selection::Number(value)
    }
}

impl From<&str> for Selection {
    fn from(text: &str) -> Self {
        Selection::Text(text.to_string())
    }
}

/// Parse an optionally signed run of leading digits, ignoring surrounding whitespace
/// and any trailing characters ("2", " 3 ", "1abc").
pub(crate) fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Answers keyed by zero-based question index.
///
/// A question is unanswered when its key is absent or holds
/// [`Selection::Unanswered`]. Iteration is in ascending question order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap {
    entries: BTreeMap<usize, Selection>,
}

impl AnswerMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) the selection for a question.
    pub fn select(&mut self, question_index: usize, selection: impl Into<Selection>) {
        self.entries.insert(question_index, selection.into());
    }

    /// Mark a question as explicitly unanswered.
    pub fn clear(&mut self, question_index: usize) {
        self.entries.insert(question_index, Selection::Unanswered);
    }

    #[must_use]
    pub fn get(&self, question_index: usize) -> Option<&Selection> {
        self.entries.get(&question_index)
    }

    /// Coerced option index for a question, if answered.
    #[must_use]
    pub fn selected_option(&self, question_index: usize) -> Option<usize> {
        self.get(question_index).and_then(Selection::coerce)
    }

    /// Number of keys, including explicit unanswered markers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of questions with a selection that coerces to an option index.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.entries
            .values()
            .filter(|selection| selection.coerce().is_some())
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Selection)> {
        self.entries.iter().map(|(index, selection)| (*index, selection))
    }
}

impl FromIterator<(usize, Selection)> for AnswerMap {
    fn from_iter<I: IntoIterator<Item = (usize, Selection)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
