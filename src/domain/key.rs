//! Answer keys and their consistency checks.
//!
//! An [`AnswerKey`] maps question indices to the set of option indices
//! accepted as correct. Keys are produced by an external spreadsheet parser;
//! the core only defines the structured type and validates it against the
//! questions actually resolved for a sheet. A key entry that references a
//! question the sheet does not have is reported explicitly — never silently
//! dropped.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Mapping from question index to the set of correct option indices.
///
/// Normally one option per question, but keys declaring several correct
/// options are tolerated: any one of them earns the point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey {
    entries: BTreeMap<u32, BTreeSet<u8>>,
}

impl AnswerKey {
    /// Creates an empty key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or extends) the correct-option set for a question.
    pub fn insert(&mut self, question: u32, option: u8) {
        self.entries.entry(question).or_default().insert(option);
    }

    /// Returns the correct-option set for a question, if the key has one.
    pub fn correct_options(&self, question: u32) -> Option<&BTreeSet<u8>> {
        self.entries.get(&question)
    }

    /// Number of keyed questions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the key has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(question index, correct-option set)` in ascending
    /// question order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &BTreeSet<u8>)> {
        self.entries.iter().map(|(q, set)| (*q, set))
    }

    /// Checks the key against the resolved questions of a run.
    ///
    /// `questions` supplies `(question index, option count)` pairs. Every key
    /// entry whose question index is unknown, and every correct option that
    /// exceeds its question's option count, yields a [`KeyMismatch`].
    /// Mismatched questions must be excluded from scoring by the caller.
    pub fn mismatches(
        &self,
        questions: impl IntoIterator<Item = (u32, usize)>,
    ) -> Vec<KeyMismatch> {
        let counts: BTreeMap<u32, usize> = questions.into_iter().collect();
        let mut mismatches = Vec::new();
        for (&question, options) in &self.entries {
            match counts.get(&question) {
                None => mismatches.push(KeyMismatch::UnknownQuestion { question }),
                Some(&count) => {
                    for &option in options {
                        if option as usize >= count {
                            mismatches.push(KeyMismatch::OptionOutOfRange {
                                question,
                                option,
                                option_count: count,
                            });
                        }
                    }
                }
            }
        }
        mismatches
    }
}

impl FromIterator<(u32, u8)> for AnswerKey {
    fn from_iter<T: IntoIterator<Item = (u32, u8)>>(iter: T) -> Self {
        let mut key = Self::new();
        for (question, option) in iter {
            key.insert(question, option);
        }
        key
    }
}

/// A structured, non-fatal inconsistency between an answer key and the
/// resolved questions of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyMismatch {
    /// The key references a question index no resolved question carries.
    UnknownQuestion {
        /// The offending question index.
        question: u32,
    },
    /// The key declares a correct option beyond the question's option count.
    OptionOutOfRange {
        /// The question index.
        question: u32,
        /// The out-of-range option index.
        option: u8,
        /// The number of options the question actually has.
        option_count: usize,
    },
}

impl KeyMismatch {
    /// The question index this mismatch concerns.
    pub fn question(&self) -> u32 {
        match self {
            Self::UnknownQuestion { question } => *question,
            Self::OptionOutOfRange { question, .. } => *question,
        }
    }
}

impl std::fmt::Display for KeyMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownQuestion { question } => {
                write!(f, "key references unresolved question {}", question)
            }
            Self::OptionOutOfRange {
                question,
                option,
                option_count,
            } => write!(
                f,
                "key declares option {} for question {} which has only {} option(s)",
                option, question, option_count
            ),
        }
    }
}
