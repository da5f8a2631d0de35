//! Per-operation advisory warnings

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TetherError};

/// Ordered, append-only collection of human-readable warnings.
///
/// Merged from every API call participating in one operation. Order and
/// repetition are preserved; nothing is ever deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Warnings(Vec<String>);

impl Warnings {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, warning: impl Into<String>) {
        self.0.push(warning.into());
    }

    /// Append every warning from `other`, keeping its order.
    pub fn merge(&mut self, other: &Self) {
        self.0.extend(other.0.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<S: Into<String>> FromIterator<S> for Warnings {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for Warnings {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

impl IntoIterator for Warnings {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Warnings {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("\n"))
    }
}

/// Result of one logical operation together with every warning it produced.
///
/// Warnings are kept even when `result` is an error: they often explain the
/// precondition that made the operation fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub result: Result<T>,
    pub warnings: Warnings,
}

impl<T> Outcome<T> {
    pub fn success(value: T, warnings: Warnings) -> Self {
        Self { result: Ok(value), warnings }
    }

    pub fn failure(error: TetherError, warnings: Warnings) -> Self {
        Self { result: Err(error), warnings }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Split into the plain result and the warnings.
    pub fn into_parts(self) -> (Result<T>, Warnings) {
        (self.result, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_preserves_order_and_duplicates() {
        let mut warnings: Warnings = ["w1", "w2"].into_iter().collect();
        let second: Warnings = ["w2", "w3"].into_iter().collect();
        warnings.merge(&second);
        warnings.push("w1");

        assert_eq!(warnings.as_slice(), ["w1", "w2", "w2", "w3", "w1"]);
    }

    #[test]
    fn outcome_keeps_warnings_on_failure() {
        let warnings: Warnings = ["plan is deprecated"].into_iter().collect();
        let outcome: Outcome<()> = Outcome::failure(TetherError::Cancelled, warnings.clone());

        assert!(!outcome.is_success());
        let (result, kept) = outcome.into_parts();
        assert_eq!(result, Err(TetherError::Cancelled));
        assert_eq!(kept, warnings);
    }

    #[test]
    fn serializes_as_plain_list() {
        let warnings: Warnings = ["a", "b"].into_iter().collect();
        assert_eq!(serde_json::to_string(&warnings).unwrap(), r#"["a","b"]"#);
    }
}
