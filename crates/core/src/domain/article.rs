use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static ARTICLE_ID_SCAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}[a-zA-Z]{3}\d{2}-\d{1,3}\b").expect("valid article id scan pattern")
});

static ARTICLE_ID_EXACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}[a-zA-Z]{3}\d{2}-\d{1,3}$").expect("valid article id pattern")
});

/// Date-coded catalog identifier, e.g. `21may25-1`.
///
/// The lexical shape is `<day><mon><yy>-<serial>`; ids are assigned by the
/// inventory pipeline and immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("malformed article id `{0}` (expected shape like 21may25-1)")]
pub struct ArticleIdError(String);

impl ArticleId {
    pub fn parse(raw: &str) -> Result<Self, ArticleIdError> {
        let trimmed = raw.trim();
        if ARTICLE_ID_EXACT_RE.is_match(trimmed) {
            Ok(Self(trimmed.to_owned()))
        } else {
            Err(ArticleIdError(raw.to_owned()))
        }
    }

    /// First article id appearing anywhere in free text, if any.
    pub fn extract(text: &str) -> Option<Self> {
        ARTICLE_ID_SCAN_RE.find(text).map(|found| Self(found.as_str().to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::ArticleId;

    #[test]
    fn parse_accepts_date_coded_ids() {
        for raw in ["21may25-1", "1jan26-999", "05OCT25-42"] {
            assert!(ArticleId::parse(raw).is_ok(), "expected `{raw}` to parse");
        }
    }

    #[test]
    fn parse_rejects_off_shape_ids() {
        for raw in ["", "21may25", "may25-1", "213may25-1", "21may2025-1", "21may25-1234", "21may25-1 extra"] {
            assert!(ArticleId::parse(raw).is_err(), "expected `{raw}` to be rejected");
        }
    }

    #[test]
    fn extract_finds_id_embedded_in_free_text() {
        let found = ArticleId::extract("is 21may25-1 still in stock?").expect("id present");
        assert_eq!(found.as_str(), "21may25-1");
    }

    #[test]
    fn extract_returns_first_of_multiple_ids() {
        let found = ArticleId::extract("compare 21may25-1 with 22may25-3").expect("id present");
        assert_eq!(found.as_str(), "21may25-1");
    }

    #[test]
    fn extract_ignores_text_without_ids() {
        assert!(ArticleId::extract("do you have blue shirts?").is_none());
    }
}
