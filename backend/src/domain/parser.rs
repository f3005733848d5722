//! Text-parsing collaborator seam.
//!
//! The real parser is an external AI service that maps free text like
//! "coffee 4.5 this morning" to a structured transaction. This module only
//! fixes the interface and ships the local fallback used when that service
//! is unavailable.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use regex::Regex;
use shared::ParsedTransaction;
use tracing::debug;

/// Maps free natural-language text to the fields of a transaction.
#[async_trait]
pub trait TextParser: Send + Sync {
    async fn parse(&self, text: &str) -> Result<ParsedTransaction>;
}

/// Local fallback: pull the first number out of the text and file the rest
/// as an "Other" expense dated now.
pub struct FallbackParser {
    amount: Regex,
}

impl FallbackParser {
    pub fn new() -> Self {
        Self {
            amount: Regex::new(r"\d+(\.\d+)?").expect("static pattern compiles"),
        }
    }
}

impl Default for FallbackParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextParser for FallbackParser {
    async fn parse(&self, text: &str) -> Result<ParsedTransaction> {
        let amount = self
            .amount
            .find(text)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0);
        debug!("fallback parse of {:?} extracted amount {}", text, amount);

        Ok(ParsedTransaction {
            amount,
            category: "Other".to_string(),
            description: text.trim().to_string(),
            date: Local::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extracts_first_amount() {
        let parser = FallbackParser::new();

        let parsed = parser.parse("coffee 4.5 and a 12 dollar cab").await.unwrap();
        assert_eq!(parsed.amount, 4.5);
        assert_eq!(parsed.category, "Other");
        assert_eq!(parsed.description, "coffee 4.5 and a 12 dollar cab");
    }

    #[tokio::test]
    async fn test_integer_amount() {
        let parser = FallbackParser::new();
        assert_eq!(parser.parse("lunch 25").await.unwrap().amount, 25.0);
    }

    #[tokio::test]
    async fn test_no_amount_defaults_to_zero() {
        let parser = FallbackParser::new();

        let parsed = parser.parse("forgot how much that was").await.unwrap();
        assert_eq!(parsed.amount, 0.0);
        assert!(chrono::DateTime::parse_from_rfc3339(&parsed.date).is_ok());
    }

    #[tokio::test]
    async fn test_description_is_trimmed() {
        let parser = FallbackParser::new();
        let parsed = parser.parse("  9.99 headphones  ").await.unwrap();
        assert_eq!(parsed.description, "9.99 headphones");
    }
}
