/*!
 * Mock oracle implementations for testing.
 *
 * This module provides mock oracles that simulate different behaviors:
 * - `MockOracle::working()` - Always answers with a well-formed array
 * - `MockOracle::malformed()` - Answers with text containing no JSON array
 * - `MockOracle::failing()` - Always fails with a transport error
 */

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::OracleError;

use super::oracle::PhraseOracle;

/// Behavior mode for the mock oracle
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Echo every prompt line back as a well-formed enriched element
    Working,
    /// Return a fixed canned completion
    Canned(String),
    /// Return prose with no JSON array in it
    Malformed,
    /// Return a completion whose array is empty
    EmptyArray,
    /// Always fail with a transport error
    Failing,
    /// Fail the first N requests, then behave like `Working`
    FailFirst(usize),
}

/// Mock oracle for testing enrichment behavior
#[derive(Debug)]
pub struct MockOracle {
    /// Behavior mode
    behavior: MockBehavior,
    /// Number of requests received so far
    request_count: Arc<AtomicUsize>,
}

impl MockOracle {
    /// Create a new mock oracle with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a working mock oracle that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that returns a fixed completion
    pub fn canned(completion: impl Into<String>) -> Self {
        Self::new(MockBehavior::Canned(completion.into()))
    }

    /// Create a mock that returns prose without a JSON array
    pub fn malformed() -> Self {
        Self::new(MockBehavior::Malformed)
    }

    /// Create a mock that returns an empty array
    pub fn empty_array() -> Self {
        Self::new(MockBehavior::EmptyArray)
    }

    /// Create a failing mock oracle that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that fails the first `n` requests
    pub fn fail_first(n: usize) -> Self {
        Self::new(MockBehavior::FailFirst(n))
    }

    /// Number of requests this mock has received
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Build a well-formed completion echoing the prompt's input lines
    fn echo_completion(prompt: &str) -> String {
        let elements: Vec<Value> = prompt_texts(prompt)
            .into_iter()
            .map(|text| {
                serde_json::json!({
                    "text": text,
                    "translate": null,
                    "ai_translate": format!("ai:{}", text),
                    "ai_translate_comment": null,
                    "phrasal_verbs": [],
                    "idioms": []
                })
            })
            .collect();
        serde_json::to_string(&Value::Array(elements)).unwrap()
    }
}

/// Recover the input `text` values embedded in a prompt
fn prompt_texts(prompt: &str) -> Vec<String> {
    let Some(start) = prompt.rfind('[') else {
        return Vec::new();
    };
    let Some(end) = prompt.rfind(']') else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }

    serde_json::from_str::<Vec<Value>>(&prompt[start..=end])
        .map(|elements| {
            elements
                .iter()
                .filter_map(|e| e.get("text").and_then(|t| t.as_str()).map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl PhraseOracle for MockOracle {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Working => Ok(Self::echo_completion(prompt)),
            MockBehavior::Canned(completion) => Ok(completion.clone()),
            MockBehavior::Malformed => {
                Ok("I could not find any interesting expressions here.".to_string())
            }
            MockBehavior::EmptyArray => Ok("[]".to_string()),
            MockBehavior::Failing => Err(OracleError::RequestFailed(
                "simulated transport failure".to_string(),
            )),
            MockBehavior::FailFirst(n) => {
                if count < *n {
                    Err(OracleError::RequestFailed(format!(
                        "simulated transport failure {}",
                        count + 1
                    )))
                } else {
                    Ok(Self::echo_completion(prompt))
                }
            }
        }
    }
}
