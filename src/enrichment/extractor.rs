use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use serde_json::Value;

use crate::database::models::{PhraseKind, SubtitleRecord};
use crate::database::repository::Repository;
use crate::errors::OracleError;

use super::oracle::PhraseOracle;

/// Number of subtitle lines sent to the oracle per request
pub const CHUNK_SIZE: usize = 10;

/// Attempts per chunk before degrading to fallback stubs
pub const MAX_ATTEMPTS: u32 = 3;

/// Base backoff between attempts in milliseconds
const RETRY_BACKOFF_MS: u64 = 500;

/// A detected expression with its translation
#[derive(Debug, Clone, PartialEq)]
pub struct PhrasePair {
    /// The expression as it appears in the line
    pub phrase: String,
    /// Its translation
    pub translate: String,
}

/// One subtitle line's enrichment result
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedLine {
    /// Original line text, the join key back to the subtitle row
    pub text: String,
    /// Human translation echoed back by the oracle
    pub translate: Option<String>,
    /// Alternative machine translation
    pub ai_translate: Option<String>,
    /// Explanatory comment for idiomatic or cultural content
    pub ai_translate_comment: Option<String>,
    /// Detected phrasal verbs
    pub phrasal_verbs: Vec<PhrasePair>,
    /// Detected idioms
    pub idioms: Vec<PhrasePair>,
}

impl EnrichedLine {
    /// The degraded, enrichment-free record for a line
    pub fn fallback_stub(text: &str) -> Self {
        Self {
            text: text.to_string(),
            translate: None,
            ai_translate: None,
            ai_translate_comment: None,
            phrasal_verbs: Vec::new(),
            idioms: Vec::new(),
        }
    }
}

/// Outcome of validating one oracle response element
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Element passed field-by-field validation
    Valid(EnrichedLine),
    /// Element failed validation and was replaced by its stub
    Fallback(EnrichedLine),
}

impl LineOutcome {
    /// The enriched line regardless of outcome
    pub fn line(&self) -> &EnrichedLine {
        match self {
            LineOutcome::Valid(line) | LineOutcome::Fallback(line) => line,
        }
    }
}

/// Batches subtitle lines, queries the oracle and persists the results.
///
/// Oracle failures never escalate: after the retry budget is spent the
/// affected chunk degrades to fallback stubs and ingestion carries on.
pub struct PhraseExtractor {
    oracle: Arc<dyn PhraseOracle>,
    repository: Repository,
    concurrency: usize,
}

impl PhraseExtractor {
    /// Create an extractor over the given oracle and repository
    pub fn new(oracle: Arc<dyn PhraseOracle>, repository: Repository) -> Self {
        Self {
            oracle,
            repository,
            concurrency: 4,
        }
    }

    /// Enrich every entry: update AI fields and persist detected phrases.
    ///
    /// Entries are partitioned into fixed-size chunks which are processed
    /// concurrently. Chunks are disjoint over entries, so no two writes
    /// ever target the same subtitle row.
    pub async fn enrich(&self, entries: &[SubtitleRecord]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        info!(
            "Enriching {} subtitle lines in {} chunks",
            entries.len(),
            entries.len().div_ceil(CHUNK_SIZE)
        );

        let results: Vec<Result<()>> = stream::iter(
            entries
                .chunks(CHUNK_SIZE)
                .map(|chunk| self.enrich_chunk(chunk)),
        )
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        for result in results {
            result?;
        }
        Ok(())
    }

    /// Resolve one chunk against the oracle and persist its outcomes
    async fn enrich_chunk(&self, chunk: &[SubtitleRecord]) -> Result<()> {
        let outcomes = self.resolve_chunk(chunk).await;

        for outcome in &outcomes {
            let line = outcome.line();
            let Some(entry) = chunk.iter().find(|e| e.text.trim() == line.text.trim()) else {
                warn!(
                    "Oracle returned a line not present in the chunk, skipping: {:?}",
                    line.text
                );
                continue;
            };

            let LineOutcome::Valid(line) = outcome else {
                // A stub carries nothing to persist
                continue;
            };

            self.repository
                .update_ai_fields(
                    entry.id,
                    line.ai_translate.clone(),
                    line.ai_translate_comment.clone(),
                )
                .await?;

            for (pairs, kind) in [
                (&line.phrasal_verbs, PhraseKind::PhrasalVerb),
                (&line.idioms, PhraseKind::Idiom),
            ] {
                for pair in pairs.iter() {
                    let phrase_id = self
                        .repository
                        .find_or_create_phrase(pair.phrase.clone(), pair.translate.clone(), kind)
                        .await?;
                    self.repository.link_phrase(entry.id, phrase_id).await?;
                }
            }
        }

        Ok(())
    }

    /// Query the oracle for one chunk, retrying a bounded number of times.
    ///
    /// Returns one outcome per well-keyed response element; after the retry
    /// budget is exhausted, returns a fallback stub per input line.
    async fn resolve_chunk(&self, chunk: &[SubtitleRecord]) -> Vec<LineOutcome> {
        let prompt = build_prompt(chunk);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.oracle.complete(&prompt).await {
                Ok(completion) => match parse_completion(&completion) {
                    Ok(elements) => {
                        return elements.iter().filter_map(validate_element).collect();
                    }
                    Err(e) => {
                        error!(
                            "Oracle response unusable (attempt {}/{}): {}",
                            attempt, MAX_ATTEMPTS, e
                        );
                        debug!("Unusable completion was: {}", completion);
                    }
                },
                Err(e) => {
                    error!("Oracle request failed (attempt {}/{}): {}", attempt, MAX_ATTEMPTS, e);
                    debug!("Failed prompt was: {}", prompt);
                }
            }

            if attempt < MAX_ATTEMPTS {
                let backoff = RETRY_BACKOFF_MS * (1u64 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        warn!(
            "Oracle failed {} times, degrading chunk of {} lines to fallback stubs",
            MAX_ATTEMPTS,
            chunk.len()
        );
        chunk
            .iter()
            .map(|e| LineOutcome::Fallback(EnrichedLine::fallback_stub(&e.text)))
            .collect()
    }
}

/// Build the structured prompt for one chunk of subtitle lines
pub fn build_prompt(chunk: &[SubtitleRecord]) -> String {
    let lines: Vec<Value> = chunk
        .iter()
        .map(|entry| {
            serde_json::json!({
                "text": entry.text,
                "translate": entry.translate,
            })
        })
        .collect();
    let payload = serde_json::to_string(&Value::Array(lines)).unwrap_or_else(|_| "[]".to_string());

    format!(
        "You are analyzing film subtitles for language learners. \
         For every element of the input array, return a JSON object with: \
         \"text\" (the input line unchanged), \
         \"translate\" (the given translation, or your own if null), \
         \"ai_translate\" (an alternative translation), \
         \"ai_translate_comment\" (a short note on idiomatic or cultural content, or null), \
         \"phrasal_verbs\" and \"idioms\" (arrays of {{\"phrase\", \"translate\"}} pairs detected in the line, \
         empty arrays when none). \
         Respond with exactly one JSON array and nothing else.\n\nInput: {}",
        payload
    )
}

/// Extract the substring between the first `[` and the last `]`
pub fn extract_json_array(text: &str) -> Result<&str, OracleError> {
    let start = text
        .find('[')
        .ok_or_else(|| OracleError::MalformedResponse("no '[' in completion".to_string()))?;
    let end = text
        .rfind(']')
        .ok_or_else(|| OracleError::MalformedResponse("no ']' in completion".to_string()))?;
    if end < start {
        return Err(OracleError::MalformedResponse(
            "']' precedes '[' in completion".to_string(),
        ));
    }
    Ok(&text[start..=end])
}

/// Parse the completion into a non-empty array of JSON elements
fn parse_completion(completion: &str) -> Result<Vec<Value>, OracleError> {
    let array_text = extract_json_array(completion)?;
    let value: Value = serde_json::from_str(array_text)
        .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

    let Value::Array(elements) = value else {
        return Err(OracleError::MalformedResponse("not a JSON array".to_string()));
    };
    if elements.is_empty() {
        return Err(OracleError::MalformedResponse("empty array".to_string()));
    }
    Ok(elements)
}

/// Validate one response element field by field.
///
/// An element with a usable `text` but any other shape violation becomes a
/// fallback stub keyed by that text. An element with no usable `text` at
/// all cannot be matched back to a subtitle line and is dropped.
pub fn validate_element(value: &Value) -> Option<LineOutcome> {
    let text = match value.get("text").and_then(|v| v.as_str()) {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => {
            warn!("Oracle element has no usable 'text' field, dropping: {}", value);
            return None;
        }
    };

    let translate = match optional_string(value, "translate") {
        Ok(v) => v,
        Err(()) => return Some(LineOutcome::Fallback(EnrichedLine::fallback_stub(&text))),
    };
    let ai_translate = match optional_string(value, "ai_translate") {
        Ok(v) => v,
        Err(()) => return Some(LineOutcome::Fallback(EnrichedLine::fallback_stub(&text))),
    };
    let ai_translate_comment = match optional_string(value, "ai_translate_comment") {
        Ok(v) => v,
        Err(()) => return Some(LineOutcome::Fallback(EnrichedLine::fallback_stub(&text))),
    };

    let phrasal_verbs = match phrase_pairs(value, "phrasal_verbs") {
        Ok(v) => v,
        Err(()) => return Some(LineOutcome::Fallback(EnrichedLine::fallback_stub(&text))),
    };
    let idioms = match phrase_pairs(value, "idioms") {
        Ok(v) => v,
        Err(()) => return Some(LineOutcome::Fallback(EnrichedLine::fallback_stub(&text))),
    };

    Some(LineOutcome::Valid(EnrichedLine {
        text,
        translate,
        ai_translate,
        ai_translate_comment,
        phrasal_verbs,
        idioms,
    }))
}

/// A field that must be absent, null, or a string
fn optional_string(value: &Value, field: &str) -> Result<Option<String>, ()> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(()),
    }
}

/// A field that must be an array of `{phrase, translate}` string pairs
fn phrase_pairs(value: &Value, field: &str) -> Result<Vec<PhrasePair>, ()> {
    let Some(Value::Array(items)) = value.get(field) else {
        return Err(());
    };

    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        let phrase = item.get("phrase").and_then(|v| v.as_str()).ok_or(())?;
        let translate = item.get("translate").and_then(|v| v.as_str()).ok_or(())?;
        pairs.push(PhrasePair {
            phrase: phrase.to_string(),
            translate: translate.to_string(),
        });
    }
    Ok(pairs)
}
