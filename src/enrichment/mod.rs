/*!
 * Subtitle enrichment via an external text-analysis oracle.
 *
 * The oracle receives batches of subtitle lines and returns, per line, an
 * alternative translation, an optional explanatory comment, and the phrasal
 * verbs and idioms it detected. Enrichment is best-effort: it runs after
 * the catalog entry is committed and degrades to empty stubs when the
 * oracle cannot produce a valid answer.
 */

pub mod extractor;
pub mod mock;
pub mod oracle;

pub use extractor::{EnrichedLine, LineOutcome, PhraseExtractor, PhrasePair};
pub use oracle::{PhraseOracle, YandexGpt};
