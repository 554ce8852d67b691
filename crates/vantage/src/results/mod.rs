//! Canonical result schemas, response parsing and local persistence.

pub mod parser;
pub mod schema;
pub mod store;

pub use parser::{parse_content, parse_emotion, ParseTier, Parsed};
pub use schema::{ContentResults, EmotionResults, ResultsDocument};
pub use store::{write_results, ResultsStoreError};
