//! Intent classification and light action extraction

pub mod classifier;
pub mod extractor;

pub use classifier::{Classification, Intent, IntentClassifier, is_self_referential, parse_category};
pub use extractor::{ActionExtractor, ExtractError, Extraction, ParsedAction, extract};
