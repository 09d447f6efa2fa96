//! Context gathered around an utterance
//!
//! Combines:
//! - Conversation history (recent lines)
//! - User profile and presence
//! - Weather and web search results
//!
//! Every source is best effort. A failing source degrades to a placeholder
//! string and never fails the request.

pub mod history;
pub mod presence;
pub mod profile;
pub mod search;
pub mod weather;

use async_trait::async_trait;

pub use history::ConversationHistory;
pub use presence::PresenceProbe;
pub use profile::UserProfile;
pub use search::{SearchProvider, SearchResult, SearchSource, WebSearchTool, format_results};
pub use weather::WeatherSource;

use crate::Result;

/// Placeholder used when a source cannot answer
pub const UNAVAILABLE: &str = "Unavailable";

/// A single-call source of context text
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fetch the current value
    ///
    /// # Errors
    ///
    /// Returns error if the source is unreachable or answers garbage
    async fn query(&self) -> Result<String>;
}

/// Query a source, substituting `placeholder` on failure
pub async fn query_or(source: &dyn ContextSource, placeholder: &str) -> String {
    match source.query().await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(source = source.name(), error = %e, "context source failed");
            placeholder.to_string()
        }
    }
}
