//! Utterance classification
//!
//! Classification is fail-safe: anything other than one clear category from
//! the model lands in [`Intent::Conversational`], which never touches a device.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::{Completion, CompletionOptions};

static SELF_REFERENTIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(who\s+are\s+you|what'?s\s+your\s+name|what\s+is\s+your\s+name|tell\s+me\s+about\s+yourself)\b")
        .expect("valid regex")
});

/// What the user wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// Change the state of one or more lights
    LightCommand,
    /// Factual question answered from web search
    GeneralQuestion,
    /// Greetings, feelings, small talk
    Conversational,
}

impl Intent {
    const ALL: [Self; 3] = [Self::LightCommand, Self::GeneralQuestion, Self::Conversational];

    /// Category token the model answers with
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::LightCommand => "LIGHT_COMMAND",
            Self::GeneralQuestion => "GENERAL_QUESTION",
            Self::Conversational => "CONVERSATIONAL",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Classification result with the model's raw answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub raw: String,
}

impl Classification {
    fn fallback(raw: impl Into<String>) -> Self {
        Self {
            intent: Intent::Conversational,
            raw: raw.into(),
        }
    }
}

/// Map a model answer to a category
///
/// Exactly one distinct category token must appear; anything else is `None`.
#[must_use]
pub fn parse_category(raw: &str) -> Option<Intent> {
    let upper = raw.to_uppercase();
    let mut found = Intent::ALL.into_iter().filter(|i| upper.contains(i.token()));

    match (found.next(), found.next()) {
        (Some(intent), None) => Some(intent),
        _ => None,
    }
}

/// Questions about the assistant itself, always conversational
#[must_use]
pub fn is_self_referential(utterance: &str) -> bool {
    SELF_REFERENTIAL.is_match(utterance)
}

/// Routes utterances to a category using the completion model
#[derive(Clone)]
pub struct IntentClassifier {
    llm: Arc<dyn Completion>,
    history_turns: usize,
}

impl fmt::Debug for IntentClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentClassifier")
            .field("history_turns", &self.history_turns)
            .finish_non_exhaustive()
    }
}

impl IntentClassifier {
    #[must_use]
    pub fn new(llm: Arc<dyn Completion>, history_turns: usize) -> Self {
        Self { llm, history_turns }
    }

    /// Classify `utterance` given recent conversation lines
    ///
    /// Never fails: model errors and unclear answers classify as
    /// [`Intent::Conversational`].
    pub async fn classify(&self, utterance: &str, history: &[String]) -> Classification {
        if is_self_referential(utterance) {
            tracing::debug!("self-referential question, skipping classifier");
            return Classification::fallback("");
        }

        let recent = &history[history.len().saturating_sub(self.history_turns)..];
        let prompt = classification_prompt(utterance, recent);

        let raw = match self
            .llm
            .complete(&prompt, &CompletionOptions::deterministic())
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "classifier unavailable, treating as conversational");
                return Classification::fallback("");
            }
        };

        match parse_category(&raw) {
            Some(intent) => {
                tracing::info!(%intent, "classified utterance");
                Classification { intent, raw }
            }
            None => {
                tracing::warn!(raw = %raw, "unclear classification, treating as conversational");
                Classification::fallback(raw)
            }
        }
    }
}

fn classification_prompt(utterance: &str, history: &[String]) -> String {
    format!(
        "Recent Conversation:\n{history}\n\n\
         Analyze the new input: '{utterance}'\n\
         Categories: [LIGHT_COMMAND, GENERAL_QUESTION, CONVERSATIONAL]\n\
         Rules:\n\
         - LIGHT_COMMAND: Use ONLY if the user gives a direct order or expresses a current need for change \
         (e.g. 'turn on', 'make it brighter', 'too dark'). If the user is describing a state or using a \
         metaphor (e.g. 'the lights are dim', 'my eyes are tired'), do NOT use this.\n\
         - GENERAL_QUESTION: Factual or world data.\n\
         - CONVERSATIONAL: Greetings, statements about feelings, or casual chat.\n\
         Note: If the user asks for your name or who you are, it is ALWAYS CONVERSATIONAL.\n\
         Respond with only the category name.",
        history = history.join("\n"),
    )
}
