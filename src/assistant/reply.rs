//! Final reply synthesis
//!
//! Builds the persona prompt for each branch and turns the model's answer into
//! a single clean sentence. Empty or failed completions fall back to canned
//! replies so every request ends with something to say.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::config::AssistantConfig;
use crate::context::UserProfile;
use crate::llm::{Completion, CompletionOptions};

static CHAT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\|.*?\|>").expect("valid regex"));

/// Reply when the extraction model answered with malformed JSON
pub const PARSE_ERROR_REPLY: &str = "Sorry, I couldn't process that light command.";

/// Reply when the extraction model could not be reached
pub const UNAVAILABLE_REPLY: &str = "Sorry, I couldn't reach the light controller.";

/// Reply when there was nothing to hear
pub const EMPTY_INPUT_REPLY: &str = "I didn't catch that.";

const LIGHT_FALLBACK: &str = "Lights updated.";
const LIGHT_FAILURE_FALLBACK: &str = "Some lights didn't respond.";
const CHAT_FALLBACK: &str = "I'm on it.";
const ERROR_FALLBACK: &str = "Handled.";

/// Which branch a reply is for, selecting prompt and fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind<'a> {
    /// Confirmation of a dispatched light command
    Light { status: &'a str, success: bool },
    /// Summary of search results for a question
    Search { results: &'a str, question: &'a str },
    /// Free conversation
    Chat { utterance: &'a str, weather: Option<&'a str> },
}

impl ReplyKind<'_> {
    const fn empty_fallback(&self) -> &'static str {
        match self {
            Self::Light { success: true, .. } => LIGHT_FALLBACK,
            Self::Light { success: false, .. } => LIGHT_FAILURE_FALLBACK,
            Self::Search { .. } | Self::Chat { .. } => CHAT_FALLBACK,
        }
    }
}

/// Persona and user context shared by every reply prompt
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub style: String,
    pub nickname: String,
    /// Profile summary including presence
    pub user_context: String,
}

impl Persona {
    #[must_use]
    pub fn new(config: &AssistantConfig, profile: &UserProfile, user_context: String) -> Self {
        Self {
            name: config.name.clone(),
            style: profile.preferences().unwrap_or(&config.style).to_string(),
            nickname: profile.nickname().to_string(),
            user_context,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Role: You are {}, a smart home assistant. User Context: {}. Persona Style: {}. \
             Instruction: Address the user as {}.",
            self.name, self.user_context, self.style, self.nickname
        )
    }
}

/// Build the reply prompt for a branch
#[must_use]
pub fn reply_prompt(persona: &Persona, kind: &ReplyKind<'_>) -> String {
    match kind {
        ReplyKind::Light { status, success: true } => format!(
            "{persona}\nContext: {status}\n\
             Task: Give a very short confirmation of the light action. Max 5 words. \
             Use your specific persona/style."
        ),
        ReplyKind::Light { status, success: false } => format!(
            "{persona}\nContext: {status}\n\
             Task: Briefly tell the user what did not work. One short sentence. \
             Use your specific persona/style."
        ),
        ReplyKind::Search { results, question } => format!(
            "{persona}\nSearch Data: Search Results: {results}\nUser Asked: {question}\n\
             Task: Answer naturally from the search data. Under 25 words."
        ),
        ReplyKind::Chat { utterance, weather } => {
            let weather = weather.map(|w| format!("Weather: {w}\n")).unwrap_or_default();
            format!(
                "{persona}\n{weather}User said: {utterance}\n\
                 Task: Reply briefly. One short sentence only. You are {}.",
                persona.name
            )
        }
    }
}

/// Prompt asking the model to turn a follow-up into a standalone search query
#[must_use]
pub fn rewrite_prompt(user_context: &str, history: &str, question: &str) -> String {
    format!(
        "User Profile Summary: {user_context}.\n\
         Conversation History:\n{history}\n\n\
         User's new question: {question}\n\
         Rewrite this question into a standalone search engine query that captures the full \
         context (who 'she', 'it', or 'they' refers to). Respond with only the search query."
    )
}

/// Strip chat-template tokens and quotes from a model reply
#[must_use]
pub fn clean_reply(raw: &str) -> String {
    CHAT_TOKEN.replace_all(raw, "").replace('"', "").trim().to_string()
}

/// Generates the final spoken/text reply
#[derive(Clone)]
pub struct ReplySynthesizer {
    llm: Arc<dyn Completion>,
}

impl fmt::Debug for ReplySynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplySynthesizer").finish_non_exhaustive()
    }
}

impl ReplySynthesizer {
    #[must_use]
    pub fn new(llm: Arc<dyn Completion>) -> Self {
        Self { llm }
    }

    fn options() -> CompletionOptions {
        CompletionOptions::deterministic()
            .with_temperature(0.8)
            .with_stop(["\n", "<|"])
            .with_max_tokens(50)
    }

    /// Produce a reply; never fails
    pub async fn synthesize(&self, persona: &Persona, kind: &ReplyKind<'_>) -> String {
        let prompt = reply_prompt(persona, kind);

        match self.llm.complete(&prompt, &Self::options()).await {
            Ok(raw) => {
                let reply = clean_reply(&raw);
                if reply.is_empty() {
                    tracing::debug!("empty reply, using fallback");
                    kind.empty_fallback().to_string()
                } else {
                    reply
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reply synthesis failed");
                match kind {
                    ReplyKind::Light { .. } => kind.empty_fallback().to_string(),
                    ReplyKind::Search { .. } | ReplyKind::Chat { .. } => ERROR_FALLBACK.to_string(),
                }
            }
        }
    }
}
