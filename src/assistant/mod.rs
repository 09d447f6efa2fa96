//! The command interpretation pipeline
//!
//! ```text
//! utterance → classify ─┬─ LIGHT_COMMAND ──→ extract → resolve → dispatch ─┐
//!                       ├─ GENERAL_QUESTION → rewrite → search ─────────────┤→ reply
//!                       └─ CONVERSATIONAL ──────────────────────────────────┘
//! ```
//!
//! A `NO_ACTION` extraction reroutes to the conversational branch. Every
//! branch ends in a reply, whatever fails upstream.

pub mod reply;

use std::sync::Arc;

use serde::Serialize;

pub use reply::{Persona, ReplyKind, ReplySynthesizer, clean_reply};

use crate::config::{AssistantConfig, Config, DispatchConfig};
use crate::context::{
    self, ContextSource, ConversationHistory, PresenceProbe, SearchSource, UserProfile,
    WeatherSource, WebSearchTool,
};
use crate::devices::{DeviceRegistry, resolve};
use crate::dispatch::{ActionRequest, DispatchOutcome, Dispatcher};
use crate::intent::{ActionExtractor, ExtractError, Extraction, Intent, IntentClassifier};
use crate::llm::{Completion, CompletionOptions, OllamaClient};
use crate::transport::{CloudTransport, LanTransport, Transport, Transports};
use crate::Result;

/// Presence text when the probe cannot answer
const PRESENCE_UNKNOWN: &str = "Unknown";

/// Outcome of handling one utterance
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub reply_text: String,
    /// Whether any device was contacted
    pub action_taken: bool,
    /// Branch that produced the reply
    pub intent: Intent,
    /// The utterance as received
    pub transcription: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchOutcome>,
}

enum LightResult {
    Dispatched(DispatchOutcome),
    NoAction,
    Failed(&'static str),
}

/// Smart-home assistant pipeline
pub struct Assistant {
    classifier: IntentClassifier,
    extractor: ActionExtractor,
    synthesizer: ReplySynthesizer,
    llm: Arc<dyn Completion>,
    dispatcher: Dispatcher,
    registry: Arc<DeviceRegistry>,
    presence: Option<Arc<dyn ContextSource>>,
    weather: Option<Arc<dyn ContextSource>>,
    search: Option<Arc<dyn SearchSource>>,
    search_limit: usize,
    profile: UserProfile,
    history: ConversationHistory,
    config: AssistantConfig,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("devices", &self.registry.len())
            .field("name", &self.config.name)
            .finish_non_exhaustive()
    }
}

impl Assistant {
    /// Start building an assistant around a completion model, transports and registry
    #[must_use]
    pub fn builder(
        llm: Arc<dyn Completion>,
        transports: Transports,
        registry: Arc<DeviceRegistry>,
    ) -> AssistantBuilder {
        AssistantBuilder {
            llm,
            transports,
            registry,
            config: AssistantConfig::default(),
            dispatch: DispatchConfig::default(),
            presence: None,
            weather: None,
            search: None,
            search_limit: 3,
            profile: UserProfile::default(),
        }
    }

    /// Wire up the production pipeline from configuration
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be built or the search provider is misconfigured
    pub fn from_config(config: &Config) -> Result<Self> {
        let llm: Arc<dyn Completion> = Arc::new(OllamaClient::from_config(&config.llm)?);
        let transports = transports_from_config(config)?;
        let registry = Arc::new(config.registry());

        if registry.is_empty() {
            tracing::warn!("no devices registered; light commands will match nothing");
        }

        let mut builder = Self::builder(llm, transports, registry)
            .assistant_config(config.assistant.clone())
            .dispatch_config(config.dispatch.clone())
            .profile(UserProfile::load(config.assistant.profile_path.as_deref()))
            .presence(Arc::new(PresenceProbe::new(&config.presence)))
            .search(
                Arc::new(WebSearchTool::from_config(&config.search)?),
                config.search.max_results,
            );

        if config.weather.location.is_some() {
            builder = builder.weather(Arc::new(WeatherSource::new(&config.weather)?));
        }

        Ok(builder.build())
    }

    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub const fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Handle one utterance end to end
    pub async fn handle(&self, text: &str) -> Reply {
        let text = text.trim();
        if text.is_empty() {
            return Reply {
                reply_text: reply::EMPTY_INPUT_REPLY.to_string(),
                action_taken: false,
                intent: Intent::Conversational,
                transcription: String::new(),
                dispatch: None,
            };
        }

        tracing::info!(utterance = %text, "handling utterance");

        self.history.push_user(text);
        let recent = self.history.recent();

        // Presence may shell out, so it overlaps the classifier call
        let (persona, classification) =
            tokio::join!(self.persona(), self.classifier.classify(text, &recent));

        let reply = match classification.intent {
            Intent::LightCommand => match self.light_command(text).await {
                LightResult::Dispatched(outcome) => {
                    let status = outcome.summary();
                    tracing::info!(%status, "light command finished");
                    let kind = ReplyKind::Light {
                        status: &status,
                        success: outcome.overall_success(),
                    };
                    let reply_text = self.synthesizer.synthesize(&persona, &kind).await;
                    Reply {
                        reply_text,
                        action_taken: outcome.action_taken(),
                        intent: Intent::LightCommand,
                        transcription: text.to_string(),
                        dispatch: Some(outcome),
                    }
                }
                LightResult::NoAction => {
                    tracing::info!("no light change intended, replying conversationally");
                    self.chat(text, &persona).await
                }
                LightResult::Failed(message) => Reply {
                    reply_text: message.to_string(),
                    action_taken: false,
                    intent: Intent::LightCommand,
                    transcription: text.to_string(),
                    dispatch: None,
                },
            },
            Intent::GeneralQuestion => self.question(text, &persona).await,
            Intent::Conversational => self.chat(text, &persona).await,
        };

        self.history.push_assistant(&self.config.name, &reply.reply_text);
        reply
    }

    /// Persona with the profile summary and presence, computed once per request
    async fn persona(&self) -> Persona {
        let presence = match &self.presence {
            Some(probe) => context::query_or(probe.as_ref(), PRESENCE_UNKNOWN).await,
            None => PRESENCE_UNKNOWN.to_string(),
        };
        Persona::new(&self.config, &self.profile, self.profile.summary(&presence))
    }

    async fn light_command(&self, text: &str) -> LightResult {
        let names = self.registry.names();
        let action = match self.extractor.extract(text, &names).await {
            Ok(Extraction::Action(action)) => action,
            Ok(Extraction::NoAction) => return LightResult::NoAction,
            Err(ExtractError::Parse(e)) => {
                tracing::warn!(error = %e, "malformed light action");
                return LightResult::Failed(reply::PARSE_ERROR_REPLY);
            }
            Err(ExtractError::Unavailable(e)) => {
                tracing::warn!(error = %e, "light controller model unreachable");
                return LightResult::Failed(reply::UNAVAILABLE_REPLY);
            }
        };

        let targets = resolve(&action.target, &self.registry);
        tracing::info!(
            power = %action.power,
            target = %action.target,
            resolved = targets.len(),
            "light action extracted"
        );

        let request = ActionRequest::new(&action, targets);
        LightResult::Dispatched(self.dispatcher.dispatch(&request).await)
    }

    async fn question(&self, text: &str, persona: &Persona) -> Reply {
        let query = self.rewrite_query(text, persona).await;

        let results = match &self.search {
            Some(search) => match search.search(&query, self.search_limit).await {
                Ok(results) => context::format_results(&results),
                Err(e) => {
                    tracing::warn!(error = %e, "web search failed");
                    format!("Search Error: {e}")
                }
            },
            None => context::search::NO_RESULTS.to_string(),
        };

        let kind = ReplyKind::Search {
            results: &results,
            question: text,
        };
        Reply {
            reply_text: self.synthesizer.synthesize(persona, &kind).await,
            action_taken: false,
            intent: Intent::GeneralQuestion,
            transcription: text.to_string(),
            dispatch: None,
        }
    }

    /// Rewrite a follow-up question into a standalone query, or keep it as is
    async fn rewrite_query(&self, text: &str, persona: &Persona) -> String {
        let prompt = reply::rewrite_prompt(&persona.user_context, &self.history.render(), text);

        match self
            .llm
            .complete(&prompt, &CompletionOptions::deterministic())
            .await
        {
            Ok(raw) => {
                let query = clean_reply(&raw);
                if query.is_empty() {
                    text.to_string()
                } else {
                    tracing::debug!(%query, "rewrote search query");
                    query
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "query rewrite failed, searching the original text");
                text.to_string()
            }
        }
    }

    async fn chat(&self, text: &str, persona: &Persona) -> Reply {
        let weather = match &self.weather {
            Some(source) => Some(context::query_or(source.as_ref(), context::UNAVAILABLE).await),
            None => None,
        };

        let kind = ReplyKind::Chat {
            utterance: text,
            weather: weather.as_deref(),
        };
        Reply {
            reply_text: self.synthesizer.synthesize(persona, &kind).await,
            action_taken: false,
            intent: Intent::Conversational,
            transcription: text.to_string(),
            dispatch: None,
        }
    }
}

/// Builder for [`Assistant`]
pub struct AssistantBuilder {
    llm: Arc<dyn Completion>,
    transports: Transports,
    registry: Arc<DeviceRegistry>,
    config: AssistantConfig,
    dispatch: DispatchConfig,
    presence: Option<Arc<dyn ContextSource>>,
    weather: Option<Arc<dyn ContextSource>>,
    search: Option<Arc<dyn SearchSource>>,
    search_limit: usize,
    profile: UserProfile,
}

impl AssistantBuilder {
    #[must_use]
    pub fn assistant_config(mut self, config: AssistantConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn dispatch_config(mut self, config: DispatchConfig) -> Self {
        self.dispatch = config;
        self
    }

    #[must_use]
    pub fn presence(mut self, source: Arc<dyn ContextSource>) -> Self {
        self.presence = Some(source);
        self
    }

    #[must_use]
    pub fn weather(mut self, source: Arc<dyn ContextSource>) -> Self {
        self.weather = Some(source);
        self
    }

    #[must_use]
    pub fn search(mut self, source: Arc<dyn SearchSource>, limit: usize) -> Self {
        self.search = Some(source);
        self.search_limit = limit.max(1);
        self
    }

    #[must_use]
    pub fn profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn build(self) -> Assistant {
        Assistant {
            classifier: IntentClassifier::new(Arc::clone(&self.llm), self.config.history_turns),
            extractor: ActionExtractor::new(Arc::clone(&self.llm)),
            synthesizer: ReplySynthesizer::new(Arc::clone(&self.llm)),
            dispatcher: Dispatcher::new(self.transports, self.dispatch),
            history: ConversationHistory::new(self.config.history_turns),
            llm: self.llm,
            registry: self.registry,
            presence: self.presence,
            weather: self.weather,
            search: self.search,
            search_limit: self.search_limit,
            profile: self.profile,
            config: self.config,
        }
    }
}

/// Build the cloud and LAN adapters described by configuration
///
/// # Errors
///
/// Returns error if the cloud HTTP client cannot be built
pub fn transports_from_config(config: &Config) -> Result<Transports> {
    let cloud: Arc<dyn Transport> = Arc::new(CloudTransport::from_config(&config.cloud)?);
    let lan: Arc<dyn Transport> = Arc::new(LanTransport::new(config.lan.send_timeout));

    Ok(Transports::new(cloud, lan))
}
