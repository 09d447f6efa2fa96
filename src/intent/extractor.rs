//! Structured light actions from model output
//!
//! The model is asked for a small JSON object but small local models wrap it
//! in tool-call tags, markdown fences or stray chat tokens, and sometimes nest
//! the fields under `parameters`. Extraction tolerates all of that.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::devices::PowerState;
use crate::llm::{Completion, CompletionOptions};

/// Sentinel the model emits when the utterance is not really a command
pub const NO_ACTION: &str = "NO_ACTION";

/// Target used when the model names none
pub const DEFAULT_TARGET: &str = "ALL";

const WRAPPERS: [&str; 5] = ["<tool_call>", "</tool_call>", "<|im_end|>", "```json", "```"];

/// A light command extracted from model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAction {
    pub power: PowerState,
    /// Raw target spec, upper-cased
    pub target: String,
    /// Brightness percentage in 1..=100
    pub brightness: Option<u8>,
    /// Color temperature in Kelvin, always positive
    pub color_temp_k: Option<u32>,
}

/// Extraction result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Action(ParsedAction),
    /// The model decided the utterance does not change any light
    NoAction,
}

/// Why no action could be extracted
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Model output looked like JSON but could not be parsed
    #[error("malformed action: {0}")]
    Parse(String),

    /// The model could not be reached
    #[error("extraction model unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Nested {
        #[serde(alias = "arguments")]
        parameters: RawParams,
    },
    Flat(RawParams),
}

impl Envelope {
    fn into_params(self) -> RawParams {
        match self {
            Self::Nested { parameters } | Self::Flat(parameters) => parameters,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawParams {
    #[serde(default)]
    action: Option<ActionValue>,
    #[serde(default)]
    target: Option<TargetValue>,
    #[serde(default)]
    brightness: Option<Numeric>,
    #[serde(
        default,
        alias = "colorTempK",
        alias = "color_temp",
        alias = "colorTemperatureK"
    )]
    color_temp_k: Option<Numeric>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActionValue {
    Text(String),
    Flag(bool),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TargetValue {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn value(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().trim_end_matches(['%', 'K', 'k']).trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<RawParams> for ParsedAction {
    fn from(raw: RawParams) -> Self {
        let power = match raw.action {
            Some(ActionValue::Text(action)) => PowerState::from_action(&action),
            Some(ActionValue::Flag(true)) => PowerState::On,
            Some(ActionValue::Flag(false)) | None => PowerState::Off,
        };

        let target = match raw.target {
            Some(TargetValue::One(target)) => target,
            Some(TargetValue::Many(targets)) => targets.join(", "),
            None => String::new(),
        };
        let target = target.trim().to_uppercase();

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let brightness = raw
            .brightness
            .and_then(|b| b.value())
            .map(|b| b.round().clamp(1.0, 100.0) as u8);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let color_temp_k = raw
            .color_temp_k
            .and_then(|k| k.value())
            .map(f64::round)
            .filter(|k| *k > 0.0)
            .map(|k| k.min(f64::from(u32::MAX)) as u32);

        Self {
            power,
            target: if target.is_empty() {
                DEFAULT_TARGET.to_string()
            } else {
                target
            },
            brightness,
            color_temp_k,
        }
    }
}

/// Extract a light action from raw model output
///
/// Output with no `{` or containing the `NO_ACTION` sentinel is
/// [`Extraction::NoAction`]; output with braces that fail to parse is
/// [`ExtractError::Parse`].
///
/// # Errors
///
/// Returns [`ExtractError::Parse`] if the JSON object is malformed
pub fn extract(raw: &str) -> Result<Extraction, ExtractError> {
    let mut cleaned = raw.to_string();
    for wrapper in WRAPPERS {
        cleaned = cleaned.replace(wrapper, "");
    }
    let cleaned = cleaned.trim();

    if cleaned.to_uppercase().contains(NO_ACTION) {
        return Ok(Extraction::NoAction);
    }
    let Some(start) = cleaned.find('{') else {
        return Ok(Extraction::NoAction);
    };
    let end = cleaned
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| ExtractError::Parse("unterminated object".to_string()))?;

    let envelope: Envelope = serde_json::from_str(&cleaned[start..=end])
        .map_err(|e| ExtractError::Parse(e.to_string()))?;

    Ok(Extraction::Action(envelope.into_params().into()))
}

/// Asks the model for a light action and extracts it
#[derive(Clone)]
pub struct ActionExtractor {
    llm: Arc<dyn Completion>,
}

impl std::fmt::Debug for ActionExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExtractor").finish_non_exhaustive()
    }
}

impl ActionExtractor {
    #[must_use]
    pub fn new(llm: Arc<dyn Completion>) -> Self {
        Self { llm }
    }

    /// Extract an action for `utterance`, offering `device_names` as targets
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Unavailable`] if the model call fails and
    /// [`ExtractError::Parse`] if its output is malformed
    pub async fn extract(
        &self,
        utterance: &str,
        device_names: &[&str],
    ) -> Result<Extraction, ExtractError> {
        let prompt = extraction_prompt(utterance, device_names);
        let options = CompletionOptions::deterministic().with_stop(["<|im_end|>", "</tool_call>"]);

        let raw = self
            .llm
            .complete(&prompt, &options)
            .await
            .map_err(|e| ExtractError::Unavailable(e.to_string()))?;

        tracing::debug!(raw = %raw, "extractor output");
        extract(&raw)
    }
}

fn extraction_prompt(utterance: &str, device_names: &[&str]) -> String {
    let mut targets = device_names.join(", ");
    if !targets.is_empty() {
        targets.push_str(", ");
    }
    targets.push_str(DEFAULT_TARGET);

    format!(
        "<|im_start|>system\n\
         You control the lights in a home. Decide whether the user wants to CHANGE a light.\n\n\
         # Rules:\n\
         1. If the user only describes how things look (\"the lights are dim\", \"it is dark\"), output NO_ACTION.\n\
         2. If the user gives a command, output one JSON object:\n\
         {{\"action\": \"ON\" or \"OFF\", \"target\": \"<target>\", \"brightness\": 1-100 (optional), \"color_temp_k\": kelvin (optional)}}\n\
         3. Available targets: {targets}. Several targets may be comma separated.\n\n\
         # Examples:\n\
         User: \"Turn on the kitchen\" -> {{\"action\": \"ON\", \"target\": \"KITCHEN LIGHT 1\"}}\n\
         User: \"Dim everything to 30 percent\" -> {{\"action\": \"ON\", \"target\": \"ALL\", \"brightness\": 30}}\n\
         User: \"It's too bright in here\" -> {{\"action\": \"OFF\", \"target\": \"ALL\"}}\n\
         User: \"My eyes are tired\" -> NO_ACTION\n\
         <|im_end|>\n\
         <|im_start|>user\n\
         {utterance}\n\
         <|im_end|>\n\
         <|im_start|>assistant\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(raw: &str) -> ParsedAction {
        match extract(raw).unwrap() {
            Extraction::Action(action) => action,
            Extraction::NoAction => panic!("expected an action from {raw}"),
        }
    }

    #[test]
    fn flat_object() {
        let parsed = action(r#"{"action":"ON","target":"KITCHEN LIGHT 1","brightness":50}"#);
        assert_eq!(
            parsed,
            ParsedAction {
                power: PowerState::On,
                target: "KITCHEN LIGHT 1".to_string(),
                brightness: Some(50),
                color_temp_k: None,
            }
        );
    }

    #[test]
    fn nested_parameters_normalize_like_flat() {
        let nested = action(r#"{"parameters":{"action":"OFF","target":"ALL"}}"#);
        let flat = action(r#"{"action":"OFF","target":"ALL"}"#);
        assert_eq!(nested, flat);

        let arguments = action(r#"{"name":"set_light","arguments":{"action":"OFF","target":"ALL"}}"#);
        assert_eq!(arguments, flat);
    }

    #[test]
    fn no_brace_is_no_action() {
        assert_eq!(extract("Sure, the lights are fine.").unwrap(), Extraction::NoAction);
        assert_eq!(extract("").unwrap(), Extraction::NoAction);
    }

    #[test]
    fn sentinel_is_no_action_in_any_case() {
        assert_eq!(extract("NO_ACTION").unwrap(), Extraction::NoAction);
        assert_eq!(extract("no_action {}").unwrap(), Extraction::NoAction);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(extract(r#"{"action": ON}"#), Err(ExtractError::Parse(_))));
        assert!(matches!(extract("{ oops"), Err(ExtractError::Parse(_))));
    }

    #[test]
    fn wrappers_are_stripped() {
        let raw = "<tool_call>\n```json\n{\"action\": \"on\", \"target\": \"standing lamp\"}\n```\n</tool_call><|im_end|>";
        let parsed = action(raw);
        assert_eq!(parsed.power, PowerState::On);
        assert_eq!(parsed.target, "STANDING LAMP");
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let parsed = action(r#"Here you go: {"action":"ON","target":"ALL"} done"#);
        assert_eq!(parsed.target, "ALL");
    }

    #[test]
    fn missing_fields_default() {
        let parsed = action("{}");
        assert_eq!(parsed.power, PowerState::Off);
        assert_eq!(parsed.target, DEFAULT_TARGET);
        assert_eq!(parsed.brightness, None);
    }

    #[test]
    fn only_on_means_on() {
        assert_eq!(action(r#"{"action":"TOGGLE"}"#).power, PowerState::Off);
        assert_eq!(action(r#"{"action":true}"#).power, PowerState::On);
    }

    #[test]
    fn brightness_is_clamped_and_rounded() {
        assert_eq!(action(r#"{"action":"ON","brightness":0}"#).brightness, Some(1));
        assert_eq!(action(r#"{"action":"ON","brightness":250}"#).brightness, Some(100));
        assert_eq!(action(r#"{"action":"ON","brightness":42.6}"#).brightness, Some(43));
        assert_eq!(action(r#"{"action":"ON","brightness":"30%"}"#).brightness, Some(30));
        assert_eq!(action(r#"{"action":"ON","brightness":"bright"}"#).brightness, None);
    }

    #[test]
    fn color_temperature_aliases() {
        for key in ["color_temp_k", "colorTempK", "color_temp", "colorTemperatureK"] {
            let raw = format!(r#"{{"action":"ON","{key}":2700}}"#);
            assert_eq!(action(&raw).color_temp_k, Some(2700), "{key}");
        }
        assert_eq!(action(r#"{"action":"ON","color_temp_k":-5}"#).color_temp_k, None);
        assert_eq!(action(r#"{"action":"ON","color_temp_k":0}"#).color_temp_k, None);
    }

    #[test]
    fn target_list_is_joined() {
        let parsed = action(r#"{"action":"ON","target":["kitchen light 1","standing lamp"]}"#);
        assert_eq!(parsed.target, "KITCHEN LIGHT 1, STANDING LAMP");
    }

    #[test]
    fn prompt_lists_targets() {
        let prompt = extraction_prompt("lights on", &["KITCHEN LIGHT 1", "STANDING LAMP"]);
        assert!(prompt.contains("Available targets: KITCHEN LIGHT 1, STANDING LAMP, ALL."));
        assert!(prompt.contains("lights on"));
    }
}
