//! End-to-end pipeline tests with a scripted model and recording transports

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hearth_gateway::assistant::reply::{
    EMPTY_INPUT_REPLY, PARSE_ERROR_REPLY, UNAVAILABLE_REPLY,
};
use hearth_gateway::config::DispatchConfig;
use hearth_gateway::context::{ContextSource, SearchResult, SearchSource};
use hearth_gateway::{
    ActionRequest, Assistant, Capability, Dispatcher, Extraction, Intent, ParsedAction,
    PowerState, TransportKind, Transports, extract, resolve,
};

mod common;
use common::{Harness, RecordingTransport, ScriptedLlm, test_registry};

fn unpaced() -> DispatchConfig {
    DispatchConfig {
        pacing: Duration::ZERO,
        ..DispatchConfig::default()
    }
}

#[tokio::test]
async fn test_light_command_dispatches_and_confirms() {
    let llm = ScriptedLlm::new([
        "LIGHT_COMMAND",
        r#"<tool_call>{"name": "control_light", "arguments": {"action": "ON", "target": "standing lamp", "brightness": 40}}</tool_call>"#,
        "\"Lamp's on, User!\"<|im_end|>",
    ]);
    let harness = Harness::new(llm);

    let reply = harness.assistant.handle("turn on the standing lamp at 40%").await;

    assert_eq!(reply.intent, Intent::LightCommand);
    assert!(reply.action_taken);
    assert_eq!(reply.reply_text, "Lamp's on, User!");
    assert_eq!(
        harness.cloud.calls_for("STANDING LAMP"),
        vec![Capability::Power(PowerState::On), Capability::Brightness(40)]
    );
    assert!(harness.lan.calls().is_empty());

    let outcome = reply.dispatch.unwrap();
    assert!(outcome.overall_success());
    assert_eq!(
        outcome.summary(),
        "SUCCESS: STANDING LAMP turned ON at 40% brightness"
    );

    // The status line, not the raw action, reaches the reply prompt
    let prompts = harness.llm.prompts();
    assert!(prompts[2].contains("Context: SUCCESS: STANDING LAMP turned ON"));
}

#[tokio::test]
async fn test_unreachable_model_never_touches_devices() {
    let harness = Harness::new(ScriptedLlm::unreachable());

    let reply = harness.assistant.handle("turn off everything").await;

    assert_eq!(reply.intent, Intent::Conversational);
    assert!(!reply.action_taken);
    assert!(!reply.reply_text.is_empty());
    assert_eq!(harness.transport_calls(), 0);
}

#[tokio::test]
async fn test_extractor_unreachable_gets_fixed_reply() {
    let llm = ScriptedLlm::new(["LIGHT_COMMAND"]).then_fail("timed out");
    let harness = Harness::new(llm);

    let reply = harness.assistant.handle("lights on").await;

    assert_eq!(reply.intent, Intent::LightCommand);
    assert_eq!(reply.reply_text, UNAVAILABLE_REPLY);
    assert!(!reply.action_taken);
    assert_eq!(harness.transport_calls(), 0);
    // No reply synthesis after a failed extraction
    assert_eq!(harness.llm.calls(), 2);
}

#[tokio::test]
async fn test_malformed_action_gets_parse_error_reply() {
    let llm = ScriptedLlm::new(["LIGHT_COMMAND", r#"{"action": "ON", "target": }"#]);
    let harness = Harness::new(llm);

    let reply = harness.assistant.handle("lights on").await;

    assert_eq!(reply.reply_text, PARSE_ERROR_REPLY);
    assert!(!reply.action_taken);
    assert_eq!(harness.transport_calls(), 0);
}

#[tokio::test]
async fn test_no_action_reroutes_to_conversation() {
    let llm = ScriptedLlm::new(["LIGHT_COMMAND", "NO_ACTION", "Want me to brighten things up?"]);
    let harness = Harness::new(llm);

    let reply = harness.assistant.handle("the lights are kind of dim").await;

    assert_eq!(reply.intent, Intent::Conversational);
    assert!(!reply.action_taken);
    assert!(reply.dispatch.is_none());
    assert_eq!(reply.reply_text, "Want me to brighten things up?");
    assert_eq!(harness.transport_calls(), 0);
    assert!(harness.llm.prompts()[2].contains("User said: the lights are kind of dim"));
}

#[tokio::test]
async fn test_off_never_sends_brightness_or_color() {
    let llm = ScriptedLlm::new([
        "LIGHT_COMMAND",
        r#"{"action": "OFF", "target": "KITCHEN LIGHT 1, CEILING LIGHT", "brightness": 80, "color_temp_k": 2700}"#,
        "Done.",
    ]);
    let harness = Harness::new(llm);

    let reply = harness.assistant.handle("kitchen and ceiling off").await;

    assert!(reply.action_taken);
    assert_eq!(
        harness.cloud.calls_for("KITCHEN LIGHT 1"),
        vec![Capability::Power(PowerState::Off)]
    );
    assert_eq!(
        harness.lan.calls_for("CEILING LIGHT"),
        vec![Capability::Power(PowerState::Off)]
    );
    let outcome = reply.dispatch.unwrap();
    assert_eq!(outcome.brightness, None);
    assert_eq!(outcome.color_temp_k, None);
}

#[tokio::test]
async fn test_all_reaches_every_device_through_its_adapter() {
    let llm = ScriptedLlm::new([
        "LIGHT_COMMAND",
        r#"{"action": "ON", "target": "ALL", "color_temp_k": 3000}"#,
        "Everything's on.",
    ]);
    let harness = Harness::new(llm);

    let reply = harness.assistant.handle("turn everything on warm").await;
    let outcome = reply.dispatch.unwrap();

    assert!(outcome.expanded_all);
    assert_eq!(outcome.target_count, 4);
    assert_eq!(
        outcome.summary(),
        "SUCCESS: ALL turned ON with color temperature 3000K"
    );

    for name in ["KITCHEN LIGHT 1", "KITCHEN LIGHT 2", "STANDING LAMP"] {
        assert_eq!(
            harness.cloud.calls_for(name),
            vec![
                Capability::Power(PowerState::On),
                Capability::ColorTemperature(3000)
            ]
        );
    }
    assert_eq!(harness.lan.calls().len(), 2);
    assert!(harness.cloud.calls_for("CEILING LIGHT").is_empty());
}

#[tokio::test]
async fn test_ambiguous_target_resolves_to_nothing() {
    let llm = ScriptedLlm::new([
        "LIGHT_COMMAND",
        r#"{"action": "ON", "target": "kitchen"}"#,
        "Which kitchen light?",
    ]);
    let harness = Harness::new(llm);

    let reply = harness.assistant.handle("kitchen on").await;

    assert!(!reply.action_taken);
    assert_eq!(harness.transport_calls(), 0);
    let outcome = reply.dispatch.unwrap();
    assert_eq!(outcome.target_count, 0);
    assert_eq!(outcome.summary(), "No matching lights found for 'KITCHEN'");
}

#[tokio::test]
async fn test_partial_failure_keeps_going() {
    let llm = ScriptedLlm::new([
        "LIGHT_COMMAND",
        r#"{"action": "ON", "target": "KITCHEN LIGHT 1, KITCHEN LIGHT 2, CEILING LIGHT", "brightness": 50}"#,
        "One light didn't answer.",
    ]);
    let harness = Harness::with_transports(
        llm,
        RecordingTransport::failing(TransportKind::Cloud, &["KITCHEN LIGHT 2"]),
        RecordingTransport::new(TransportKind::Lan),
    );

    let reply = harness.assistant.handle("kitchen and ceiling to half").await;
    let outcome = reply.dispatch.unwrap();

    assert!(reply.action_taken);
    assert!(!outcome.overall_success());
    assert_eq!(outcome.failed_devices(), vec!["KITCHEN LIGHT 2"]);
    assert_eq!(
        outcome.succeeded_devices(),
        vec!["KITCHEN LIGHT 1", "CEILING LIGHT"]
    );
    assert!(outcome.summary().starts_with("PARTIAL FAILURE: KITCHEN LIGHT 1, CEILING LIGHT turned ON"));

    // A failed power step stops that device only
    assert_eq!(
        harness.cloud.calls_for("KITCHEN LIGHT 2"),
        vec![Capability::Power(PowerState::On)]
    );
    assert_eq!(harness.cloud.calls_for("KITCHEN LIGHT 1").len(), 2);
    assert_eq!(harness.lan.calls_for("CEILING LIGHT").len(), 2);

    // Failure prompt asks to explain rather than confirm
    assert!(harness.llm.prompts()[2].contains("what did not work"));
}

#[tokio::test]
async fn test_all_with_cloud_failure_is_not_a_success() {
    let llm = ScriptedLlm::new([
        "LIGHT_COMMAND",
        r#"{"action": "ON", "target": "ALL"}"#,
        "Some lights didn't answer.",
    ]);
    let harness = Harness::with_transports(
        llm,
        RecordingTransport::failing(TransportKind::Cloud, &["STANDING LAMP"]),
        RecordingTransport::new(TransportKind::Lan),
    );

    let reply = harness.assistant.handle("everything on").await;
    let outcome = reply.dispatch.unwrap();

    assert!(outcome.expanded_all);
    assert!(!outcome.overall_success());
    assert_eq!(outcome.failed_devices(), vec!["STANDING LAMP"]);
    assert_eq!(
        outcome.succeeded_devices(),
        vec!["KITCHEN LIGHT 1", "KITCHEN LIGHT 2", "CEILING LIGHT"]
    );
    assert_eq!(
        harness.lan.calls_for("CEILING LIGHT"),
        vec![Capability::Power(PowerState::On)]
    );
    assert!(outcome.summary().starts_with("PARTIAL FAILURE:"));
}

#[tokio::test]
async fn test_unclear_classification_is_conversational() {
    let llm = ScriptedLlm::new(["LIGHT_COMMAND or GENERAL_QUESTION", "Hmm, tell me more."]);
    let harness = Harness::new(llm);

    let reply = harness.assistant.handle("lights and weather").await;

    assert_eq!(reply.intent, Intent::Conversational);
    assert_eq!(harness.transport_calls(), 0);
}

#[tokio::test]
async fn test_self_referential_question_skips_classifier() {
    let llm = ScriptedLlm::new(["I'm Maya, your home assistant."]);
    let harness = Harness::new(llm);

    let reply = harness.assistant.handle("Who are you?").await;

    assert_eq!(reply.intent, Intent::Conversational);
    assert_eq!(reply.reply_text, "I'm Maya, your home assistant.");
    assert_eq!(harness.llm.calls(), 1);
}

struct SlowPresence {
    delay: Duration,
    queries: AtomicUsize,
}

#[async_trait]
impl ContextSource for SlowPresence {
    fn name(&self) -> &'static str {
        "presence"
    }

    async fn query(&self) -> hearth_gateway::Result<String> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok("At Home".to_string())
    }
}

#[tokio::test]
async fn test_presence_overlaps_classification() {
    let delay = Duration::from_millis(300);
    let llm = ScriptedLlm::slow(["LIGHT_COMMAND", "NO_ACTION", "Looks cozy."], delay);
    let presence = Arc::new(SlowPresence {
        delay,
        queries: AtomicUsize::new(0),
    });
    let transports = Transports::new(
        RecordingTransport::new(TransportKind::Cloud),
        RecordingTransport::new(TransportKind::Lan),
    );
    let assistant = Assistant::builder(llm.clone(), transports, Arc::new(test_registry()))
        .presence(presence.clone())
        .build();

    let started = Instant::now();
    let reply = assistant.handle("the room looks dim").await;

    // Three model calls; presence runs alongside the first one
    assert!(started.elapsed() < delay * 4 - Duration::from_millis(100));
    assert_eq!(reply.intent, Intent::Conversational);
    // Computed once and reused after the reroute
    assert_eq!(presence.queries.load(Ordering::SeqCst), 1);
    assert!(llm.prompts()[2].contains("Current Status: At Home"));
}

#[tokio::test]
async fn test_empty_input() {
    let harness = Harness::new(ScriptedLlm::unreachable());

    let reply = harness.assistant.handle("   ").await;

    assert_eq!(reply.reply_text, EMPTY_INPUT_REPLY);
    assert_eq!(harness.llm.calls(), 0);
    assert!(harness.assistant.history().is_empty());
}

#[tokio::test]
async fn test_history_records_both_sides() {
    let llm = ScriptedLlm::new(["CONVERSATIONAL", "Hi there!", "CONVERSATIONAL", "Still here."]);
    let harness = Harness::new(llm);

    harness.assistant.handle("hello").await;
    harness.assistant.handle("you there?").await;

    assert_eq!(harness.assistant.history().len(), 4);
    let recent = harness.assistant.history().recent();
    assert!(recent[0].contains("hello"));
    assert!(recent[1].contains("Hi there!"));

    // The second classification sees the first exchange
    assert!(harness.llm.prompts()[2].contains("Hi there!"));
}

struct FakeSearch {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl SearchSource for FakeSearch {
    async fn search(&self, query: &str, _limit: usize) -> hearth_gateway::Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(vec![SearchResult {
            title: "Lisbon weather".to_string(),
            url: "https://example.com/lisbon".to_string(),
            snippet: "Sunny, 24 degrees".to_string(),
        }])
    }
}

#[tokio::test]
async fn test_question_rewrites_and_searches() {
    let llm = ScriptedLlm::new([
        "GENERAL_QUESTION",
        "\"weather in Lisbon today\"",
        "Sunny and 24 in Lisbon.",
    ]);
    let search = Arc::new(FakeSearch {
        queries: Mutex::new(Vec::new()),
    });
    let transports = Transports::new(
        RecordingTransport::new(TransportKind::Cloud),
        RecordingTransport::new(TransportKind::Lan),
    );
    let assistant = Assistant::builder(llm.clone(), transports, Arc::new(test_registry()))
        .search(search.clone(), 3)
        .build();

    let reply = assistant.handle("what's it like there today?").await;

    assert_eq!(reply.intent, Intent::GeneralQuestion);
    assert!(!reply.action_taken);
    assert_eq!(reply.reply_text, "Sunny and 24 in Lisbon.");
    assert_eq!(*search.queries.lock().unwrap(), vec!["weather in Lisbon today"]);
    assert!(llm.prompts()[2].contains("Content: Sunny, 24 degrees"));
}

#[tokio::test]
async fn test_dispatch_outcome_is_repeatable() {
    let registry = test_registry();
    let transports = Transports::new(
        RecordingTransport::new(TransportKind::Cloud),
        RecordingTransport::new(TransportKind::Lan),
    );
    let dispatcher = Dispatcher::new(transports, unpaced());

    let action = ParsedAction {
        power: PowerState::On,
        target: "ALL".to_string(),
        brightness: Some(70),
        color_temp_k: None,
    };
    let request = ActionRequest::new(&action, resolve(&action.target, &registry));

    let first = dispatcher.dispatch(&request).await;
    let second = dispatcher.dispatch(&request).await;

    assert_eq!(first, second);
    // Steps come back in target order
    let devices: Vec<&str> = first.steps.iter().map(|s| s.device.as_str()).collect();
    assert_eq!(
        devices,
        vec![
            "KITCHEN LIGHT 1",
            "KITCHEN LIGHT 1",
            "KITCHEN LIGHT 2",
            "KITCHEN LIGHT 2",
            "STANDING LAMP",
            "STANDING LAMP",
            "CEILING LIGHT",
            "CEILING LIGHT",
        ]
    );
}

#[tokio::test]
async fn test_all_dispatch_is_paced() {
    let registry = test_registry();
    let pacing = Duration::from_millis(60);
    let dispatcher = Dispatcher::new(
        Transports::new(
            RecordingTransport::new(TransportKind::Cloud),
            RecordingTransport::new(TransportKind::Lan),
        ),
        DispatchConfig {
            pacing,
            ..DispatchConfig::default()
        },
    );
    let off = |target: &str| ActionRequest {
        power: PowerState::Off,
        targets: resolve(target, &registry),
        brightness: None,
        color_temp_k: None,
        color_rgb: None,
    };

    // Four sends through one pacer: the first is immediate, three wait a period each
    let started = Instant::now();
    let outcome = dispatcher.dispatch(&off("ALL")).await;
    assert_eq!(outcome.steps.len(), 4);
    assert!(started.elapsed() >= pacing * 3 - Duration::from_millis(10));

    // Named targets are not paced
    let started = Instant::now();
    let outcome = dispatcher
        .dispatch(&off("KITCHEN LIGHT 1, KITCHEN LIGHT 2, STANDING LAMP, CEILING LIGHT"))
        .await;
    assert_eq!(outcome.steps.len(), 4);
    assert!(started.elapsed() < pacing * 3);
}

#[test]
fn test_extraction_examples() {
    let Ok(Extraction::Action(action)) =
        extract(r#"```json {"action": "on", "target": ["kitchen light 1", "standing lamp"], "brightness": "35"} ```"#)
    else {
        panic!("expected an action");
    };
    assert_eq!(action.power, PowerState::On);
    assert_eq!(action.target, "KITCHEN LIGHT 1, STANDING LAMP");
    assert_eq!(action.brightness, Some(35));

    let Ok(Extraction::Action(action)) = extract(r#"{"action": "OFF"}"#) else {
        panic!("expected an action");
    };
    assert_eq!(action.target, "ALL");

    assert_eq!(extract("Sure, nothing to do.").unwrap(), Extraction::NoAction);
    assert!(extract("{not json}").is_err());
}
