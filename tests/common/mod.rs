//! Shared test utilities

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hearth_gateway::{
    Assistant, Capability, Completion, CompletionOptions, Device, DeviceRegistry, Error,
    Transport, TransportError, TransportKind, Transports,
};

/// Completion model that answers from a script, in order
///
/// Once the script runs out every call fails, like an unreachable model.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        })
    }

    /// Like [`ScriptedLlm::new`], but every call takes `delay`
    pub fn slow<I, S>(replies: I, delay: Duration) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
            delay,
        })
    }

    /// A model that never answers
    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a failing call after the replies already scripted
    pub fn then_fail(self: Arc<Self>, message: &str) -> Arc<Self> {
        self.replies.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Completion for ScriptedLlm {
    async fn complete(&self, prompt: &str, _options: &CompletionOptions) -> hearth_gateway::Result<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(Error::Llm(message)),
            None => Err(Error::Llm("connection refused".to_string())),
        }
    }
}

/// Transport that records every call and fails for chosen devices
pub struct RecordingTransport {
    kind: TransportKind,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, Capability)>>,
}

impl RecordingTransport {
    pub fn new(kind: TransportKind) -> Arc<Self> {
        Self::failing(kind, &[])
    }

    /// Every call for the named devices is rejected
    pub fn failing(kind: TransportKind, devices: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            kind,
            failing: devices.iter().map(ToString::to_string).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(String, Capability)> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made for one device
    pub fn calls_for(&self, device: &str) -> Vec<Capability> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == device)
            .map(|(_, capability)| capability)
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn apply(&self, device: &Device, capability: Capability) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((device.name.clone(), capability));

        if self.failing.contains(&device.name) {
            return Err(TransportError::Rejected {
                code: 400,
                message: "device offline".to_string(),
            });
        }
        Ok(())
    }
}

fn device(name: &str, transport: TransportKind, address: Option<&str>) -> Device {
    Device {
        name: name.to_string(),
        id: format!("AA:BB:{}", name.len()),
        sku: "H6008".to_string(),
        transport,
        address: address.map(|a| a.parse().unwrap()),
    }
}

/// Three cloud lights and one LAN light
pub fn test_registry() -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    registry.insert(device("KITCHEN LIGHT 1", TransportKind::Cloud, None));
    registry.insert(device("KITCHEN LIGHT 2", TransportKind::Cloud, None));
    registry.insert(device("STANDING LAMP", TransportKind::Cloud, None));
    registry.insert(device(
        "CEILING LIGHT",
        TransportKind::Lan,
        Some("192.168.1.40:4003"),
    ));
    registry
}

/// Assistant wired to scripted and recording fakes
pub struct Harness {
    pub assistant: Assistant,
    pub llm: Arc<ScriptedLlm>,
    pub cloud: Arc<RecordingTransport>,
    pub lan: Arc<RecordingTransport>,
}

impl Harness {
    pub fn new(llm: Arc<ScriptedLlm>) -> Self {
        Self::with_transports(
            llm,
            RecordingTransport::new(TransportKind::Cloud),
            RecordingTransport::new(TransportKind::Lan),
        )
    }

    pub fn with_transports(
        llm: Arc<ScriptedLlm>,
        cloud: Arc<RecordingTransport>,
        lan: Arc<RecordingTransport>,
    ) -> Self {
        let transports = Transports::new(cloud.clone(), lan.clone());
        let assistant =
            Assistant::builder(llm.clone(), transports, Arc::new(test_registry())).build();

        Self {
            assistant,
            llm,
            cloud,
            lan,
        }
    }

    /// Total adapter calls across both transports
    pub fn transport_calls(&self) -> usize {
        self.cloud.calls().len() + self.lan.calls().len()
    }
}
