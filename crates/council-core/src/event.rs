use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event decode failed: {0}")]
    Decode(String),
}

/// Per-event metadata bag. The backend populates only the keys relevant to
/// each event type; everything it may add later lands in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventMetadata {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub total_rounds: Option<u32>,
    #[serde(default)]
    pub council: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

/// Wire shape of one inbound event. The backend sends every field on every
/// event, blank when unused, so each one defaults independently.
#[derive(Debug, Clone, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    agent: String,
    #[serde(default)]
    round: u32,
    #[serde(default)]
    content: String,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    #[allow(dead_code)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: EventMetadata,
}

/// One inbound session event, lifted out of the flat wire object into a
/// closed set of kinds. Tags this client does not know about decode to
/// `Unknown` so a newer backend never breaks the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum CouncilEvent {
    Status {
        content: String,
    },
    RoundStart {
        round: u32,
        total_rounds: Option<u32>,
    },
    AgentStart {
        agent: String,
        model: Option<String>,
    },
    AgentDone {
        agent: String,
        round: u32,
        content: String,
        model: Option<String>,
    },
    RoundDone {
        round: u32,
    },
    ModeratorStart {
        content: String,
    },
    ModeratorDone {
        content: String,
        model: Option<String>,
    },
    ModelLoading {
        agent: String,
        model: Option<String>,
        content: String,
    },
    ModelLoaded {
        agent: String,
        model: Option<String>,
        content: String,
    },
    Error {
        message: String,
    },
    CouncilDone,
    Unknown {
        kind: String,
    },
}

impl CouncilEvent {
    /// Parse one text frame from the session socket.
    pub fn from_wire(text: &str) -> Result<Self, EventError> {
        let raw: RawEvent =
            serde_json::from_str(text).map_err(|err| EventError::Decode(err.to_string()))?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawEvent) -> Self {
        match raw.kind.as_str() {
            "status" => CouncilEvent::Status { content: raw.content },
            "round_start" => CouncilEvent::RoundStart {
                round: raw.round,
                total_rounds: raw.metadata.total_rounds,
            },
            "agent_start" => CouncilEvent::AgentStart {
                agent: raw.agent,
                model: raw.metadata.model,
            },
            "agent_done" => CouncilEvent::AgentDone {
                agent: raw.agent,
                round: raw.round,
                content: raw.content,
                model: raw.metadata.model,
            },
            "round_done" => CouncilEvent::RoundDone { round: raw.round },
            "moderator_start" => CouncilEvent::ModeratorStart { content: raw.content },
            "moderator_done" => CouncilEvent::ModeratorDone {
                content: raw.content,
                model: raw.metadata.model,
            },
            "model_loading" => CouncilEvent::ModelLoading {
                agent: raw.agent,
                model: raw.metadata.model,
                content: raw.content,
            },
            "model_loaded" => CouncilEvent::ModelLoaded {
                agent: raw.agent,
                model: raw.metadata.model,
                content: raw.content,
            },
            "error" => CouncilEvent::Error { message: raw.content },
            "council_done" => CouncilEvent::CouncilDone,
            other => CouncilEvent::Unknown {
                kind: other.to_string(),
            },
        }
    }
}

/// Generation overrides carried on task submission. Every field is optional;
/// the backend falls back to its configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debate_rounds: Option<u32>,
}

impl GenerationSettings {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_tokens.is_none() && self.debate_rounds.is_none()
    }
}

/// The one outbound message this client sends: run a task through a council.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub council: String,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<GenerationSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_overrides: Option<HashMap<String, String>>,
}

impl TaskMessage {
    pub fn new(council: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            kind: "task".to_string(),
            council: council.into(),
            task: task.into(),
            settings: None,
            model_overrides: None,
        }
    }

    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// The backend emits `"timestamp": ""` on most events; treat anything that is
/// not valid RFC 3339 as absent instead of failing the whole frame.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
        .map(|parsed| parsed.with_timezone(&Utc)))
}
