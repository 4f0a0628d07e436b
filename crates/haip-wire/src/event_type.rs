//! The closed set of event types the core accepts (§6), plus the wider
//! reserved set (§9 ambiguity #1) that is only ever treated via the `crit`
//! rule and never dispatched.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Event types the core protocol engine understands and dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreEventType {
    Hai,
    Ping,
    Pong,
    Error,
    FlowUpdate,
    TransactionStart,
    TransactionEnd,
    ReplayRequest,
    MessageStart,
    MessagePart,
    MessageEnd,
    AudioChunk,
    Info,
    ToolList,
    ToolSchema,
}

impl CoreEventType {
    pub const ALL: &'static [CoreEventType] = &[
        Self::Hai,
        Self::Ping,
        Self::Pong,
        Self::Error,
        Self::FlowUpdate,
        Self::TransactionStart,
        Self::TransactionEnd,
        Self::ReplayRequest,
        Self::MessageStart,
        Self::MessagePart,
        Self::MessageEnd,
        Self::AudioChunk,
        Self::Info,
        Self::ToolList,
        Self::ToolSchema,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hai => "HAI",
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::Error => "ERROR",
            Self::FlowUpdate => "FLOW_UPDATE",
            Self::TransactionStart => "TRANSACTION_START",
            Self::TransactionEnd => "TRANSACTION_END",
            Self::ReplayRequest => "REPLAY_REQUEST",
            Self::MessageStart => "MESSAGE_START",
            Self::MessagePart => "MESSAGE_PART",
            Self::MessageEnd => "MESSAGE_END",
            Self::AudioChunk => "AUDIO_CHUNK",
            Self::Info => "INFO",
            Self::ToolList => "TOOL_LIST",
            Self::ToolSchema => "TOOL_SCHEMA",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

/// An event type as it appears on the wire: either one of the core types, or
/// an opaque name from the wider/reserved set (forward-compatibility).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    Core(CoreEventType),
    Unknown(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Core(t) => t.as_str(),
            Self::Unknown(s) => s.as_str(),
        }
    }

    pub fn is_core(&self) -> bool {
        matches!(self, Self::Core(_))
    }
}

impl From<CoreEventType> for EventType {
    fn from(value: CoreEventType) -> Self {
        Self::Core(value)
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match CoreEventType::from_str(&raw) {
            Some(t) => EventType::Core(t),
            None => EventType::Unknown(raw),
        })
    }
}

/// Logical sub-channel a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "AGENT")]
    Agent,
    #[serde(rename = "SYSTEM")]
    System,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::User, Channel::Agent, Channel::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Agent => "AGENT",
            Self::System => "SYSTEM",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_event_round_trips() {
        let json = serde_json::to_string(&EventType::Core(CoreEventType::Hai)).unwrap();
        assert_eq!(json, "\"HAI\"");
        let parsed: EventType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, EventType::Core(CoreEventType::Hai));
    }

    #[test]
    fn reserved_wide_type_parses_as_unknown() {
        let parsed: EventType = serde_json::from_str("\"RUN_START\"").unwrap();
        assert_eq!(parsed, EventType::Unknown("RUN_START".to_string()));
        assert!(!parsed.is_core());
    }

    #[test]
    fn channel_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Channel::Agent).unwrap(), "\"AGENT\"");
    }
}
