//! Engine configuration: every per-session knob enumerated in §6.

use std::time::Duration;

/// Flow-control knobs (§4.3, §6 `flowControl.*`).
#[derive(Debug, Clone)]
pub struct FlowControlConfig {
    pub min_credits: u64,
    pub max_credits: u64,
    pub credit_threshold: u64,
    pub back_pressure_threshold: u64,
    pub adaptive_adjustment: bool,
    pub initial_credit_messages: u64,
    pub initial_credit_bytes: u64,
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        Self {
            min_credits: 1,
            max_credits: 10_000,
            credit_threshold: 4,
            back_pressure_threshold: 0,
            adaptive_adjustment: false,
            initial_credit_messages: 32,
            initial_credit_bytes: 1_048_576,
        }
    }
}

/// Heartbeat knobs (§4.6 `heartbeatInterval`/`heartbeatTimeout`).
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub max_missed: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(5),
            max_missed: 3,
        }
    }
}

/// Replay-window knobs (§4.2 `replayWindowSize`/`replayWindowTime`).
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub max_count: usize,
    pub max_age: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_count: 256,
            max_age: Duration::from_secs(300),
        }
    }
}

/// Everything the engine needs beyond the principal itself.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub flow_control: FlowControlConfig,
    pub heartbeat: HeartbeatConfig,
    pub replay: ReplayConfig,
    pub max_concurrent_runs: usize,
    /// Protocol major versions this server supports (§4.6 handshake).
    pub supported_majors: Vec<u8>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flow_control: FlowControlConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            replay: ReplayConfig::default(),
            max_concurrent_runs: 8,
            supported_majors: vec![1],
        }
    }
}
