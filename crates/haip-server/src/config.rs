//! Typed server configuration (§6, §10 A1), loaded from environment
//! variables with sensible defaults — in the style of the workspace's own
//! `McpConfig`: a plain struct, a `from_env` constructor, no new
//! config-file-format dependency.

use std::env;
use std::time::Duration;

use haip_session::{EngineConfig, HeartbeatConfig, ReplayConfig};

const ENV_PREFIX: &str = "HAIP_";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub engine: EngineConfig,
    pub enable_cors: bool,
    pub enable_compression: bool,
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            max_connections: 1024,
            engine: EngineConfig::default(),
            enable_cors: true,
            enable_compression: true,
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    /// Populate from `HAIP_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut flow_control = defaults.engine.flow_control.clone();
        flow_control.min_credits = env_u64("FLOW_MIN_CREDITS", flow_control.min_credits);
        flow_control.max_credits = env_u64("FLOW_MAX_CREDITS", flow_control.max_credits);
        flow_control.credit_threshold = env_u64("FLOW_CREDIT_THRESHOLD", flow_control.credit_threshold);
        flow_control.back_pressure_threshold =
            env_u64("FLOW_BACK_PRESSURE_THRESHOLD", flow_control.back_pressure_threshold);
        flow_control.adaptive_adjustment = env_bool("FLOW_ADAPTIVE_ADJUSTMENT", flow_control.adaptive_adjustment);
        flow_control.initial_credit_messages =
            env_u64("FLOW_INITIAL_CREDIT_MESSAGES", flow_control.initial_credit_messages);
        flow_control.initial_credit_bytes = env_u64("FLOW_INITIAL_CREDIT_BYTES", flow_control.initial_credit_bytes);

        let heartbeat = HeartbeatConfig {
            interval: env_duration_secs("HEARTBEAT_INTERVAL_SECS", defaults.engine.heartbeat.interval),
            timeout: env_duration_secs("HEARTBEAT_TIMEOUT_SECS", defaults.engine.heartbeat.timeout),
            max_missed: env_u64("HEARTBEAT_MAX_MISSED", defaults.engine.heartbeat.max_missed as u64) as u32,
        };

        let replay = ReplayConfig {
            max_count: env_u64("REPLAY_WINDOW_SIZE", defaults.engine.replay.max_count as u64) as usize,
            max_age: env_duration_secs("REPLAY_WINDOW_TIME_SECS", defaults.engine.replay.max_age),
        };

        Self {
            host: env_string("HOST", defaults.host),
            port: env_u64("PORT", defaults.port as u64) as u16,
            max_connections: env_u64("MAX_CONNECTIONS", defaults.max_connections as u64) as usize,
            engine: EngineConfig {
                flow_control,
                heartbeat,
                replay,
                max_concurrent_runs: env_u64("MAX_CONCURRENT_RUNS", defaults.engine.max_concurrent_runs as u64)
                    as usize,
                supported_majors: defaults.engine.supported_majors,
            },
            enable_cors: env_bool("ENABLE_CORS", defaults.enable_cors),
            enable_compression: env_bool("ENABLE_COMPRESSION", defaults.enable_compression),
            enable_logging: env_bool("ENABLE_LOGGING", defaults.enable_logging),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}{suffix}")
}

fn env_string(suffix: &str, default: String) -> String {
    env::var(env_key(suffix)).unwrap_or(default)
}

fn env_u64(suffix: &str, default: u64) -> u64 {
    env::var(env_key(suffix)).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(suffix: &str, default: bool) -> bool {
    env::var(env_key(suffix)).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_duration_secs(suffix: &str, default: Duration) -> Duration {
    env::var(env_key(suffix))
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
