//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]`. Each type implements
//! [`Default`] with production default values, and `#[serde(default)]`
//! allows partial JSON — missing fields get their default during
//! deserialization.

use serde::{Deserialize, Serialize};

/// Root settings type for the drip sender.
///
/// Loaded from `~/.drip/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// # JSON Format
///
/// All field names are camelCase. Example:
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "transport": { "gatewayUrl": "ws://gateway:8765/ws" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DripSettings {
    /// HTTP control-surface settings.
    pub server: ServerSettings,
    /// Credential store settings.
    pub session: SessionSettings,
    /// Platform gateway transport settings.
    pub transport: TransportSettings,
    /// Reconnect backoff policy.
    pub reconnect: ReconnectSettings,
    /// Dispatch loop settings.
    pub dispatch: DispatchSettings,
}

impl Default for DripSettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            session: SessionSettings::default(),
            transport: TransportSettings::default(),
            reconnect: ReconnectSettings::default(),
            dispatch: DispatchSettings::default(),
        }
    }
}

/// HTTP control-surface settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Listen port for the control surface.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Credential store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Directory holding the durable credential record.
    pub store_dir: String,
    /// Fixed account identity the store is keyed by.
    pub account: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            store_dir: "~/.drip/session".to_string(),
            account: "default".to_string(),
        }
    }
}

/// Platform gateway transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// WebSocket URL of the platform gateway.
    pub gateway_url: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            gateway_url: "ws://127.0.0.1:8765/ws".to_string(),
        }
    }
}

/// Reconnect backoff policy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Maximum consecutive failures before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_attempts: 10,
        }
    }
}

/// What to do when an individual send fails mid-job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicySetting {
    /// Log the failure and move on to the next message (default).
    LogAndContinue,
    /// End the job on the first failure.
    Abort,
    /// Retry the same message a bounded number of times, then move on.
    Retry,
}

/// Dispatch loop settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchSettings {
    /// Floor on the per-message delay, in milliseconds. Supplied delays
    /// below this are clamped, not rejected.
    pub min_delay_ms: u64,
    /// Per-message failure handling.
    pub failure_policy: FailurePolicySetting,
    /// Retry attempts per message when the policy is `retry`.
    pub retry_attempts: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            min_delay_ms: 1_000,
            failure_policy: FailurePolicySetting::LogAndContinue,
            retry_attempts: 3,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_contract() {
        let s = DripSettings::default();
        assert_eq!(s.server.port, 3000);
        assert_eq!(s.session.store_dir, "~/.drip/session");
        assert_eq!(s.reconnect.max_attempts, 10);
        assert_eq!(s.dispatch.min_delay_ms, 1_000);
        assert_eq!(
            s.dispatch.failure_policy,
            FailurePolicySetting::LogAndContinue
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: DripSettings = serde_json::from_str(r#"{"server": {"port": 9090}}"#).unwrap();
        assert_eq!(s.server.port, 9090);
        assert_eq!(s.dispatch.min_delay_ms, 1_000);
    }

    #[test]
    fn camel_case_wire_format() {
        let json = serde_json::to_value(DripSettings::default()).unwrap();
        assert!(json["transport"].get("gatewayUrl").is_some());
        assert!(json["reconnect"].get("baseDelayMs").is_some());
        assert!(json["dispatch"].get("failurePolicy").is_some());
    }

    #[test]
    fn failure_policy_snake_case_values() {
        let v = serde_json::to_value(FailurePolicySetting::LogAndContinue).unwrap();
        assert_eq!(v, "log_and_continue");
        let p: FailurePolicySetting = serde_json::from_value("retry".into()).unwrap();
        assert_eq!(p, FailurePolicySetting::Retry);
    }
}
