//! Hub Wire Protocol
//!
//! Request and reply shapes exchanged with the hub over the session channel.
//!
//! # Envelope
//!
//! ```text
//! request: { "hubId": "...", "timeout": 30,
//!            "hbus": { "cmd": "<plugin/engine?operation>", "id": N, "params": {...} } }
//! reply:   { "cmd": "...", "id": N, "code": 200, "msg": "OK", "data": {...} }
//! ```
//!
//! The hub is loose about scalar types: ids and codes come back either as
//! JSON numbers or as numeric strings, so reply accessors parse both.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::catalog::ActivityId;

/// Port the hub serves both HTTP discovery and the session channel on
pub const DEFAULT_HUB_PORT: u16 = 8088;

/// Advisory timeout (seconds) carried in every request; enforced by the hub
pub const HUB_REQUEST_TIMEOUT_SECS: u64 = 30;

/// One-shot HTTP discovery command
pub const CMD_DISCOVERY_INFO: &str = "connect.discoveryinfo?get";
/// Full engine configuration (activities, control groups)
pub const CMD_GET_CONFIG: &str = "vnd.logitech.harmony/vnd.logitech.harmony.engine?config";
/// Currently running activity
pub const CMD_GET_CURRENT_ACTIVITY: &str =
    "vnd.logitech.harmony/vnd.logitech.harmony.engine?getCurrentActivity";
/// Start an activity (or `-1` to power everything off)
pub const CMD_RUN_ACTIVITY: &str = "harmony.activityengine?runactivity";
/// Press or release a device button
pub const CMD_HOLD_ACTION: &str = "vnd.logitech.harmony/vnd.logitech.harmony.engine?holdAction";

/// Phase of a two-step button press
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonPhase {
    /// Button pushed down
    Press,
    /// Button let go
    Release,
}

impl ButtonPhase {
    fn status(self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::Release => "release",
        }
    }

    /// Timestamp offset the hub expects for this phase
    fn timestamp(self) -> &'static str {
        match self {
            Self::Press => "0",
            Self::Release => "50",
        }
    }
}

/// Inner `hbus` block of a request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hbus {
    cmd: String,
    id: u64,
    params: Value,
}

/// A request addressed to the hub
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HubRequest {
    #[serde(rename = "hubId")]
    hub_id: String,
    timeout: u64,
    hbus: Hbus,
}

impl HubRequest {
    /// Build a request for an arbitrary command
    pub fn new(hub_id: impl Into<String>, cmd: impl Into<String>, params: Value) -> Self {
        Self {
            hub_id: hub_id.into(),
            timeout: HUB_REQUEST_TIMEOUT_SECS,
            hbus: Hbus {
                cmd: cmd.into(),
                id: 0,
                params,
            },
        }
    }

    /// Request the full engine configuration
    pub fn get_config(hub_id: impl Into<String>) -> Self {
        Self::new(
            hub_id,
            CMD_GET_CONFIG,
            json!({ "verb": "get", "format": "json" }),
        )
    }

    /// Request the currently running activity
    pub fn get_current_activity(hub_id: impl Into<String>) -> Self {
        Self::new(
            hub_id,
            CMD_GET_CURRENT_ACTIVITY,
            json!({ "verb": "get", "format": "json" }),
        )
    }

    /// Request an activity switch
    pub fn run_activity(hub_id: impl Into<String>, activity: ActivityId) -> Self {
        Self::new(
            hub_id,
            CMD_RUN_ACTIVITY,
            json!({
                "async": "false",
                "timestamp": 0,
                "args": { "rule": "start" },
                "activityId": activity.to_string(),
            }),
        )
    }

    /// Press or release the button bound to `action`
    pub fn hold_action(hub_id: impl Into<String>, action: &Value, phase: ButtonPhase) -> Self {
        Self::new(
            hub_id,
            CMD_HOLD_ACTION,
            json!({
                "status": phase.status(),
                "timestamp": phase.timestamp(),
                "verb": "render",
                "action": action,
            }),
        )
    }

    /// Stamp the correlation id
    pub fn set_id(&mut self, id: u64) {
        self.hbus.id = id;
    }

    /// Correlation id
    pub fn id(&self) -> u64 {
        self.hbus.id
    }

    /// Command string
    pub fn cmd(&self) -> &str {
        &self.hbus.cmd
    }

    /// Operation parameters
    pub fn params(&self) -> &Value {
        &self.hbus.params
    }

    /// Hub the request is addressed to
    pub fn hub_id(&self) -> &str {
        &self.hub_id
    }
}

/// A reply from the hub
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HubResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl HubResponse {
    /// Build a reply carrying a status code
    pub fn with_code(code: u16) -> Self {
        Self {
            code: Some(json!(code)),
            ..Self::default()
        }
    }

    /// Attach a message
    #[must_use]
    pub fn msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// Attach a payload
    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Echo a correlation id
    #[must_use]
    pub fn correlated(mut self, id: u64) -> Self {
        self.id = Some(json!(id));
        self
    }

    /// Correlation id echoed by the hub
    pub fn correlation_id(&self) -> Option<u64> {
        self.id
            .as_ref()
            .and_then(lenient_i64)
            .and_then(|id| u64::try_from(id).ok())
    }

    /// Numeric status code
    pub fn status_code(&self) -> Option<u16> {
        self.code
            .as_ref()
            .and_then(lenient_i64)
            .and_then(|code| u16::try_from(code).ok())
    }

    /// Status message
    pub fn message(&self) -> Option<&str> {
        self.msg.as_deref()
    }

    /// Payload
    pub fn payload(&self) -> Option<&Value> {
        self.data.as_ref()
    }
}

/// Read an integer that may be encoded as a JSON number or a numeric string
pub(crate) fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_shape() {
        let mut request = HubRequest::get_current_activity("hub-42");
        request.set_id(7);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["hubId"], "hub-42");
        assert_eq!(json["timeout"], 30);
        assert_eq!(json["hbus"]["cmd"], CMD_GET_CURRENT_ACTIVITY);
        assert_eq!(json["hbus"]["id"], 7);
        assert_eq!(json["hbus"]["params"]["verb"], "get");
    }

    #[test]
    fn test_run_activity_params() {
        let request = HubRequest::run_activity("hub", ActivityId(31337));
        assert_eq!(request.cmd(), CMD_RUN_ACTIVITY);
        assert_eq!(request.params()["activityId"], "31337");
        assert_eq!(request.params()["args"]["rule"], "start");
    }

    #[test]
    fn test_hold_action_phases() {
        let action = json!("{\"command\":\"Mute\",\"deviceId\":\"1\"}");
        let press = HubRequest::hold_action("hub", &action, ButtonPhase::Press);
        let release = HubRequest::hold_action("hub", &action, ButtonPhase::Release);

        assert_eq!(press.params()["status"], "press");
        assert_eq!(press.params()["timestamp"], "0");
        assert_eq!(release.params()["status"], "release");
        assert_eq!(release.params()["timestamp"], "50");
        assert_eq!(release.params()["action"], action);
    }

    #[test]
    fn test_reply_lenient_scalars() {
        let reply: HubResponse =
            serde_json::from_str(r#"{"id":"12","code":"200","msg":"OK"}"#).unwrap();
        assert_eq!(reply.correlation_id(), Some(12));
        assert_eq!(reply.status_code(), Some(200));
        assert_eq!(reply.message(), Some("OK"));

        let reply: HubResponse = serde_json::from_str(r#"{"id":3,"code":202}"#).unwrap();
        assert_eq!(reply.correlation_id(), Some(3));
        assert_eq!(reply.status_code(), Some(202));
        assert!(reply.payload().is_none());
    }

    #[test]
    fn test_reply_missing_fields() {
        let reply: HubResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.correlation_id(), None);
        assert_eq!(reply.status_code(), None);
    }
}
