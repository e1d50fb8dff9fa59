//! HTTP API payloads for hub/CLI communication
//!
//! JSON bodies over localhost HTTP. Field names are camelCase on the wire
//! so external observers (dashboards, scripts) see conventional JSON.

use serde::{Deserialize, Serialize};

use crate::types::InstanceStatus;

/// One entry in the `GET /instances` listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    /// Instance identifier
    pub instance_id: String,
    /// Whether the instance can accept sends right now
    pub is_connected: bool,
    /// Provider-assigned address, present only while connected
    pub connected_address: Option<String>,
    /// Whether a pairing artifact is currently available
    pub has_pairing_artifact: bool,
}

/// Body for `POST /instances`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    /// Caller-supplied identifier; generated when absent
    pub instance_id: Option<String>,
    /// Display label
    pub name: Option<String>,
}

/// Response for `POST /instances` and `POST /instances/:id/reset`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceResponse {
    pub instance_id: String,
    pub status: InstanceStatus,
}

/// Response for `GET /instances/:id/qr`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingInfo {
    pub instance_id: String,
    /// Null once the instance is connected
    pub pairing_artifact: Option<String>,
    pub is_connected: bool,
}

/// Response for `GET /instances/:id/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatusInfo {
    pub instance_id: String,
    pub status: InstanceStatus,
    pub connected: bool,
    pub bound_address: Option<String>,
    /// Unix millis of the most recent status change
    pub last_transition_at: u64,
}

/// Response for `GET /status` and `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStatus {
    /// Process liveness flag, always true when the endpoint answers
    pub running: bool,
    /// Total registered instances
    pub instance_count: usize,
    /// Instances currently connected
    pub connected: usize,
    /// Instances connecting, awaiting pairing, or waiting on a recycle
    pub pending: usize,
    /// Instances disconnected or auth-failed
    pub down: usize,
    /// Seconds since process start
    pub uptime_secs: u64,
}

/// Body for `POST /send-message`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub instance_id: String,
    pub target_address: String,
    pub content: String,
    pub media_ref: Option<String>,
    /// Caller-supplied row identity; generated when absent
    pub message_id: Option<String>,
}

/// Response for `POST /send-message`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub success: bool,
    pub message_id: String,
    pub provider_message_id: Option<String>,
}

/// Error body returned with 4xx/5xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Taxonomy kind, e.g. "not_found" or "not_connected"
    pub error: String,
    /// Human-readable detail
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_uses_camel_case() {
        let summary = InstanceSummary {
            instance_id: "a".into(),
            is_connected: true,
            connected_address: Some("+5511999999999".into()),
            has_pairing_artifact: false,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"instanceId\""));
        assert!(json.contains("\"isConnected\""));
        assert!(json.contains("\"hasPairingArtifact\""));
    }

    #[test]
    fn test_create_request_fields_are_optional() {
        let req: CreateInstanceRequest = serde_json::from_str("{}").unwrap();
        assert!(req.instance_id.is_none());
        assert!(req.name.is_none());
    }

    #[test]
    fn test_status_info_serializes_status_lowercase() {
        let info = InstanceStatusInfo {
            instance_id: "a".into(),
            status: InstanceStatus::AwaitingPairing,
            connected: false,
            bound_address: None,
            last_transition_at: 1_700_000_000_000,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"awaiting_pairing\""));
        assert!(json.contains("\"boundAddress\":null"));
        assert!(json.contains("\"lastTransitionAt\":1700000000000"));
    }

    #[test]
    fn test_send_request_round_trip() {
        let json = r#"{"instanceId":"a","targetAddress":"+1","content":"hi","mediaRef":null,"messageId":null}"#;
        let req: SendMessageRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.instance_id, "a");
        assert_eq!(req.target_address, "+1");
        assert!(req.message_id.is_none());
    }
}
