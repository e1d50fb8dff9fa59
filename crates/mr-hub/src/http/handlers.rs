//! Request handlers
//!
//! Thin translation between HTTP payloads and registry/dispatcher calls.
//! All domain decisions live below this layer.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use mr_core::api::{
    CreateInstanceRequest, CreateInstanceResponse, HubStatus, InstanceStatusInfo, InstanceSummary,
    PairingInfo, SendMessageRequest, SendMessageResponse,
};
use mr_core::error::RelayError;
use mr_core::types::{InstanceId, MessageId, OutgoingMessage};

use crate::dispatch::{DispatchOutcome, REASON_INSTANCE_NOT_CONNECTED, REASON_INSTANCE_NOT_FOUND};
use crate::health::aggregate_status;
use crate::state::HubState;

use super::ApiError;

pub async fn list_instances(State(state): State<Arc<HubState>>) -> Json<Vec<InstanceSummary>> {
    let mut summaries: Vec<InstanceSummary> = state
        .registry
        .list_snapshots()
        .into_iter()
        .map(|record| InstanceSummary {
            instance_id: record.id.to_string(),
            is_connected: record.status.is_connected(),
            connected_address: record.bound_address,
            has_pairing_artifact: record.pairing_artifact.is_some(),
        })
        .collect();
    summaries.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
    Json(summaries)
}

pub async fn create_instance(
    State(state): State<Arc<HubState>>,
    Json(request): Json<CreateInstanceRequest>,
) -> Result<(StatusCode, Json<CreateInstanceResponse>), ApiError> {
    let id = match request.instance_id {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(RelayError::InvalidRequest(
                    "instanceId must not be empty".into(),
                )
                .into());
            }
            InstanceId::new(trimmed)
        }
        None => InstanceId::generate(),
    };

    let entry = state
        .registry
        .create_and_start(id.clone(), request.name)
        .await?;

    tracing::info!("Created instance {} via API", id);
    Ok((
        StatusCode::CREATED,
        Json(CreateInstanceResponse {
            instance_id: id.to_string(),
            status: entry.handle.status(),
        }),
    ))
}

pub async fn instance_pairing(
    State(state): State<Arc<HubState>>,
    Path(id): Path<String>,
) -> Result<Json<PairingInfo>, ApiError> {
    let id = InstanceId::new(id);
    let entry = state
        .registry
        .get(&id)
        .ok_or_else(|| RelayError::NotFound(id.to_string()))?;

    let record = entry.handle.snapshot();
    Ok(Json(PairingInfo {
        instance_id: record.id.to_string(),
        pairing_artifact: record.pairing_artifact,
        is_connected: record.status.is_connected(),
    }))
}

pub async fn instance_status(
    State(state): State<Arc<HubState>>,
    Path(id): Path<String>,
) -> Result<Json<InstanceStatusInfo>, ApiError> {
    let id = InstanceId::new(id);
    let entry = state
        .registry
        .get(&id)
        .ok_or_else(|| RelayError::NotFound(id.to_string()))?;

    let record = entry.handle.snapshot();
    Ok(Json(InstanceStatusInfo {
        instance_id: record.id.to_string(),
        connected: record.status.is_connected(),
        status: record.status,
        bound_address: record.bound_address,
        last_transition_at: record.last_transition_at,
    }))
}

/// Tear the instance down and recreate it under the same ID.
///
/// The recreated session starts from a fresh transport, so a new pairing
/// artifact is expected shortly after this returns.
pub async fn reset_instance(
    State(state): State<Arc<HubState>>,
    Path(id): Path<String>,
) -> Result<Json<CreateInstanceResponse>, ApiError> {
    let id = InstanceId::new(id);
    let entry = state
        .registry
        .get(&id)
        .ok_or_else(|| RelayError::NotFound(id.to_string()))?;
    let name = entry.handle.snapshot().name;

    state.registry.remove(&id).await;
    let entry = state.registry.create_and_start(id.clone(), name).await?;

    tracing::info!("Reset instance {}", id);
    Ok(Json(CreateInstanceResponse {
        instance_id: id.to_string(),
        status: entry.handle.status(),
    }))
}

pub async fn disconnect_instance(
    State(state): State<Arc<HubState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = InstanceId::new(id);
    if !state.registry.remove(&id).await {
        return Err(RelayError::NotFound(id.to_string()).into());
    }

    tracing::info!("Disconnected instance {} via API", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn hub_status(State(state): State<Arc<HubState>>) -> Json<HubStatus> {
    Json(aggregate_status(&state.registry, state.started_at))
}

pub async fn send_message(
    State(state): State<Arc<HubState>>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    if request.instance_id.trim().is_empty() {
        return Err(RelayError::InvalidRequest("instanceId must not be empty".into()).into());
    }
    if request.target_address.trim().is_empty() {
        return Err(
            RelayError::InvalidRequest("targetAddress must not be empty".into()).into(),
        );
    }

    let message_id = match request.message_id {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(RelayError::InvalidRequest(
                    "messageId must not be empty".into(),
                )
                .into());
            }
            let id = MessageId::new(trimmed);
            // Producers own retry policy, so a reused ID is rejected
            if state.outbox.get(&id).await.map_err(RelayError::from)?.is_some() {
                return Err(RelayError::AlreadyExists(id.to_string()).into());
            }
            id
        }
        None => MessageId::generate(),
    };

    let row = OutgoingMessage::new(
        message_id.clone(),
        InstanceId::new(request.instance_id.clone()),
        request.target_address,
        request.content,
        request.media_ref,
    );

    let outcome = state
        .dispatcher
        .send_now(row)
        .await
        .map_err(RelayError::from)?;

    match outcome {
        DispatchOutcome::Sent {
            provider_message_id,
        } => Ok(Json(SendMessageResponse {
            success: true,
            message_id: message_id.to_string(),
            provider_message_id: Some(provider_message_id),
        })),
        DispatchOutcome::Failed { reason } => {
            let err = if reason == REASON_INSTANCE_NOT_FOUND {
                RelayError::NotFound(request.instance_id)
            } else if reason == REASON_INSTANCE_NOT_CONNECTED {
                RelayError::NotConnected(request.instance_id)
            } else {
                RelayError::TransportFailure(reason)
            };
            Err(err.into())
        }
        DispatchOutcome::AlreadyDone | DispatchOutcome::InFlight => {
            Err(RelayError::AlreadyExists(message_id.to_string()).into())
        }
    }
}
