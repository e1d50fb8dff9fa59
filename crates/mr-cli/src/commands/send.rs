//! Send command implementation

use anyhow::Result;

use mr_core::api::SendMessageRequest;

use crate::client::HubClient;
use crate::output::{print_error, print_success};

/// Execute the send command
pub async fn send_command(
    client: &HubClient,
    instance_id: &str,
    target: &str,
    content: &str,
    media_ref: Option<String>,
) -> Result<()> {
    let request = SendMessageRequest {
        instance_id: instance_id.to_string(),
        target_address: target.to_string(),
        content: content.to_string(),
        media_ref,
        message_id: None,
    };

    let response = match client.send_message(&request).await {
        Ok(r) => r,
        Err(e) => {
            print_error(&format!("Failed to send message: {}", e));
            return Err(e);
        }
    };

    match response.provider_message_id {
        Some(provider_id) => print_success(&format!(
            "Sent message {} (provider id {})",
            response.message_id, provider_id
        )),
        None => print_success(&format!("Sent message {}", response.message_id)),
    }

    Ok(())
}
