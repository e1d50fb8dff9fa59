//! Instance lifecycle commands

use std::time::Duration;

use anyhow::Result;

use crate::client::HubClient;
use crate::output::{format_pairing, print_error, print_info, print_success};

/// Execute the create command
pub async fn create_command(
    client: &HubClient,
    instance_id: Option<String>,
    name: Option<String>,
) -> Result<()> {
    let response = match client.create_instance(instance_id, name).await {
        Ok(r) => r,
        Err(e) => {
            print_error(&format!("Failed to create instance: {}", e));
            return Err(e);
        }
    };

    print_success(&format!(
        "Created instance {} ({})",
        response.instance_id, response.status
    ));
    print_info(&format!(
        "Run `m-relay qr {}` to get the pairing code",
        response.instance_id
    ));

    Ok(())
}

/// Execute the qr command
///
/// With `wait` the command polls until a pairing artifact shows up or
/// the instance connects, since a fresh instance takes a moment to
/// produce one.
pub async fn qr_command(client: &HubClient, instance_id: &str, wait: bool) -> Result<()> {
    let deadline = std::time::Instant::now() + Duration::from_secs(60);

    loop {
        let info = match client.pairing(instance_id).await {
            Ok(i) => i,
            Err(e) => {
                print_error(&format!("Failed to get pairing code: {}", e));
                return Err(e);
            }
        };

        let settled = info.is_connected || info.pairing_artifact.is_some();
        if settled || !wait || std::time::Instant::now() >= deadline {
            println!("{}", format_pairing(&info));
            return Ok(());
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Execute the reset command
pub async fn reset_command(client: &HubClient, instance_id: &str) -> Result<()> {
    let response = match client.reset_instance(instance_id).await {
        Ok(r) => r,
        Err(e) => {
            print_error(&format!("Failed to reset instance: {}", e));
            return Err(e);
        }
    };

    print_success(&format!(
        "Reset instance {} ({})",
        response.instance_id, response.status
    ));
    print_info("The instance will need to pair again");

    Ok(())
}

/// Execute the disconnect command
pub async fn disconnect_command(client: &HubClient, instance_id: &str) -> Result<()> {
    if let Err(e) = client.disconnect_instance(instance_id).await {
        print_error(&format!("Failed to disconnect instance: {}", e));
        return Err(e);
    }

    print_success(&format!("Disconnected instance {}", instance_id));

    Ok(())
}
