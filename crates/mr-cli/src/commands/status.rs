//! Status command implementation

use anyhow::Result;

use crate::client::HubClient;
use crate::output::{format_hub_status, format_instance_status, print_error};

/// Execute the status command
///
/// Without an instance argument this shows hub-wide counts; with one it
/// shows that instance's lifecycle state.
pub async fn status_command(client: &HubClient, instance: Option<&str>) -> Result<()> {
    match instance {
        Some(id) => {
            let info = match client.instance_status(id).await {
                Ok(i) => i,
                Err(e) => {
                    print_error(&format!("Failed to get status for {}: {}", id, e));
                    return Err(e);
                }
            };
            println!("{}", format_instance_status(&info));
        }
        None => {
            let status = match client.hub_status().await {
                Ok(s) => s,
                Err(e) => {
                    print_error(&format!("Failed to get hub status: {}", e));
                    print_error("Is the hub running? Try: mr-hub");
                    return Err(e);
                }
            };
            println!("{}", format_hub_status(&status));
        }
    }

    Ok(())
}
