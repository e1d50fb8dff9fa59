//! List command implementation

use anyhow::Result;

use crate::client::HubClient;
use crate::output::{format_instances, print_error};

/// Execute the list command
pub async fn list_command(client: &HubClient, filter: Option<&str>) -> Result<()> {
    let instances = match client.list_instances().await {
        Ok(i) => i,
        Err(e) => {
            print_error(&format!("Failed to list instances: {}", e));
            return Err(e);
        }
    };

    let instances: Vec<_> = if let Some(filter) = filter {
        instances
            .into_iter()
            .filter(|i| i.instance_id.contains(filter))
            .collect()
    } else {
        instances
    };

    println!("Instances:");
    println!("{}", format_instances(&instances));

    Ok(())
}
