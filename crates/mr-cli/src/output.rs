//! Output formatting utilities for the CLI
//!
//! This module provides functions for formatting hub data as
//! human-readable output for the terminal, including the instance
//! table, status displays, and colored status messages.

use tabled::{settings::Style, Table, Tabled};

use mr_core::api::{HubStatus, InstanceStatusInfo, InstanceSummary, PairingInfo};
use mr_core::time::elapsed_millis;

/// Format a list of instances as an ASCII table
///
/// # Arguments
/// * `instances` - Slice of instance summaries to display
///
/// # Returns
/// A formatted string suitable for terminal output, or "No instances
/// registered" if the list is empty.
pub fn format_instances(instances: &[InstanceSummary]) -> String {
    if instances.is_empty() {
        return "No instances registered".to_string();
    }

    #[derive(Tabled)]
    struct InstanceRow {
        #[tabled(rename = "INSTANCE ID")]
        id: String,
        #[tabled(rename = "CONNECTED")]
        connected: String,
        #[tabled(rename = "ADDRESS")]
        address: String,
        #[tabled(rename = "PAIRING")]
        pairing: String,
    }

    let rows: Vec<InstanceRow> = instances
        .iter()
        .map(|i| InstanceRow {
            id: truncate(&i.instance_id, 16),
            connected: if i.is_connected { "yes" } else { "no" }.to_string(),
            address: i
                .connected_address
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            pairing: if i.has_pairing_artifact {
                "available"
            } else {
                "-"
            }
            .to_string(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format hub status as a human-readable string
pub fn format_hub_status(status: &HubStatus) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Hub Status: {}\n",
        if status.running { "Running" } else { "Stopped" }
    ));
    output.push_str(&format!(
        "Uptime: {}\n",
        format_duration(status.uptime_secs)
    ));
    output.push_str(&format!("Instances: {}\n", status.instance_count));
    output.push_str(&format!("  Connected: {}\n", status.connected));
    output.push_str(&format!("  Pending: {}\n", status.pending));
    output.push_str(&format!("  Down: {}\n", status.down));

    output
}

/// Format a single instance's status as a human-readable string
pub fn format_instance_status(info: &InstanceStatusInfo) -> String {
    let mut output = String::new();

    output.push_str(&format!("Instance: {}\n", info.instance_id));
    output.push_str(&format!("Status: {}\n", info.status));
    if let Some(address) = &info.bound_address {
        output.push_str(&format!("Address: {}\n", address));
    }
    if info.last_transition_at > 0 {
        output.push_str(&format!(
            "Last change: {} ago\n",
            format_duration(elapsed_millis(info.last_transition_at) / 1000)
        ));
    }

    output
}

/// Format pairing info for the terminal
///
/// The artifact is printed on its own line so scripts can grab it with
/// a plain tail/grep.
pub fn format_pairing(info: &PairingInfo) -> String {
    if info.is_connected {
        return format!("Instance {} is already connected", info.instance_id);
    }
    match &info.pairing_artifact {
        Some(artifact) => format!(
            "Pairing code for {}:\n\n{}\n\nEnter this code in the provider app to link the instance.",
            info.instance_id, artifact
        ),
        None => format!(
            "No pairing code available for {} yet. Try again shortly.",
            info.instance_id
        ),
    }
}

/// Format duration in human-readable form
fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        format!("{}m {}s", mins, remaining_secs)
    } else if secs < 86400 {
        let hours = secs / 3600;
        let remaining_mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, remaining_mins)
    } else {
        let days = secs / 86400;
        let remaining_hours = (secs % 86400) / 3600;
        format!("{}d {}h", days, remaining_hours)
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.saturating_sub(3)])
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
