//! Utility functions for the ndnfw CLI

use anyhow::Result;
use rust_ndnfw_common::metrics::MetricsSnapshot;
use std::fmt::Write;
use std::time::Duration;

/// Format a (simulated) duration as a human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs == 0 {
        format!("{}ms", duration.subsec_millis())
    } else if total_secs < 60 {
        format!("{}.{:03}s", total_secs, duration.subsec_millis())
    } else {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    }
}

/// Lowercase hex dump of a wire packet, 16 bytes per line
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, chunk) in bytes.chunks(16).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let line: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let _ = write!(out, "{}", line.join(" "));
    }
    out
}

/// Print every non-zero counter of a metrics snapshot
pub fn print_metrics(snapshot: &MetricsSnapshot) -> Result<()> {
    let value = serde_json::to_value(snapshot)?;
    if let Some(fields) = value.as_object() {
        for (name, value) in fields {
            if value.as_f64() != Some(0.0) {
                println!("  {:<32}{}", name, value);
            }
        }
    }
    Ok(())
}

/// Print a section header in the CLI output
pub fn print_header(title: &str) {
    let separator = "=".repeat(title.len());
    println!("\n{}", title);
    println!("{}", separator);
}
