//! Server check: connect, list tools, call the search tool, report.

use crate::client::{spawn_server, ToolHost};
use crate::error::CheckError;
use mercari_core::ResultItem;
use serde_json::Value;
use tracing::{error, info, warn};

/// Number of listings printed in the success summary
pub const MAX_LISTED_ITEMS: usize = 10;

/// Terminal state of a server check
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// The server could not be started or did not complete the handshake.
    ConnectFailed { reason: String },
    /// Connected, but `tools/list` failed.
    ListFailed { reason: String },
    /// Connected, but the expected tool is not advertised. No call is made.
    ToolMissing { available: Vec<String> },
    /// The tool call failed or returned an unusable payload.
    CallFailed { reason: String },
    /// The tool call succeeded without any content.
    NoContent,
    /// The tool call succeeded.
    Succeeded { items: Vec<ResultItem> },
}

/// Check result plus the context needed to present it
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub server: String,
    pub tool: String,
    pub outcome: CheckOutcome,
}

impl CheckReport {
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            CheckOutcome::NoContent | CheckOutcome::Succeeded { .. }
        )
    }

    /// Human-readable summary for the terminal
    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        match &self.outcome {
            CheckOutcome::ConnectFailed { reason } => {
                lines.push(FAILURE_HEADER.to_string());
                lines.push(format!("Could not connect to '{}': {}", self.server, reason));
            }
            CheckOutcome::ListFailed { reason } => {
                lines.push(FAILURE_HEADER.to_string());
                lines.push(format!(
                    "Connected to the server, but failed to list tools: {}",
                    reason
                ));
            }
            CheckOutcome::ToolMissing { available } => {
                lines.push(FAILURE_HEADER.to_string());
                lines.push(format!(
                    "Connected to the server, but the expected tool '{}' was not found.",
                    self.tool
                ));
                lines.push(format!("Available tools: {:?}", available));
            }
            CheckOutcome::CallFailed { reason } => {
                lines.push(FAILURE_HEADER.to_string());
                lines.push(format!("The tool '{}' failed: {}", self.tool, reason));
            }
            CheckOutcome::NoContent => {
                lines.push(RESULTS_HEADER.to_string());
                lines.push("Tool executed but returned no results.".to_string());
                self.success_footer(&mut lines);
            }
            CheckOutcome::Succeeded { items } if items.is_empty() => {
                lines.push(RESULTS_HEADER.to_string());
                lines.push("No items found matching the criteria.".to_string());
                self.success_footer(&mut lines);
            }
            CheckOutcome::Succeeded { items } => {
                lines.push(format!(
                    "\n--- Mercari Search Results (First {}) ---",
                    MAX_LISTED_ITEMS
                ));
                lines.extend(items.iter().take(MAX_LISTED_ITEMS).map(|item| {
                    format!("- {} ({} JPY): {}", item.name, format_price(item.price), item.url)
                }));
                if items.len() > MAX_LISTED_ITEMS {
                    lines.push(format!("... and {} more.", items.len() - MAX_LISTED_ITEMS));
                }
                self.success_footer(&mut lines);
            }
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    fn success_footer(&self, lines: &mut Vec<String>) {
        lines.push("\n--- Server Check Result: SUCCESS ---".to_string());
        lines.push(format!(
            "The server is running, '{}' tool is available and was called successfully.",
            self.tool
        ));
    }
}

const FAILURE_HEADER: &str = "\n--- Server Check Result: FAILURE ---";

const RESULTS_HEADER: &str = "\n--- Mercari Search Results ---";

/// Whole prices keep one decimal place (`120000.0`), others print as-is
fn format_price(price: f64) -> String {
    if price.fract() == 0.0 && price.abs() < 1e16 {
        format!("{:.1}", price)
    } else {
        price.to_string()
    }
}

/// Run the list/find/call sequence against a connected host
pub async fn run_check<H>(host: &mut H, tool: &str, params: &Value) -> CheckOutcome
where
    H: ToolHost + ?Sized,
{
    info!("Listing available tools...");
    let tools = match host.list_tools().await {
        Ok(tools) => tools,
        Err(e) => {
            error!(error = %e, "Failed to list tools");
            return CheckOutcome::ListFailed {
                reason: e.to_string(),
            };
        }
    };

    let available: Vec<String> = tools.into_iter().map(|t| t.name).collect();
    info!(tools = ?available, "Found tools");

    if !available.iter().any(|name| name == tool) {
        error!(tool, "Expected tool not found");
        return CheckOutcome::ToolMissing { available };
    }

    info!(tool, params = %params, "Calling tool");
    let result = match host.call_tool(tool, params.clone()).await {
        Ok(result) => result,
        Err(e) => {
            error!(tool, error = %e, "Tool call failed");
            return CheckOutcome::CallFailed {
                reason: e.to_string(),
            };
        }
    };

    if result.is_error() {
        let reason = result
            .first_text()
            .unwrap_or("tool reported an error")
            .to_string();
        error!(tool, %reason, "Tool reported an error");
        return CheckOutcome::CallFailed { reason };
    }

    let Some(text) = result.first_text() else {
        warn!(tool, "Tool call returned no content");
        return CheckOutcome::NoContent;
    };

    match serde_json::from_str::<Vec<ResultItem>>(text) {
        Ok(items) => {
            info!(tool, count = items.len(), "Tool call successful");
            CheckOutcome::Succeeded { items }
        }
        Err(e) => CheckOutcome::CallFailed {
            reason: format!("unexpected result payload: {}", e),
        },
    }
}

/// Start the server from `command_line`, check it, and shut it down
pub async fn check_server(command_line: &str, tool: &str, params: &Value) -> CheckReport {
    let report = |outcome| CheckReport {
        server: command_line.to_string(),
        tool: tool.to_string(),
        outcome,
    };

    let mut parts = command_line.split_whitespace().map(str::to_string);
    let Some(program) = parts.next() else {
        return report(CheckOutcome::ConnectFailed {
            reason: "empty server command".to_string(),
        });
    };
    let args: Vec<String> = parts.collect();

    let mut process = match spawn_server(&program, &args).await {
        Ok(process) => process,
        Err(e) => {
            match &e {
                CheckError::ServerNotFound(_) => {
                    error!(server = %program, "Server executable not found, is it installed and on PATH?")
                }
                _ => error!(error = %e, "Failed to connect"),
            }
            return report(CheckOutcome::ConnectFailed {
                reason: e.to_string(),
            });
        }
    };
    info!("Successfully connected to the server.");

    let outcome = run_check(&mut process.client, tool, params).await;
    process.shutdown().await;

    report(outcome)
}
