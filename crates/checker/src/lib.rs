//! Smoke-test client for the `mercari-mcp` server.
//!
//! Starts the server as a child process, verifies that it advertises the
//! search tool, and calls the tool once with sample parameters.

pub mod check;
pub mod client;
pub mod error;

pub use check::{check_server, run_check, CheckOutcome, CheckReport};
pub use client::{spawn_server, McpClient, ServerProcess, ToolHost};
pub use error::{CheckError, CheckResult};
