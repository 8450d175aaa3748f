// MCP (Model Context Protocol) server exposing the Mercari search tool

pub mod config;
pub mod protocol;
pub mod server;
pub mod tools;

pub use config::{SearchSettings, ServerConfig};
pub use server::McpServer;
