// Standalone MCP server binary

use anyhow::{Context, Result};
use clap::Parser;
use mercari_core::HttpMarketplace;
use mercari_mcp::server::McpServer;
use mercari_mcp::tools::{SearchMercariTool, ToolRegistry};
use mercari_mcp::ServerConfig;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "mercari-mcp")]
#[command(about = "MCP server for filtered Mercari Japan searches", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MERCARI_MCP_CONFIG", default_value = "mercari-mcp.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    tracing::info!("Mercari MCP Server starting...");

    let config = ServerConfig::load(&args.config)?;
    tracing::info!(
        base_url = %config.marketplace.base_url,
        max_pages = config.marketplace.max_pages,
        base_exclusions = config.search.base_exclusions.len(),
        "Configuration loaded"
    );

    let marketplace = HttpMarketplace::new(config.marketplace.clone())
        .context("Failed to create marketplace client")?;

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchMercariTool::new(
        Arc::new(marketplace),
        config.search.clone(),
    )));

    tracing::info!("Registered {} tools", registry.len());

    let server = McpServer::new(registry);
    server.start().await?;

    Ok(())
}
