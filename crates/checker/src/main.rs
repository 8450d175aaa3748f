// Server check binary

use mercari_check::check_server;
use mercari_mcp::tools::SEARCH_TOOL_NAME;
use std::process::ExitCode;

/// Server started when `MERCARI_MCP_SERVER` is unset
const SERVER_COMMAND: &str = "mercari-mcp";

fn search_params() -> serde_json::Value {
    serde_json::json!({
        "keyword": "iPhone15 Pro 256GB",
        "exclude_keywords": "11 12 13 14 16 ジャンク max",
        "min_price": 100000,
        "max_price": 150000
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let server = std::env::var("MERCARI_MCP_SERVER").unwrap_or_else(|_| SERVER_COMMAND.to_string());
    tracing::info!(server = %server, "Checking MCP server");

    let report = check_server(&server, SEARCH_TOOL_NAME, &search_params()).await;
    print!("{}", report.render());

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
