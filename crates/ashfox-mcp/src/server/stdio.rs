//! Stdio transport: line-delimited JSON-RPC sharing the HTTP router.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::Runtime;
use super::router::{self, RpcHeaders};

/// Serve JSON-RPC over stdin/stdout until EOF.
pub async fn run_stdio(runtime: Arc<Runtime>) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    // stdio has no session header; track the current session locally
    let mut current_session: Option<String> = None;

    tracing::info!("MCP stdio server ready, waiting for requests");

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            tracing::info!("stdin closed, shutting down");
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let headers = RpcHeaders { session_id: current_session.clone(), ..Default::default() };
        let outcome = router::handle_rpc(&runtime, &headers, trimmed.as_bytes()).await;
        if let Some(session) = &outcome.session {
            current_session = Some(session.id.clone());
        }

        // accepted notifications produce no output line
        if let Some(response) = &outcome.response {
            let serialized = serde_json::to_string(response)?;
            stdout.write_all(serialized.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
