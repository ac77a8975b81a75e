//! MCP server assembly.
//!
//! [`Runtime`] owns every shared component and is handed to the transports
//! by construction; nothing lives in a global.

pub mod dispatch;
pub mod router;
pub mod session;
pub mod stdio;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::ports::{EditorPort, MemoryEditor, NullSnapshot, SnapshotPort};
use crate::resources::ResourceStore;
use crate::trace::TraceRecorder;
use dispatch::ToolRegistry;
use session::SessionStore;

/// Shared server state: sessions, tools, resources, ports, metrics.
pub struct Runtime {
    pub config: Config,
    pub sessions: SessionStore,
    pub registry: ToolRegistry,
    pub resources: ResourceStore,
    pub editor: Arc<dyn EditorPort>,
    pub snapshot: Arc<dyn SnapshotPort>,
    pub trace: Arc<TraceRecorder>,
    pub metrics: Arc<Metrics>,
}

impl Runtime {
    /// Build a runtime with the default in-memory ports.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_ports(config, Arc::new(MemoryEditor::new()), Arc::new(NullSnapshot))
    }

    /// Build a runtime bound to explicit editor/snapshot ports.
    #[must_use]
    pub fn with_ports(
        config: Config,
        editor: Arc<dyn EditorPort>,
        snapshot: Arc<dyn SnapshotPort>,
    ) -> Self {
        let trace = Arc::new(TraceRecorder::new());
        Self {
            sessions: SessionStore::new(
                config.session_ttl,
                config.require_revision,
                config.limits,
            ),
            registry: ToolRegistry::new(),
            resources: ResourceStore::new(Arc::clone(&trace)),
            editor,
            snapshot,
            trace,
            metrics: Arc::new(Metrics::new()),
            config,
        }
    }

    /// Announce a tool registry change on every attached stream.
    pub async fn notify_tool_registry_changed(&self) {
        self.sessions
            .broadcast("tool_registry_changed", &format!("{{\"tools\":{}}}", self.registry.len()))
            .await;
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").field("tools", &self.registry.len()).finish()
    }
}

/// The MCP server over a configured runtime.
pub struct McpServer {
    runtime: Arc<Runtime>,
}

impl McpServer {
    /// Create a server with default ports.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { runtime: Arc::new(Runtime::new(config)) }
    }

    /// Create a server around an existing runtime.
    #[must_use]
    pub fn with_runtime(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }

    /// The shared runtime.
    #[must_use]
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Run the HTTP transport until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error when the listener cannot bind or the server fails.
    pub async fn run_http(self) -> anyhow::Result<()> {
        let config = &self.runtime.config;
        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address: {e}"))?;

        tracing::info!(
            %addr,
            path = %config.base_path,
            tools = self.runtime.registry.len(),
            "starting HTTP MCP server"
        );

        let app = transport::create_router(Arc::clone(&self.runtime));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }

    /// Run the stdio transport until EOF.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        tracing::info!(tools = self.runtime.registry.len(), "starting stdio MCP server");
        stdio::run_stdio(self.runtime).await
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer").finish()
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install CTRL+C handler");
        return;
    }
    tracing::info!("received shutdown signal");
}
