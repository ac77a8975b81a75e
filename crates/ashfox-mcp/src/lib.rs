//! ashfox MCP server
//!
//! A Model Context Protocol (MCP) server that exposes a catalogue of typed
//! tools for driving a block-model editor - bones, cubes, textures, and
//! animations - to AI agents over HTTP with JSON-RPC 2.0 framing.
//!
//! # Features
//!
//! - **20 MCP tools**: project, model, texture, animation, export, composite
//! - **Revision-guarded state**: every mutation is gated by an
//!   optimistic-concurrency revision and committed atomically
//! - **Deterministic exports**: byte-stable geometry and animation artifacts
//! - **Session lifecycle**: TTL pruning, long-lived SSE streams, implicit
//!   discovery sessions
//!
//! # Example
//!
//! ```no_run
//! use ashfox_mcp::{config::Config, server::McpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     McpServer::new(config).run_http().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod ports;
pub mod presets;
pub mod resources;
pub mod server;
pub mod tools;
pub mod trace;

pub use config::Config;
pub use error::{ErrorCode, ToolError};
pub use server::McpServer;
