//! Error types for the ashfox MCP server.
//!
//! Tool services return typed [`ToolError`]s carrying a domain code; the
//! dispatcher turns them into MCP `CallToolResult` payloads. Transport-level
//! failures use JSON-RPC error codes from [`rpc`].

use serde::Serialize;
use serde_json::{Value, json};

/// JSON-RPC 2.0 error codes used by the router.
pub mod rpc {
    /// Malformed JSON.
    pub const PARSE_ERROR: i32 = -32700;

    /// Missing `jsonrpc`/`method`, or protocol mismatch.
    pub const INVALID_REQUEST: i32 = -32600;

    /// Unknown JSON-RPC method.
    pub const METHOD_NOT_FOUND: i32 = -32601;

    /// Invalid params, unknown tool, or unknown resource.
    pub const INVALID_PARAMS: i32 = -32602;

    /// Server not initialized / session required.
    pub const NOT_INITIALIZED: i32 = -32000;
}

/// Domain error codes surfaced in `ToolResponse.error.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Argument shape or value wrong.
    InvalidPayload,
    /// Preconditions unmet (no active project, missing revision, bad format).
    InvalidState,
    /// Optimistic-concurrency miss.
    InvalidStateRevisionMismatch,
    /// Requested output format not enabled.
    UnsupportedFormat,
    /// Editor/host I/O failed.
    IoError,
    /// Capability absent in the bound editor.
    NotImplemented,
    /// Resource URI or tool name unknown.
    ResourceNotFound,
    /// No tools exposed.
    ToolRegistryEmpty,
    /// Unclassified; `details.reason` is always set.
    Unknown,
}

impl ErrorCode {
    /// Stable wire name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidPayload => "invalid_payload",
            Self::InvalidState => "invalid_state",
            Self::InvalidStateRevisionMismatch => "invalid_state_revision_mismatch",
            Self::UnsupportedFormat => "unsupported_format",
            Self::IoError => "io_error",
            Self::NotImplemented => "not_implemented",
            Self::ResourceNotFound => "resource_not_found",
            Self::ToolRegistryEmpty => "tool_registry_empty",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the client should refresh (`tools/list` + `get_project_state`)
    /// and retry, up to two attempts.
    #[must_use]
    pub const fn retry_after_refresh(self) -> bool {
        matches!(
            self,
            Self::ResourceNotFound
                | Self::InvalidState
                | Self::InvalidStateRevisionMismatch
                | Self::ToolRegistryEmpty
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed tool failure.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{code}: {message}")]
pub struct ToolError {
    /// Domain code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Suggested remediation, e.g. a tool to call first.
    pub fix: Option<String>,
    /// Structured context.
    pub details: Option<Value>,
}

impl ToolError {
    /// Create an error with just a code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), fix: None, details: None }
    }

    /// Attach a remediation hint.
    #[must_use]
    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Argument shape or value wrong.
    #[must_use]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPayload, message)
    }

    /// Preconditions unmet.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    /// Missing `ifRevision` while the revision policy is on.
    #[must_use]
    pub fn revision_required() -> Self {
        Self::invalid_state("revision required for mutating tools")
            .with_fix("call get_project_state and pass its revision as ifRevision")
    }

    /// Optimistic-concurrency miss.
    #[must_use]
    pub fn revision_mismatch(expected: impl Into<String>, current: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidStateRevisionMismatch, "project state revision mismatch")
            .with_fix("call get_project_state and retry with the fresh revision")
            .with_details(json!({
                "expected": expected.into(),
                "currentRevision": current.into(),
            }))
    }

    /// Requested output format not enabled.
    #[must_use]
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        let format = format.into();
        Self::new(ErrorCode::UnsupportedFormat, format!("unsupported format: {format}"))
            .with_details(json!({ "format": format }))
    }

    /// Editor/host I/O failed.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IoError, message)
    }

    /// Capability absent in the bound editor.
    #[must_use]
    pub fn not_implemented(capability: impl Into<String>) -> Self {
        let capability = capability.into();
        Self::new(
            ErrorCode::NotImplemented,
            format!("editor does not support {capability}"),
        )
        .with_details(json!({ "capability": capability }))
    }

    /// Resource URI or tool name unknown.
    #[must_use]
    pub fn resource_not_found(what: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, what)
    }

    /// No tools exposed.
    #[must_use]
    pub fn registry_empty() -> Self {
        Self::new(ErrorCode::ToolRegistryEmpty, "no tools registered")
    }

    /// Unclassified failure; always records the reason in details.
    #[must_use]
    pub fn unknown(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(ErrorCode::Unknown, reason.clone())
            .with_details(json!({ "reason": reason }))
    }

    /// Serialize as the `ToolResponse.error` wire object.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        let mut error = json!({
            "code": self.code.as_str(),
            "message": self.message,
        });
        if let Some(fix) = &self.fix {
            error["fix"] = json!(fix);
        }
        if let Some(details) = &self.details {
            error["details"] = details.clone();
        }
        error
    }
}

/// Failures crossing the editor/snapshot port boundary.
#[derive(thiserror::Error, Debug)]
pub enum PortError {
    /// The host operation failed.
    #[error("editor I/O failed: {0}")]
    Io(String),

    /// The bound editor lacks the capability.
    #[error("capability not implemented: {0}")]
    NotImplemented(String),
}

impl From<PortError> for ToolError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Io(detail) => Self::io(detail),
            PortError::NotImplemented(capability) => Self::not_implemented(capability),
        }
    }
}

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_names() {
        assert_eq!(ErrorCode::InvalidPayload.as_str(), "invalid_payload");
        assert_eq!(
            ErrorCode::InvalidStateRevisionMismatch.as_str(),
            "invalid_state_revision_mismatch"
        );
        assert_eq!(serde_json::to_value(ErrorCode::IoError).unwrap(), json!("io_error"));
    }

    #[test]
    fn test_retry_after_refresh() {
        assert!(ErrorCode::ResourceNotFound.retry_after_refresh());
        assert!(ErrorCode::InvalidState.retry_after_refresh());
        assert!(ErrorCode::InvalidStateRevisionMismatch.retry_after_refresh());
        assert!(ErrorCode::ToolRegistryEmpty.retry_after_refresh());
        assert!(!ErrorCode::InvalidPayload.retry_after_refresh());
        assert!(!ErrorCode::IoError.retry_after_refresh());
    }

    #[test]
    fn test_revision_mismatch_details() {
        let err = ToolError::revision_mismatch("r0", "r1");
        let wire = err.to_wire();
        assert_eq!(wire["code"], "invalid_state_revision_mismatch");
        assert_eq!(wire["details"]["expected"], "r0");
        assert_eq!(wire["details"]["currentRevision"], "r1");
    }

    #[test]
    fn test_unknown_populates_reason() {
        let wire = ToolError::unknown("boom").to_wire();
        assert_eq!(wire["details"]["reason"], "boom");
    }

    #[test]
    fn test_port_error_mapping() {
        let err: ToolError = PortError::NotImplemented("preview".to_string()).into();
        assert_eq!(err.code, ErrorCode::NotImplemented);
        let err: ToolError = PortError::Io("disk full".to_string()).into();
        assert_eq!(err.code, ErrorCode::IoError);
    }
}
