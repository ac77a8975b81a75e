//! Request counters and SSE gauges, rendered as Prometheus text.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Counter key: JSON-RPC method (or HTTP method when no RPC was parsed) plus
/// response status.
type RequestKey = (String, u16);

/// Process-wide metrics registry.
#[derive(Default)]
pub struct Metrics {
    requests: RwLock<HashMap<RequestKey, Arc<AtomicU64>>>,
    sse_active: AtomicI64,
    sse_opened: AtomicU64,
}

impl Metrics {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one handled request.
    pub fn record_request(&self, method: &str, status: u16) {
        let key = (method.to_string(), status);
        if let Ok(read) = self.requests.read() {
            if let Some(counter) = read.get(&key) {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        if let Ok(mut write) = self.requests.write() {
            write.entry(key).or_default().fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Mark an SSE stream opened.
    pub fn sse_opened(&self) {
        self.sse_active.fetch_add(1, Ordering::Relaxed);
        self.sse_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark an SSE stream closed.
    pub fn sse_closed(&self) {
        self.sse_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Currently attached SSE streams.
    #[must_use]
    pub fn sse_active(&self) -> i64 {
        self.sse_active.load(Ordering::Relaxed)
    }

    /// Render the registry as Prometheus exposition text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# HELP mcp_requests_total Total MCP requests handled.\n");
        out.push_str("# TYPE mcp_requests_total counter\n");

        let mut rows: Vec<(RequestKey, u64)> = self
            .requests
            .read()
            .map(|read| {
                read.iter()
                    .map(|(key, counter)| (key.clone(), counter.load(Ordering::Relaxed)))
                    .collect()
            })
            .unwrap_or_default();
        rows.sort();
        for ((method, status), count) in rows {
            out.push_str(&format!(
                "mcp_requests_total{{method=\"{method}\",status=\"{status}\"}} {count}\n"
            ));
        }

        out.push_str("# HELP mcp_sse_connections_active Currently attached SSE streams.\n");
        out.push_str("# TYPE mcp_sse_connections_active gauge\n");
        out.push_str(&format!(
            "mcp_sse_connections_active {}\n",
            self.sse_active.load(Ordering::Relaxed)
        ));
        out.push_str("# HELP mcp_sse_connections_opened_total SSE streams opened since start.\n");
        out.push_str("# TYPE mcp_sse_connections_opened_total counter\n");
        out.push_str(&format!(
            "mcp_sse_connections_opened_total {}\n",
            self.sse_opened.load(Ordering::Relaxed)
        ));
        out
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").field("sse_active", &self.sse_active()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_counter() {
        let metrics = Metrics::new();
        metrics.record_request("tools/call", 200);
        metrics.record_request("tools/call", 200);
        metrics.record_request("POST", 413);

        let text = metrics.render();
        assert!(text.contains("mcp_requests_total{method=\"tools/call\",status=\"200\"} 2"));
        assert!(text.contains("mcp_requests_total{method=\"POST\",status=\"413\"} 1"));
    }

    #[test]
    fn test_sse_gauge() {
        let metrics = Metrics::new();
        metrics.sse_opened();
        metrics.sse_opened();
        metrics.sse_closed();
        assert_eq!(metrics.sse_active(), 1);

        let text = metrics.render();
        assert!(text.contains("mcp_sse_connections_active 1"));
        assert!(text.contains("mcp_sse_connections_opened_total 2"));
    }

    #[test]
    fn test_render_is_sorted() {
        let metrics = Metrics::new();
        metrics.record_request("tools/list", 200);
        metrics.record_request("initialize", 200);
        let text = metrics.render();
        let a = text.find("initialize").unwrap();
        let b = text.find("tools/list").unwrap();
        assert!(a < b);
    }
}
