//! Request dispatcher.
//!
//! [`SqlMcpServer::handle_line`] turns one input line into at most one
//! response. Every failure is converted into a JSON-RPC error response, so a
//! bad request can never stop the read loop.

use crate::config::Config;
use crate::database::{QueryExecutor, SqlDriver};
use crate::error::ProtocolError;
use crate::protocol::{
    CallToolParams, Incoming, InitializeResult, JsonRpcResponse, ListToolsResult, Method,
    RequestEnvelope,
};
use crate::tools::{catalog, Tool};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The SQL MCP server: tool handlers plus the JSON-RPC routing around them.
pub struct SqlMcpServer {
    /// Query pipeline. Also owns the shared configuration.
    pub(crate) executor: QueryExecutor,
}

impl SqlMcpServer {
    /// Create a server that executes queries through `driver`.
    pub fn new(config: Arc<Config>, driver: Arc<dyn SqlDriver>) -> Self {
        Self::with_executor(QueryExecutor::new(config, driver))
    }

    /// Create a server around a preconfigured executor.
    pub fn with_executor(executor: QueryExecutor) -> Self {
        info!(
            "Server ready with {} configured database(s), default: {}",
            executor.config().registry.len(),
            executor
                .config()
                .registry
                .default_database()
                .unwrap_or("not set")
        );
        Self { executor }
    }

    /// Shared configuration.
    pub fn config(&self) -> &Config {
        self.executor.config()
    }

    /// Handle one input line. Returns `None` when nothing must be written
    /// (blank lines and notifications).
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!("Unparsable request line: {}", e);
                return Some(JsonRpcResponse::error(
                    None,
                    &ProtocolError::ParseError(e.to_string()),
                ));
            }
        };

        let request = match RequestEnvelope::from_value(value) {
            Ok(Incoming::Request(request)) => request,
            Ok(Incoming::Notification { method }) => {
                debug!(
                    "Dropping notification {}",
                    method.as_deref().unwrap_or("(no method)")
                );
                return None;
            }
            Err((id, e)) => {
                warn!("Invalid request: {}", e);
                return Some(JsonRpcResponse::error(id, &e));
            }
        };

        debug!("Request {} {}", request.id, request.method);
        let id = request.id;
        match self.dispatch(&request.method, request.params).await {
            Ok(result) => Some(JsonRpcResponse::success(id, result)),
            Err(e) => {
                debug!("Request {} failed: {}", id, e);
                Some(JsonRpcResponse::error(Some(id), &e))
            }
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, ProtocolError> {
        let method = Method::from_name(method)
            .ok_or_else(|| ProtocolError::MethodNotFound(method.to_string()))?;

        match method {
            Method::Initialize => to_value(&InitializeResult::default()),
            Method::Ping => Ok(json!({})),
            Method::ToolsList => to_value(&ListToolsResult {
                tools: catalog(&self.config().registry),
            }),
            Method::ToolsCall => {
                let params = CallToolParams::from_params(params)?;
                let tool = Tool::from_name(&params.name)
                    .ok_or_else(|| ProtocolError::ToolNotFound(params.name.clone()))?;
                let result = self.call_tool(tool, params.arguments).await?;
                to_value(&result)
            }
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(value)
        .map_err(|e| ProtocolError::Internal(format!("Failed to serialize result: {}", e).into()))
}
