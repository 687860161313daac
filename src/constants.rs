//! Centralized constants for the SQL MCP Server.
//!
//! Timeouts, retry bounds and capture limits used by the execution pipeline
//! live here so they are easy to find and to reason about together.

use std::time::Duration;

// =============================================================================
// Timeout Constants
// =============================================================================

/// Connect timeout for query execution, applied unless the connection string sets one.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Command timeout for query execution.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Connect and command timeout for the PARSEONLY and describe side queries.
pub const SIDE_QUERY_TIMEOUT_SECS: u64 = 5;

/// Default connect timeout as Duration.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS);

/// Default command timeout as Duration.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS);

/// Side query timeout as Duration.
pub const SIDE_QUERY_TIMEOUT: Duration = Duration::from_secs(SIDE_QUERY_TIMEOUT_SECS);

// =============================================================================
// Retry Constants
// =============================================================================

/// Number of retries after the first attempt for transient failures.
pub const MAX_RETRIES: u32 = 3;

/// Base backoff delay in milliseconds; attempt `n` waits `2^(n-1)` times this.
pub const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Base backoff delay as Duration.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(RETRY_BASE_DELAY_MS);

// =============================================================================
// Result Size Constants
// =============================================================================

/// Rows captured per result set. Further rows are drained, not kept.
pub const MAX_ROWS_PER_RESULT_SET: usize = 1000;

// =============================================================================
// Protocol Constants
// =============================================================================

/// Protocol version reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

// =============================================================================
// Logging Constants
// =============================================================================

/// Default truncation length for query logging.
pub const LOG_QUERY_TRUNCATE_LENGTH: usize = 200;
