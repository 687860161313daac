//! Database driver abstraction.
//!
//! The execution pipeline talks to the database only through [`SqlDriver`] and
//! [`SqlConnection`]. Production uses the TDS implementation in
//! [`tds`](super::tds); tests substitute scripted drivers.

use crate::config::ExecutionConfig;
use crate::database::types::SqlValue;
use crate::error::DriverError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::time::Duration;

/// One item of a batch's output, in the order the server produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultItem {
    /// Start of a new result set with its column names.
    Columns(Vec<String>),
    /// A row of the current result set.
    Row(Vec<SqlValue>),
    /// An informational message (PRINT, low severity RAISERROR, etc.).
    Info(String),
}

/// Stream of result items produced by one batch.
pub type ResultStream<'a> = BoxStream<'a, Result<ResultItem, DriverError>>;

/// Timeouts applied to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Bound on opening the connection.
    pub connect_timeout: Duration,
    /// Bound on running a batch and draining its results.
    pub command_timeout: Duration,
}

impl ConnectOptions {
    /// Options for the user query.
    ///
    /// `Connect Timeout` (or `Connection Timeout`) in the connection string
    /// takes precedence over the configured default.
    pub fn for_query(connection_string: &str, config: &ExecutionConfig) -> Self {
        Self {
            connect_timeout: connect_timeout_from(connection_string)
                .unwrap_or(config.connect_timeout),
            command_timeout: config.command_timeout,
        }
    }

    /// Options for short side queries (PARSEONLY checks, result shape discovery).
    pub fn for_side_query(config: &ExecutionConfig) -> Self {
        Self {
            connect_timeout: config.side_query_timeout,
            command_timeout: config.side_query_timeout,
        }
    }
}

/// Reads an explicit connect timeout (in seconds) from an ADO.NET style string.
pub fn connect_timeout_from(connection_string: &str) -> Option<Duration> {
    connection_string
        .split(';')
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| {
            let key = key.trim().to_lowercase();
            key == "connect timeout" || key == "connection timeout" || key == "timeout"
        })
        .and_then(|(_, value)| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Opens connections to a database.
#[async_trait]
pub trait SqlDriver: Send + Sync {
    /// Open a fresh connection. The connection is closed when dropped.
    async fn connect(
        &self,
        connection_string: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn SqlConnection>, DriverError>;
}

/// An open connection able to run batches.
#[async_trait]
pub trait SqlConnection: Send {
    /// Run a batch and stream every result set it produces.
    async fn execute<'a>(&'a mut self, sql: &'a str) -> Result<ResultStream<'a>, DriverError>;
}
