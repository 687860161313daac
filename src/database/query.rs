//! Query execution pipeline.
//!
//! One call to [`QueryExecutor::execute`] resolves the target database,
//! validates the query once, then runs it with transient-failure retries.
//! Every attempt opens a fresh connection and closes it before returning.

use crate::config::Config;
use crate::constants::LOG_QUERY_TRUNCATE_LENGTH;
use crate::database::capture::{capture, CapturedResults, ResultTable};
use crate::database::driver::{ConnectOptions, SqlDriver};
use crate::database::enrichment::enrich;
use crate::error::{DriverError, DriverErrorKind};
use crate::resilience::{retry_async, Sleeper, TokioSleeper};
use crate::security::{blocked_labels, blocked_message, classify};
use crate::sql::{parse_script, SqlVersion};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a validation pass. Execution never proceeds past `Invalid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationVerdict {
    Valid,
    Invalid {
        message: String,
        blocked_commands: Vec<String>,
    },
}

/// A completed execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSuccess {
    /// Name of the database the query ran against.
    pub database: String,

    /// Rows captured across all result sets.
    pub rows_affected: usize,

    /// Result sets in server order.
    pub tables: Vec<ResultTable>,

    /// Informational messages in emission order.
    pub messages: Vec<String>,

    /// Always false; queries are never rewritten.
    pub was_auto_fixed: bool,

    /// Attempts made, including the successful one.
    pub attempts: u32,
}

impl ExecutionSuccess {
    fn new(database: &str, captured: CapturedResults, attempts: u32) -> Self {
        Self {
            database: database.to_string(),
            rows_affected: captured.total_rows,
            tables: captured.tables,
            messages: captured.messages,
            was_auto_fixed: false,
            attempts,
        }
    }

    /// Markdown report of the results.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Query executed successfully on database: {}", self.database);
        let _ = writeln!(out, "Rows returned: {}", self.rows_affected);

        if !self.messages.is_empty() {
            let _ = writeln!(out, "\n--- Informational Messages ---");
            for message in &self.messages {
                let _ = writeln!(out, "{}", message);
            }
        }
        out.push('\n');

        if self.tables.is_empty() {
            out.push_str("No result sets returned.\n");
            return out;
        }

        let numbered = self.tables.len() > 1;
        for (i, table) in self.tables.iter().enumerate() {
            if numbered {
                let _ = writeln!(out, "--- Result Set {} ---", i + 1);
            }
            out.push_str(&table.to_markdown_table());
            out.push('\n');
        }
        out
    }
}

/// A failed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailure {
    /// Caller-facing message, enriched where the error class is known.
    pub message: String,

    /// Blocked command labels when the query was rejected by the deny-list.
    pub blocked_commands: Vec<String>,

    /// Database error number, when the failure came from the database.
    pub error_code: Option<i32>,

    /// Line reported by the database, when known.
    pub error_line: Option<u32>,

    /// Execution attempts made. Zero when rejected before execution.
    pub attempts: u32,
}

impl ExecutionFailure {
    fn rejected(message: String, blocked_commands: Vec<String>) -> Self {
        Self {
            message,
            blocked_commands,
            error_code: None,
            error_line: None,
            attempts: 0,
        }
    }
}

/// Result of [`QueryExecutor::execute`]. Exactly one variant is populated.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(ExecutionSuccess),
    Failure(ExecutionFailure),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }
}

/// Result of the live PARSEONLY round trip.
#[derive(Debug)]
enum ServerSyntaxCheck {
    Accepted,
    Rejected(String),
    Unavailable,
}

/// Runs queries against configured databases.
pub struct QueryExecutor {
    config: Arc<Config>,
    driver: Arc<dyn SqlDriver>,
    sleeper: Arc<dyn Sleeper>,
}

impl QueryExecutor {
    /// Create an executor that sleeps on the tokio timer between retries.
    pub fn new(config: Arc<Config>, driver: Arc<dyn SqlDriver>) -> Self {
        Self {
            config,
            driver,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute `query` against `database` (or the default database).
    pub async fn execute(&self, query: &str, database: Option<&str>) -> ExecutionOutcome {
        let (name, connection_string) = match self.config.registry.lookup(database) {
            Ok(found) => found,
            Err(e) => {
                warn!("Cannot resolve database: {}", e);
                return ExecutionOutcome::Failure(ExecutionFailure::rejected(e.to_string(), Vec::new()));
            }
        };

        info!(
            "Executing query on '{}': {}",
            name,
            truncate_for_log(query, LOG_QUERY_TRUNCATE_LENGTH)
        );

        if let ValidationVerdict::Invalid {
            message,
            blocked_commands,
        } = self.validate(query, connection_string).await
        {
            return ExecutionOutcome::Failure(ExecutionFailure::rejected(message, blocked_commands));
        }

        let execution = &self.config.execution;
        let options = ConnectOptions::for_query(connection_string, execution);

        let result = retry_async(&execution.retry, self.sleeper.as_ref(), move |attempt| {
            self.run_attempt(query, connection_string, options, attempt)
        })
        .await;

        let attempts = result.attempts;
        match result.outcome {
            Ok(captured) => {
                info!(
                    "Query completed on '{}': {} rows in {} result sets after {} attempt(s)",
                    name,
                    captured.total_rows,
                    captured.tables.len(),
                    attempts
                );
                ExecutionOutcome::Success(ExecutionSuccess::new(name, captured, attempts))
            }
            Err(error) if result.exhausted => ExecutionOutcome::Failure(ExecutionFailure {
                message: format!(
                    "SQL Error after {} attempts (transient failure, retries exhausted): {}\n\n\
                     Action: The database is unreachable or busy. Check connectivity and retry later.",
                    attempts, error.message
                ),
                blocked_commands: Vec::new(),
                error_code: error.code,
                error_line: error.line,
                attempts,
            }),
            Err(error) => {
                let side_options = ConnectOptions::for_side_query(execution);
                let enriched = enrich(
                    &error,
                    query,
                    connection_string,
                    self.driver.as_ref(),
                    &side_options,
                )
                .await;
                ExecutionOutcome::Failure(ExecutionFailure {
                    message: format!(
                        "Query failed on attempt {} (error is not transient, not retried).\n\n{}",
                        attempts, enriched
                    ),
                    blocked_commands: Vec::new(),
                    error_code: error.code,
                    error_line: error.line,
                    attempts,
                })
            }
        }
    }

    /// Validate a query before execution.
    ///
    /// The deny-list runs first and does not depend on syntax validity.
    /// Local syntax errors are confirmed against the server with a PARSEONLY
    /// round trip for a more precise message.
    pub async fn validate(&self, query: &str, connection_string: &str) -> ValidationVerdict {
        let script = parse_script(query, SqlVersion::default());

        let blocked = classify(&script);
        if !blocked.is_empty() {
            let labels = blocked_labels(&blocked);
            warn!("Rejected query with blocked commands: {}", labels.join(", "));
            return ValidationVerdict::Invalid {
                message: blocked_message(&blocked),
                blocked_commands: labels,
            };
        }

        if script.is_valid() {
            return ValidationVerdict::Valid;
        }

        match self.check_server_syntax(query, connection_string).await {
            ServerSyntaxCheck::Rejected(message) => ValidationVerdict::Invalid {
                message: format!(
                    "SQL Syntax Error:\n   {}\n\n\
                     Action: Review the error above, fix the syntax issue, and retry the query.",
                    message
                ),
                blocked_commands: Vec::new(),
            },
            ServerSyntaxCheck::Accepted if self.config.execution.trust_server_syntax => {
                info!("Server accepted a query the local parser rejected; proceeding");
                ValidationVerdict::Valid
            }
            _ => {
                let mut message = String::from("SQL Syntax Errors:\n");
                for error in &script.errors {
                    let _ = writeln!(message, "   - {}", error);
                }
                message.push_str(
                    "\nAction: Correct the syntax errors listed above and retry the query.",
                );
                ValidationVerdict::Invalid {
                    message,
                    blocked_commands: Vec::new(),
                }
            }
        }
    }

    /// Only errors raised by the PARSEONLY batch itself count as a rejection.
    /// Login and availability failures say nothing about the syntax.
    async fn check_server_syntax(&self, query: &str, connection_string: &str) -> ServerSyntaxCheck {
        let options = ConnectOptions::for_side_query(&self.config.execution);
        let batch = format!("SET PARSEONLY ON; {}; SET PARSEONLY OFF;", query);

        let work = async {
            let mut conn = match self.driver.connect(connection_string, &options).await {
                Ok(conn) => conn,
                Err(e) => {
                    debug!("PARSEONLY check could not connect: {}", e);
                    return ServerSyntaxCheck::Unavailable;
                }
            };
            let parsed = match conn.execute(&batch).await {
                Ok(stream) => capture(stream, 0).await.map(|_| ()),
                Err(e) => Err(e),
            };
            match parsed {
                Ok(()) => ServerSyntaxCheck::Accepted,
                Err(e) if e.kind == DriverErrorKind::Server && !e.is_transient() => {
                    ServerSyntaxCheck::Rejected(e.message)
                }
                Err(e) => {
                    debug!("PARSEONLY check unavailable: {}", e);
                    ServerSyntaxCheck::Unavailable
                }
            }
        };

        let limit = options.connect_timeout + options.command_timeout;
        tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
            debug!("PARSEONLY check timed out");
            ServerSyntaxCheck::Unavailable
        })
    }

    async fn run_attempt(
        &self,
        query: &str,
        connection_string: &str,
        options: ConnectOptions,
        attempt: u32,
    ) -> Result<CapturedResults, DriverError> {
        debug!("Execution attempt {}", attempt);

        let mut conn = tokio::time::timeout(
            options.connect_timeout,
            self.driver.connect(connection_string, &options),
        )
        .await
        .map_err(|_| DriverError::timeout("Connection", options.connect_timeout.as_secs()))??;

        let max_rows = self.config.execution.max_rows_per_result_set;
        let work = async {
            let stream = conn.execute(query).await?;
            capture(stream, max_rows).await
        };

        tokio::time::timeout(options.command_timeout, work)
            .await
            .map_err(|_| DriverError::timeout("Query execution", options.command_timeout.as_secs()))?
    }
}

/// Truncate a string for logging, on a character boundary.
fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
