//! Shared test fixtures: a scripted database driver and a recording sleeper.

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream;
use sql_mcp_server::config::{Config, ConnectionRegistry};
use sql_mcp_server::database::{
    ConnectOptions, QueryExecutor, ResultItem, ResultStream, SqlConnection, SqlDriver, SqlValue,
};
use sql_mcp_server::error::DriverError;
use sql_mcp_server::resilience::Sleeper;
use sql_mcp_server::SqlMcpServer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the next batch does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Produce these items.
    Items(Vec<ResultItem>),
    /// Fail the batch.
    Fail(DriverError),
}

/// Driver that replays scripted steps, one per executed batch, across all
/// connections it opens.
///
/// Once the script runs out every batch succeeds with no result sets.
#[derive(Clone, Default)]
pub struct ScriptedDriver {
    steps: Arc<Mutex<VecDeque<Step>>>,
    connects: Arc<AtomicUsize>,
    batches: Arc<Mutex<Vec<String>>>,
}

impl ScriptedDriver {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Connections opened so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Batches executed so far, in order.
    pub fn batches(&self) -> Vec<String> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlDriver for ScriptedDriver {
    async fn connect(
        &self,
        _connection_string: &str,
        _options: &ConnectOptions,
    ) -> Result<Box<dyn SqlConnection>, DriverError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            steps: Arc::clone(&self.steps),
            batches: Arc::clone(&self.batches),
        }))
    }
}

struct ScriptedConnection {
    steps: Arc<Mutex<VecDeque<Step>>>,
    batches: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl SqlConnection for ScriptedConnection {
    async fn execute<'a>(&'a mut self, sql: &'a str) -> Result<ResultStream<'a>, DriverError> {
        self.batches.lock().unwrap().push(sql.to_string());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Items(items)) => Ok(Box::pin(stream::iter(
                items.into_iter().map(Ok::<_, DriverError>),
            ))),
            None => Ok(Box::pin(stream::empty::<Result<ResultItem, DriverError>>())),
        }
    }
}

/// Sleeper that records requested delays instead of waiting.
#[derive(Clone, Default)]
pub struct InstantSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl InstantSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.delays().into_iter().sum()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Registry with two databases, `sales` first.
pub fn registry() -> ConnectionRegistry {
    ConnectionRegistry::new(
        [
            ("sales", "Server=tcp:sales.example,1433;Database=Sales;"),
            ("hr", "Server=tcp:hr.example,1433;Database=HR;"),
        ],
        None,
    )
}

/// Server wired to a scripted driver and an instant sleeper.
pub fn server(driver: &ScriptedDriver, sleeper: &InstantSleeper) -> SqlMcpServer {
    server_with_config(driver, sleeper, Config::with_registry(registry()))
}

/// Like [`server`], but a server-side syntax acceptance overrides local
/// parse errors.
pub fn trusting_server(driver: &ScriptedDriver, sleeper: &InstantSleeper) -> SqlMcpServer {
    let mut config = Config::with_registry(registry());
    config.execution.trust_server_syntax = true;
    server_with_config(driver, sleeper, config)
}

fn server_with_config(
    driver: &ScriptedDriver,
    sleeper: &InstantSleeper,
    config: Config,
) -> SqlMcpServer {
    let executor = QueryExecutor::new(Arc::new(config), Arc::new(driver.clone()))
        .with_sleeper(Arc::new(sleeper.clone()));
    SqlMcpServer::with_executor(executor)
}

/// Result items for one result set.
pub fn result_set(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Vec<ResultItem> {
    let mut items = vec![ResultItem::Columns(
        columns.iter().map(|c| c.to_string()).collect(),
    )];
    items.extend(rows.into_iter().map(ResultItem::Row));
    items
}

/// A `tools/call` request line.
pub fn call(id: i64, tool: &str, arguments: serde_json::Value) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": tool, "arguments": arguments }
    })
    .to_string()
}
