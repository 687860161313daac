//! # SQL MCP Server
//!
//! A JSON-RPC server on stdin/stdout that validates, documents and safely
//! executes T-SQL against configured SQL Server databases.
//!
//! This crate provides:
//! - **Tools**: `validate_sql`, `parse_sql`, `document_sql`, `execute_sql`, `list_databases`
//! - **Safety**: a statement deny-list applied before any query reaches the database
//! - **Resilience**: bounded exponential-backoff retry on transient failures only
//! - **Diagnostics**: database errors enriched with concrete corrective actions
//!
//! ## Architecture
//!
//! Requests flow from the [`transport`] loop into the [`server`] dispatcher,
//! which routes `tools/call` to the handlers in [`tools`]. Query execution
//! goes through [`database::QueryExecutor`], which consults the
//! [`security`] classifier and the [`sql`] parser before talking to a
//! [`database::SqlDriver`].

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod protocol;
pub mod resilience;
pub mod security;
pub mod server;
pub mod sql;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::ServerError;
pub use server::SqlMcpServer;
