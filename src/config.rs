//! Configuration management for the SQL MCP Server.
//!
//! The set of reachable databases is built once at startup from environment
//! variables and command-line flags, then frozen. Sources are merged in this
//! order:
//!
//! 1. `SQL_MCP_DATABASES`: a JSON object of `name -> connection string`
//! 2. `SQL_MCP_DB_<NAME>`: one variable per database, name lowercased
//! 3. `--databases=<json>`: replaces everything gathered from the environment
//!
//! `SQL_MCP_DEFAULT_DATABASE` names the default, `--default-database` overrides
//! it, and when neither is set the first inserted database becomes the default.

use crate::constants::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, MAX_ROWS_PER_RESULT_SET, SIDE_QUERY_TIMEOUT,
};
use crate::error::ServerError;
use crate::resilience::RetryConfig;
use clap::Parser;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable holding a JSON object of databases.
pub const ENV_DATABASES: &str = "SQL_MCP_DATABASES";

/// Prefix of per-database environment variables.
pub const ENV_DATABASE_PREFIX: &str = "SQL_MCP_DB_";

/// Environment variable naming the default database.
pub const ENV_DEFAULT_DATABASE: &str = "SQL_MCP_DEFAULT_DATABASE";

/// Environment variable enabling server-authoritative syntax checks.
pub const ENV_TRUST_SERVER_SYNTAX: &str = "SQL_MCP_TRUST_SERVER_SYNTAX";

/// Command-line flags accepted at startup.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "sql-mcp-server", version, about = "JSON-RPC stdio server for T-SQL validation and safe execution")]
pub struct Cli {
    /// JSON object mapping database names to connection strings (replaces environment entries)
    #[arg(long, value_name = "JSON")]
    pub databases: Option<String>,

    /// Name of the database used when a request does not name one
    #[arg(long = "default-database", value_name = "NAME")]
    pub default_database: Option<String>,
}

/// Raw configuration inputs before merging.
///
/// Kept separate from the environment so the precedence rules can be tested
/// without touching process state.
#[derive(Debug, Clone, Default)]
pub struct RegistrySources {
    pub env_bulk: Option<String>,
    pub env_single: Vec<(String, String)>,
    pub env_default: Option<String>,
    pub cli_bulk: Option<String>,
    pub cli_default: Option<String>,
}

impl RegistrySources {
    /// Gather sources from the process environment and parsed flags.
    ///
    /// Per-database variables are taken in variable-name order so the
    /// "first inserted" default does not depend on environment ordering.
    pub fn from_env(cli: &Cli) -> Self {
        Self {
            env_bulk: std::env::var(ENV_DATABASES).ok(),
            env_single: database_variables(std::env::vars()),
            env_default: std::env::var(ENV_DEFAULT_DATABASE).ok(),
            cli_bulk: cli.databases.clone(),
            cli_default: cli.default_database.clone(),
        }
    }
}

/// Per-database variables as `(name, connection string)`, sorted by name.
///
/// The prefix matches case-insensitively. Entries with an empty name or a
/// blank connection string are skipped.
fn database_variables(vars: impl IntoIterator<Item = (String, String)>) -> Vec<(String, String)> {
    let prefix_len = ENV_DATABASE_PREFIX.len();
    let mut entries: Vec<(String, String)> = vars
        .into_iter()
        .filter_map(|(key, value)| {
            let prefix = key.get(..prefix_len)?;
            if !prefix.eq_ignore_ascii_case(ENV_DATABASE_PREFIX) {
                return None;
            }
            let name = &key[prefix_len..];
            if name.is_empty() || value.trim().is_empty() {
                return None;
            }
            Some((name.to_lowercase(), value))
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

/// Logical database name to connection string mapping.
///
/// Insertion order is preserved. Connection strings never appear in `Debug`
/// output or logs.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    entries: Vec<(String, String)>,
    default: Option<String>,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("databases", &self.names())
            .field("default", &self.default)
            .finish()
    }
}

impl ConnectionRegistry {
    /// Build a registry from ordered entries and an optional default.
    ///
    /// Later duplicates overwrite earlier ones in place. If no default is
    /// given, the first entry becomes the default.
    pub fn new<I, K, V>(entries: I, default: Option<String>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut registry = Self {
            entries: Vec::new(),
            default: default.filter(|d| !d.trim().is_empty()),
        };
        for (name, conn) in entries {
            registry.insert(name.into(), conn.into());
        }
        registry.apply_default_rule();
        registry
    }

    /// Merge the configured sources following the startup precedence rules.
    pub fn from_sources(sources: &RegistrySources) -> Result<Self, ServerError> {
        let mut registry = Self::default();

        if let Some(json) = sources.env_bulk.as_deref() {
            for (name, conn) in parse_database_map(json, ENV_DATABASES)? {
                registry.insert(name, conn);
            }
        }

        for (name, conn) in &sources.env_single {
            registry.insert(name.clone(), conn.clone());
        }

        if let Some(json) = sources.cli_bulk.as_deref() {
            registry.entries.clear();
            for (name, conn) in parse_database_map(json, "--databases")? {
                registry.insert(name, conn);
            }
        }

        registry.default = sources
            .cli_default
            .clone()
            .or_else(|| sources.env_default.clone())
            .filter(|d| !d.trim().is_empty());

        registry.apply_default_rule();

        info!(
            "Configured {} database(s): [{}], default: {}",
            registry.entries.len(),
            registry.names().join(", "),
            registry.default.as_deref().unwrap_or("(none)")
        );

        if let Some(default) = registry.default.as_deref() {
            if registry.resolve(Some(default)).is_none() {
                warn!("Default database '{}' is not among the configured databases", default);
            }
        }

        Ok(registry)
    }

    fn insert(&mut self, name: String, conn: String) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = conn,
            None => self.entries.push((name, conn)),
        }
    }

    fn apply_default_rule(&mut self) {
        if self.default.is_none() {
            self.default = self.entries.first().map(|(name, _)| name.clone());
        }
    }

    /// Resolve a database name (or the default when `None`) to its connection string.
    pub fn resolve(&self, name: Option<&str>) -> Option<&str> {
        let name = name.or(self.default.as_deref())?;
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, conn)| conn.as_str())
    }

    /// Like [`resolve`](Self::resolve), but explains a failed lookup.
    pub fn lookup(&self, name: Option<&str>) -> Result<(&str, &str), ServerError> {
        let Some(requested) = name.or(self.default.as_deref()) else {
            return Err(ServerError::NoDefaultDatabase {
                available: self.names(),
            });
        };

        self.entries
            .iter()
            .find(|(candidate, _)| candidate == requested)
            .map(|(name, conn)| (name.as_str(), conn.as_str()))
            .ok_or_else(|| ServerError::DatabaseNotFound {
                requested: requested.to_string(),
                available: self.names(),
            })
    }

    /// Known database names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    /// The default database name, if any.
    pub fn default_database(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Number of configured databases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no database is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered `name -> connection string` pairs read from a JSON object.
struct OrderedDatabaseMap(Vec<(String, String)>);

impl<'de> Deserialize<'de> for OrderedDatabaseMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = OrderedDatabaseMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object of database name to connection string")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((name, conn)) = map.next_entry::<String, String>()? {
                    entries.push((name, conn));
                }
                Ok(OrderedDatabaseMap(entries))
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

fn parse_database_map(json: &str, source: &str) -> Result<Vec<(String, String)>, ServerError> {
    serde_json::from_str::<OrderedDatabaseMap>(json)
        .map(|map| map.0)
        .map_err(|e| ServerError::config(format!("{} is not a valid JSON object: {}", source, e)))
}

/// Query execution configuration.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Connect timeout when the connection string does not set one.
    pub connect_timeout: Duration,

    /// Command timeout for the user query.
    pub command_timeout: Duration,

    /// Connect and command timeout for PARSEONLY and describe side queries.
    pub side_query_timeout: Duration,

    /// Rows captured per result set.
    pub max_rows_per_result_set: usize,

    /// Proceed when the live server accepts a query the local parser rejected.
    pub trust_server_syntax: bool,

    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            side_query_timeout: SIDE_QUERY_TIMEOUT,
            max_rows_per_result_set: MAX_ROWS_PER_RESULT_SET,
            trust_server_syntax: false,
            retry: RetryConfig::default(),
        }
    }
}

/// Server configuration, immutable after startup.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Reachable databases.
    pub registry: ConnectionRegistry,

    /// Execution pipeline settings.
    pub execution: ExecutionConfig,
}

impl Config {
    /// Load configuration from the environment and parsed command-line flags.
    ///
    /// Environment variables:
    /// - `SQL_MCP_DATABASES`: JSON object of databases
    /// - `SQL_MCP_DB_<NAME>`: a single database (name lowercased)
    /// - `SQL_MCP_DEFAULT_DATABASE`: default database name
    /// - `SQL_MCP_TRUST_SERVER_SYNTAX`: `true`/`1` to let a successful
    ///   PARSEONLY round trip override local parser errors (default: false)
    pub fn load(cli: &Cli) -> Result<Self, ServerError> {
        let registry = ConnectionRegistry::from_sources(&RegistrySources::from_env(cli))?;

        let trust_server_syntax = std::env::var(ENV_TRUST_SERVER_SYNTAX)
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            registry,
            execution: ExecutionConfig {
                trust_server_syntax,
                ..ExecutionConfig::default()
            },
        })
    }

    /// Configuration with the given registry and default execution settings.
    pub fn with_registry(registry: ConnectionRegistry) -> Self {
        Self {
            registry,
            execution: ExecutionConfig::default(),
        }
    }
}
