//! Tool input types with JSON Schema generation.

use crate::sql::SqlVersion;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input for the `validate_sql` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateSqlInput {
    #[schemars(description = "The SQL query to validate")]
    pub query: String,

    #[serde(default)]
    #[schemars(
        description = "SQL Server version: 90=2005, 100=2008, 110=2012, 120=2014, 130=2016, 140=2017, 150=2019, 160=2022 (default)"
    )]
    pub sql_version: SqlVersion,
}

/// Input for the `parse_sql` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParseSqlInput {
    #[schemars(description = "The SQL query to parse")]
    pub query: String,

    #[serde(default)]
    #[schemars(description = "SQL Server version (default: 160 for SQL Server 2022)")]
    pub sql_version: SqlVersion,
}

/// Input for the `document_sql` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSqlInput {
    #[schemars(description = "The SQL script to document")]
    pub query: String,

    #[serde(default)]
    #[schemars(description = "SQL Server version (default: 160 for SQL Server 2022)")]
    pub sql_version: SqlVersion,
}

/// Input for the `execute_sql` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteSqlInput {
    #[schemars(description = "The SQL query to execute")]
    pub query: String,

    /// Logical database name. Falls back to the configured default.
    #[serde(default)]
    #[schemars(description = "Database name to use (default: configured default database)")]
    pub database: Option<String>,
}

/// Input for the `list_databases` tool. Takes no arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListDatabasesInput {}
