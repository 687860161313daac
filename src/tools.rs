//! Tool catalog and tool handlers.
//!
//! Each tool is a variant of [`Tool`]; `tools/call` resolves the name, decodes
//! the argument object into the tool's input type and runs the handler.
//! Tool-level failures (syntax errors, blocked commands, database errors)
//! come back as a [`CallToolResult`] with `isError` set. Only argument
//! problems are reported as JSON-RPC errors.

pub mod inputs;

pub use inputs::{
    DocumentSqlInput, ExecuteSqlInput, ListDatabasesInput, ParseSqlInput, ValidateSqlInput,
};

use crate::config::ConnectionRegistry;
use crate::database::ExecutionOutcome;
use crate::error::ProtocolError;
use crate::protocol::{CallToolResult, ToolDescriptor};
use crate::security::BlockedCommand;
use crate::server::SqlMcpServer;
use crate::sql::{parse_script, render_markdown, ScriptSummary, SqlVersion, SyntaxError};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::{debug, info, warn};

/// Tools exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    ValidateSql,
    ParseSql,
    DocumentSql,
    ExecuteSql,
    ListDatabases,
}

impl Tool {
    /// Every tool, in catalog order.
    pub const ALL: [Tool; 5] = [
        Tool::ValidateSql,
        Tool::ParseSql,
        Tool::DocumentSql,
        Tool::ExecuteSql,
        Tool::ListDatabases,
    ];

    /// Wire name of the tool.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::ValidateSql => "validate_sql",
            Tool::ParseSql => "parse_sql",
            Tool::DocumentSql => "document_sql",
            Tool::ExecuteSql => "execute_sql",
            Tool::ListDatabases => "list_databases",
        }
    }

    /// Look up a tool by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Description shown in `tools/list`. Database names are read from the
    /// live registry.
    pub fn description(&self, registry: &ConnectionRegistry) -> String {
        match self {
            Tool::ValidateSql => "Validates SQL Server T-SQL syntax and returns detailed error \
                information if invalid. Supports all SQL Server versions from 2005 to 2022."
                .to_string(),
            Tool::ParseSql => "Parses SQL and returns the syntax tree summary with statement \
                and table counts."
                .to_string(),
            Tool::DocumentSql => "Generates Markdown documentation for SQL scripts including \
                tables, functions, complexity analysis and recommendations."
                .to_string(),
            Tool::ExecuteSql => {
                let blocked: Vec<&str> = BlockedCommand::ALL.iter().map(|c| c.label()).collect();
                format!(
                    "Executes SQL queries with automatic syntax validation and security checks. \
                     Blocked: {}. Allowed: SELECT, INSERT, CREATE. Validation is automatic, \
                     there is no need to call validate_sql first. {}",
                    blocked.join(", "),
                    database_hint(registry)
                )
            }
            Tool::ListDatabases => format!(
                "Lists all configured databases and shows which one is the default. {}",
                database_hint(registry)
            ),
        }
    }

    /// JSON Schema of the tool's arguments.
    pub fn input_schema(&self) -> Value {
        match self {
            Tool::ValidateSql => schema_for::<ValidateSqlInput>(),
            Tool::ParseSql => schema_for::<ParseSqlInput>(),
            Tool::DocumentSql => schema_for::<DocumentSqlInput>(),
            Tool::ExecuteSql => schema_for::<ExecuteSqlInput>(),
            Tool::ListDatabases => schema_for::<ListDatabasesInput>(),
        }
    }

    pub fn descriptor(&self, registry: &ConnectionRegistry) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description(registry),
            input_schema: self.input_schema(),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The full tool catalog.
pub fn catalog(registry: &ConnectionRegistry) -> Vec<ToolDescriptor> {
    Tool::ALL.iter().map(|t| t.descriptor(registry)).collect()
}

fn database_hint(registry: &ConnectionRegistry) -> String {
    let names = registry.names();
    format!(
        "Default database: {}. Available databases: {}.",
        registry.default_database().unwrap_or("not set"),
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(", ")
        }
    )
}

fn schema_for<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
    }
    schema
}

fn decode<T: DeserializeOwned>(tool: Tool, arguments: Map<String, Value>) -> Result<T, ProtocolError> {
    serde_json::from_value(Value::Object(arguments)).map_err(|e| {
        ProtocolError::InvalidParams(format!("Invalid arguments for {}: {}", tool, e).into())
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ProtocolError::Internal(format!("Failed to serialize tool output: {}", e).into()))
}

// =========================================================================
// Tool outputs
// =========================================================================

/// Output of `validate_sql`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub error_count: usize,
    pub sql_version: SqlVersion,
    pub sql_version_name: &'static str,
    pub errors: Vec<SyntaxError>,
    pub summary: String,
}

/// Output of `parse_sql`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReport {
    pub valid: bool,
    pub sql_version: SqlVersion,
    pub sql_version_name: &'static str,
    pub statement_count: usize,
    pub token_count: usize,
    pub statement_types: Vec<&'static str>,
    pub errors: Vec<SyntaxError>,
    pub ast_info: String,
}

/// Output of `document_sql` when the script does not parse.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentationFailure {
    pub success: bool,
    pub errors: Vec<String>,
}

/// Output of `execute_sql` on failure.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionErrorReport {
    pub success: bool,
    pub error_message: String,
    /// `null` unless the query was rejected by the deny-list.
    pub blocked_commands: Option<Vec<String>>,
    pub sql_error_number: Option<i32>,
    pub sql_error_line_number: Option<u32>,
}

/// Output of `list_databases`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseListing {
    pub success: bool,
    pub default_database: Option<String>,
    pub available_databases: Vec<String>,
    pub summary: String,
}

impl DatabaseListing {
    pub fn from_registry(registry: &ConnectionRegistry) -> Self {
        let available = registry.names();
        let default = registry.default_database().map(str::to_string);
        let summary = format!(
            "Default database: {}\nAvailable databases: {}",
            default.as_deref().unwrap_or("not set"),
            available.join(", ")
        );
        Self {
            success: true,
            default_database: default,
            available_databases: available,
            summary,
        }
    }
}

// =========================================================================
// Handlers
// =========================================================================

impl SqlMcpServer {
    /// Decode arguments and run a tool.
    pub async fn call_tool(
        &self,
        tool: Tool,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, ProtocolError> {
        debug!("Calling tool {}", tool);
        match tool {
            Tool::ValidateSql => self.validate_sql(decode(tool, arguments)?),
            Tool::ParseSql => self.parse_sql(decode(tool, arguments)?),
            Tool::DocumentSql => self.document_sql(decode(tool, arguments)?),
            Tool::ExecuteSql => self.execute_sql(decode(tool, arguments)?).await,
            Tool::ListDatabases => {
                let _: ListDatabasesInput = decode(tool, arguments)?;
                self.list_databases()
            }
        }
    }

    /// Syntax check only. Never touches a database.
    pub fn validate_sql(&self, input: ValidateSqlInput) -> Result<CallToolResult, ProtocolError> {
        let script = parse_script(&input.query, input.sql_version);
        let version_name = input.sql_version.name();
        let summary = if script.is_valid() {
            format!("SQL syntax is valid (validated against {})", version_name)
        } else {
            format!(
                "Found {} syntax error(s) (validated against {})",
                script.errors.len(),
                version_name
            )
        };

        let report = ValidationReport {
            valid: script.is_valid(),
            error_count: script.errors.len(),
            sql_version: input.sql_version,
            sql_version_name: version_name,
            errors: script.errors,
            summary,
        };
        Ok(CallToolResult::text(to_json(&report)?))
    }

    /// Statement and table counts for a script.
    pub fn parse_sql(&self, input: ParseSqlInput) -> Result<CallToolResult, ProtocolError> {
        let script = parse_script(&input.query, input.sql_version);
        let table_count: usize = script.nodes().map(|n| n.tables.len()).sum();
        let statement_types = script.statements.iter().map(|s| s.kind.label()).collect();

        let report = ParseReport {
            valid: script.is_valid(),
            sql_version: input.sql_version,
            sql_version_name: input.sql_version.name(),
            statement_count: script.statements.len(),
            token_count: script.token_count,
            statement_types,
            ast_info: format!(
                "Statements: {}, Tables: {}",
                script.statements.len(),
                table_count
            ),
            errors: script.errors,
        };
        Ok(CallToolResult::text(to_json(&report)?))
    }

    /// Markdown documentation for a script that parses.
    pub fn document_sql(&self, input: DocumentSqlInput) -> Result<CallToolResult, ProtocolError> {
        let script = parse_script(&input.query, input.sql_version);
        if !script.is_valid() {
            let failure = DocumentationFailure {
                success: false,
                errors: script
                    .errors
                    .iter()
                    .map(|e| format!("Line {}, Column {}: {}", e.line, e.column, e.message))
                    .collect(),
            };
            return Ok(CallToolResult::error(to_json(&failure)?));
        }

        let summary = ScriptSummary::from_script(&script);
        debug!("Documented script: {}", summary.headline());
        Ok(CallToolResult::text(render_markdown(&summary, &input.query)))
    }

    /// Validate and run a query with transient-failure retries.
    pub async fn execute_sql(&self, input: ExecuteSqlInput) -> Result<CallToolResult, ProtocolError> {
        if input.query.trim().is_empty() {
            return Err(ProtocolError::InvalidParams("query must not be empty".into()));
        }

        match self
            .executor
            .execute(&input.query, input.database.as_deref())
            .await
        {
            ExecutionOutcome::Success(success) => {
                info!(
                    "execute_sql succeeded on {} ({} rows, {} attempt(s))",
                    success.database, success.rows_affected, success.attempts
                );
                let structured = serde_json::to_value(&success).map_err(|e| {
                    ProtocolError::Internal(format!("Failed to serialize results: {}", e).into())
                })?;
                Ok(CallToolResult::text(success.to_markdown()).with_structured(structured))
            }
            ExecutionOutcome::Failure(failure) => {
                warn!(
                    "execute_sql failed after {} attempt(s) (code {:?})",
                    failure.attempts, failure.error_code
                );
                let report = ExecutionErrorReport {
                    success: false,
                    error_message: failure.message,
                    blocked_commands: (!failure.blocked_commands.is_empty())
                        .then_some(failure.blocked_commands),
                    sql_error_number: failure.error_code,
                    sql_error_line_number: failure.error_line,
                };
                Ok(CallToolResult::error(to_json(&report)?))
            }
        }
    }

    /// Configured database names and the default.
    pub fn list_databases(&self) -> Result<CallToolResult, ProtocolError> {
        let listing = DatabaseListing::from_registry(&self.config().registry);
        Ok(CallToolResult::text(to_json(&listing)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(
            [("sales", "Server=a;"), ("hr", "Server=b;")],
            None,
        )
    }

    #[test]
    fn test_tool_lookup() {
        for tool in Tool::ALL {
            assert_eq!(Tool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(Tool::from_name("format_sql"), None);
    }

    #[test]
    fn test_catalog_interpolates_databases() {
        let tools = catalog(&registry());
        assert_eq!(tools.len(), 5);
        let execute = tools.iter().find(|t| t.name == "execute_sql").unwrap();
        assert!(execute.description.contains("Default database: sales"));
        assert!(execute.description.contains("Available databases: sales, hr"));
        assert!(execute.description.contains("ALTER DATABASE"));
    }

    #[test]
    fn test_catalog_without_databases() {
        let empty = ConnectionRegistry::new(Vec::<(String, String)>::new(), None);
        let listing = Tool::ListDatabases.description(&empty);
        assert!(listing.contains("Default database: not set"));
        assert!(listing.contains("Available databases: none"));
    }

    #[test]
    fn test_input_schema_shape() {
        let schema = Tool::ExecuteSql.input_schema();
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].get("query").is_some());
        assert!(schema["properties"].get("database").is_some());
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|r| r == "query"));
        assert!(!required.iter().any(|r| r == "database"));

        let schema = Tool::ListDatabases.input_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].is_object());
    }

    #[test]
    fn test_database_listing_first_inserted_default() {
        let listing = DatabaseListing::from_registry(&registry());
        assert!(listing.success);
        assert_eq!(listing.default_database.as_deref(), Some("sales"));
        assert_eq!(listing.available_databases, vec!["sales", "hr"]);
        assert_eq!(
            listing.summary,
            "Default database: sales\nAvailable databases: sales, hr"
        );
    }

    #[test]
    fn test_decode_reports_invalid_params() {
        let err = decode::<ExecuteSqlInput>(Tool::ExecuteSql, Map::new()).unwrap_err();
        assert_eq!(err.code(), -32602);
        assert!(err.to_string().contains("execute_sql"));
    }
}
