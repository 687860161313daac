//! Error enrichment for fatal query failures.
//!
//! [`format_error`] attaches a remediation hint chosen by error code.
//! [`enrich`] additionally runs the best-effort column discovery side query
//! for invalid column errors against system objects.

use crate::database::capture::capture;
use crate::database::driver::{ConnectOptions, SqlDriver};
use crate::database::types::SqlValue;
use crate::error::DriverError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;
use tracing::{debug, warn};

static INVALID_OBJECT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Invalid object name '([^']+)'")
        .unwrap_or_else(|e| panic!("Internal error: invalid object name pattern: {}", e))
});

static NEAR_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)keyword '([^']+)'")
        .unwrap_or_else(|e| panic!("Internal error: invalid keyword pattern: {}", e))
});

static SERVER_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"SQL Server (\d{4})")
        .unwrap_or_else(|e| panic!("Internal error: invalid version pattern: {}", e))
});

/// Reserved words commonly misused as column aliases.
const RESERVED_KEYWORDS: &[&str] = &[
    "COUNT", "ROWCOUNT", "ROW", "ROWS", "TOTAL", "SUM", "AVG", "MIN", "MAX", "INDEX", "KEY",
    "ORDER", "GROUP", "RANK", "PERCENT", "VALUE", "VALUES", "DATE", "TIME", "TIMESTAMP", "YEAR",
    "MONTH", "DAY", "LEVEL", "USER", "SCHEMA", "TABLE", "VIEW", "COLUMN", "DATABASE", "TYPE",
    "SIZE", "STATUS", "STATE", "MODE", "OPTION", "SELECT", "FROM", "WHERE", "JOIN", "INNER",
    "OUTER", "LEFT", "RIGHT", "ON", "AND", "OR", "NOT", "IN", "EXISTS", "BETWEEN", "LIKE", "IS",
    "NULL", "AS", "BY", "HAVING", "DISTINCT", "UNION", "INSERT", "INTO", "CREATE", "ALTER", "DROP",
    "TRUNCATE", "BEGIN", "END", "IF", "ELSE", "WHILE", "CASE", "WHEN", "THEN", "DECLARE", "SET",
    "EXEC", "EXECUTE", "RETURN", "PRINT", "WITH", "OVER", "PARTITION", "OFFSET", "FETCH", "TOP",
];

/// Whether `word` is in the reserved alias list (case-insensitive).
pub fn is_reserved_keyword(word: &str) -> bool {
    RESERVED_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(word))
}

/// Object name from an "Invalid object name '...'" message.
pub fn invalid_object_name(message: &str) -> Option<&str> {
    INVALID_OBJECT_NAME
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Keyword from an "Incorrect syntax near the keyword '...'" message.
pub fn near_keyword(message: &str) -> Option<&str> {
    NEAR_KEYWORD
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Formats a database error with the remediation hint for its code.
pub fn format_error(error: &DriverError) -> String {
    let mut out = String::new();
    let _ = write_error(&mut out, error);
    out
}

fn write_error(out: &mut String, error: &DriverError) -> std::fmt::Result {
    match error.code {
        Some(code) => writeln!(out, "SQL Error (Code {}):", code)?,
        None => writeln!(out, "SQL Error:")?,
    }
    writeln!(out, "   {}", error.message)?;
    if let Some(line) = error.line {
        writeln!(out, "   Line: {}", line)?;
    }
    writeln!(out)?;
    writeln!(out, "Action Required:")?;

    match error.code {
        Some(207) => {
            writeln!(out, "   - The column name is invalid or doesn't exist in the table")?;
            writeln!(out, "   - Check the column name spelling and case sensitivity")?;
            writeln!(out)?;
            writeln!(out, "   For user tables:")?;
            writeln!(
                out,
                "     SELECT * FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = 'YourTable'"
            )?;
            writeln!(out)?;
            writeln!(out, "   For system tables/functions (sys.*, dm_*, fn_*):")?;
            writeln!(out, "     EXEC sp_help 'sys.dm_db_log_info'")?;
            writeln!(out, "     -- OR --")?;
            writeln!(
                out,
                "     SELECT name, system_type_name FROM sys.dm_exec_describe_first_result_set(N'SELECT * FROM sys.dm_db_log_info(DB_ID())', NULL, 0)"
            )?;
            writeln!(out)?;
            writeln!(out, "   - Then retry with the correct column name")?;
        }
        Some(208) => {
            writeln!(out, "   - The table/view/function name is invalid or doesn't exist")?;
            writeln!(out, "   - Check the object name spelling and schema")?;
            writeln!(out)?;
            let system_object = invalid_object_name(&error.message)
                .is_some_and(|name| name.to_lowercase().starts_with("sys."));
            if system_object {
                writeln!(out, "   For system objects (sys.*):")?;
                writeln!(
                    out,
                    "     SELECT name, type_desc FROM sys.objects WHERE name LIKE '%dm_db%'"
                )?;
                writeln!(out, "     SELECT name FROM sys.system_objects WHERE name LIKE '%log%'")?;
            } else {
                writeln!(out, "   For user tables:")?;
                writeln!(out, "     SELECT TABLE_SCHEMA, TABLE_NAME FROM INFORMATION_SCHEMA.TABLES")?;
                writeln!(
                    out,
                    "     SELECT SCHEMA_NAME(schema_id) AS SchemaName, name AS TableName FROM sys.tables"
                )?;
            }
            writeln!(out)?;
            writeln!(out, "   - Then retry with the correct object name")?;
        }
        Some(156) => {
            writeln!(out, "   - There's a syntax error near a SQL keyword")?;
            writeln!(out)?;
            if let Some(keyword) = near_keyword(&error.message).filter(|k| is_reserved_keyword(k)) {
                writeln!(
                    out,
                    "   LIKELY CAUSE: '{}' is a SQL reserved keyword used as an alias",
                    keyword
                )?;
                writeln!(out, "   SOLUTION: Enclose it in square brackets: [{}]", keyword)?;
                writeln!(out)?;
                writeln!(out, "   Example:")?;
                writeln!(out, "     Wrong:   ... as {}", keyword)?;
                writeln!(out, "     Correct: ... as [{}]", keyword)?;
                writeln!(out)?;
            }
            writeln!(out, "   Other possible causes:")?;
            writeln!(out, "   - Missing commas, parentheses, or quotes")?;
            writeln!(out, "   - Incorrect SQL syntax for the SQL Server version")?;
            writeln!(out)?;
            writeln!(out, "   - Correct the syntax and retry")?;
        }
        Some(102) => {
            writeln!(out, "   - General syntax error detected")?;
            writeln!(out, "   - Review the query for typos or incorrect SQL syntax")?;
            writeln!(out, "   - Check for missing keywords or incorrect punctuation")?;
            writeln!(out, "   - Fix the syntax error and retry")?;
        }
        Some(4104) => {
            writeln!(
                out,
                "   - A column reference is ambiguous or doesn't exist in the specified table"
            )?;
            writeln!(
                out,
                "   - Use table aliases to clarify column references (e.g., t1.ColumnName)"
            )?;
            writeln!(out, "   - Verify the column exists in the table you're referencing")?;
            writeln!(out, "   - Correct the column reference and retry")?;
        }
        Some(1776) | Some(1778) => {
            writeln!(out, "   - There's an issue with the ORDER BY clause")?;
            writeln!(out, "   - Review the ORDER BY syntax and column names")?;
            writeln!(out, "   - Ensure columns in ORDER BY exist in the result set")?;
            writeln!(out, "   - Fix the ORDER BY clause and retry")?;
        }
        _ => {
            writeln!(out, "   - Review the error message above carefully")?;
            writeln!(out, "   - Correct the identified issue in your query")?;
            writeln!(out, "   - Retry the corrected query")?;
        }
    }

    writeln!(out)?;
    write!(out, "Please fix the error and execute the corrected query.")
}

/// Full enrichment: the formatted error plus, for invalid columns in queries
/// against system objects, the columns the query would have returned.
///
/// The side query is best-effort. Its failures are logged and dropped.
pub async fn enrich(
    error: &DriverError,
    query: &str,
    connection_string: &str,
    driver: &dyn SqlDriver,
    options: &ConnectOptions,
) -> String {
    let base = format_error(error);

    if error.code != Some(207) || !references_system_objects(query) {
        return base;
    }

    match discover_columns(query, connection_string, driver, options).await {
        Ok(Some(discovery)) => format!("{}\n{}", base, discovery),
        Ok(None) => base,
        Err(e) => {
            warn!("Failed to auto-discover columns: {}", e);
            base
        }
    }
}

fn references_system_objects(query: &str) -> bool {
    let lowered = query.to_lowercase();
    lowered.contains("sys.") || lowered.contains("dm_")
}

/// SQL for the describe-first-result-set side query.
pub fn describe_query(query: &str) -> String {
    format!(
        "SELECT name, system_type_name, max_length, precision, scale \
         FROM sys.dm_exec_describe_first_result_set(N'{}', NULL, 0) \
         WHERE is_hidden = 0 ORDER BY column_ordinal",
        query.replace('\'', "''")
    )
}

async fn discover_columns(
    query: &str,
    connection_string: &str,
    driver: &dyn SqlDriver,
    options: &ConnectOptions,
) -> Result<Option<String>, DriverError> {
    let timeout = options.connect_timeout + options.command_timeout;
    let work = async {
        let mut conn = driver.connect(connection_string, options).await?;

        let version = {
            let stream = conn.execute("SELECT @@VERSION").await?;
            let captured = capture(stream, 1).await?;
            captured
                .tables
                .first()
                .and_then(|t| t.rows.first())
                .and_then(|row| row.first())
                .map(|value| server_version(&value.to_string()))
                .unwrap_or_else(|| "Unknown".to_string())
        };

        let sql = describe_query(query);
        let stream = conn.execute(&sql).await?;
        let captured = capture(stream, usize::MAX).await?;

        let columns: Vec<String> = captured
            .tables
            .first()
            .map(|table| {
                table
                    .rows
                    .iter()
                    .filter_map(|row| match (row.first(), row.get(1)) {
                        (Some(SqlValue::String(name)), Some(SqlValue::String(ty))) => {
                            Some(format!("{} ({})", name, ty))
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok::<_, DriverError>((columns, version))
    };

    let (columns, version) = tokio::time::timeout(timeout, work)
        .await
        .map_err(|_| DriverError::timeout("Column discovery", timeout.as_secs()))??;

    if columns.is_empty() {
        debug!("Column discovery returned no columns");
        return Ok(None);
    }

    let rule = "-".repeat(42);
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "AVAILABLE COLUMNS (auto-discovered):");
    let _ = writeln!(out, "{}", rule);
    for column in &columns {
        let _ = writeln!(out, "   - {}", column);
    }
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out);
    let _ = writeln!(out, "SQL Server Version: {}", version);
    let _ = writeln!(out, "   For more details, consult Microsoft documentation:");
    let _ = writeln!(out, "   https://learn.microsoft.com/sql/relational-databases/");
    let _ = writeln!(out);
    let _ = write!(out, "Use one of the available columns above and retry.");
    Ok(Some(out))
}

/// Short product version from a `@@VERSION` string.
pub fn server_version(raw: &str) -> String {
    match SERVER_VERSION.captures(raw).and_then(|c| c.get(1)) {
        Some(year) => format!("SQL Server {}", year.as_str()),
        None => raw.lines().next().unwrap_or("Unknown").trim().to_string(),
    }
}
