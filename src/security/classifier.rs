//! Command classification: the deny-list applied before any query runs.
//!
//! Policy is allow-by-default. Only the statement classes in
//! [`BlockedCommand`] are rejected; everything else (SELECT, INSERT, CREATE,
//! EXEC, ...) passes.

use crate::sql::{ParsedScript, StatementKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// A statement class that may not be executed.
///
/// Ordering follows the declaration order, which is also the reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BlockedCommand {
    #[serde(rename = "DROP")]
    Drop,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "TRUNCATE")]
    Truncate,
    #[serde(rename = "ALTER TABLE")]
    AlterTable,
    #[serde(rename = "ALTER DATABASE")]
    AlterDatabase,
}

impl BlockedCommand {
    /// Every blocked class, in reporting order.
    pub const ALL: [BlockedCommand; 6] = [
        BlockedCommand::Drop,
        BlockedCommand::Delete,
        BlockedCommand::Update,
        BlockedCommand::Truncate,
        BlockedCommand::AlterTable,
        BlockedCommand::AlterDatabase,
    ];

    /// Label used in messages and tool output.
    pub fn label(&self) -> &'static str {
        match self {
            BlockedCommand::Drop => "DROP",
            BlockedCommand::Delete => "DELETE",
            BlockedCommand::Update => "UPDATE",
            BlockedCommand::Truncate => "TRUNCATE",
            BlockedCommand::AlterTable => "ALTER TABLE",
            BlockedCommand::AlterDatabase => "ALTER DATABASE",
        }
    }

    /// The blocked class a statement kind falls into, if any.
    pub fn for_kind(kind: StatementKind) -> Option<Self> {
        match kind {
            StatementKind::Drop => Some(BlockedCommand::Drop),
            StatementKind::Delete => Some(BlockedCommand::Delete),
            StatementKind::Update => Some(BlockedCommand::Update),
            StatementKind::Truncate => Some(BlockedCommand::Truncate),
            StatementKind::AlterTable => Some(BlockedCommand::AlterTable),
            StatementKind::AlterDatabase => Some(BlockedCommand::AlterDatabase),
            _ => None,
        }
    }
}

impl fmt::Display for BlockedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Blocked command classes present anywhere in the script, nested
/// statements included. Independent of syntax validity.
///
/// The statement tree and the raw command keywords are both consulted; a
/// keyword the parser folded into another statement still counts.
pub fn classify(script: &ParsedScript) -> BTreeSet<BlockedCommand> {
    script
        .nodes()
        .map(|node| node.kind)
        .chain(script.command_keywords.iter().copied())
        .filter_map(BlockedCommand::for_kind)
        .collect()
}

/// Labels of a blocked set, in reporting order.
pub fn blocked_labels(blocked: &BTreeSet<BlockedCommand>) -> Vec<String> {
    blocked.iter().map(|c| c.label().to_string()).collect()
}

/// Caller-facing rejection message.
pub fn blocked_message(blocked: &BTreeSet<BlockedCommand>) -> String {
    let all: Vec<&str> = BlockedCommand::ALL.iter().map(BlockedCommand::label).collect();
    format!(
        "Security Error: Query contains blocked commands: {}\n\n\
         Only the following commands are allowed:\n\
         \x20  - SELECT: read data\n\
         \x20  - INSERT: create new records\n\
         \x20  - CREATE: create tables, indexes, procedures, etc.\n\n\
         Blocked commands:\n\
         \x20  - {}\n\n\
         Action: Rewrite your query using only allowed commands and retry.",
        blocked_labels(blocked).join(", "),
        all.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{parse_script, SqlVersion};

    fn blocked(sql: &str) -> Vec<String> {
        blocked_labels(&classify(&parse_script(sql, SqlVersion::default())))
    }

    #[test]
    fn test_allowed_statements() {
        assert!(blocked("SELECT * FROM dbo.Users").is_empty());
        assert!(blocked("INSERT INTO t (a) VALUES (1)").is_empty());
        assert!(blocked("CREATE TABLE t (id INT)").is_empty());
        assert!(blocked("EXEC sp_who").is_empty());
    }

    #[test]
    fn test_each_blocked_class() {
        assert_eq!(blocked("DROP TABLE t"), vec!["DROP"]);
        assert_eq!(blocked("DELETE FROM t WHERE id = 1"), vec!["DELETE"]);
        assert_eq!(blocked("UPDATE t SET a = 1"), vec!["UPDATE"]);
        assert_eq!(blocked("TRUNCATE TABLE t"), vec!["TRUNCATE"]);
        assert_eq!(blocked("ALTER TABLE t ADD c INT"), vec!["ALTER TABLE"]);
        assert_eq!(blocked("ALTER DATABASE db SET READ_ONLY"), vec!["ALTER DATABASE"]);
    }

    #[test]
    fn test_other_alters_allowed() {
        assert!(blocked("ALTER VIEW v AS SELECT 1 AS a").is_empty());
    }

    #[test]
    fn test_multiple_reported_once_in_order() {
        assert_eq!(
            blocked("UPDATE t SET a = 1; DELETE FROM t; DELETE FROM u; DROP TABLE t"),
            vec!["DROP", "DELETE", "UPDATE"]
        );
    }

    #[test]
    fn test_blocked_even_when_script_invalid() {
        assert_eq!(blocked("SELEC broken FROM;\nDELETE FROM t"), vec!["DELETE"]);
    }

    #[test]
    fn test_cte_delete_blocked() {
        assert_eq!(
            blocked("WITH c AS (SELECT id FROM t) DELETE FROM c"),
            vec!["DELETE"]
        );
    }

    #[test]
    fn test_keyword_after_select_without_separator() {
        assert_eq!(blocked("SELECT 1 DELETE FROM t"), vec!["DELETE"]);
        assert_eq!(blocked("SELECT 1 AS [x] \nTRUNCATE TABLE t"), vec!["TRUNCATE"]);
    }

    #[test]
    fn test_newline_separated_batches() {
        assert_eq!(blocked("SELECT * FROM a\nDELETE FROM t"), vec!["DELETE"]);
        assert_eq!(blocked("DECLARE @x INT = 1\nUPDATE t SET a = @x"), vec!["UPDATE"]);
        assert_eq!(blocked("PRINT 'x'\nDELETE FROM t"), vec!["DELETE"]);
        assert_eq!(blocked("EXEC sp_who\nDELETE FROM t"), vec!["DELETE"]);
        assert_eq!(blocked("SET NOCOUNT ON\nDELETE FROM t"), vec!["DELETE"]);
        assert_eq!(blocked("SELECT 1 AS after DELETE FROM t"), vec!["DELETE"]);
    }

    #[test]
    fn test_keywords_found_when_tokenizer_fails() {
        assert_eq!(blocked("DROP TABLE t; SELECT 'unterminated"), vec!["DROP"]);
    }

    #[test]
    fn test_quoted_and_literal_words_allowed() {
        assert!(blocked("SELECT [Delete], 'DROP TABLE t' AS note FROM dbo.Audit").is_empty());
        assert!(blocked("SELECT 1 -- UPDATE t SET a = 1").is_empty());
    }

    #[test]
    fn test_clause_keywords_allowed() {
        assert!(blocked(
            "CREATE TABLE o (id INT, u INT REFERENCES u(id) ON DELETE CASCADE ON UPDATE NO ACTION)"
        )
        .is_empty());
        assert!(blocked(
            "CREATE TRIGGER tr ON t AFTER INSERT, UPDATE AS BEGIN INSERT INTO log VALUES (1) END"
        )
        .is_empty());
        assert!(blocked("DECLARE c CURSOR FOR SELECT a FROM t FOR UPDATE OF a").is_empty());
    }

    #[test]
    fn test_alter_table_drop_column_reported_once() {
        assert_eq!(blocked("ALTER TABLE t DROP COLUMN c"), vec!["ALTER TABLE"]);
    }

    #[test]
    fn test_message_lists_commands() {
        let set: BTreeSet<_> = [BlockedCommand::Delete].into_iter().collect();
        let message = blocked_message(&set);
        assert!(message.starts_with("Security Error: Query contains blocked commands: DELETE\n"));
        assert!(message.contains("   - SELECT: read data"));
        assert!(message.contains("ALTER DATABASE"));
    }

    #[test]
    fn test_serializes_as_label() {
        assert_eq!(
            serde_json::to_string(&BlockedCommand::AlterTable).unwrap(),
            "\"ALTER TABLE\""
        );
    }
}
