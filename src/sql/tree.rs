//! Plain data tree describing a parsed script.
//!
//! The parser adapter produces these values once; classification and
//! documentation are pure folds over them.

use serde::Serialize;
use std::fmt;

/// Kind of a single statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    CreateTable,
    CreateView,
    CreateIndex,
    CreateProcedure,
    CreateFunction,
    CreateOther,
    AlterTable,
    AlterDatabase,
    AlterOther,
    Drop,
    Truncate,
    BeginTransaction,
    Commit,
    Rollback,
    Execute,
    Declare,
    Set,
    Use,
    #[default]
    Other,
}

impl StatementKind {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Merge => "MERGE",
            StatementKind::CreateTable => "CREATE TABLE",
            StatementKind::CreateView => "CREATE VIEW",
            StatementKind::CreateIndex => "CREATE INDEX",
            StatementKind::CreateProcedure => "CREATE PROCEDURE",
            StatementKind::CreateFunction => "CREATE FUNCTION",
            StatementKind::CreateOther => "CREATE",
            StatementKind::AlterTable => "ALTER TABLE",
            StatementKind::AlterDatabase => "ALTER DATABASE",
            StatementKind::AlterOther => "ALTER",
            StatementKind::Drop => "DROP",
            StatementKind::Truncate => "TRUNCATE",
            StatementKind::BeginTransaction => "BEGIN TRANSACTION",
            StatementKind::Commit => "COMMIT",
            StatementKind::Rollback => "ROLLBACK",
            StatementKind::Execute => "EXECUTE",
            StatementKind::Declare => "DECLARE",
            StatementKind::Set => "SET",
            StatementKind::Use => "USE",
            StatementKind::Other => "OTHER",
        }
    }

    /// Any CREATE statement.
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            StatementKind::CreateTable
                | StatementKind::CreateView
                | StatementKind::CreateIndex
                | StatementKind::CreateProcedure
                | StatementKind::CreateFunction
                | StatementKind::CreateOther
        )
    }

    /// Any ALTER statement.
    pub fn is_alter(&self) -> bool {
        matches!(
            self,
            StatementKind::AlterTable | StatementKind::AlterDatabase | StatementKind::AlterOther
        )
    }

    /// Data-modifying statements.
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete | StatementKind::Merge
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of a join between table sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
    /// CROSS APPLY / OUTER APPLY
    Apply,
}

impl JoinKind {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
            JoinKind::RightOuter => "RIGHT OUTER JOIN",
            JoinKind::FullOuter => "FULL OUTER JOIN",
            JoinKind::Cross => "CROSS JOIN",
            JoinKind::Apply => "APPLY",
        }
    }

    /// Joins without a join condition.
    pub fn is_unqualified(&self) -> bool {
        matches!(self, JoinKind::Cross | JoinKind::Apply)
    }
}

/// Parameter of a stored procedure definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureParameter {
    pub name: String,
    pub data_type: String,
}

/// Name and parameters of a stored procedure definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureSignature {
    pub name: String,
    pub parameters: Vec<ProcedureParameter>,
}

/// One statement and the statements nested inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatementNode {
    pub kind: StatementKind,

    /// Statements nested in this one (procedure bodies, control-flow blocks, CTE DML).
    pub children: Vec<StatementNode>,

    /// Distinct table or view names referenced directly by this statement.
    pub tables: Vec<String>,

    /// Distinct function names called directly by this statement.
    pub functions: Vec<String>,

    pub subqueries: usize,
    pub ctes: usize,
    pub case_expressions: usize,

    /// Present for CREATE PROCEDURE.
    pub procedure: Option<ProcedureSignature>,

    /// False when the statement could not be parsed and was classified from
    /// its leading keywords.
    pub parsed: bool,
}

impl StatementNode {
    /// A statement with no further detail.
    pub fn new(kind: StatementKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Builder-style helper adding a nested statement.
    pub fn with_child(mut self, child: StatementNode) -> Self {
        self.children.push(child);
        self
    }

    /// Pre-order traversal of this node and everything nested in it.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }
}

/// Pre-order iterator over a statement tree.
pub struct Walk<'a> {
    stack: Vec<&'a StatementNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a StatementNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A syntax error with its position in the script (1-based line and column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    /// Character offset from the start of the script.
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Line {}, Column {})", self.message, self.line, self.column)
    }
}

/// Output of parsing a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedScript {
    /// Top-level statements in script order.
    pub statements: Vec<StatementNode>,

    /// Syntax errors; empty when the script is valid.
    pub errors: Vec<SyntaxError>,

    /// Joins in script order.
    pub joins: Vec<JoinKind>,

    /// Number of non-whitespace tokens.
    pub token_count: usize,

    /// Modifying command keywords found anywhere in the script, whether or
    /// not the statement around them parsed.
    pub command_keywords: Vec<StatementKind>,
}

impl ParsedScript {
    /// Whether the script parsed without errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Every statement, nested ones included, in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = &StatementNode> {
        self.statements.iter().flat_map(StatementNode::walk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_is_pre_order() {
        let tree = StatementNode::new(StatementKind::CreateProcedure)
            .with_child(StatementNode::new(StatementKind::Select))
            .with_child(
                StatementNode::new(StatementKind::Other)
                    .with_child(StatementNode::new(StatementKind::Delete)),
            );

        let kinds: Vec<StatementKind> = tree.walk().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StatementKind::CreateProcedure,
                StatementKind::Select,
                StatementKind::Other,
                StatementKind::Delete
            ]
        );
    }

    #[test]
    fn test_kind_groups() {
        assert!(StatementKind::CreateView.is_create());
        assert!(StatementKind::AlterDatabase.is_alter());
        assert!(StatementKind::Merge.is_dml());
        assert!(!StatementKind::Select.is_dml());
        assert!(JoinKind::Apply.is_unqualified());
        assert!(!JoinKind::Inner.is_unqualified());
    }

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError {
            line: 2,
            column: 5,
            offset: 12,
            message: "Expected an expression".to_string(),
        };
        assert_eq!(err.to_string(), "Expected an expression (Line 2, Column 5)");
    }
}
