//! T-SQL parsing on top of sqlparser's MS SQL dialect.
//!
//! The sqlparser AST never leaves this module. Statements are folded into
//! [`StatementNode`] trees; joins and token counts come from the token stream.
//!
//! When the whole script fails to parse, the token stream is split at `;` and
//! `GO` separators and each chunk is parsed on its own. Chunks that still fail
//! are classified from their keywords.
//!
//! Independently of the AST, every unquoted DROP, DELETE, UPDATE, TRUNCATE and
//! ALTER TABLE/DATABASE word in the token stream is recorded. These are
//! reserved words in T-SQL, so they cannot hide as aliases, and the record
//! does not depend on the script being valid.

use crate::sql::tree::{
    JoinKind, ParsedScript, ProcedureParameter, ProcedureSignature, StatementKind, StatementNode,
    SyntaxError,
};
use crate::sql::version::SqlVersion;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::{Expr, ObjectName, Query, Statement, TableFactor, Visit, Visitor};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::ops::ControlFlow;
use tracing::debug;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

/// Leading-keyword patterns, checked in order.
static STATEMENT_PATTERNS: Lazy<Vec<(Regex, StatementKind)>> = Lazy::new(|| {
    vec![
        (compile(r"(?i)^\s*SELECT\b"), StatementKind::Select),
        (compile(r"(?i)^\s*INSERT\b"), StatementKind::Insert),
        (compile(r"(?i)^\s*UPDATE\b"), StatementKind::Update),
        (compile(r"(?i)^\s*DELETE\b"), StatementKind::Delete),
        (compile(r"(?i)^\s*MERGE\b"), StatementKind::Merge),
        (compile(r"(?i)^\s*DROP\b"), StatementKind::Drop),
        (compile(r"(?i)^\s*TRUNCATE\b"), StatementKind::Truncate),
        (compile(r"(?i)^\s*ALTER\s+TABLE\b"), StatementKind::AlterTable),
        (compile(r"(?i)^\s*ALTER\s+DATABASE\b"), StatementKind::AlterDatabase),
        (compile(r"(?i)^\s*ALTER\b"), StatementKind::AlterOther),
        (
            compile(r"(?i)^\s*CREATE\s+(?:OR\s+ALTER\s+)?TABLE\b"),
            StatementKind::CreateTable,
        ),
        (
            compile(r"(?i)^\s*CREATE\s+(?:OR\s+ALTER\s+)?VIEW\b"),
            StatementKind::CreateView,
        ),
        (
            compile(r"(?i)^\s*CREATE\s+(?:UNIQUE\s+)?(?:(?:NON)?CLUSTERED\s+)?INDEX\b"),
            StatementKind::CreateIndex,
        ),
        (
            compile(r"(?i)^\s*CREATE\s+(?:OR\s+ALTER\s+)?PROC(?:EDURE)?\b"),
            StatementKind::CreateProcedure,
        ),
        (
            compile(r"(?i)^\s*CREATE\s+(?:OR\s+ALTER\s+)?FUNCTION\b"),
            StatementKind::CreateFunction,
        ),
        (compile(r"(?i)^\s*CREATE\b"), StatementKind::CreateOther),
        (
            compile(r"(?i)^\s*BEGIN\s+(?:DISTRIBUTED\s+)?TRAN(?:SACTION)?\b"),
            StatementKind::BeginTransaction,
        ),
        (compile(r"(?i)^\s*COMMIT\b"), StatementKind::Commit),
        (compile(r"(?i)^\s*ROLLBACK\b"), StatementKind::Rollback),
        (compile(r"(?i)^\s*EXEC(?:UTE)?\b"), StatementKind::Execute),
        (compile(r"(?i)^\s*DECLARE\b"), StatementKind::Declare),
        (compile(r"(?i)^\s*SET\b"), StatementKind::Set),
        (compile(r"(?i)^\s*USE\b"), StatementKind::Use),
    ]
});

static ERROR_LOCATION: Lazy<Regex> = Lazy::new(|| compile(r"\s*at Line: (\d+), Column: (\d+)"));

static PROCEDURE_NAME: Lazy<Regex> =
    Lazy::new(|| compile(r"(?i)^\s*CREATE\s+(?:OR\s+ALTER\s+)?PROC(?:EDURE)?\s+([^\s(]+)"));

static PROCEDURE_PARAMETER: Lazy<Regex> =
    Lazy::new(|| compile(r"@(\w+)\s+(?:AS\s+)?([A-Za-z_][\w.]*(?:\s*\(\s*[\w\s,]*\))?)"));

static PROCEDURE_BODY: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bAS\b"));

/// Matches blocked command words in text the tokenizer rejected.
static COMMAND_WORDS: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(DROP|DELETE|UPDATE|TRUNCATE|ALTER\s+TABLE|ALTER\s+DATABASE)\b")
});

/// Keywords that may start a statement nested in an unparsed chunk.
const NESTED_STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "DROP", "TRUNCATE", "ALTER", "CREATE", "EXEC",
    "EXECUTE",
];

const CTE_BODY_KEYWORDS: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE", "MERGE"];

/// Parse a T-SQL script.
///
/// All compatibility levels share the MS SQL grammar.
pub fn parse_script(sql: &str, version: SqlVersion) -> ParsedScript {
    let dialect = MsSqlDialect {};

    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!("Tokenizer rejected script for {}: {}", version, e);
            return ParsedScript {
                statements: classify_text_chunks(sql),
                errors: vec![syntax_error(sql, &e.to_string())],
                joins: Vec::new(),
                token_count: 0,
                command_keywords: scan_command_text(sql),
            };
        }
    };

    let significant: Vec<&Token> = tokens.iter().filter(|t| !is_whitespace(t)).collect();
    let joins = scan_joins(&significant);
    let command_keywords = scan_command_keywords(&significant);
    let token_count = significant.len();

    let (statements, errors) = match Parser::new(&dialect)
        .with_tokens(tokens.clone())
        .parse_statements()
    {
        Ok(statements) => (statements.iter().flat_map(build_nodes).collect(), Vec::new()),
        Err(e) => {
            debug!("Script failed to parse for {}, recovering per chunk: {}", version, e);
            (recover_chunks(&dialect, &tokens), vec![syntax_error(sql, &e.to_string())])
        }
    };

    ParsedScript {
        statements,
        errors,
        joins,
        token_count,
        command_keywords,
    }
}

// ============================================================================
// AST folding
// ============================================================================

/// Builds statement trees from the sqlparser visitor callbacks.
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<StatementNode>,
    roots: Vec<StatementNode>,
}

impl TreeBuilder {
    fn current(&mut self) -> Option<&mut StatementNode> {
        self.stack.last_mut()
    }
}

impl Visitor for TreeBuilder {
    type Break = ();

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<Self::Break> {
        let text = statement.to_string();
        let kind = statement_kind(statement, &text);
        self.stack.push(StatementNode {
            kind,
            procedure: (kind == StatementKind::CreateProcedure)
                .then(|| procedure_signature(&text))
                .flatten(),
            parsed: true,
            ..Default::default()
        });
        ControlFlow::Continue(())
    }

    fn post_visit_statement(&mut self, _statement: &Statement) -> ControlFlow<Self::Break> {
        if let Some(node) = self.stack.pop() {
            match self.stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => self.roots.push(node),
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        if let Some(node) = self.current() {
            push_unique(&mut node.tables, relation.to_string());
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(node) = self.current() {
            node.ctes += query.with.as_ref().map_or(0, |with| with.cte_tables.len());
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<Self::Break> {
        if let (TableFactor::Derived { .. }, Some(node)) = (table_factor, self.current()) {
            node.subqueries += 1;
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        let Some(node) = self.current() else {
            return ControlFlow::Continue(());
        };
        match expr {
            Expr::Function(function) => push_unique(&mut node.functions, function.name.to_string()),
            Expr::Subquery { .. } | Expr::Exists { .. } | Expr::InSubquery { .. } => {
                node.subqueries += 1
            }
            Expr::Case { .. } => node.case_expressions += 1,
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

fn build_nodes(statement: &Statement) -> Vec<StatementNode> {
    let mut builder = TreeBuilder::default();
    let _ = statement.visit(&mut builder);
    builder.roots
}

fn statement_kind(statement: &Statement, text: &str) -> StatementKind {
    match statement {
        // WITH ... DELETE/UPDATE parses as a query; look past the CTE prefix.
        Statement::Query { .. } => match kind_from_text(text) {
            StatementKind::Other => StatementKind::Select,
            kind => kind,
        },
        Statement::Insert { .. } => StatementKind::Insert,
        Statement::Update { .. } => StatementKind::Update,
        Statement::Delete { .. } => StatementKind::Delete,
        Statement::Merge { .. } => StatementKind::Merge,
        Statement::Drop { .. } => StatementKind::Drop,
        Statement::Truncate { .. } => StatementKind::Truncate,
        Statement::AlterTable { .. } => StatementKind::AlterTable,
        Statement::CreateTable { .. } => StatementKind::CreateTable,
        Statement::CreateView { .. } => StatementKind::CreateView,
        Statement::CreateIndex { .. } => StatementKind::CreateIndex,
        Statement::CreateProcedure { .. } => StatementKind::CreateProcedure,
        Statement::CreateFunction { .. } => StatementKind::CreateFunction,
        Statement::StartTransaction { .. } => StatementKind::BeginTransaction,
        Statement::Commit { .. } => StatementKind::Commit,
        Statement::Rollback { .. } => StatementKind::Rollback,
        Statement::Execute { .. } => StatementKind::Execute,
        Statement::Declare { .. } => StatementKind::Declare,
        Statement::Set { .. } => StatementKind::Set,
        Statement::Use { .. } => StatementKind::Use,
        _ => kind_from_text(text),
    }
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.iter().any(|existing| existing.eq_ignore_ascii_case(&item)) {
        items.push(item);
    }
}

// ============================================================================
// Keyword classification
// ============================================================================

/// Classify a statement from its leading keywords.
///
/// A leading CTE (`WITH name AS (...)`) is skipped to reach the statement it
/// feeds.
pub fn kind_from_text(text: &str) -> StatementKind {
    let text = skip_cte_prefix(text);
    STATEMENT_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, kind)| *kind)
        .unwrap_or(StatementKind::Other)
}

/// Returns the text starting at the first top-level DML keyword after a
/// `WITH` clause, or the input unchanged.
fn skip_cte_prefix(text: &str) -> &str {
    let trimmed = text.trim_start();
    let starts_with_with = trimmed
        .get(..4)
        .is_some_and(|head| head.eq_ignore_ascii_case("WITH"))
        && trimmed[4..].starts_with(|c: char| c.is_whitespace());
    if !starts_with_with {
        return text;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut word_start: Option<usize> = None;

    for (i, c) in trimmed.char_indices() {
        if in_string {
            if c == '\'' {
                in_string = false;
            }
            continue;
        }
        let is_word_char = c.is_alphanumeric() || c == '_';
        if is_word_char {
            word_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = word_start.take() {
            if depth == 0 && is_cte_body(&trimmed[start..i]) {
                return &trimmed[start..];
            }
        }
        match c {
            '\'' => in_string = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    match word_start {
        Some(start) if depth == 0 && is_cte_body(&trimmed[start..]) => &trimmed[start..],
        _ => text,
    }
}

fn is_cte_body(word: &str) -> bool {
    CTE_BODY_KEYWORDS
        .iter()
        .any(|keyword| word.eq_ignore_ascii_case(keyword))
}

fn procedure_signature(text: &str) -> Option<ProcedureSignature> {
    let captures = PROCEDURE_NAME.captures(text)?;
    let name_match = captures.get(1)?;
    let rest = &text[name_match.end()..];
    let header = PROCEDURE_BODY
        .find(rest)
        .map_or(rest, |body| &rest[..body.start()]);

    let parameters = PROCEDURE_PARAMETER
        .captures_iter(header)
        .map(|c| ProcedureParameter {
            name: format!("@{}", &c[1]),
            data_type: c[2].split_whitespace().collect::<Vec<_>>().join(" "),
        })
        .collect();

    Some(ProcedureSignature {
        name: name_match.as_str().to_string(),
        parameters,
    })
}

// ============================================================================
// Recovery
// ============================================================================

fn recover_chunks(dialect: &MsSqlDialect, tokens: &[Token]) -> Vec<StatementNode> {
    split_batches(tokens)
        .into_iter()
        .flat_map(|chunk| {
            let parsed = Parser::new(dialect)
                .with_tokens(chunk.to_vec())
                .parse_statements();
            match parsed {
                Ok(statements) => statements.iter().flat_map(build_nodes).collect(),
                Err(_) => vec![classify_chunk(chunk)],
            }
        })
        .collect()
}

/// Splits a token stream at `;` and at `GO` lines, dropping empty chunks.
fn split_batches(tokens: &[Token]) -> Vec<&[Token]> {
    let mut chunks = Vec::new();
    let mut start = 0;

    for (i, token) in tokens.iter().enumerate() {
        let separator = matches!(token, Token::SemiColon) || is_go_separator(tokens, i);
        if separator {
            chunks.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    chunks.push(&tokens[start..]);

    chunks
        .into_iter()
        .filter(|chunk| chunk.iter().any(|t| !is_whitespace(t)))
        .collect()
}

fn is_go_separator(tokens: &[Token], i: usize) -> bool {
    if word_upper(&tokens[i]).as_deref() != Some("GO") {
        return false;
    }
    let line_break = |t: &Token| {
        matches!(
            t,
            Token::Whitespace(Whitespace::Newline) | Token::Whitespace(Whitespace::SingleLineComment { .. })
        )
    };
    let inline_space = |t: &&Token| {
        matches!(t, Token::Whitespace(Whitespace::Space) | Token::Whitespace(Whitespace::Tab))
    };

    let before = tokens[..i].iter().rev().find(|t| !inline_space(t));
    let after = tokens[i + 1..].iter().find(|t| !inline_space(t));
    before.is_none_or(line_break)
        && after.is_none_or(|t| line_break(t) || matches!(t, Token::EOF))
}

/// Classifies an unparsable chunk from its leading keywords, plus a child for
/// every statement keyword found later in the chunk.
fn classify_chunk(chunk: &[Token]) -> StatementNode {
    let text: String = chunk.iter().map(|t| t.to_string()).collect();
    let mut node = StatementNode::new(kind_from_text(&text));
    if node.kind == StatementKind::CreateProcedure {
        node.procedure = procedure_signature(&text);
    }

    let significant: Vec<&Token> = chunk.iter().filter(|t| !is_whitespace(t)).collect();
    let words: Vec<Option<String>> = significant.iter().map(|t| word_upper(t)).collect();
    for i in 1..significant.len() {
        let Some(word) = words[i].as_deref() else {
            continue;
        };
        if !NESTED_STATEMENT_KEYWORDS.contains(&word)
            || matches!(significant[i - 1], Token::LParen)
            || is_clause_keyword(&significant, &words, i)
        {
            continue;
        }
        let rest: String = significant[i..]
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        node.children.push(StatementNode::new(kind_from_text(&rest)));
    }
    node
}

/// Classifies text that could not even be tokenized.
fn classify_text_chunks(sql: &str) -> Vec<StatementNode> {
    sql.split(';')
        .flat_map(|part| part.split("\nGO"))
        .filter(|part| !part.trim().is_empty())
        .map(|part| StatementNode::new(kind_from_text(part)))
        .collect()
}

// ============================================================================
// Command keywords
// ============================================================================

/// Blocked command keywords in a token stream, deduplicated in first-seen
/// order.
fn scan_command_keywords(significant: &[&Token]) -> Vec<StatementKind> {
    let words: Vec<Option<String>> = significant.iter().map(|t| word_upper(t)).collect();
    let mut kinds = Vec::new();
    for i in 0..words.len() {
        let kind = match words[i].as_deref() {
            Some("DROP") => StatementKind::Drop,
            Some("DELETE") => StatementKind::Delete,
            Some("UPDATE") => StatementKind::Update,
            Some("TRUNCATE") => StatementKind::Truncate,
            Some("ALTER") => match words.get(i + 1).and_then(|w| w.as_deref()) {
                Some("TABLE") => StatementKind::AlterTable,
                Some("DATABASE") => StatementKind::AlterDatabase,
                _ => continue,
            },
            _ => continue,
        };
        if !is_clause_keyword(significant, &words, i) && !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}

/// Whether the command word at `i` is part of another statement's clause
/// rather than a statement of its own:
///
/// - referential actions (`ON DELETE CASCADE`, `ON UPDATE SET NULL`, `ON DELETE NO ACTION`)
/// - trigger events before the trigger body (`AFTER DELETE`, `FOR INSERT, UPDATE`)
/// - `INSTEAD OF DELETE` and cursor `FOR UPDATE [OF ...]`
/// - `DROP COLUMN` / `DROP CONSTRAINT`, which only occur inside ALTER TABLE
///
/// `FOR` and `OF` are reserved and never end a statement. `ON` does (`SET
/// NOCOUNT ON`), so it needs the action after it. `AFTER` is not reserved, so
/// it only counts inside a trigger header.
fn is_clause_keyword(significant: &[&Token], words: &[Option<String>], i: usize) -> bool {
    let word_at = |j: usize| words.get(j).and_then(|w| w.as_deref());
    match word_at(i) {
        Some("DELETE" | "UPDATE") => {
            let previous = i.checked_sub(1).and_then(word_at);
            let referential_action = match (word_at(i + 1), word_at(i + 2)) {
                (Some("CASCADE"), _) => true,
                (Some("SET"), Some("NULL" | "DEFAULT")) => true,
                (Some("NO"), Some("ACTION")) => true,
                _ => false,
            };
            let listed_event = i >= 2
                && matches!(significant[i - 1], Token::Comma)
                && matches!(word_at(i - 2), Some("INSERT" | "UPDATE" | "DELETE"));
            match previous {
                Some("FOR" | "OF") => true,
                Some("ON") => referential_action,
                Some("AFTER") => in_trigger_header(words, i),
                _ => listed_event && in_trigger_header(words, i),
            }
        }
        Some("DROP") => matches!(word_at(i + 1), Some("COLUMN" | "CONSTRAINT")),
        _ => false,
    }
}

/// Whether position `i` follows a `TRIGGER` keyword with no `AS` in between.
fn in_trigger_header(words: &[Option<String>], i: usize) -> bool {
    for word in words[..i].iter().rev().flatten() {
        match word.as_str() {
            "TRIGGER" => return true,
            "AS" => return false,
            _ => {}
        }
    }
    false
}

/// Blocked command words in text that could not be tokenized.
fn scan_command_text(sql: &str) -> Vec<StatementKind> {
    let mut kinds = Vec::new();
    for found in COMMAND_WORDS.find_iter(sql) {
        let kind = kind_from_text(found.as_str());
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}

// ============================================================================
// Token helpers
// ============================================================================

fn is_whitespace(token: &Token) -> bool {
    matches!(token, Token::Whitespace(_) | Token::EOF)
}

fn word_upper(token: &Token) -> Option<String> {
    match token {
        Token::Word(word) if word.quote_style.is_none() => Some(word.value.to_uppercase()),
        _ => None,
    }
}

/// Finds every JOIN and APPLY in the token stream.
fn scan_joins(significant: &[&Token]) -> Vec<JoinKind> {
    let words: Vec<Option<String>> = significant.iter().map(|t| word_upper(t)).collect();
    let word_at = |i: usize| words.get(i).and_then(|w| w.as_deref());

    let mut joins = Vec::new();
    for i in 0..words.len() {
        match word_at(i) {
            Some("JOIN") => {
                // Skip OUTER and join hints to reach the join type keyword.
                let mut j = i;
                while j > 0 && matches!(word_at(j - 1), Some("OUTER" | "HASH" | "LOOP" | "MERGE" | "REMOTE")) {
                    j -= 1;
                }
                let kind = match j.checked_sub(1).and_then(word_at) {
                    Some("LEFT") => JoinKind::LeftOuter,
                    Some("RIGHT") => JoinKind::RightOuter,
                    Some("FULL") => JoinKind::FullOuter,
                    Some("CROSS") => JoinKind::Cross,
                    _ => JoinKind::Inner,
                };
                joins.push(kind);
            }
            Some("APPLY") if matches!(i.checked_sub(1).and_then(word_at), Some("CROSS" | "OUTER")) => {
                joins.push(JoinKind::Apply)
            }
            _ => {}
        }
    }
    joins
}

// ============================================================================
// Errors
// ============================================================================

fn syntax_error(sql: &str, raw: &str) -> SyntaxError {
    let message = raw
        .trim_start_matches("sql parser error: ")
        .trim_start_matches("sql tokenizer error: ");

    let (line, column) = ERROR_LOCATION
        .captures(message)
        .and_then(|c| Some((c[1].parse::<usize>().ok()?, c[2].parse::<usize>().ok()?)))
        .unwrap_or((1, 1));
    let message = ERROR_LOCATION.replace(message, "").trim().to_string();

    SyntaxError {
        line: line.max(1),
        column: column.max(1),
        offset: char_offset(sql, line, column),
        message,
    }
}

/// Character offset of a 1-based line/column position.
fn char_offset(sql: &str, line: usize, column: usize) -> usize {
    let preceding: usize = sql
        .split('\n')
        .take(line.saturating_sub(1))
        .map(|l| l.chars().count() + 1)
        .sum();
    (preceding + column.saturating_sub(1)).min(sql.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> ParsedScript {
        parse_script(sql, SqlVersion::default())
    }

    fn kinds(script: &ParsedScript) -> Vec<StatementKind> {
        script.nodes().map(|n| n.kind).collect()
    }

    #[test]
    fn test_valid_select() {
        let script = parse("SELECT id, name FROM dbo.Users WHERE id = 1");
        assert!(script.is_valid());
        assert_eq!(kinds(&script), vec![StatementKind::Select]);
        assert_eq!(script.statements[0].tables, vec!["dbo.Users"]);
        assert!(script.statements[0].parsed);
        assert!(script.token_count > 5);
    }

    #[test]
    fn test_multiple_statements() {
        let script = parse("SELECT 1; DELETE FROM t WHERE id = 2; UPDATE t SET a = 1");
        assert!(script.is_valid());
        assert_eq!(
            kinds(&script),
            vec![StatementKind::Select, StatementKind::Delete, StatementKind::Update]
        );
    }

    #[test]
    fn test_syntax_error_has_position() {
        let script = parse("SELECT * FROM");
        assert!(!script.is_valid());
        let err = &script.errors[0];
        assert!(err.line >= 1);
        assert!(err.column >= 1);
        assert!(!err.message.is_empty());
        assert!(!err.message.contains("Line:"));
    }

    #[test]
    fn test_recovery_classifies_unparsable_chunks() {
        let script = parse("SELEC oops FROM;\nDROP TABLE dbo.Users");
        assert!(!script.is_valid());
        assert!(kinds(&script).contains(&StatementKind::Drop));
    }

    #[test]
    fn test_recovery_finds_nested_statements() {
        let script = parse("IF EXISTS (SELECT 1 FROM t) DROP TABLE t ELSE TRUNCATE TABLE t WITH WHATEVER((");
        assert!(!script.is_valid());
        let found = kinds(&script);
        assert!(found.contains(&StatementKind::Drop));
        assert!(found.contains(&StatementKind::Truncate));
    }

    #[test]
    fn test_command_keywords_from_tokens() {
        let script = parse("SELECT 1 DELETE FROM t");
        assert_eq!(script.command_keywords, vec![StatementKind::Delete]);

        let script = parse("EXEC sp_who\nALTER DATABASE db SET OFFLINE\nDROP TABLE t");
        assert_eq!(
            script.command_keywords,
            vec![StatementKind::AlterDatabase, StatementKind::Drop]
        );

        let script = parse("SELECT \"update\", [drop] FROM t WHERE note = 'DELETE'");
        assert!(script.command_keywords.is_empty());
    }

    #[test]
    fn test_command_keywords_when_tokenizer_fails() {
        let script = parse("UPDATE t SET a = 'unterminated");
        assert!(!script.is_valid());
        assert_eq!(script.command_keywords, vec![StatementKind::Update]);
    }

    #[test]
    fn test_clause_keywords_not_commands() {
        let script = parse("CREATE TABLE o (u INT REFERENCES u(id) ON DELETE SET NULL)");
        assert!(script.command_keywords.is_empty());

        let script = parse("SET NOCOUNT ON\nUPDATE t SET a = 1");
        assert_eq!(script.command_keywords, vec![StatementKind::Update]);
    }

    #[test]
    fn test_go_splits_batches() {
        let script = parse("SELECT 1\nGO\nDELETE FROM t WHERE (\nGO\n");
        assert!(kinds(&script).contains(&StatementKind::Delete));
    }

    #[test]
    fn test_kind_from_text() {
        assert_eq!(kind_from_text("  select 1"), StatementKind::Select);
        assert_eq!(kind_from_text("ALTER TABLE t ADD c INT"), StatementKind::AlterTable);
        assert_eq!(kind_from_text("alter database x set offline"), StatementKind::AlterDatabase);
        assert_eq!(kind_from_text("ALTER VIEW v AS SELECT 1"), StatementKind::AlterOther);
        assert_eq!(kind_from_text("CREATE PROC p AS SELECT 1"), StatementKind::CreateProcedure);
        assert_eq!(kind_from_text("CREATE UNIQUE INDEX ix ON t(a)"), StatementKind::CreateIndex);
        assert_eq!(kind_from_text("BEGIN TRAN"), StatementKind::BeginTransaction);
        assert_eq!(kind_from_text("EXEC sp_who"), StatementKind::Execute);
        assert_eq!(kind_from_text("PRINT 'x'"), StatementKind::Other);
    }

    #[test]
    fn test_cte_prefix_skipped() {
        assert_eq!(
            kind_from_text("WITH c AS (SELECT id FROM t WHERE x = '(') DELETE FROM c"),
            StatementKind::Delete
        );
        assert_eq!(
            kind_from_text("WITH c AS (SELECT 1 AS a) SELECT a FROM c"),
            StatementKind::Select
        );
    }

    #[test]
    fn test_joins_counted() {
        let script = parse(
            "SELECT * FROM a INNER JOIN b ON a.id = b.id LEFT OUTER JOIN c ON c.id = a.id \
             CROSS JOIN d JOIN e ON e.id = a.id",
        );
        assert_eq!(
            script.joins,
            vec![JoinKind::Inner, JoinKind::LeftOuter, JoinKind::Cross, JoinKind::Inner]
        );
    }

    #[test]
    fn test_apply_counted_from_tokens() {
        let script = parse("SELECT * FROM a CROSS APPLY f(a.id) x OUTER APPLY g(a.id) y");
        assert_eq!(script.joins, vec![JoinKind::Apply, JoinKind::Apply]);
    }

    #[test]
    fn test_functions_subqueries_and_cases() {
        let script = parse(
            "SELECT COUNT(*), CASE WHEN a > 1 THEN 'x' ELSE 'y' END \
             FROM t WHERE id IN (SELECT id FROM u) AND EXISTS (SELECT 1 FROM v)",
        );
        assert!(script.is_valid());
        let select = &script.statements[0];
        assert!(select.functions.iter().any(|f| f.eq_ignore_ascii_case("COUNT")));
        assert_eq!(select.case_expressions, 1);
        assert_eq!(select.subqueries, 2);
    }

    #[test]
    fn test_cte_counted() {
        let script = parse("WITH a AS (SELECT 1 AS x), b AS (SELECT 2 AS y) SELECT * FROM a, b");
        assert!(script.is_valid());
        let ctes: usize = script.nodes().map(|n| n.ctes).sum();
        assert_eq!(ctes, 2);
    }

    #[test]
    fn test_procedure_signature() {
        let signature = procedure_signature(
            "CREATE PROCEDURE dbo.GetUser @Id INT, @Name NVARCHAR(50) = NULL AS BEGIN SELECT 1 END",
        )
        .unwrap();
        assert_eq!(signature.name, "dbo.GetUser");
        assert_eq!(
            signature.parameters,
            vec![
                ProcedureParameter {
                    name: "@Id".to_string(),
                    data_type: "INT".to_string()
                },
                ProcedureParameter {
                    name: "@Name".to_string(),
                    data_type: "NVARCHAR(50)".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_char_offset() {
        assert_eq!(char_offset("SELECT\nFROM x", 2, 1), 7);
        assert_eq!(char_offset("SELECT 1", 1, 8), 7);
        assert_eq!(char_offset("", 3, 3), 0);
    }

    #[test]
    fn test_error_location_extracted() {
        let err = syntax_error(
            "SELECT\nFROM",
            "sql parser error: Expected: an expression, found: FROM at Line: 2, Column: 1",
        );
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 1);
        assert_eq!(err.offset, 7);
        assert_eq!(err.message, "Expected: an expression, found: FROM");
    }
}
