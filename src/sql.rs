//! T-SQL syntax analysis.
//!
//! - [`parse_script`]: parse a script into a [`ParsedScript`]
//! - [`ScriptSummary`]: documentation fold over a parsed script
//! - [`SqlVersion`]: accepted compatibility levels

pub mod document;
pub mod parser;
pub mod tree;
pub mod version;

pub use document::{render_markdown, ProcedureSummary, ScriptSummary};
pub use parser::{kind_from_text, parse_script};
pub use tree::{
    JoinKind, ParsedScript, ProcedureParameter, ProcedureSignature, StatementKind, StatementNode,
    SyntaxError,
};
pub use version::SqlVersion;
