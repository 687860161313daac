//! Script documentation: a fold over the statement tree plus Markdown rendering.

use crate::sql::tree::{JoinKind, ParsedScript, ProcedureParameter, StatementKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;

/// A stored procedure defined by the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureSummary {
    pub name: String,
    pub parameters: Vec<ProcedureParameter>,
    pub tables_used: BTreeSet<String>,
}

/// Counts and names collected from a script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSummary {
    pub total_statements: usize,
    pub selects: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    pub creates: usize,
    pub alters: usize,
    pub drops: usize,
    pub transactions: usize,

    pub inner_joins: usize,
    pub left_joins: usize,
    pub right_joins: usize,
    pub full_joins: usize,
    pub cross_joins: usize,

    pub subqueries: usize,
    pub ctes: usize,
    pub case_expressions: usize,

    pub tables: BTreeSet<String>,
    pub functions: BTreeSet<String>,
    pub procedures: Vec<ProcedureSummary>,
}

impl ScriptSummary {
    /// Fold a parsed script into its summary.
    pub fn from_script(script: &ParsedScript) -> Self {
        let mut summary = ScriptSummary::default();

        for node in script.nodes() {
            summary.total_statements += 1;
            match node.kind {
                StatementKind::Select => summary.selects += 1,
                StatementKind::Insert => summary.inserts += 1,
                StatementKind::Update => summary.updates += 1,
                StatementKind::Delete => summary.deletes += 1,
                StatementKind::Drop => summary.drops += 1,
                StatementKind::BeginTransaction => summary.transactions += 1,
                kind if kind.is_create() => summary.creates += 1,
                kind if kind.is_alter() => summary.alters += 1,
                _ => {}
            }

            summary.subqueries += node.subqueries;
            summary.ctes += node.ctes;
            summary.case_expressions += node.case_expressions;
            summary.tables.extend(node.tables.iter().cloned());
            summary.functions.extend(node.functions.iter().cloned());

            if let Some(signature) = &node.procedure {
                summary.procedures.push(ProcedureSummary {
                    name: signature.name.clone(),
                    parameters: signature.parameters.clone(),
                    tables_used: node.walk().flat_map(|n| n.tables.iter().cloned()).collect(),
                });
            }
        }

        for join in &script.joins {
            match join {
                JoinKind::Inner => summary.inner_joins += 1,
                JoinKind::LeftOuter => summary.left_joins += 1,
                JoinKind::RightOuter => summary.right_joins += 1,
                JoinKind::FullOuter => summary.full_joins += 1,
                JoinKind::Cross | JoinKind::Apply => summary.cross_joins += 1,
            }
        }

        summary
    }

    /// All joins of any kind.
    pub fn joins(&self) -> usize {
        self.inner_joins + self.left_joins + self.right_joins + self.full_joins + self.cross_joins
    }

    fn dml_statements(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }

    /// Complexity score from 1 to 10.
    pub fn complexity(&self) -> usize {
        let raw = self.selects
            + 2 * self.inserts
            + 2 * self.updates
            + 2 * self.deletes
            + 2 * self.joins()
            + 3 * self.subqueries
            + 2 * self.ctes
            + self.case_expressions;
        (raw / 3).clamp(1, 10)
    }

    /// Review recommendations, in a fixed order.
    pub fn recommendations(&self) -> Vec<&'static str> {
        let mut recommendations = Vec::new();
        if self.selects > 5 {
            recommendations.push("Consider consolidating multiple SELECT statements if possible");
        }
        if self.subqueries > 3 {
            recommendations.push(
                "High number of subqueries detected - consider using CTEs for better readability",
            );
        }
        if self.joins() > 5 {
            recommendations.push("Complex JOIN structure - ensure proper indexing on join columns");
        }
        if self.deletes > 0 && self.transactions == 0 {
            recommendations.push(
                "DELETE statements without explicit transaction - consider wrapping in BEGIN TRANSACTION",
            );
        }
        if self.cross_joins > 0 {
            recommendations.push(
                "CROSS JOIN or APPLY detected - ensure this is intentional as it can create cartesian products",
            );
        }
        if self.transactions > self.dml_statements() {
            recommendations
                .push("More transactions than DML statements - review transaction boundaries");
        }
        recommendations
    }

    /// One-line summary.
    pub fn headline(&self) -> String {
        format!(
            "{} statements, {} tables, {} joins, complexity {}/10",
            self.total_statements,
            self.tables.len(),
            self.joins(),
            self.complexity()
        )
    }
}

/// Render the Markdown documentation for a script.
pub fn render_markdown(summary: &ScriptSummary, sql: &str) -> String {
    let mut out = String::new();
    let _ = render_into(&mut out, summary, sql);
    out
}

fn render_into(out: &mut String, s: &ScriptSummary, sql: &str) -> std::fmt::Result {
    writeln!(out, "# SQL Script Documentation\n")?;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total Statements:** {}", s.total_statements)?;
    writeln!(out, "- **Tables Referenced:** {}", s.tables.len())?;
    writeln!(out, "- **Functions Used:** {}", s.functions.len())?;
    writeln!(out, "- **Stored Procedures:** {}", s.procedures.len())?;
    writeln!(out, "- **Complexity Score:** {}/10\n", s.complexity())?;

    writeln!(out, "## Statement Breakdown\n")?;
    writeln!(out, "- **SELECT Statements:** {}", s.selects)?;
    writeln!(out, "- **INSERT Statements:** {}", s.inserts)?;
    writeln!(out, "- **UPDATE Statements:** {}", s.updates)?;
    writeln!(out, "- **DELETE Statements:** {}", s.deletes)?;
    writeln!(out, "- **CREATE Statements:** {}", s.creates)?;
    writeln!(out, "- **ALTER Statements:** {}", s.alters)?;
    writeln!(out, "- **DROP Statements:** {}\n", s.drops)?;

    if !s.tables.is_empty() {
        writeln!(out, "## Tables Referenced\n")?;
        for table in &s.tables {
            writeln!(out, "- `{}`", table)?;
        }
        writeln!(out)?;
    }

    if !s.functions.is_empty() {
        writeln!(out, "## Functions Used\n")?;
        for function in &s.functions {
            writeln!(out, "- `{}`", function)?;
        }
        writeln!(out)?;
    }

    if !s.procedures.is_empty() {
        writeln!(out, "## Stored Procedures\n")?;
        for procedure in &s.procedures {
            writeln!(out, "### `{}`\n", procedure.name)?;
            if !procedure.parameters.is_empty() {
                writeln!(out, "**Parameters:**")?;
                for param in &procedure.parameters {
                    writeln!(out, "- `{}` ({})", param.name, param.data_type)?;
                }
                writeln!(out)?;
            }
            if !procedure.tables_used.is_empty() {
                writeln!(out, "**Tables Used:**")?;
                for table in &procedure.tables_used {
                    writeln!(out, "- `{}`", table)?;
                }
                writeln!(out)?;
            }
        }
    }

    if s.joins() > 0 {
        writeln!(out, "## Join Analysis\n")?;
        writeln!(out, "- **Total Joins:** {}", s.joins())?;
        writeln!(out, "- **INNER JOINs:** {}", s.inner_joins)?;
        writeln!(out, "- **LEFT JOINs:** {}", s.left_joins)?;
        writeln!(out, "- **RIGHT JOINs:** {}", s.right_joins)?;
        writeln!(out, "- **FULL JOINs:** {}", s.full_joins)?;
        writeln!(out, "- **CROSS JOINs / APPLY:** {}\n", s.cross_joins)?;
    }

    writeln!(out, "## Complexity Analysis\n")?;
    writeln!(out, "- **Subqueries:** {}", s.subqueries)?;
    writeln!(out, "- **CTEs (WITH clauses):** {}", s.ctes)?;
    writeln!(out, "- **CASE expressions:** {}", s.case_expressions)?;
    writeln!(out, "- **Transactions:** {}\n", s.transactions)?;

    let recommendations = s.recommendations();
    if !recommendations.is_empty() {
        writeln!(out, "## Recommendations\n")?;
        for recommendation in recommendations {
            writeln!(out, "- {}", recommendation)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Original SQL\n")?;
    writeln!(out, "```sql\n{}\n```", sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::tree::{ProcedureSignature, StatementNode};

    fn node(kind: StatementKind) -> StatementNode {
        StatementNode::new(kind)
    }

    #[test]
    fn test_fold_counts_nested_statements() {
        let mut select = node(StatementKind::Select);
        select.tables = vec!["dbo.Users".to_string()];
        select.functions = vec!["COUNT".to_string()];
        select.subqueries = 1;

        let mut delete = node(StatementKind::Delete);
        delete.tables = vec!["dbo.Audit".to_string()];

        let mut procedure = node(StatementKind::CreateProcedure)
            .with_child(select)
            .with_child(delete);
        procedure.procedure = Some(ProcedureSignature {
            name: "dbo.Cleanup".to_string(),
            parameters: vec![ProcedureParameter {
                name: "@Days".to_string(),
                data_type: "INT".to_string(),
            }],
        });

        let script = ParsedScript {
            statements: vec![procedure],
            joins: vec![JoinKind::Inner, JoinKind::Cross],
            ..Default::default()
        };

        let summary = ScriptSummary::from_script(&script);
        assert_eq!(summary.total_statements, 3);
        assert_eq!(summary.creates, 1);
        assert_eq!(summary.selects, 1);
        assert_eq!(summary.deletes, 1);
        assert_eq!(summary.joins(), 2);
        assert_eq!(summary.cross_joins, 1);
        assert_eq!(summary.procedures.len(), 1);
        assert_eq!(
            summary.procedures[0].tables_used.iter().collect::<Vec<_>>(),
            vec!["dbo.Audit", "dbo.Users"]
        );
        assert!(summary.tables.contains("dbo.Users"));
    }

    #[test]
    fn test_complexity_bounds() {
        let summary = ScriptSummary::default();
        assert_eq!(summary.complexity(), 1);

        let summary = ScriptSummary {
            selects: 1,
            deletes: 1,
            subqueries: 2,
            ..Default::default()
        };
        // (1 + 2 + 6) / 3
        assert_eq!(summary.complexity(), 3);

        let summary = ScriptSummary {
            subqueries: 40,
            ..Default::default()
        };
        assert_eq!(summary.complexity(), 10);
    }

    #[test]
    fn test_recommendations() {
        let summary = ScriptSummary {
            deletes: 1,
            cross_joins: 1,
            ..Default::default()
        };
        let recs = summary.recommendations();
        assert_eq!(recs.len(), 2);
        assert!(recs[0].starts_with("DELETE statements without explicit transaction"));
        assert!(recs[1].starts_with("CROSS JOIN"));

        let summary = ScriptSummary {
            transactions: 2,
            inserts: 1,
            ..Default::default()
        };
        assert_eq!(
            summary.recommendations(),
            vec!["More transactions than DML statements - review transaction boundaries"]
        );
    }

    #[test]
    fn test_markdown_sections() {
        let summary = ScriptSummary {
            total_statements: 1,
            selects: 1,
            tables: ["dbo.Users".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let markdown = render_markdown(&summary, "SELECT * FROM dbo.Users");

        assert!(markdown.starts_with("# SQL Script Documentation"));
        assert!(markdown.contains("## Statement Breakdown"));
        assert!(markdown.contains("- `dbo.Users`"));
        assert!(!markdown.contains("## Join Analysis"));
        assert!(!markdown.contains("## Recommendations"));
        assert!(markdown.contains("```sql\nSELECT * FROM dbo.Users\n```"));
    }

    #[test]
    fn test_headline() {
        let summary = ScriptSummary {
            total_statements: 2,
            ..Default::default()
        };
        assert_eq!(summary.headline(), "2 statements, 0 tables, 0 joins, complexity 1/10");
    }
}
