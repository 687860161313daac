//! Result capture: folds a batch's result stream into result tables.

use crate::database::driver::ResultItem;
use crate::database::types::SqlValue;
use crate::error::DriverError;
use futures_util::stream::{Stream, TryStreamExt};
use serde::Serialize;

/// One tabular result set.
///
/// Every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultTable {
    /// Column names in the order the query produced them.
    pub columns: Vec<String>,

    /// Captured rows.
    pub rows: Vec<Vec<SqlValue>>,

    /// Whether rows beyond the capture limit were discarded.
    pub truncated: bool,
}

impl ResultTable {
    fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            truncated: false,
        }
    }

    /// Format the table as Markdown. NULL cells render as `NULL`.
    pub fn to_markdown_table(&self) -> String {
        let mut output = String::new();

        output.push_str("| ");
        output.push_str(&self.columns.join(" | "));
        output.push_str(" |\n");

        output.push_str("| ");
        output.push_str(&vec!["---"; self.columns.len()].join(" | "));
        output.push_str(" |\n");

        for row in &self.rows {
            let values: Vec<String> = row
                .iter()
                .map(|v| v.to_string().replace('|', "\\|").replace(['\r', '\n'], " "))
                .collect();
            output.push_str("| ");
            output.push_str(&values.join(" | "));
            output.push_str(" |\n");
        }

        if self.truncated {
            output.push_str(&format!("_(truncated to {} rows)_\n", self.rows.len()));
        }

        output
    }
}

/// Everything captured from one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CapturedResults {
    /// Non-empty result sets in the order the server produced them.
    pub tables: Vec<ResultTable>,

    /// Rows captured across all tables.
    pub total_rows: usize,

    /// Informational messages in emission order.
    pub messages: Vec<String>,
}

impl CapturedResults {
    fn close_table(&mut self, table: Option<ResultTable>) {
        if let Some(table) = table {
            if table.columns.is_empty() {
                return;
            }
            self.total_rows += table.rows.len();
            self.tables.push(table);
        }
    }
}

/// Drain `stream` completely, keeping at most `max_rows` rows per result set.
///
/// Rows past the limit are still read so later result sets are reached.
/// Result sets without columns are dropped.
pub async fn capture<S>(mut stream: S, max_rows: usize) -> Result<CapturedResults, DriverError>
where
    S: Stream<Item = Result<ResultItem, DriverError>> + Unpin,
{
    let mut captured = CapturedResults::default();
    let mut current: Option<ResultTable> = None;

    while let Some(item) = stream.try_next().await? {
        match item {
            ResultItem::Columns(columns) => {
                captured.close_table(current.take());
                current = Some(ResultTable::new(columns));
            }
            ResultItem::Row(mut values) => {
                let Some(table) = current.as_mut() else {
                    continue;
                };
                if table.rows.len() >= max_rows {
                    table.truncated = true;
                    continue;
                }
                values.resize(table.columns.len(), SqlValue::Null);
                table.rows.push(values);
            }
            ResultItem::Info(message) => captured.messages.push(message),
        }
    }

    captured.close_table(current);
    Ok(captured)
}
