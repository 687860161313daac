//! Database connectivity and query execution.

pub mod capture;
pub mod driver;
pub mod enrichment;
mod query;
pub mod tds;
pub mod types;

pub use capture::{capture, CapturedResults, ResultTable};
pub use driver::{ConnectOptions, ResultItem, ResultStream, SqlConnection, SqlDriver};
pub use query::{
    ExecutionFailure, ExecutionOutcome, ExecutionSuccess, QueryExecutor, ValidationVerdict,
};
pub use tds::TdsDriver;
pub use types::{SqlValue, TypeMapper};
