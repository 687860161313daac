//! SQL Server compatibility levels accepted by the syntax tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target SQL Server version, identified by compatibility level.
///
/// Every level is parsed with the same MS SQL grammar; the level is carried
/// through to reports.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum SqlVersion {
    #[serde(rename = "90")]
    Sql90,
    #[serde(rename = "100")]
    Sql100,
    #[serde(rename = "110")]
    Sql110,
    #[serde(rename = "120")]
    Sql120,
    #[serde(rename = "130")]
    Sql130,
    #[serde(rename = "140")]
    Sql140,
    #[serde(rename = "150")]
    Sql150,
    #[default]
    #[serde(rename = "160")]
    Sql160,
}

impl SqlVersion {
    /// All supported versions, oldest first.
    pub const ALL: [SqlVersion; 8] = [
        SqlVersion::Sql90,
        SqlVersion::Sql100,
        SqlVersion::Sql110,
        SqlVersion::Sql120,
        SqlVersion::Sql130,
        SqlVersion::Sql140,
        SqlVersion::Sql150,
        SqlVersion::Sql160,
    ];

    /// Compatibility level code as used in requests.
    pub fn code(&self) -> &'static str {
        match self {
            SqlVersion::Sql90 => "90",
            SqlVersion::Sql100 => "100",
            SqlVersion::Sql110 => "110",
            SqlVersion::Sql120 => "120",
            SqlVersion::Sql130 => "130",
            SqlVersion::Sql140 => "140",
            SqlVersion::Sql150 => "150",
            SqlVersion::Sql160 => "160",
        }
    }

    /// Product name.
    pub fn name(&self) -> &'static str {
        match self {
            SqlVersion::Sql90 => "SQL Server 2005",
            SqlVersion::Sql100 => "SQL Server 2008",
            SqlVersion::Sql110 => "SQL Server 2012",
            SqlVersion::Sql120 => "SQL Server 2014",
            SqlVersion::Sql130 => "SQL Server 2016",
            SqlVersion::Sql140 => "SQL Server 2017",
            SqlVersion::Sql150 => "SQL Server 2019",
            SqlVersion::Sql160 => "SQL Server 2022",
        }
    }
}

impl fmt::Display for SqlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}
