//! Data models for Callboard storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A registered contest participant.
///
/// `national_id` is sensitive: never log it unmasked.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Caller {
    pub id: String,
    pub national_id: String,
    pub national_id_hash: String,
    pub name: String,
    pub phone: String,
    pub participation_count: i64,
    pub status: String,
    pub is_family: bool,
    pub is_selected: bool,
    pub is_winner: bool,
    pub origin_address: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl Caller {
    /// Typed view of the `status` column. Unknown values read as `Inactive`.
    pub fn status(&self) -> CallerStatus {
        self.status.parse().unwrap_or(CallerStatus::Inactive)
    }
}

/// Admin-controlled caller status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerStatus {
    Active,
    Inactive,
    Blocked,
}

impl CallerStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Blocked => "blocked",
        }
    }
}

impl fmt::Display for CallerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "blocked" => Ok(Self::Blocked),
            other => Err(format!("unknown caller status: {other}")),
        }
    }
}

/// Read-only aggregate counts over non-deleted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickStats {
    pub total_callers: i64,
    pub total_hits: i64,
    pub today_callers: i64,
    pub total_winners: i64,
}
