// src/models/reference.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Classification tables that resolve to a plain `{id, name}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Board,
    Standard,
    Subject,
    Topic,
}

impl ReferenceKind {
    pub fn table(&self) -> &'static str {
        match self {
            ReferenceKind::Board => "boards",
            ReferenceKind::Standard => "standards",
            ReferenceKind::Subject => "subjects",
            ReferenceKind::Topic => "topics",
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AgeGroup {
    pub id: i64,
    pub start_age: i32,
    pub end_age: i32,
}

/// Classification with foreign ids replaced by display records.
/// A reference that no longer exists resolves to `None`.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedInfo {
    pub exam_type: Option<String>,
    pub difficulty_level: Option<String>,
    pub board: Option<NamedRef>,
    pub standard: Option<NamedRef>,
    pub subject: Option<NamedRef>,
    pub topic: Option<NamedRef>,
    pub age_group: Option<AgeGroup>,
}

/// Classification metadata shared by questions (`meta`) and exams (`info`).
/// Reference fields hold foreign ids into the classification tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub exam_type: Option<String>,
    pub difficulty_level: Option<String>,
    pub board_id: Option<i64>,
    pub standard_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub age_group_id: Option<i64>,
}
