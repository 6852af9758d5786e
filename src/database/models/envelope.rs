use serde::{Deserialize, Serialize};
use std::fmt;

/// A budgeting bucket: either one category or a whole section (rollup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EnvelopeRef {
    Category(i64),
    Section(i64),
}

impl EnvelopeRef {
    /// Builds the reference from a pair of nullable columns.
    /// Returns `None` unless exactly one of them is set.
    pub fn from_columns(category_id: Option<i64>, section_id: Option<i64>) -> Option<Self> {
        match (category_id, section_id) {
            (Some(id), None) => Some(Self::Category(id)),
            (None, Some(id)) => Some(Self::Section(id)),
            _ => None,
        }
    }

    /// (category_id, section_id) for binding into SQL.
    pub fn columns(&self) -> (Option<i64>, Option<i64>) {
        match *self {
            Self::Category(id) => (Some(id), None),
            Self::Section(id) => (None, Some(id)),
        }
    }

    pub fn is_rollup(&self) -> bool {
        matches!(self, Self::Section(_))
    }
}

impl fmt::Display for EnvelopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(id) => write!(f, "category {id}"),
            Self::Section(id) => write!(f, "section {id}"),
        }
    }
}
