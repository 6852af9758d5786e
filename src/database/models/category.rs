use serde::{Deserialize, Serialize};

use super::SectionType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub household_id: i64,
    pub section_id: i64,
    pub name: String,
    pub section_type: SectionType,
    pub section_is_income: bool,
}
