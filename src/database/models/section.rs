use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Fixed,
    Flexible,
    Debt,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Flexible => "flexible",
            Self::Debt => "debt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fixed" => Some(Self::Fixed),
            "flexible" => Some(Self::Flexible),
            "debt" => Some(Self::Debt),
            _ => None,
        }
    }

    /// Flexible sections are budgeted as one envelope; fixed and debt
    /// sections are budgeted per category.
    pub fn requires_rollup(&self) -> bool {
        matches!(self, Self::Flexible)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub household_id: i64,
    pub name: String,
    pub section_type: SectionType,
    pub is_income: bool,        // placeholder section receiving income, never auto-funded
}
