// 🎯 Program - wellness or assistance program with an optional run window

use super::Entity;
use crate::error::ValidationErrors;
use crate::validation::{check_date_order, require_text, RuleTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl Entity for Program {
    const TABLE: &'static str = "programs";
    const ENTITY_TYPE: &'static str = "program";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self, _rules: &RuleTable) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);
        check_date_order(&mut errors, "end_date", self.start_date, self.end_date);
        ValidationErrors::into_result(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_window() {
        let mut program = Program {
            id: None,
            name: "Quit Smoking".to_string(),
            description: None,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 1),
        };
        assert!(program.validate(&RuleTable::default()).is_ok());

        program.end_date = NaiveDate::from_ymd_opt(2024, 5, 31);
        assert!(program.validate(&RuleTable::default()).unwrap_err().has_field("end_date"));
    }
}
