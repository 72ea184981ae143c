// 🏥 Medicare Plan
//
// Supplement and advantage plans offered to retirees. Rates hang off the plan
// itself (no options), see `RateOwner::MedicarePlan`.

use super::Entity;
use crate::error::ValidationErrors;
use crate::validation::{require_text, RuleTable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicarePlan {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub carrier: Option<String>,
    /// CMS contract/plan identifier, e.g. "H1234-001"
    #[serde(default)]
    pub plan_code: Option<String>,
}

impl MedicarePlan {
    pub fn new(name: impl Into<String>) -> Self {
        MedicarePlan {
            id: None,
            name: name.into(),
            carrier: None,
            plan_code: None,
        }
    }
}

impl Entity for MedicarePlan {
    const TABLE: &'static str = "medicare_plans";
    const ENTITY_TYPE: &'static str = "medicare_plan";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self, _rules: &RuleTable) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);
        ValidationErrors::into_result(errors)
    }
}
