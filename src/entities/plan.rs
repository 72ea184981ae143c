// 📋 Benefit Plan & Plan Option
//
// A plan belongs to a group and carries its contribution rules; each option
// (e.g. "Employee Only", "30-39") has its own rate history.

use super::Entity;
use crate::error::ValidationErrors;
use crate::validation::{check_date_order, require_text, PlanField, RuleTable, MAX_CLASSES};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// PLAN TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanType {
    Medical,
    Dental,
    Vision,
    Life,
    Disability,
}

impl PlanType {
    pub const ALL: [PlanType; 5] = [
        PlanType::Medical,
        PlanType::Dental,
        PlanType::Vision,
        PlanType::Life,
        PlanType::Disability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Medical => "Medical",
            PlanType::Dental => "Dental",
            PlanType::Vision => "Vision",
            PlanType::Life => "Life",
            PlanType::Disability => "Disability",
        }
    }
}

// ============================================================================
// BENEFIT PLAN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenefitPlan {
    #[serde(default)]
    pub id: Option<i64>,
    pub group_id: i64,
    pub name: String,
    pub plan_type: PlanType,
    #[serde(default)]
    pub carrier: Option<String>,
    /// Employee classes with their own contribution (1 to 4)
    pub number_of_classes: u8,
    #[serde(default)]
    pub class1_contribution: Option<f64>,
    #[serde(default)]
    pub class2_contribution: Option<f64>,
    #[serde(default)]
    pub class3_contribution: Option<f64>,
    #[serde(default)]
    pub class4_contribution: Option<f64>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub termination_date: Option<NaiveDate>,
}

impl BenefitPlan {
    pub fn new(group_id: i64, name: impl Into<String>, plan_type: PlanType) -> Self {
        BenefitPlan {
            id: None,
            group_id,
            name: name.into(),
            plan_type,
            carrier: None,
            number_of_classes: 1,
            class1_contribution: None,
            class2_contribution: None,
            class3_contribution: None,
            class4_contribution: None,
            effective_date: None,
            termination_date: None,
        }
    }

    /// Contribution for a 1-based class number.
    pub fn contribution(&self, class: u8) -> Option<f64> {
        match class {
            1 => self.class1_contribution,
            2 => self.class2_contribution,
            3 => self.class3_contribution,
            4 => self.class4_contribution,
            _ => None,
        }
    }

    /// Whether the form field has a value.
    pub fn field_present(&self, field: PlanField) -> bool {
        match field {
            PlanField::Carrier => self.carrier.as_deref().map_or(false, |c| !c.trim().is_empty()),
            PlanField::EffectiveDate => self.effective_date.is_some(),
            PlanField::TerminationDate => self.termination_date.is_some(),
            PlanField::ClassContribution(class) => self.contribution(class).is_some(),
        }
    }
}

impl Entity for BenefitPlan {
    const TABLE: &'static str = "benefit_plans";
    const ENTITY_TYPE: &'static str = "plan";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self, rules: &RuleTable) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);

        if self.number_of_classes == 0 || self.number_of_classes > MAX_CLASSES {
            errors.push(crate::error::ValidationError::new(
                "number_of_classes",
                format!("must be between 1 and {}", MAX_CLASSES),
            ));
        }

        check_date_order(
            &mut errors,
            "termination_date",
            self.effective_date,
            self.termination_date,
        );

        errors.extend(rules.check(self));
        ValidationErrors::into_result(errors)
    }
}

// ============================================================================
// PLAN OPTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanOption {
    #[serde(default)]
    pub id: Option<i64>,
    pub plan_id: i64,
    pub label: String,
}

impl PlanOption {
    pub fn new(plan_id: i64, label: impl Into<String>) -> Self {
        PlanOption {
            id: None,
            plan_id,
            label: label.into(),
        }
    }
}

impl Entity for PlanOption {
    const TABLE: &'static str = "plan_options";
    const ENTITY_TYPE: &'static str = "option";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self, _rules: &RuleTable) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        require_text(&mut errors, "label", &self.label);
        ValidationErrors::into_result(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn medical_plan() -> BenefitPlan {
        let mut plan = BenefitPlan::new(1, "Gold PPO", PlanType::Medical);
        plan.carrier = Some("Blue Shield".to_string());
        plan.effective_date = Some(d("2024-01-01"));
        plan.class1_contribution = Some(250.0);
        plan
    }

    #[test]
    fn test_valid_plan_passes() {
        assert!(medical_plan().validate(&RuleTable::default()).is_ok());
    }

    #[test]
    fn test_number_of_classes_bounds() {
        let mut plan = medical_plan();
        plan.number_of_classes = 0;
        assert!(plan.validate(&RuleTable::default()).unwrap_err().has_field("number_of_classes"));

        plan.number_of_classes = 5;
        assert!(plan.validate(&RuleTable::default()).unwrap_err().has_field("number_of_classes"));
    }

    #[test]
    fn test_termination_before_effective() {
        let mut plan = medical_plan();
        plan.termination_date = Some(d("2023-12-31"));
        let err = plan.validate(&RuleTable::default()).unwrap_err();
        assert!(err.has_field("termination_date"));
    }

    #[test]
    fn test_more_classes_need_more_contributions() {
        let mut plan = medical_plan();
        plan.number_of_classes = 3;
        plan.class2_contribution = Some(300.0);

        let err = plan.validate(&RuleTable::default()).unwrap_err();
        assert!(err.has_field("class3_contribution"));
        assert!(!err.has_field("class2_contribution"));
    }

    #[test]
    fn test_contribution_lookup() {
        let plan = medical_plan();
        assert_eq!(plan.contribution(1), Some(250.0));
        assert_eq!(plan.contribution(2), None);
        assert_eq!(plan.contribution(9), None);
        assert!(plan.field_present(PlanField::Carrier));
        assert!(!plan.field_present(PlanField::TerminationDate));
    }

    #[test]
    fn test_option_label_required() {
        let option = PlanOption::new(1, " ");
        assert!(option.validate(&RuleTable::default()).is_err());
    }
}
