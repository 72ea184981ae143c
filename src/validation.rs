// 🏷️ Validation Rules - Rules as Data
//
// Which plan fields are required depends on the plan type and on how many
// employee classes the plan has. One table answers that for both the create
// and the edit flow, evaluated once per submission.

use crate::entities::{BenefitPlan, PlanType};
use crate::error::ValidationError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Plans have between 1 and this many contribution classes.
pub const MAX_CLASSES: u8 = 4;

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// A plan form field covered by the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanField {
    Carrier,
    EffectiveDate,
    TerminationDate,
    /// Contribution amount for a 1-based class number
    ClassContribution(u8),
}

impl PlanField {
    pub fn name(&self) -> String {
        match self {
            PlanField::Carrier => "carrier".to_string(),
            PlanField::EffectiveDate => "effective_date".to_string(),
            PlanField::TerminationDate => "termination_date".to_string(),
            PlanField::ClassContribution(class) => format!("class{}_contribution", class),
        }
    }

    /// Every field the table can hold a rule for.
    pub fn all() -> Vec<PlanField> {
        let mut fields = vec![PlanField::Carrier, PlanField::EffectiveDate, PlanField::TerminationDate];
        fields.extend((1..=MAX_CLASSES).map(PlanField::ClassContribution));
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    Required,
    /// Required once the plan has at least this many classes
    RequiredWhenClassesAtLeast { classes: u8 },
    Optional,
}

impl Requirement {
    pub fn applies(&self, number_of_classes: u8) -> bool {
        match self {
            Requirement::Required => true,
            Requirement::RequiredWhenClassesAtLeast { classes } => number_of_classes >= *classes,
            Requirement::Optional => false,
        }
    }
}

/// One row of the rule table, as written in a rules file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub plan_type: PlanType,
    pub field: PlanField,
    pub requirement: Requirement,
    /// Overrides the default "is required" message
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// RULE TABLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: HashMap<(PlanType, PlanField), FieldRule>,
}

impl RuleTable {
    /// Empty table: every field optional.
    pub fn new() -> Self {
        RuleTable { rules: HashMap::new() }
    }

    /// Load rules from a JSON array of `FieldRule`, layered over the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<FieldRule> = serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        let mut table = RuleTable::default();
        for rule in rules {
            table.add_rule(rule);
        }
        Ok(table)
    }

    pub fn from_rules(rules: Vec<FieldRule>) -> Self {
        let mut table = RuleTable::new();
        for rule in rules {
            table.add_rule(rule);
        }
        table
    }

    /// Add or replace the rule for `(plan_type, field)`.
    pub fn add_rule(&mut self, rule: FieldRule) {
        self.rules.insert((rule.plan_type, rule.field), rule);
    }

    pub fn requirement(&self, plan_type: PlanType, field: PlanField) -> Requirement {
        self.rules
            .get(&(plan_type, field))
            .map(|r| r.requirement)
            .unwrap_or(Requirement::Optional)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Every required-but-missing field of `plan`.
    pub fn check(&self, plan: &BenefitPlan) -> Vec<ValidationError> {
        let mut errors: Vec<ValidationError> = PlanField::all()
            .into_iter()
            .filter_map(|field| {
                let rule = self.rules.get(&(plan.plan_type, field))?;
                if rule.requirement.applies(plan.number_of_classes) && !plan.field_present(field) {
                    let message = rule.message.clone().unwrap_or_else(|| {
                        format!("is required for {} plans", plan.plan_type.as_str())
                    });
                    Some(ValidationError::new(field.name(), message))
                } else {
                    None
                }
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        errors
    }
}

impl Default for RuleTable {
    /// Carrier and effective date always required. Medical, dental and vision
    /// plans need a contribution for every class they have; life and
    /// disability contributions are optional.
    fn default() -> Self {
        let mut rules = Vec::new();
        for plan_type in PlanType::ALL {
            for field in [PlanField::Carrier, PlanField::EffectiveDate] {
                rules.push(FieldRule {
                    plan_type,
                    field,
                    requirement: Requirement::Required,
                    message: None,
                });
            }

            if matches!(plan_type, PlanType::Medical | PlanType::Dental | PlanType::Vision) {
                for class in 1..=MAX_CLASSES {
                    rules.push(FieldRule {
                        plan_type,
                        field: PlanField::ClassContribution(class),
                        requirement: Requirement::RequiredWhenClassesAtLeast { classes: class },
                        message: Some(format!("is required when the plan has {} or more classes", class)),
                    });
                }
            }
        }
        RuleTable::from_rules(rules)
    }
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

pub fn require_text(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "is required"));
    }
}

pub fn check_email(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    let value = value.trim();
    let valid = value
        .split_once('@')
        .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        errors.push(ValidationError::new(field, "is not a valid email address"));
    }
}

/// `end` must not precede `start` when both are set.
pub fn check_date_order(
    errors: &mut Vec<ValidationError>,
    field: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            errors.push(ValidationError::new(field, "must not be before the start date"));
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
