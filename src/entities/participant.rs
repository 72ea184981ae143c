// 🧑‍🤝‍🧑 Participant & Dependent
//
// Participants are enrolled employees of a group; dependents hang off a
// participant. Bulk loads go through `crate::participants`.

use super::Entity;
use crate::error::{ValidationError, ValidationErrors};
use crate::validation::{check_email, require_text, RuleTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub id: Option<i64>,
    pub group_id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
}

impl Participant {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

impl Entity for Participant {
    const TABLE: &'static str = "participants";
    const ENTITY_TYPE: &'static str = "participant";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self, _rules: &RuleTable) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        require_text(&mut errors, "first_name", &self.first_name);
        require_text(&mut errors, "last_name", &self.last_name);
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            check_email(&mut errors, "email", email);
        }
        if let (Some(birth), Some(hire)) = (self.birth_date, self.hire_date) {
            if hire < birth {
                errors.push(ValidationError::new("hire_date", "must not be before the birth date"));
            }
        }
        ValidationErrors::into_result(errors)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    Spouse,
    Child,
    DomesticPartner,
    Other,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Spouse => "Spouse",
            Relationship::Child => "Child",
            Relationship::DomesticPartner => "DomesticPartner",
            Relationship::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependent {
    #[serde(default)]
    pub id: Option<i64>,
    pub participant_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub relationship: Relationship,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

impl Entity for Dependent {
    const TABLE: &'static str = "dependents";
    const ENTITY_TYPE: &'static str = "dependent";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self, _rules: &RuleTable) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        require_text(&mut errors, "first_name", &self.first_name);
        require_text(&mut errors, "last_name", &self.last_name);
        ValidationErrors::into_result(errors)
    }
}
