// 🏢 Employer Group

use super::Entity;
use crate::error::ValidationErrors;
use crate::validation::{check_email, require_text, RuleTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStatus {
    Active,
    Pending,
    Terminated,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Active => "Active",
            GroupStatus::Pending => "Pending",
            GroupStatus::Terminated => "Terminated",
        }
    }
}

/// An employer whose employees participate in benefit plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub group_number: Option<String>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    pub status: GroupStatus,
    #[serde(default)]
    pub contact_email: Option<String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Group {
            id: None,
            name: name.into(),
            group_number: None,
            effective_date: None,
            status: GroupStatus::Pending,
            contact_email: None,
        }
    }
}

impl Entity for Group {
    const TABLE: &'static str = "employer_groups";
    const ENTITY_TYPE: &'static str = "group";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self, _rules: &RuleTable) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);
        if let Some(email) = self.contact_email.as_deref().filter(|e| !e.trim().is_empty()) {
            check_email(&mut errors, "contact_email", email);
        }
        ValidationErrors::into_result(errors)
    }
}
