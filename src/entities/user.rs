// 👤 System User

use super::Entity;
use crate::error::ValidationErrors;
use crate::validation::{check_email, require_text, RuleTable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Staff,
    ReadOnly,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Staff => "Staff",
            Role::ReadOnly => "ReadOnly",
        }
    }

    pub fn can_edit(&self) -> bool {
        !matches!(self, Role::ReadOnly)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const ENTITY_TYPE: &'static str = "user";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self, _rules: &RuleTable) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        check_email(&mut errors, "email", &self.email);
        require_text(&mut errors, "display_name", &self.display_name);
        ValidationErrors::into_result(errors)
    }
}
