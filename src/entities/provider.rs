// 🩺 Provider

use super::Entity;
use crate::error::{ValidationError, ValidationErrors};
use crate::validation::{require_text, RuleTable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    /// National Provider Identifier (10 digits)
    #[serde(default)]
    pub npi: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Entity for Provider {
    const TABLE: &'static str = "providers";
    const ENTITY_TYPE: &'static str = "provider";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self, _rules: &RuleTable) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        require_text(&mut errors, "name", &self.name);

        if let Some(npi) = self.npi.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            if npi.len() != 10 || !npi.chars().all(|c| c.is_ascii_digit()) {
                errors.push(ValidationError::new("npi", "must be 10 digits"));
            }
        }
        ValidationErrors::into_result(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npi_format() {
        let rules = RuleTable::default();
        let mut provider = Provider {
            id: None,
            name: "Lakeview Dental".to_string(),
            npi: Some("123".to_string()),
            specialty: Some("Dentistry".to_string()),
            phone: None,
        };
        assert!(provider.validate(&rules).unwrap_err().has_field("npi"));

        provider.npi = Some(String::new());
        assert!(provider.validate(&rules).is_ok());
    }
}
