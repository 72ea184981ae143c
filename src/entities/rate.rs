// 💲 Rate Record - one dated price interval
//
// Plan options and Medicare plans share one `rates` table; `owner` says which
// kind of record `owner_id` points at.

use super::Entity;
use crate::error::{ValidationError, ValidationErrors};
use crate::lifecycle::RateInterval;
use crate::validation::{check_date_order, RuleTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateOwner {
    PlanOption,
    MedicarePlan,
}

impl RateOwner {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateOwner::PlanOption => "plan_option",
            RateOwner::MedicarePlan => "medicare_plan",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub owner: RateOwner,
    pub owner_id: i64,
    pub rate: f64,
    pub start_date: NaiveDate,
    /// Absent while the rate is open-ended
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl RateRecord {
    pub fn open_ended(owner: RateOwner, owner_id: i64, rate: f64, start_date: NaiveDate) -> Self {
        RateRecord {
            id: None,
            owner,
            owner_id,
            rate,
            start_date,
            end_date: None,
        }
    }
}

impl RateInterval for RateRecord {
    fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }
}

impl Entity for RateRecord {
    const TABLE: &'static str = "rates";
    const ENTITY_TYPE: &'static str = "rate";

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self, _rules: &RuleTable) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if !self.rate.is_finite() {
            errors.push(ValidationError::new("rate", "must be a number"));
        }
        check_date_order(&mut errors, "end_date", Some(self.start_date), self.end_date);
        ValidationErrors::into_result(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::RateStatus;

    #[test]
    fn test_rate_record_serializes_owner_and_dates() {
        let record = RateRecord::open_ended(
            RateOwner::MedicarePlan,
            3,
            189.5,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["owner"], "medicare_plan");
        assert_eq!(json["start_date"], "2025-01-01");
        assert!(json["end_date"].is_null());
    }

    #[test]
    fn test_rate_record_status() {
        let record = RateRecord::open_ended(
            RateOwner::PlanOption,
            1,
            42.0,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(record.status(today), RateStatus::Current);
        assert!(record.is_open_ended());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut record = RateRecord::open_ended(
            RateOwner::PlanOption,
            1,
            42.0,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        record.end_date = NaiveDate::from_ymd_opt(2023, 12, 31);
        assert!(record.validate(&RuleTable::default()).unwrap_err().has_field("end_date"));
    }
}
