// 🧾 Rate Table Form - pending rates, submission, refreshed history
//
// An admin builds a table of {option, rate} entries (typed in or imported from
// a file), picks the date the new rates take effect, and submits. Submission
// creates missing options, closes each option's open rate the day before the
// new one starts, inserts the new open-ended rates, and re-reads the history.

use crate::db::Filter;
use crate::entities::{BenefitPlan, Entity, MedicarePlan, PlanOption, RateOwner, RateRecord, Repository};
use crate::error::{ConsoleResult, FormatError, StoreError, ValidationError, ValidationErrors};
use crate::importer::{file_fingerprint, import_rate_file, RateFileRow};
use crate::lifecycle::{
    close_prior_open_rates, flat_rate_list, group_rates, HistoryView, RateBuckets, RateInterval, RateStatus,
    SortOrder,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

// ============================================================================
// FORM STATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRate {
    pub option: String,
    pub rate: f64,
}

/// File that contributed entries to the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSource {
    pub file_name: String,
    pub sha256: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTableForm {
    #[serde(default)]
    pub entries: Vec<PendingRate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub sources: Vec<ImportSource>,
}

impl RateTableForm {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, label: &str) -> Option<usize> {
        let label = label.trim();
        self.entries.iter().position(|e| e.option.trim() == label)
    }

    /// Add an entry, or replace the rate of the entry with the same label.
    /// Returns true when a new entry was appended.
    pub fn add_entry(&mut self, option: &str, rate: f64) -> bool {
        match self.position(option) {
            Some(idx) => {
                self.entries[idx].rate = rate;
                false
            }
            None => {
                self.entries.push(PendingRate {
                    option: option.trim().to_string(),
                    rate,
                });
                true
            }
        }
    }

    pub fn remove_entry(&mut self, option: &str) -> Option<PendingRate> {
        self.position(option).map(|idx| self.entries.remove(idx))
    }

    /// Upsert imported rows by option label, keeping file order for new labels.
    pub fn merge_import(&mut self, rows: Vec<RateFileRow>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for row in rows {
            if self.add_entry(&row.option, row.rate) {
                summary.added += 1;
            } else {
                summary.updated += 1;
            }
        }
        summary
    }

    /// Decode an uploaded file and merge it into the form.
    pub fn import_file(&mut self, file_name: &str, bytes: &[u8]) -> Result<MergeSummary, FormatError> {
        let rows = import_rate_file(file_name, bytes)?;
        self.sources.push(ImportSource {
            file_name: file_name.to_string(),
            sha256: file_fingerprint(bytes),
            rows: rows.len(),
        });
        Ok(self.merge_import(rows))
    }

    /// Every problem with the form, or the effective start date.
    pub fn validate(&self) -> Result<NaiveDate, ValidationErrors> {
        let mut errors = Vec::new();

        if self.entries.is_empty() {
            errors.push(ValidationError::new("entries", "at least one rate is required"));
        }
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.option.trim().is_empty() {
                errors.push(ValidationError::new(format!("entries[{}].option", idx), "is required"));
            }
            if !entry.rate.is_finite() {
                errors.push(ValidationError::new(format!("entries[{}].rate", idx), "must be a number"));
            }
        }

        match self.start_date {
            Some(start) if errors.is_empty() => Ok(start),
            Some(_) => Err(ValidationErrors(errors)),
            None => {
                errors.push(ValidationError::new("start_date", "is required"));
                Err(ValidationErrors(errors))
            }
        }
    }

    /// Write the form to the store and return the refreshed history of every
    /// option of the plan.
    pub fn submit(&self, repo: &Repository<'_>, plan_id: i64, today: NaiveDate) -> ConsoleResult<Vec<OptionHistory>> {
        let start_date = self.validate()?;
        let plan: BenefitPlan = repo.get(plan_id)?;

        let mut options: Vec<PlanOption> = repo.list_where(&Filter::all().eq("plan_id", plan_id))?;
        let mut closed = 0usize;

        for entry in &self.entries {
            let label = entry.option.trim();
            let option = match options.iter().find(|o| o.label.trim() == label) {
                Some(existing) => existing.clone(),
                None => {
                    let created = repo.create(&PlanOption::new(plan_id, label))?;
                    options.push(created.clone());
                    created
                }
            };
            let option_id = option_id(&option)?;

            closed += insert_superseding(repo, RateOwner::PlanOption, option_id, entry.rate, start_date)?;
        }

        tracing::info!(
            plan_id,
            plan = %plan.name,
            entries = self.entries.len(),
            closed,
            start_date = %start_date,
            "rate table submitted"
        );
        repo.audit(
            "rates_submitted",
            BenefitPlan::ENTITY_TYPE,
            plan_id,
            json!({
                "start_date": start_date,
                "entries": self.entries,
                "closed": closed,
                "sources": self.sources,
            }),
        );

        plan_history(repo, plan_id, today, HistoryView::Combined.default_order())
    }
}

fn option_id(option: &PlanOption) -> Result<i64, StoreError> {
    option
        .id
        .ok_or_else(|| StoreError::Backend(format!("option '{}' has no id", option.label)))
}

/// Close the owner's open rates that start before `start_date`, then insert
/// the new open-ended rate. An open rate already starting on `start_date` is
/// corrected in place instead. Returns how many records were closed.
fn insert_superseding(
    repo: &Repository<'_>,
    owner: RateOwner,
    owner_id: i64,
    rate: f64,
    start_date: NaiveDate,
) -> ConsoleResult<usize> {
    let existing = rates_for(repo, owner, owner_id)?;

    let same_start = existing
        .iter()
        .rev()
        .find(|r| r.is_open_ended() && r.start_date == start_date);
    if let Some((id, record)) = same_start.and_then(|r| r.id.map(|id| (id, r))) {
        let mut corrected = record.clone();
        corrected.rate = rate;
        repo.update(id, &corrected)?;
        tracing::debug!(owner = owner.as_str(), owner_id, rate_id = id, rate, "corrected rate in place");
        return Ok(0);
    }

    let to_close = close_prior_open_rates(&existing, start_date);

    for (record, end_date) in &to_close {
        let Some(id) = record.id else { continue };
        let mut closed = (*record).clone();
        closed.end_date = Some(*end_date);
        repo.update(id, &closed)?;
        tracing::debug!(owner = owner.as_str(), owner_id, rate_id = id, end_date = %end_date, "closed prior rate");
    }

    repo.create(&RateRecord::open_ended(owner, owner_id, rate, start_date))?;
    Ok(to_close.len())
}

/// Add one Medicare rate using the same close-then-insert rule, returning the
/// refreshed flat rate list.
pub fn add_medicare_rate(
    repo: &Repository<'_>,
    medicare_plan_id: i64,
    rate: f64,
    start_date: NaiveDate,
    today: NaiveDate,
) -> ConsoleResult<Vec<LabeledRate>> {
    if !rate.is_finite() {
        return Err(ValidationErrors::single("rate", "must be a number").into());
    }
    let _plan: MedicarePlan = repo.get(medicare_plan_id)?;

    let closed = insert_superseding(repo, RateOwner::MedicarePlan, medicare_plan_id, rate, start_date)?;
    tracing::info!(medicare_plan_id, rate, closed, start_date = %start_date, "medicare rate added");

    Ok(medicare_rate_list(
        repo,
        medicare_plan_id,
        today,
        HistoryView::FlatList.default_order(),
    )?)
}

// ============================================================================
// HISTORY VIEWS
// ============================================================================

/// A rate with its status and the label the screen shows for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledRate {
    #[serde(flatten)]
    pub record: RateRecord,
    pub status: RateStatus,
    pub label: &'static str,
}

impl LabeledRate {
    pub fn new(record: RateRecord, today: NaiveDate, view: HistoryView) -> Self {
        let status = record.status(today);
        LabeledRate {
            record,
            status,
            label: status.label(view),
        }
    }
}

impl RateInterval for LabeledRate {
    fn start_date(&self) -> NaiveDate {
        self.record.start_date
    }

    fn end_date(&self) -> Option<NaiveDate> {
        self.record.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionHistory {
    pub option: PlanOption,
    pub history: RateBuckets<LabeledRate>,
}

pub fn rates_for(repo: &Repository<'_>, owner: RateOwner, owner_id: i64) -> Result<Vec<RateRecord>, StoreError> {
    repo.list_where(
        &Filter::all()
            .eq("owner", owner.as_str())
            .eq("owner_id", owner_id)
            .order_by("start_date", SortOrder::Ascending),
    )
}

/// Grouped Pending / Active / Ended history of one plan option.
pub fn option_history(
    repo: &Repository<'_>,
    option_id: i64,
    today: NaiveDate,
    order: SortOrder,
) -> Result<RateBuckets<LabeledRate>, StoreError> {
    let records = rates_for(repo, RateOwner::PlanOption, option_id)?;
    Ok(group_rates(
        records
            .into_iter()
            .map(|r| LabeledRate::new(r, today, HistoryView::Combined)),
        today,
        order,
    ))
}

/// History of every option of a plan, options in creation order.
pub fn plan_history(
    repo: &Repository<'_>,
    plan_id: i64,
    today: NaiveDate,
    order: SortOrder,
) -> ConsoleResult<Vec<OptionHistory>> {
    let options: Vec<PlanOption> = repo.list_where(&Filter::all().eq("plan_id", plan_id))?;
    let mut histories = Vec::with_capacity(options.len());
    for option in options {
        let history = option_history(repo, option_id(&option)?, today, order)?;
        histories.push(OptionHistory { option, history });
    }
    Ok(histories)
}

/// Flat Planned / Current / Ended list of one Medicare plan's rates.
pub fn medicare_rate_list(
    repo: &Repository<'_>,
    medicare_plan_id: i64,
    today: NaiveDate,
    order: SortOrder,
) -> Result<Vec<LabeledRate>, StoreError> {
    let records = rates_for(repo, RateOwner::MedicarePlan, medicare_plan_id)?;
    Ok(flat_rate_list(records, today, order)
        .into_iter()
        .map(|(record, _)| LabeledRate::new(record, today, HistoryView::FlatList))
        .collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SqliteStore, Store};
    use crate::entities::{Group, PlanType};
    use crate::error::ConsoleError;
    use crate::validation::RuleTable;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(option: &str, rate: f64) -> RateFileRow {
        RateFileRow {
            option: option.to_string(),
            rate,
        }
    }

    fn seeded_plan(repo: &Repository<'_>) -> i64 {
        let group_id = repo.create(&Group::new("Acme")).unwrap().id.unwrap();
        let mut plan = BenefitPlan::new(group_id, "Basic Life", PlanType::Life);
        plan.carrier = Some("MetLife".to_string());
        plan.effective_date = Some(d("2024-01-01"));
        repo.create(&plan).unwrap().id.unwrap()
    }

    #[test]
    fn test_merge_import_upserts_by_label() {
        let mut form = RateTableForm::new();
        form.add_entry("30-39", 10.0);
        form.add_entry("40-49", 20.0);

        let summary = form.merge_import(vec![row(" 40-49 ", 25.0), row("50-59", 30.0), row("<30", 5.0)]);

        assert_eq!(summary, MergeSummary { added: 2, updated: 1 });
        let labels: Vec<&str> = form.entries.iter().map(|e| e.option.as_str()).collect();
        assert_eq!(labels, vec!["30-39", "40-49", "50-59", "<30"]);
        assert_eq!(form.entries[1].rate, 25.0);
    }

    #[test]
    fn test_remove_entry() {
        let mut form = RateTableForm::new();
        form.add_entry("Employee Only", 100.0);
        assert_eq!(form.remove_entry(" Employee Only").map(|e| e.rate), Some(100.0));
        assert!(form.remove_entry("Employee Only").is_none());
    }

    #[test]
    fn test_import_file_records_source() {
        let mut form = RateTableForm::new();
        let bytes = b"Age,Price\n30-39,$120.50\n40-49,(15.00)\n";
        let summary = form.import_file("rates.csv", bytes).unwrap();

        assert_eq!(summary.added, 2);
        assert_eq!(form.entries[1], PendingRate { option: "40-49".to_string(), rate: -15.0 });
        assert_eq!(form.sources.len(), 1);
        assert_eq!(form.sources[0].sha256, file_fingerprint(bytes));
        assert_eq!(form.sources[0].rows, 2);
    }

    #[test]
    fn test_import_file_error_leaves_form_untouched() {
        let mut form = RateTableForm::new();
        form.add_entry("30-39", 1.0);
        assert!(form.import_file("rates.csv", b"Name,Rate\nx,1\n").is_err());
        assert_eq!(form.entries.len(), 1);
        assert!(form.sources.is_empty());
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let form = RateTableForm::new();
        let err = form.validate().unwrap_err();
        assert!(err.has_field("entries"));
        assert!(err.has_field("start_date"));

        let mut form = RateTableForm::new();
        form.add_entry("30-39", f64::NAN);
        form.start_date = Some(d("2025-01-01"));
        assert!(form.validate().unwrap_err().has_field("entries[0].rate"));
    }

    #[test]
    fn test_submit_rejects_before_any_write() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rules = RuleTable::default();
        let repo = Repository::new(&store, &rules);
        let plan_id = seeded_plan(&repo);

        let mut form = RateTableForm::new();
        form.add_entry("30-39", 10.0);
        let err = form.submit(&repo, plan_id, d("2025-01-01")).unwrap_err();

        assert!(matches!(err, ConsoleError::Validation(_)));
        assert!(repo.list::<PlanOption>().unwrap().is_empty());
    }

    #[test]
    fn test_submit_unknown_plan() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rules = RuleTable::default();
        let repo = Repository::new(&store, &rules);

        let mut form = RateTableForm::new();
        form.add_entry("30-39", 10.0);
        form.start_date = Some(d("2025-01-01"));
        let err = form.submit(&repo, 42, d("2025-01-01")).unwrap_err();
        assert!(matches!(err, ConsoleError::Store(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_submit_creates_options_and_closes_prior_rates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rules = RuleTable::default();
        let repo = Repository::new(&store, &rules);
        let plan_id = seeded_plan(&repo);

        let mut first = RateTableForm::new();
        first.merge_import(vec![row("30-39", 10.0), row("40-49", 20.0)]);
        first.start_date = Some(d("2024-01-01"));
        let history = first.submit(&repo, plan_id, d("2024-06-01")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].history.current().map(|r| r.record.rate), Some(10.0));

        let mut second = RateTableForm::new();
        second.merge_import(vec![row("40-49", 22.0), row("50-59", 30.0)]);
        second.start_date = Some(d("2025-01-01"));
        let history = second.submit(&repo, plan_id, d("2024-06-01")).unwrap();

        assert_eq!(history.len(), 3);
        let labels: Vec<&str> = history.iter().map(|h| h.option.label.as_str()).collect();
        assert_eq!(labels, vec!["30-39", "40-49", "50-59"]);

        // 30-39 untouched: still open-ended and current
        let untouched = &history[0].history;
        assert_eq!(untouched.current().and_then(|r| r.record.end_date), None);

        // 40-49: old rate closed the day before, new one pending
        let superseded = &history[1].history;
        let current = superseded.current().unwrap();
        assert_eq!(current.record.rate, 20.0);
        assert_eq!(current.record.end_date, Some(d("2024-12-31")));
        assert_eq!(current.label, "Active");
        assert_eq!(superseded.planned.len(), 1);
        assert_eq!(superseded.planned[0].record.rate, 22.0);
        assert_eq!(superseded.planned[0].label, "Pending");

        // 50-59: new option, only a pending rate
        assert!(history[2].history.current().is_none());
        assert_eq!(history[2].history.planned.len(), 1);

        let events = store.events_for("plan", &plan_id.to_string()).unwrap();
        let submitted: Vec<_> = events.iter().filter(|e| e.event_type == "plan_rates_submitted").collect();
        assert_eq!(submitted.len(), 2);
        assert!(submitted.iter().any(|e| e.data["closed"] == json!(1)));
    }

    #[test]
    fn test_add_medicare_rate() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rules = RuleTable::default();
        let repo = Repository::new(&store, &rules);
        let id = repo.create(&MedicarePlan::new("Plan G")).unwrap().id.unwrap();
        let today = d("2024-06-01");

        add_medicare_rate(&repo, id, 150.0, d("2023-01-01"), today).unwrap();
        let list = add_medicare_rate(&repo, id, 165.0, d("2024-01-01"), today).unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].record.rate, 165.0);
        assert_eq!(list[0].label, "Current");
        assert_eq!(list[1].record.end_date, Some(d("2023-12-31")));
        assert_eq!(list[1].label, "Ended");

        let err = add_medicare_rate(&repo, 999, 1.0, today, today).unwrap_err();
        assert!(matches!(err, ConsoleError::Store(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_same_start_rate_is_corrected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rules = RuleTable::default();
        let repo = Repository::new(&store, &rules);
        let id = repo.create(&MedicarePlan::new("Plan N")).unwrap().id.unwrap();
        let today = d("2024-06-01");

        add_medicare_rate(&repo, id, 150.0, d("2024-01-01"), today).unwrap();
        let list = add_medicare_rate(&repo, id, 175.0, d("2024-01-01"), today).unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].record.rate, 175.0);
        assert_eq!(list[0].label, "Current");

        let records = rates_for(&repo, RateOwner::MedicarePlan, id).unwrap();
        let buckets = group_rates(records, today, SortOrder::Ascending);
        assert_eq!(buckets.current().map(|r| r.rate), Some(175.0));
        assert!(!buckets.has_anomaly());
    }
}
