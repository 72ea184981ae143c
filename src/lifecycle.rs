// ⏳ Rate Lifecycle - Planned / Current / Ended
//
// A rate interval is classified against today's calendar date. Dates are
// `NaiveDate`, so there is no time-of-day and no timezone in the comparison.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateStatus {
    /// Starts after today
    Planned,
    /// Started, and open-ended or ending today or later
    Current,
    /// Ended before today
    Ended,
}

/// Which screen is showing the rates. Only the wording differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryView {
    /// Per-option history, grouped: Pending / Active / Ended
    Combined,
    /// Flat rate list: Planned / Current / Ended
    FlatList,
}

impl HistoryView {
    pub fn default_order(&self) -> SortOrder {
        match self {
            HistoryView::Combined => SortOrder::Ascending,
            HistoryView::FlatList => SortOrder::Descending,
        }
    }
}

impl RateStatus {
    pub fn label(&self, view: HistoryView) -> &'static str {
        match (self, view) {
            (RateStatus::Planned, HistoryView::Combined) => "Pending",
            (RateStatus::Planned, HistoryView::FlatList) => "Planned",
            (RateStatus::Current, HistoryView::Combined) => "Active",
            (RateStatus::Current, HistoryView::FlatList) => "Current",
            (RateStatus::Ended, _) => "Ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<SortOrder> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Some(SortOrder::Ascending),
            "desc" | "descending" => Some(SortOrder::Descending),
            _ => None,
        }
    }

    fn sort_by_start<R: RateInterval>(&self, records: &mut [R]) {
        match self {
            SortOrder::Ascending => records.sort_by_key(|r| r.start_date()),
            SortOrder::Descending => records.sort_by(|a, b| b.start_date().cmp(&a.start_date())),
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Classify one interval relative to `today`.
///
/// `start == today` is Current, never Planned. `end == today` is still Current.
pub fn classify(start_date: NaiveDate, end_date: Option<NaiveDate>, today: NaiveDate) -> RateStatus {
    if start_date > today {
        RateStatus::Planned
    } else if end_date.map_or(true, |end| end >= today) {
        RateStatus::Current
    } else {
        RateStatus::Ended
    }
}

pub fn classify_today(start_date: NaiveDate, end_date: Option<NaiveDate>) -> RateStatus {
    classify(start_date, end_date, today())
}

/// Anything with a start date and an optional end date.
pub trait RateInterval {
    fn start_date(&self) -> NaiveDate;
    fn end_date(&self) -> Option<NaiveDate>;

    fn status(&self, today: NaiveDate) -> RateStatus {
        classify(self.start_date(), self.end_date(), today)
    }

    fn is_open_ended(&self) -> bool {
        self.end_date().is_none()
    }
}

impl<R: RateInterval + ?Sized> RateInterval for &R {
    fn start_date(&self) -> NaiveDate {
        (**self).start_date()
    }

    fn end_date(&self) -> Option<NaiveDate> {
        (**self).end_date()
    }
}

// ============================================================================
// GROUPING
// ============================================================================

/// Records partitioned by status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateBuckets<R> {
    pub planned: Vec<R>,
    /// Latest start first; only the first entry is authoritative.
    pub current: Vec<R>,
    pub ended: Vec<R>,
}

impl<R> RateBuckets<R> {
    /// The record on display as current.
    pub fn current(&self) -> Option<&R> {
        self.current.first()
    }

    /// Extra records that also classify as current. Normally empty.
    pub fn superseded_current(&self) -> &[R] {
        self.current.get(1..).unwrap_or(&[])
    }

    pub fn has_anomaly(&self) -> bool {
        self.current.len() > 1
    }

    pub fn len(&self) -> usize {
        self.planned.len() + self.current.len() + self.ended.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition into planned / current / ended. Planned and ended are sorted by
/// start date in `order`; current is always latest-start first, and among
/// equal starts the record that came later in `records` goes first.
pub fn group_rates<R, I>(records: I, today: NaiveDate, order: SortOrder) -> RateBuckets<R>
where
    R: RateInterval,
    I: IntoIterator<Item = R>,
{
    let mut buckets = RateBuckets {
        planned: Vec::new(),
        current: Vec::new(),
        ended: Vec::new(),
    };

    for record in records {
        match record.status(today) {
            RateStatus::Planned => buckets.planned.push(record),
            RateStatus::Current => buckets.current.push(record),
            RateStatus::Ended => buckets.ended.push(record),
        }
    }

    order.sort_by_start(&mut buckets.planned);
    order.sort_by_start(&mut buckets.ended);
    // stable sort; reversing first lets the later record win a start-date tie
    buckets.current.reverse();
    SortOrder::Descending.sort_by_start(&mut buckets.current);

    if buckets.has_anomaly() {
        tracing::warn!(count = buckets.current.len(), "more than one current rate; latest start wins");
    }

    buckets
}

/// Every record with its status, sorted by start date.
pub fn flat_rate_list<R, I>(records: I, today: NaiveDate, order: SortOrder) -> Vec<(R, RateStatus)>
where
    R: RateInterval,
    I: IntoIterator<Item = R>,
{
    let mut list: Vec<R> = records.into_iter().collect();
    order.sort_by_start(&mut list);
    list.into_iter()
        .map(|r| {
            let status = r.status(today);
            (r, status)
        })
        .collect()
}

// ============================================================================
// CLOSING PRIOR RATES
// ============================================================================

/// Open-ended records that a new rate starting on `new_start` supersedes,
/// paired with the end date they should receive (the day before `new_start`).
///
/// Records starting on or after `new_start` are left alone.
pub fn close_prior_open_rates<R: RateInterval>(records: &[R], new_start: NaiveDate) -> Vec<(&R, NaiveDate)> {
    let Some(end) = new_start.pred_opt() else {
        return Vec::new();
    };

    records
        .iter()
        .filter(|r| r.is_open_ended() && r.start_date() < new_start)
        .map(|r| (r, end))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
