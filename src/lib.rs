// Benefits Console - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod config;
pub mod dates;
pub mod db;
pub mod edit;
pub mod entities;
pub mod error;
pub mod importer;
pub mod lifecycle;
pub mod participants;
pub mod rate_form;
pub mod validation;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Settings;
pub use dates::{normalize_date_input, parse_calendar_date};
pub use db::{setup_database, Event, Filter, Row, SqliteStore, Store};
pub use edit::EditState;
pub use entities::{Entity, Repository};
pub use error::{ConsoleError, ConsoleResult, FormatError, StoreError, ValidationError, ValidationErrors};
pub use importer::{import_rate_file, parse_rate_value, FileFormat, RateFileRow};
pub use lifecycle::{classify, group_rates, HistoryView, RateBuckets, RateStatus, SortOrder};
pub use participants::import_participants;
pub use rate_form::{add_medicare_rate, RateTableForm};
pub use validation::{PlanField, Requirement, RuleTable};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
