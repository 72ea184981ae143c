// 📥 Participant CSV Importer
//
// Census files from employers: one participant per row, header names vary by
// payroll vendor. Unlike rate files these routinely carry quoted fields
// ("Smith, Jr."), so they go through the csv crate.

use crate::dates::parse_calendar_date;
use crate::entities::{Participant, Repository};
use crate::error::{ConsoleResult, FormatError};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};

const FIRST_NAME: &[&str] = &["first_name", "first name", "firstname"];
const LAST_NAME: &[&str] = &["last_name", "last name", "lastname"];
const BIRTH_DATE: &[&str] = &["birth_date", "dob", "date of birth"];
const EMAIL: &[&str] = &["email", "e-mail"];
const HIRE_DATE: &[&str] = &["hire_date", "hire date"];

struct Columns {
    first_name: usize,
    last_name: usize,
    birth_date: Option<usize>,
    email: Option<usize>,
    hire_date: Option<usize>,
}

impl Columns {
    fn resolve(header: &StringRecord) -> Result<Self, FormatError> {
        let find = |aliases: &[&str]| {
            header
                .iter()
                .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
        };
        let required = |column: &'static str, aliases: &[&str]| {
            find(aliases).ok_or_else(|| FormatError::MissingColumn {
                column,
                accepted: aliases.join(", "),
            })
        };

        Ok(Columns {
            first_name: required("first_name", FIRST_NAME)?,
            last_name: required("last_name", LAST_NAME)?,
            birth_date: find(BIRTH_DATE),
            email: find(EMAIL),
            hire_date: find(HIRE_DATE),
        })
    }
}

/// Decode a participant CSV into unsaved participants of `group_id`.
///
/// Row numbers in errors count the header as row 1.
pub fn import_participants(file_name: &str, bytes: &[u8], group_id: i64) -> Result<Vec<Participant>, FormatError> {
    let undecodable = |e: csv::Error| FormatError::Undecodable {
        file_name: file_name.to_string(),
        detail: e.to_string(),
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(strip_bom(bytes));

    let header = reader.headers().map_err(undecodable)?.clone();
    if header.iter().all(|h| h.is_empty()) {
        return Err(FormatError::Empty {
            file_name: file_name.to_string(),
        });
    }
    let columns = Columns::resolve(&header)?;

    let mut participants = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(undecodable)?;
        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 2);

        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).filter(|v| !v.is_empty());
        let name = |idx: usize, name: &'static str| {
            field(Some(idx))
                .map(str::to_string)
                .ok_or(FormatError::MissingField { field: name, row })
        };
        let date = |idx: Option<usize>| -> Result<Option<NaiveDate>, FormatError> {
            match field(idx) {
                None => Ok(None),
                Some(raw) => parse_calendar_date(raw).map(Some).ok_or_else(|| FormatError::InvalidDate {
                    raw: raw.to_string(),
                    row,
                }),
            }
        };

        participants.push(Participant {
            id: None,
            group_id,
            first_name: name(columns.first_name, "first_name")?,
            last_name: name(columns.last_name, "last_name")?,
            birth_date: date(columns.birth_date)?,
            email: field(columns.email).map(str::to_string),
            hire_date: date(columns.hire_date)?,
        });
    }

    if participants.is_empty() {
        return Err(FormatError::Empty {
            file_name: file_name.to_string(),
        });
    }

    tracing::info!(file_name, group_id, count = participants.len(), "decoded participant file");
    Ok(participants)
}

/// Validate and store every decoded participant. Stops at the first rejected
/// row; rows before it stay saved.
pub fn save_participants(repo: &Repository<'_>, participants: &[Participant]) -> ConsoleResult<Vec<Participant>> {
    participants.iter().map(|p| repo.create(p)).collect()
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::entities::Group;
    use crate::validation::RuleTable;

    #[test]
    fn test_quoted_fields_and_aliases() {
        let csv = "First Name,Last Name,DOB,Email\n\
                   Ana,\"Ruiz, Jr.\",1990-03-04T00:00:00Z,ana@example.com\n\
                   Bo,Li,,\n";
        let rows = import_participants("census.csv", csv.as_bytes(), 7).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].last_name, "Ruiz, Jr.");
        assert_eq!(rows[0].birth_date, NaiveDate::from_ymd_opt(1990, 3, 4));
        assert_eq!(rows[0].email.as_deref(), Some("ana@example.com"));
        assert_eq!(rows[0].group_id, 7);
        assert_eq!(rows[1].birth_date, None);
        assert_eq!(rows[1].email, None);
    }

    #[test]
    fn test_missing_name_reports_row() {
        let csv = "first_name,last_name\nAna,Ruiz\n,Li\n";
        let err = import_participants("census.csv", csv.as_bytes(), 1).unwrap_err();
        assert_eq!(
            err,
            FormatError::MissingField {
                field: "first_name",
                row: 3
            }
        );
    }

    #[test]
    fn test_bad_date_reports_row_and_value() {
        let csv = "first_name,last_name,hire_date\nAna,Ruiz,someday\n";
        let err = import_participants("census.csv", csv.as_bytes(), 1).unwrap_err();
        assert_eq!(
            err,
            FormatError::InvalidDate {
                raw: "someday".to_string(),
                row: 2
            }
        );
    }

    #[test]
    fn test_missing_column_and_empty_file() {
        let err = import_participants("census.csv", b"first_name,email\nAna,a@b.co\n", 1).unwrap_err();
        assert!(matches!(err, FormatError::MissingColumn { column: "last_name", .. }));

        let err = import_participants("census.csv", b"first_name,last_name\n", 1).unwrap_err();
        assert!(matches!(err, FormatError::Empty { .. }));
    }

    #[test]
    fn test_save_participants() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rules = RuleTable::default();
        let repo = Repository::new(&store, &rules);
        let group_id = repo.create(&Group::new("Acme")).unwrap().id.unwrap();

        let rows = import_participants("census.csv", b"first_name,last_name\nAna,Ruiz\nBo,Li\n", group_id).unwrap();
        let saved = save_participants(&repo, &rows).unwrap();

        assert_eq!(saved.len(), 2);
        assert!(saved.iter().all(|p| p.id.is_some()));
        assert_eq!(repo.list::<Participant>().unwrap().len(), 2);
    }
}
