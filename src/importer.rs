// 📥 Rate File Importer
// Decodes uploaded rate tables (CSV or spreadsheet) into (option, rate) rows.
//
// Two decoders produce the same cell grid; header resolution, row skipping
// and rate normalization run once on that grid, so both formats behave the same.

use crate::error::FormatError;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Cursor;

/// Accepted header names for the option column (compared lowercase, trimmed).
pub const OPTION_HEADERS: &[&str] = &["age", "option"];

/// Accepted header names for the rate column.
pub const RATE_HEADERS: &[&str] = &["rate", "price"];

// ============================================================================
// CORE TYPES
// ============================================================================

/// FileFormat - decoding path, chosen from the declared file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    DelimitedText,
    Spreadsheet,
}

impl FileFormat {
    pub fn name(&self) -> &str {
        match self {
            FileFormat::DelimitedText => "delimited text",
            FileFormat::Spreadsheet => "spreadsheet",
        }
    }
}

/// One decoded cell. Spreadsheets keep numbers numeric; text files only
/// produce `Text` and `Empty`.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(s: &str) -> Cell {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Render as an option label. Whole numbers lose their fraction ("30" not "30.0").
    pub fn as_label(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
        }
    }

    fn header_name(&self) -> String {
        self.as_label().unwrap_or_default().trim().to_lowercase()
    }
}

/// A decoded row plus its 1-based position in the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub number: usize,
    pub cells: Vec<Cell>,
}

impl GridRow {
    pub fn cell(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&Cell::Empty)
    }

    fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }
}

/// RateFileRow - one imported (option label, rate) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateFileRow {
    pub option: String,
    pub rate: f64,
}

// ============================================================================
// DECODERS
// ============================================================================

/// GridDecoder - turns raw file bytes into a grid of cells, header first.
///
/// Blank rows are dropped; every other row keeps its source row number.
pub trait GridDecoder: Send + Sync {
    fn decode(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<GridRow>, FormatError>;

    fn format(&self) -> FileFormat;
}

/// Choose the decoding path by extension: `.xlsx`/`.xls` are spreadsheets,
/// everything else is delimited text.
pub fn detect_format(file_name: &str) -> FileFormat {
    let lower = file_name.trim().to_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        FileFormat::Spreadsheet
    } else {
        FileFormat::DelimitedText
    }
}

pub fn get_decoder(format: FileFormat) -> Box<dyn GridDecoder> {
    match format {
        FileFormat::DelimitedText => Box::new(DelimitedTextDecoder),
        FileFormat::Spreadsheet => Box::new(SpreadsheetDecoder),
    }
}

/// Splits on newlines and commas. No quoted-field handling.
pub struct DelimitedTextDecoder;

impl GridDecoder for DelimitedTextDecoder {
    fn decode(&self, _file_name: &str, bytes: &[u8]) -> Result<Vec<GridRow>, FormatError> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

        let rows = text
            .split('\n')
            .enumerate()
            .map(|(idx, line)| GridRow {
                number: idx + 1,
                cells: line.trim_end_matches('\r').split(',').map(Cell::text).collect(),
            })
            .filter(|row| !row.is_blank())
            .collect();

        Ok(rows)
    }

    fn format(&self) -> FileFormat {
        FileFormat::DelimitedText
    }
}

/// Reads the first worksheet of an `.xlsx`/`.xls` workbook.
pub struct SpreadsheetDecoder;

impl GridDecoder for SpreadsheetDecoder {
    fn decode(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<GridRow>, FormatError> {
        let undecodable = |detail: String| FormatError::Undecodable {
            file_name: file_name.to_string(),
            detail,
        };

        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| undecodable(e.to_string()))?;

        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range.map_err(|e| undecodable(e.to_string()))?,
            None => {
                return Err(FormatError::Empty {
                    file_name: file_name.to_string(),
                })
            }
        };

        Ok(grid_from_range(&range))
    }

    fn format(&self) -> FileFormat {
        FileFormat::Spreadsheet
    }
}

/// Convert a worksheet range into grid rows, numbering rows as the sheet does.
pub fn grid_from_range(range: &Range<Data>) -> Vec<GridRow> {
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    range
        .rows()
        .enumerate()
        .map(|(idx, cells)| GridRow {
            number: first_row + idx + 1,
            cells: cells.iter().map(cell_from_data).collect(),
        })
        .filter(|row| !row.is_blank())
        .collect()
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::text(s),
        other => Cell::text(&other.to_string()),
    }
}

// ============================================================================
// RATE NORMALIZATION
// ============================================================================

/// Normalize a raw rate cell into a number.
///
/// Numeric cells pass through. Text accepts currency symbols, thousands
/// separators and accounting negatives: `"$1,234.56"` is 1234.56 and
/// `"(123.45)"` is -123.45.
pub fn parse_rate_value(cell: &Cell) -> Result<f64, FormatError> {
    match cell {
        Cell::Number(n) => Ok(*n),
        Cell::Text(raw) => parse_rate_text(raw),
        Cell::Empty => Err(FormatError::EmptyRate),
    }
}

pub fn parse_rate_text(raw: &str) -> Result<f64, FormatError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FormatError::EmptyRate);
    }

    let parenthesized = trimmed.starts_with('(') && trimmed.ends_with(')');

    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '(' | ')') && !c.is_whitespace())
        .collect();

    let signed = if parenthesized && !cleaned.starts_with('-') {
        format!("-{}", cleaned)
    } else {
        cleaned
    };

    signed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| FormatError::NotANumber {
            raw: raw.to_string(),
        })
}

// ============================================================================
// IMPORT
// ============================================================================

/// Decode an uploaded rate file into (option, rate) rows, in file order.
pub fn import_rate_file(file_name: &str, bytes: &[u8]) -> Result<Vec<RateFileRow>, FormatError> {
    let format = detect_format(file_name);
    tracing::debug!(file_name, format = format.name(), bytes = bytes.len(), "decoding rate file");

    let grid = get_decoder(format).decode(file_name, bytes)?;
    let rows = rows_from_grid(file_name, &grid)?;

    tracing::info!(file_name, rows = rows.len(), "rate file imported");
    Ok(rows)
}

/// Resolve the header and turn every complete data row into a `RateFileRow`.
pub fn rows_from_grid(file_name: &str, grid: &[GridRow]) -> Result<Vec<RateFileRow>, FormatError> {
    let (header, data) = match grid.split_first() {
        Some((header, data)) if !data.is_empty() => (header, data),
        _ => {
            return Err(FormatError::Empty {
                file_name: file_name.to_string(),
            })
        }
    };

    let option_col = find_column(header, OPTION_HEADERS).ok_or_else(|| FormatError::MissingColumn {
        column: "option",
        accepted: OPTION_HEADERS.join(", "),
    })?;
    let rate_col = find_column(header, RATE_HEADERS).ok_or_else(|| FormatError::MissingColumn {
        column: "rate",
        accepted: RATE_HEADERS.join(", "),
    })?;

    let mut rows = Vec::with_capacity(data.len());
    let mut skipped = 0usize;

    for row in data {
        let option = row.cell(option_col);
        let rate = row.cell(rate_col);

        let option = match option.as_label() {
            Some(label) if !rate.is_empty() => label,
            _ => {
                skipped += 1;
                continue;
            }
        };

        let rate = parse_rate_value(rate).map_err(|e| e.at_row(row.number))?;
        rows.push(RateFileRow { option, rate });
    }

    if skipped > 0 {
        tracing::debug!(file_name, skipped, "skipped incomplete rate rows");
    }

    Ok(rows)
}

/// SHA-256 of the uploaded bytes, hex encoded. Recorded with each import.
pub fn file_fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// First column whose trimmed, lowercased header equals one of `aliases`.
pub fn find_column(header: &GridRow, aliases: &[&str]) -> Option<usize> {
    header
        .cells
        .iter()
        .position(|cell| aliases.contains(&cell.header_name().as_str()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(text: &str) -> Result<Vec<RateFileRow>, FormatError> {
        import_rate_file("rates.csv", text.as_bytes())
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("rates.xlsx"), FileFormat::Spreadsheet);
        assert_eq!(detect_format("RATES.XLS"), FileFormat::Spreadsheet);
        assert_eq!(detect_format("rates.csv"), FileFormat::DelimitedText);
        assert_eq!(detect_format("rates.txt"), FileFormat::DelimitedText);
        assert_eq!(detect_format("rates"), FileFormat::DelimitedText);
    }

    #[test]
    fn test_get_decoder_format() {
        assert_eq!(get_decoder(FileFormat::Spreadsheet).format(), FileFormat::Spreadsheet);
        assert_eq!(get_decoder(FileFormat::DelimitedText).format(), FileFormat::DelimitedText);
    }

    #[test]
    fn test_parse_rate_text_formats() {
        assert_eq!(parse_rate_text("$1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_rate_text("(123.45)").unwrap(), -123.45);
        assert_eq!(parse_rate_text("-123.45").unwrap(), -123.45);
        assert_eq!(parse_rate_text("1234.56").unwrap(), 1234.56);
    }

    #[test]
    fn test_parse_rate_text_other_currencies() {
        assert_eq!(parse_rate_text("€ 99.10").unwrap(), 99.10);
        assert_eq!(parse_rate_text("£1,000").unwrap(), 1000.0);
        assert_eq!(parse_rate_text("¥500").unwrap(), 500.0);
        assert_eq!(parse_rate_text("($15.00)").unwrap(), -15.0);
        assert_eq!(parse_rate_text("(-15.00)").unwrap(), -15.0);
    }

    #[test]
    fn test_parse_rate_text_rejects_garbage() {
        assert_eq!(parse_rate_text("   "), Err(FormatError::EmptyRate));
        assert_eq!(
            parse_rate_text("twelve"),
            Err(FormatError::NotANumber {
                raw: "twelve".to_string()
            })
        );
        assert!(parse_rate_text("NaN").is_err());
        assert!(parse_rate_text("inf").is_err());
    }

    #[test]
    fn test_parse_rate_value_numeric_passthrough() {
        assert_eq!(parse_rate_value(&Cell::Number(42.5)).unwrap(), 42.5);
        assert_eq!(parse_rate_value(&Cell::Empty), Err(FormatError::EmptyRate));
    }

    #[test]
    fn test_age_price_scenario() {
        let rows = csv("Age,Price\n30-39,$120.50\n40-49,(15.00)\n").unwrap();

        assert_eq!(
            rows,
            vec![
                RateFileRow {
                    option: "30-39".to_string(),
                    rate: 120.50
                },
                RateFileRow {
                    option: "40-49".to_string(),
                    rate: -15.00
                },
            ]
        );
    }

    #[test]
    fn test_header_case_and_whitespace() {
        let rows = csv(" OPTION , Rate \r\nEmployee Only,450\r\nFamily,1200\r\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].option, "Employee Only");
        assert_eq!(rows[1].rate, 1200.0);
    }

    #[test]
    fn test_first_matching_column_wins() {
        let rows = csv("option,rate,price\nA,1,2\n").unwrap();
        assert_eq!(rows[0].rate, 1.0);

        let rows = csv("age,option,rate\n30,ignored,5\n").unwrap();
        assert_eq!(rows[0].option, "30");
    }

    #[test]
    fn test_missing_option_column_fails_before_rows() {
        // The data row is unparseable too; the column error must win.
        let err = csv("Tier,Rate\nA,not-a-number\n").unwrap_err();
        assert_eq!(
            err,
            FormatError::MissingColumn {
                column: "option",
                accepted: "age, option".to_string()
            }
        );
        assert!(err.to_string().contains("option"));
    }

    #[test]
    fn test_missing_rate_column() {
        let err = csv("Option,Amount\nA,1\n").unwrap_err();
        assert!(matches!(err, FormatError::MissingColumn { column: "rate", .. }));
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(csv(""), Err(FormatError::Empty { .. })));
        assert!(matches!(csv("Option,Rate\n"), Err(FormatError::Empty { .. })));
        assert!(matches!(csv("Option,Rate\n\n\n"), Err(FormatError::Empty { .. })));
    }

    #[test]
    fn test_incomplete_rows_are_skipped() {
        let rows = csv("Option,Rate\nA,10\n,20\nB,\nC\nD,40\n").unwrap();
        let labels: Vec<&str> = rows.iter().map(|r| r.option.as_str()).collect();
        assert_eq!(labels, vec!["A", "D"]);
    }

    #[test]
    fn test_invalid_rate_reports_row_and_value() {
        let err = csv("Option,Rate\nA,10\nB,abc\n").unwrap_err();
        assert_eq!(
            err,
            FormatError::InvalidRate {
                raw: "abc".to_string(),
                row: 3
            }
        );
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_row_numbers_survive_blank_lines() {
        let err = csv("Option,Rate\n\nA,10\n\nB,oops\n").unwrap_err();
        assert_eq!(
            err,
            FormatError::InvalidRate {
                raw: "oops".to_string(),
                row: 5
            }
        );
    }

    #[test]
    fn test_import_is_repeatable() {
        let bytes = b"option,rate\nSingle,$1,0\nCouple,2\n";
        // Unquoted comma splits "$1,0" into two fields; the rate is "$1".
        let first = import_rate_file("a.csv", bytes).unwrap();
        let second = import_rate_file("a.csv", bytes).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].rate, 1.0);
    }

    #[test]
    fn test_utf8_bom_is_ignored() {
        let rows = import_rate_file("bom.csv", "\u{feff}Option,Rate\nA,1\n".as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_spreadsheet_grid_matches_text_grid() {
        let mut range: Range<Data> = Range::new((0, 0), (3, 1));
        range.set_value((0, 0), Data::String("Age".to_string()));
        range.set_value((0, 1), Data::String("Price".to_string()));
        range.set_value((1, 0), Data::String("30-39".to_string()));
        range.set_value((1, 1), Data::String("$120.50".to_string()));
        range.set_value((2, 0), Data::Int(40));
        range.set_value((2, 1), Data::Float(-15.0));

        let sheet_rows = rows_from_grid("rates.xlsx", &grid_from_range(&range)).unwrap();
        let text_rows = csv("Age,Price\n30-39,$120.50\n40,(15.00)\n").unwrap();

        assert_eq!(sheet_rows, text_rows);
    }

    #[test]
    fn test_spreadsheet_row_numbers() {
        let mut range: Range<Data> = Range::new((0, 0), (2, 1));
        range.set_value((0, 0), Data::String("option".to_string()));
        range.set_value((0, 1), Data::String("rate".to_string()));
        range.set_value((2, 0), Data::String("X".to_string()));
        range.set_value((2, 1), Data::String("bad".to_string()));

        let err = rows_from_grid("rates.xlsx", &grid_from_range(&range)).unwrap_err();
        assert_eq!(
            err,
            FormatError::InvalidRate {
                raw: "bad".to_string(),
                row: 3
            }
        );
    }

    #[test]
    fn test_spreadsheet_garbage_bytes() {
        let err = import_rate_file("rates.xlsx", b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, FormatError::Undecodable { .. }));
    }

    #[test]
    fn test_file_fingerprint() {
        let a = file_fingerprint(b"Age,Rate\n30-39,1\n");
        assert_eq!(a.len(), 64);
        assert_eq!(a, file_fingerprint(b"Age,Rate\n30-39,1\n"));
        assert_ne!(a, file_fingerprint(b"Age,Rate\n30-39,2\n"));
    }

    #[test]
    fn test_cell_labels() {
        assert_eq!(Cell::Number(30.0).as_label().as_deref(), Some("30"));
        assert_eq!(Cell::Number(2.5).as_label().as_deref(), Some("2.5"));
        assert_eq!(Cell::text("  "), Cell::Empty);
    }
}
