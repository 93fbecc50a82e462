//! CSV ingest for CPI levels and basket weights.
//!
//! Turns a long-format CSV (`category_id,date,value,seasonally_adjusted`) into
//! `TimeSeriesPoint`s.
//!
//! - Missing required columns are fatal (exit code 2).
//! - Bad rows are skipped and reported, never silently dropped.
//! - Column names are matched case-insensitively, with a few aliases.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::{info, warn};

use crate::data::{SeriesRequest, TimeSeriesSource, WeightTable};
use crate::domain::{CategoryWeight, TimeSeriesPoint};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Ingest output: parsed points plus what was skipped.
#[derive(Debug, Clone, Default)]
pub struct IngestedSeries {
    pub points: Vec<TimeSeriesPoint>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Parse CPI levels from any reader.
///
/// A missing `seasonally_adjusted` column means every row is adjusted.
pub fn read_points<R: Read>(reader: R) -> Result<IngestedSeries, AppError> {
    let mut reader = csv_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    ensure_columns(&header_map, &["category_id", "date", "value"])?;

    let mut out = IngestedSeries::default();
    for (idx, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        out.rows_read += 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                out.row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("Unreadable row: {e}"),
                });
                continue;
            }
        };

        match parse_point(&record, &header_map) {
            Ok(p) => {
                out.points.push(p);
                out.rows_used += 1;
            }
            Err(message) => out.row_errors.push(RowError {
                line,
                id: get_optional(&record, &header_map, "category_id").map(str::to_string),
                message,
            }),
        }
    }
    Ok(out)
}

/// Parse a weight table (`category_id,parent_id,weight`) from any reader.
///
/// Rows that fail to parse are skipped with a warning. A repeated
/// `(category_id, parent_id)` pair is rejected.
pub fn read_weights<R: Read>(reader: R) -> Result<WeightTable, AppError> {
    let mut reader = csv_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read weights CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    ensure_columns(&header_map, &["category_id", "weight"])?;

    let mut rows = Vec::new();
    let mut seen: HashMap<(String, Option<String>), usize> = HashMap::new();
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let parsed = record
            .map_err(|e| format!("Unreadable row: {e}"))
            .and_then(|r| parse_weight(&r, &header_map));
        match parsed {
            Ok(w) => {
                let key = (w.category_id.clone(), w.parent_id.clone());
                if let Some(first) = seen.insert(key, line) {
                    return Err(AppError::new(
                        2,
                        format!(
                            "Duplicate weight for '{}' under '{}' on lines {first} and {line}.",
                            w.category_id,
                            w.parent_id.as_deref().unwrap_or("")
                        ),
                    ));
                }
                rows.push(w);
            }
            Err(message) => warn!(line, %message, "skipping weight row"),
        }
    }
    Ok(WeightTable::new(rows))
}

pub fn load_weights(path: &Path) -> Result<WeightTable, AppError> {
    let file = open(path)?;
    let table = read_weights(file)?;
    info!(path = %path.display(), rows = table.rows.len(), "loaded weight table");
    Ok(table)
}

/// CPI levels read from a CSV file on every load.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TimeSeriesSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn load(&self, request: &SeriesRequest) -> Result<Vec<TimeSeriesPoint>, AppError> {
        let ingested = read_points(open(&self.path)?)?;
        for e in &ingested.row_errors {
            warn!(line = e.line, id = e.id.as_deref().unwrap_or(""), message = %e.message, "skipped CSV row");
        }
        info!(
            path = %self.path.display(),
            rows_read = ingested.rows_read,
            rows_used = ingested.rows_used,
            "loaded CPI CSV"
        );
        Ok(ingested.points.into_iter().filter(|p| request.accepts(p)).collect())
    }
}

fn open(path: &Path) -> Result<File, AppError> {
    File::open(path).map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        map.entry(canonical_header(name)).or_insert(idx);
    }
    map
}

fn canonical_header(name: &str) -> String {
    let normalized = name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "category" | "product" | "series" => "category_id".to_string(),
        "parent" => "parent_id".to_string(),
        "sa" | "seasonal" | "seasonally_adj" => "seasonally_adjusted".to_string(),
        "level" | "index" => "value".to_string(),
        _ => normalized,
    }
}

fn ensure_columns(header_map: &HashMap<String, usize>, required: &[&str]) -> Result<(), AppError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| !header_map.contains_key(*c))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::new(
            2,
            format!("CSV is missing required column(s): {}", missing.join(", ")),
        ))
    }
}

fn parse_point(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<TimeSeriesPoint, String> {
    let category_id = get_required(record, header_map, "category_id")?;
    let date = parse_date(get_required(record, header_map, "date")?)?;
    let raw = get_required(record, header_map, "value")?;
    let value = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("Invalid value '{raw}'."))?;
    let seasonally_adjusted = match get_optional(record, header_map, "seasonally_adjusted") {
        Some(s) => parse_bool(s)?,
        None => true,
    };
    Ok(TimeSeriesPoint::new(category_id, date, value, seasonally_adjusted))
}

fn parse_weight(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<CategoryWeight, String> {
    let category_id = get_required(record, header_map, "category_id")?.to_string();
    let raw = get_required(record, header_map, "weight")?;
    let weight = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("Invalid weight '{raw}'."))?;
    Ok(CategoryWeight {
        category_id,
        parent_id: get_optional(record, header_map, "parent_id").map(str::to_string),
        weight,
    })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    get_optional(record, header_map, name).ok_or_else(|| format!("Missing '{name}'."))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = *header_map.get(name)?;
    record.get(idx).filter(|s| !s.is_empty())
}

/// Full dates or bare `YYYY-MM` months; either way the month start is kept.
fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{s}'. Expected YYYY-MM-DD or YYYY-MM."))
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err(format!("Invalid seasonally_adjusted flag '{s}'.")),
    }
}
