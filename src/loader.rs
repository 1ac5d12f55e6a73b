//! Dataset loading from in-memory bytes: CSV through polars, spreadsheets through calamine.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;

use crate::config::AppConfig;
use crate::dataset::Dataset;
use crate::error::{user_message_from_polars, PortalError, Result};
use crate::Args;

pub use dataportal_cli::FileFormat;

/// How to read an uploaded file. CLI values take precedence over config values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Overrides extension-based format detection.
    pub format: Option<FileFormat>,
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub parse_dates: bool,
    /// Spreadsheet sheet: 0-based index or sheet name. First sheet when unset.
    pub sheet: Option<String>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            format: None,
            delimiter: None,
            has_header: None,
            parse_dates: true,
            sheet: None,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = Some(has_header);
        self
    }

    pub fn with_parse_dates(mut self, parse_dates: bool) -> Self {
        self.parse_dates = parse_dates;
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Combine config defaults with command-line overrides.
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Self {
        let loading = &config.file_loading;
        let mut opts = OpenOptions::new();

        opts.format = args.format;
        opts.delimiter = args.delimiter.or(loading.delimiter);
        opts.has_header = match args.no_header {
            Some(no_header) => Some(!no_header),
            None => loading.has_header,
        };
        opts.parse_dates = args
            .parse_dates
            .or(loading.parse_dates)
            .unwrap_or(true);
        opts.sheet = args.sheet.clone().or_else(|| loading.sheet.clone());

        opts
    }
}

/// Parse uploaded bytes into a Dataset. The file name decides the format unless
/// `options.format` is set: a name ending in `.csv` is delimited text, anything
/// else is a spreadsheet.
pub fn load(bytes: &[u8], filename: &str, options: &OpenOptions) -> Result<Dataset> {
    let format = options
        .format
        .unwrap_or_else(|| FileFormat::from_path(Path::new(filename)));
    debug!("loading {} ({} bytes) as {:?}", filename, bytes.len(), format);

    let df = match format {
        FileFormat::Csv => read_csv(bytes, options)?,
        FileFormat::Excel => read_spreadsheet(bytes, options)?,
    };

    info!(
        "loaded {}: {} rows x {} columns",
        filename,
        df.height(),
        df.width()
    );
    Ok(Dataset::new(df))
}

fn read_csv(bytes: &[u8], options: &OpenOptions) -> Result<DataFrame> {
    if let Err(e) = std::str::from_utf8(bytes) {
        return Err(PortalError::format(
            "CSV",
            format!("not valid UTF-8 text (bad byte at offset {})", e.valid_up_to()),
        ));
    }
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(PortalError::format("CSV", "file is empty"));
    }

    let delimiter = options.delimiter.unwrap_or(b',');
    let parse_dates = options.parse_dates;
    // Full-column inference: a late float or string must not break an integer guess.
    let read_options = CsvReadOptions::default()
        .with_has_header(options.has_header.unwrap_or(true))
        .with_infer_schema_length(None)
        .map_parse_options(|opts| {
            opts.with_separator(delimiter)
                .with_try_parse_dates(parse_dates)
        });

    CsvReader::new(Cursor::new(bytes.to_vec()))
        .with_options(read_options)
        .finish()
        .map_err(|e| PortalError::format("CSV", user_message_from_polars(&e)))
}

fn read_spreadsheet(bytes: &[u8], options: &OpenOptions) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| PortalError::format("spreadsheet", e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(PortalError::format("spreadsheet", "workbook has no sheets"));
    }

    let range: Range<Data> = match options.sheet.as_deref() {
        Some(sel) => match sel.parse::<usize>() {
            Ok(idx) => workbook
                .worksheet_range_at(idx)
                .ok_or_else(|| {
                    PortalError::format("spreadsheet", format!("no sheet at index {}", idx))
                })?
                .map_err(|e| PortalError::format("spreadsheet", e.to_string()))?,
            Err(_) => workbook
                .worksheet_range(sel)
                .map_err(|e| PortalError::format("spreadsheet", e.to_string()))?,
        },
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| PortalError::format("spreadsheet", "no first sheet"))?
            .map_err(|e| PortalError::format("spreadsheet", e.to_string()))?,
    };

    let rows: Vec<&[Data]> = range.rows().collect();
    sheet_rows_to_frame(&rows, options.has_header.unwrap_or(true))
}

/// Build a frame from sheet rows; the first row names the columns when `has_header`.
fn sheet_rows_to_frame(rows: &[&[Data]], has_header: bool) -> Result<DataFrame> {
    if rows.is_empty() {
        return Ok(DataFrame::empty());
    }

    let n_cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let (names, body): (Vec<String>, &[&[Data]]) = if has_header {
        let names = (0..n_cols)
            .map(|i| match rows[0].get(i).map(header_text) {
                Some(text) if !text.is_empty() => text,
                _ => format!("column_{}", i + 1),
            })
            .collect();
        (dedup_names(names), &rows[1..])
    } else {
        let names = (0..n_cols).map(|i| format!("column_{}", i + 1)).collect();
        (names, rows)
    };

    let mut columns: Vec<Column> = Vec::with_capacity(n_cols);
    for (col_idx, name) in names.iter().enumerate() {
        let cells: Vec<Option<&Data>> = body.iter().map(|row| row.get(col_idx)).collect();
        let cell_type = infer_cell_type(&cells);
        debug!("sheet column '{}' inferred as {:?}", name, cell_type);
        columns.push(cells_to_series(name, &cells, cell_type)?.into());
    }

    DataFrame::new(columns)
        .map_err(|e| PortalError::format("spreadsheet", user_message_from_polars(&e)))
}

/// Rename repeated header names to `<name>_duplicated_<n>`, the way the CSV reader does.
/// A new name never collides with another header.
fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in &names {
        if !out.contains(name) {
            out.push(name.clone());
            continue;
        }
        let renamed = (0usize..)
            .map(|n| format!("{}_duplicated_{}", name, n))
            .find(|candidate| !out.contains(candidate) && !names.contains(candidate))
            .unwrap_or_default();
        out.push(renamed);
    }
    out
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Inferred type for a sheet column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CellType {
    Int64,
    Float64,
    Boolean,
    Utf8,
    Date,
    Datetime,
}

/// Integer beats float beats string. Strings only become temporal when every
/// non-empty one parses as a date or datetime.
fn infer_cell_type(cells: &[Option<&Data>]) -> CellType {
    let mut saw_string = false;
    let mut strings_temporal = true;
    let mut saw_int = false;
    let mut saw_float = false;
    let mut floats_whole = true;
    let mut saw_bool = false;
    let mut saw_datetime = false;

    for cell in cells.iter().flatten() {
        match cell {
            Data::Empty | Data::Error(_) => {}
            Data::String(s) => {
                if s.trim().is_empty() {
                    continue;
                }
                saw_string = true;
                if parse_naive_datetime_str(s).is_none() {
                    strings_temporal = false;
                }
            }
            Data::Int(_) => saw_int = true,
            Data::Float(f) => {
                saw_float = true;
                if !f.is_finite() || f.fract() != 0.0 {
                    floats_whole = false;
                }
            }
            Data::Bool(_) => saw_bool = true,
            Data::DateTime(_) | Data::DateTimeIso(_) => saw_datetime = true,
            #[allow(unreachable_patterns)]
            _ => {
                saw_string = true;
                strings_temporal = false;
            }
        }
    }

    let saw_number = saw_int || saw_float;
    if saw_string {
        if strings_temporal && !saw_number && !saw_bool {
            temporal_type(cells)
        } else {
            CellType::Utf8
        }
    } else if saw_bool {
        if saw_number || saw_datetime {
            CellType::Utf8
        } else {
            CellType::Boolean
        }
    } else if saw_datetime {
        if saw_number {
            CellType::Float64
        } else {
            temporal_type(cells)
        }
    } else if saw_float {
        if floats_whole {
            CellType::Int64
        } else {
            CellType::Float64
        }
    } else if saw_int {
        CellType::Int64
    } else {
        CellType::Utf8
    }
}

fn temporal_type(cells: &[Option<&Data>]) -> CellType {
    let midnight = NaiveTime::MIN;
    let all_midnight = cells
        .iter()
        .flatten()
        .filter_map(|c| cell_to_naive_datetime(c))
        .all(|dt| dt.time() == midnight);
    if all_midnight {
        CellType::Date
    } else {
        CellType::Datetime
    }
}

/// Excel serial date, ISO datetime cell, or a string in one of the accepted formats.
fn cell_to_naive_datetime(cell: &Data) -> Option<NaiveDateTime> {
    use calamine::DataType;
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    let s = cell.get_datetime_iso().or_else(|| cell.get_string())?;
    parse_naive_datetime_str(s)
}

fn parse_naive_datetime_str(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn cells_to_series(name: &str, cells: &[Option<&Data>], cell_type: CellType) -> Result<Series> {
    use calamine::DataType as _;
    use polars::datatypes::TimeUnit;

    let series = match cell_type {
        CellType::Int64 => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| match c {
                    Some(Data::Int(i)) => Some(*i),
                    Some(Data::Float(f)) => Some(*f as i64),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), v)
        }
        CellType::Float64 => {
            let v: Vec<Option<f64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_f64()))
                .collect();
            Series::new(name.into(), v)
        }
        CellType::Boolean => {
            let v: Vec<Option<bool>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.get_bool()))
                .collect();
            Series::new(name.into(), v)
        }
        CellType::Utf8 => {
            let v: Vec<Option<String>> = cells
                .iter()
                .map(|c| match c {
                    None | Some(Data::Empty) | Some(Data::Error(_)) => None,
                    Some(Data::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                })
                .collect();
            Series::new(name.into(), v)
        }
        CellType::Date => {
            let epoch = NaiveDate::default();
            let v: Vec<Option<i32>> = cells
                .iter()
                .map(|c| {
                    c.and_then(cell_to_naive_datetime)
                        .map(|dt| (dt.date() - epoch).num_days() as i32)
                })
                .collect();
            Series::new(name.into(), v).cast(&DataType::Date)?
        }
        CellType::Datetime => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| {
                    c.and_then(cell_to_naive_datetime)
                        .map(|dt| dt.and_utc().timestamp_micros())
                })
                .collect();
            Series::new(name.into(), v).cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        }
    };
    Ok(series)
}
