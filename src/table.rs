//! Materialization of CasJobs payloads into DataFrames.
//!
//! Quick jobs and the fast retrieval path return delimited text whose header
//! cells are `[name]:sqltype`; the SQL type drives the column dtype. Extract
//! jobs download as plain CSV. The service spells missing values as the
//! literal word `NULL`, which is scrubbed to real missing values before
//! parsing.

use std::io::Cursor;
use std::sync::{Arc, LazyLock};

use polars::prelude::*;
use regex::Regex;
use tracing::warn;

use crate::prelude::{Error, Result};

/// Data accepted by [`upload_table`](crate::MastCasJobs::upload_table):
/// either CSV text ready for the wire or a DataFrame to serialize.
pub enum TableData {
    /// Raw CSV text with a header line.
    Csv(String),
    /// In-memory table, serialized to CSV on upload.
    Frame(DataFrame),
}

impl From<String> for TableData {
    fn from(csv: String) -> Self {
        TableData::Csv(csv)
    }
}

impl From<&str> for TableData {
    fn from(csv: &str) -> Self {
        TableData::Csv(csv.to_string())
    }
}

impl From<DataFrame> for TableData {
    fn from(df: DataFrame) -> Self {
        TableData::Frame(df)
    }
}

static COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(?P<name>[^\[]+)\]:(?P<datatype>.+)$").unwrap());

/// Column dtype for a SQL type name from a typed header.
fn sql_dtype(sql_type: &str) -> DataType {
    match sql_type.to_ascii_lowercase().as_str() {
        "int" => DataType::Int32,
        "smallint" => DataType::Int16,
        "tinyint" | "bit" => DataType::UInt8,
        "bigint" | "integer" => DataType::Int64,
        "float" | "decimal" => DataType::Float64,
        "real" => DataType::Float32,
        // Includes datetime: the service gives no format hint, so dates
        // stay textual.
        _ => DataType::String,
    }
}

/// Schema from a `[name]:sqltype` header line. Cells that do not match the
/// pattern keep their raw text as the name and materialize as strings.
fn header_schema(headline: &str, separator: char) -> Schema {
    let mut schema = Schema::default();
    for cell in headline.trim_end_matches('\r').split(separator) {
        match COLUMN.captures(cell) {
            Some(caps) => {
                let name = caps.name("name").map(|m| m.as_str()).unwrap_or(cell);
                let dtype = caps
                    .name("datatype")
                    .map(|m| sql_dtype(m.as_str()))
                    .unwrap_or(DataType::String);
                schema.with_column(name.into(), dtype);
            }
            None => {
                warn!(column = cell, "unable to parse typed column header");
                schema.with_column(cell.into(), DataType::String);
            }
        }
    }
    schema
}

/// Replace literal `NULL` cells with empty cells, line by line.
fn scrub_nulls(text: &str, separator: char) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut first = true;
        for cell in line.split(separator) {
            if !first {
                out.push(separator);
            }
            first = false;
            if !cell.trim_end_matches('\r').eq_ignore_ascii_case("null") {
                out.push_str(cell);
            }
        }
    }
    out
}

fn read_typed(body: String, schema: Schema, separator: u8) -> Result<DataFrame> {
    if body.trim().is_empty() {
        return Ok(DataFrame::empty_with_schema(&schema));
    }
    let df = CsvReadOptions::default()
        .with_has_header(false)
        .with_schema(Some(Arc::new(schema)))
        .with_parse_options(CsvParseOptions::default().with_separator(separator))
        .into_reader_with_file_handle(Cursor::new(body.into_bytes()))
        .finish()?;
    Ok(df)
}

/// DataFrame from a quick-job payload: comma-separated, typed header,
/// literal NULLs.
pub fn quick_frame(result: &str) -> Result<DataFrame> {
    let (headline, body) = result.split_once('\n').unwrap_or((result, ""));
    let schema = header_schema(headline, ',');
    read_typed(scrub_nulls(body, ','), schema, b',')
}

/// DataFrame from a fast-path payload: tab-separated, typed header. The
/// fast service already blanks NULL entries.
pub fn fast_frame(result: &str) -> Result<DataFrame> {
    let (headline, body) = result.split_once('\n').unwrap_or((result, ""));
    let schema = header_schema(headline, '\t');
    read_typed(body.to_string(), schema, b'\t')
}

/// DataFrame from an extract-job download: plain CSV with ordinary headers,
/// dtypes inferred, literal NULLs.
pub fn csv_frame(text: &str) -> Result<DataFrame> {
    let cleaned = scrub_nulls(text, ',');
    if cleaned.trim().is_empty() {
        return Err(Error::MalformedResponse(
            "empty extract-job download".to_string(),
        ));
    }
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(cleaned.into_bytes()))
        .finish()?;
    Ok(df)
}

/// Serialize a DataFrame to CSV with headers, the format the upload call
/// expects.
pub fn frame_to_csv(df: &DataFrame) -> Result<String> {
    let mut buf = Vec::new();
    let mut df = df.clone();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(&mut df)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
