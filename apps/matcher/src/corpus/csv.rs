//! Flat-store codec: RFC4180-style rows for the 11-column CV record schema.
//!
//! A field is quoted when it contains a comma, quote, or line break; a quote
//! inside a quoted field is written twice. Line breaks inside quotes belong to
//! the field, so a single record may span several physical lines.

use chrono::NaiveDateTime;

use crate::errors::RecordParseError;
use crate::models::cv::CvRecord;

pub const COLUMNS: [&str; 11] = [
    "user_id",
    "job_offer_id",
    "cv_path",
    "name",
    "email",
    "phone",
    "description",
    "skills",
    "experience",
    "education",
    "extracted_at",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
/// ISO-8601 local date-times may omit the seconds.
const TIMESTAMP_MINUTES_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// A raw row with the physical line it started on (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub line: usize,
    pub fields: Vec<String>,
}

/// Splits `input` into rows of fields, honouring quoted fields.
///
/// Blank physical lines outside quotes are dropped. An unterminated quote
/// swallows the rest of the input into its field.
pub fn split_rows(input: &str) -> Vec<RawRow> {
    let mut rows = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_start = 1;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                push_row(&mut rows, &mut fields, &mut field, row_start);
                line += 1;
                row_start = line;
            }
            _ => field.push(c),
        }
    }
    push_row(&mut rows, &mut fields, &mut field, row_start);

    rows
}

fn push_row(rows: &mut Vec<RawRow>, fields: &mut Vec<String>, field: &mut String, line: usize) {
    if fields.is_empty() && field.is_empty() {
        return;
    }
    fields.push(std::mem::take(field));
    rows.push(RawRow {
        line,
        fields: std::mem::take(fields),
    });
}

/// Decodes one data row into a `CvRecord`. Extra trailing fields are ignored.
pub fn parse_record(fields: &[String]) -> Result<CvRecord, RecordParseError> {
    if fields.len() < COLUMNS.len() {
        return Err(RecordParseError::TooFewFields {
            found: fields.len(),
            expected: COLUMNS.len(),
        });
    }

    Ok(CvRecord {
        user_id: parse_id("user_id", &fields[0])?,
        job_offer_id: parse_id("job_offer_id", &fields[1])?,
        cv_path: fields[2].trim().to_string(),
        name: fields[3].trim().to_string(),
        email: fields[4].trim().to_string(),
        phone: fields[5].trim().to_string(),
        description: fields[6].clone(),
        skills: fields[7].clone(),
        experience: fields[8].clone(),
        education: fields[9].clone(),
        extracted_at: parse_timestamp(&fields[10])?,
    })
}

fn parse_id(field: &'static str, raw: &str) -> Result<i64, RecordParseError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| RecordParseError::InvalidInteger {
            field,
            value: raw.to_string(),
        })
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, RecordParseError> {
    let raw_trimmed = raw.trim();
    NaiveDateTime::parse_from_str(raw_trimmed, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw_trimmed, TIMESTAMP_MINUTES_FORMAT))
        .map_err(|_| RecordParseError::InvalidTimestamp {
            value: raw.to_string(),
        })
}

/// True when `fields` is exactly the expected header (case-insensitive).
pub fn is_expected_header(fields: &[String]) -> bool {
    fields.len() == COLUMNS.len()
        && fields
            .iter()
            .zip(COLUMNS)
            .all(|(f, c)| f.trim().eq_ignore_ascii_case(c))
}

pub fn header_line() -> String {
    COLUMNS.join(",")
}

/// Encodes a record as one CSV row (no trailing newline).
pub fn encode_record(record: &CvRecord) -> String {
    let extracted_at = record.extracted_at.format(TIMESTAMP_FORMAT).to_string();
    let fields = [
        record.user_id.to_string(),
        record.job_offer_id.to_string(),
        escape_field(&record.cv_path),
        escape_field(&record.name),
        escape_field(&record.email),
        escape_field(&record.phone),
        escape_field(&record.description),
        escape_field(&record.skills),
        escape_field(&record.experience),
        escape_field(&record.education),
        escape_field(&extracted_at),
    ];
    fields.join(",")
}

/// Header plus a single record: the input file format of the normalisation stage.
pub fn encode_single(record: &CvRecord) -> String {
    format!("{}\n{}\n", header_line(), encode_record(record))
}

pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
