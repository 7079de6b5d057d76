//! Transaction id format
//!
//! 12 ASCII digits: `YYMMDD` (UTC date) followed by a 6-digit, 1-based,
//! zero-padded daily sequence. Example: `260214000001` is the first
//! transaction of 14 Feb 2026. The sequence wraps at 999999, effectively
//! unbounded for realistic volumes.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Highest daily sequence before wrapping back to 1
pub const MAX_DAILY_SEQUENCE: u32 = 999_999;

/// Errors from parsing a transaction id
#[derive(Debug, Error, PartialEq)]
pub enum TxIdError {
    #[error("Expected 12 digits, got: {0}")]
    Malformed(String),

    #[error("Invalid date component: {0}")]
    InvalidDate(String),
}

/// Components of a parsed transaction id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTxId {
    pub date: NaiveDate,
    pub sequence: u32,
}

/// Assemble a transaction id from a date and a daily sequence.
///
/// Sequences above [`MAX_DAILY_SEQUENCE`] wrap to 1.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use fraud_detection_core_rs::lifecycle::format_tx_id;
///
/// let date = NaiveDate::from_ymd_opt(2026, 2, 14).unwrap();
/// assert_eq!(format_tx_id(date, 1), "260214000001");
/// ```
pub fn format_tx_id(date: NaiveDate, sequence: u32) -> String {
    let sequence = if sequence > MAX_DAILY_SEQUENCE { 1 } else { sequence };
    format!(
        "{:02}{:02}{:02}{:06}",
        date.year() % 100,
        date.month(),
        date.day(),
        sequence
    )
}

/// The `YYMMDD` prefix for a date, used to scope daily sequence queries.
pub fn date_prefix(date: NaiveDate) -> String {
    format!("{:02}{:02}{:02}", date.year() % 100, date.month(), date.day())
}

/// Parse a transaction id into its date and sequence.
pub fn parse_tx_id(tx_id: &str) -> Result<ParsedTxId, TxIdError> {
    if tx_id.len() != 12 || !tx_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TxIdError::Malformed(tx_id.to_string()));
    }

    let (date_part, seq_part) = tx_id.split_at(6);
    let year = 2000 + date_part[0..2].parse::<i32>().expect("digits");
    let month = date_part[2..4].parse::<u32>().expect("digits");
    let day = date_part[4..6].parse::<u32>().expect("digits");

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| TxIdError::InvalidDate(date_part.to_string()))?;

    Ok(ParsedTxId {
        date,
        sequence: seq_part.parse().expect("digits"),
    })
}

/// Whether a string is a well-formed transaction id.
pub fn is_valid_tx_id(tx_id: &str) -> bool {
    parse_tx_id(tx_id).is_ok()
}
