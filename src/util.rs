// Utility helpers for parsing and formatting.
//
// Spreadsheet exports mix numbers, text and dates freely; everything that
// turns a cell into a typed value lives here so the rest of the code works
// with `Option`s.
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

use crate::columns::CAPTURED_AT_FORMAT;

/// Parse a cell into `f64`.
///
/// - Trims whitespace; empty cells are `None`.
/// - Rejects values that contain alphabetic characters.
/// - Reads German notation: `"12,5"`, `"1.234"` and `"1.234,5"`. A lone `.`
///   is a thousands separator only in a well-formed grouping (`1.234`,
///   `12.345.678`); `"0.125"` and `"12.5"` stay decimals.
/// - Both separators present: the later one is the decimal mark.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let normalized = match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(_)) => s.replace(',', "."),
        (Some(_), None) if is_dot_grouped(s) => s.replace('.', ""),
        _ => s.to_string(),
    };
    normalized.parse::<f64>().ok()
}

fn is_dot_grouped(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let mut groups = digits.split('.');
    let Some(lead) = groups.next() else { return false };
    let lead_ok = (1..=3).contains(&lead.len())
        && !lead.starts_with('0')
        && lead.chars().all(|c| c.is_ascii_digit());
    let mut rest = groups.peekable();
    lead_ok && rest.peek().is_some() && rest.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

/// Parse a postal prefix into a number. Anything that is not plain digits
/// yields `None`.
pub fn parse_u32_safe(s: Option<&str>) -> Option<u32> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<u32>().ok()
}

/// Parse an `ERFASST` value (`dd.mm.yyyy HH:MM:SS`). Unparsable text is `None`.
pub fn parse_datetime_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(s, CAPTURED_AT_FORMAT).ok()
}

/// Empty or whitespace-only cells count as missing.
pub fn non_blank(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

/// `MMYYYY` of the calendar month before `today`.
pub fn previous_month_stamp(today: NaiveDate) -> String {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    format!("{:02}{:04}", month, year)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with German separators, e.g. `1.234.567,89`.
    if !n.is_finite() {
        return n.to_string();
    }
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::de);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push(',');
            res.push_str(frac);
        }
    }
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Counts in console messages, e.g. `9.855 Kontrollen`.
    n.to_formatted_string(&Locale::de)
}
