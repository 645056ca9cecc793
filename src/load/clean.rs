// src/load/clean.rs

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// INSEE commune codes: two department characters (2A/2B for Corsica) + three digits.
static INSEE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9][0-9AB][0-9]{3}$").expect("static regex is valid"));

/// 1) Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// 2) Pick the field delimiter from a header line.
///
/// INSEE publishes `;`-separated files, so ties (including a header with
/// neither character) resolve to `;`.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if commas > semicolons {
        b','
    } else {
        b';'
    }
}

/// 3) Parse a numeric cell, accepting a French decimal comma.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() {
        return None;
    }
    let normalized = if cleaned.contains(',') && !cleaned.contains('.') {
        cleaned.replace(',', ".")
    } else {
        cleaned
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 4) Normalize a commune code as read from CSV or a spreadsheet cell.
///
/// Spreadsheets store codes like `01001` as the number `1001` (or `1001.0`),
/// so purely numeric codes shorter than five characters are left-padded.
pub fn normalize_commune_code(raw: &str) -> String {
    let mut code = clean_str(raw);
    if let Some(stripped) = code.strip_suffix(".0") {
        if stripped.chars().all(|c| c.is_ascii_digit()) {
            code = stripped.to_string();
        }
    }
    if !code.is_empty() && code.len() < 5 && code.chars().all(|c| c.is_ascii_digit()) {
        code = format!("{:0>5}", code);
    }
    code.to_ascii_uppercase()
}

/// True for codes shaped like an INSEE commune code.
pub fn is_insee_code(code: &str) -> bool {
    INSEE_CODE.is_match(code)
}

/// Give every column a usable, unique name: blanks become `column_<n>`,
/// repeats get the first free `_<n>` suffix. Suffixes never take a name
/// that appears verbatim elsewhere in the header.
pub fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let reserved: HashSet<String> = raw.iter().filter(|h| !h.is_empty()).cloned().collect();
    let mut used: HashSet<String> = HashSet::with_capacity(raw.len());
    raw.into_iter()
        .enumerate()
        .map(|(i, name)| {
            let base = if name.is_empty() {
                format!("column_{}", i + 1)
            } else {
                name
            };
            let mut candidate = base.clone();
            let mut n = 1;
            while used.contains(&candidate) || (n > 1 && reserved.contains(&candidate)) {
                n += 1;
                candidate = format!("{}_{}", base, n);
            }
            used.insert(candidate.clone());
            candidate
        })
        .collect()
}
