//! Extraction of raw METARs out of a cycle file.
//!
//! A cycle file interleaves observation timestamps with reports:
//!
//! ```text
//! 2024/03/01 12:00
//! KJFK 011251Z 18010KT 10SM FEW250 24/12 A3001 RMK AO2
//!      SLP163 T02440122
//!
//! 2024/03/01 12:05
//! EGLL 011250Z 24010KT 9999 FEW030 08/03 Q1012
//! ```
//!
//! Timestamp lines are dropped, wrapped reports (continuation lines start
//! with whitespace) are joined back together and duplicates collapse.

use storage::DedupSet;

/// Byte offset of the `/` in a `YYYY/MM/DD HH:MM` timestamp line.
const TIMESTAMP_SLASH_INDEX: usize = 4;

fn is_timestamp_line(line: &str) -> bool {
    line.as_bytes().get(TIMESTAMP_SLASH_INDEX) == Some(&b'/')
}

fn is_continuation(line: &str) -> bool {
    line.starts_with(|c: char| c == ' ' || c == '\t')
}

/// Extract the deduplicated set of raw reports contained in a cycle file.
///
/// Invalid UTF-8 is replaced rather than rejected so one damaged report
/// cannot hide the rest of the file.
pub fn extract_reports(contents: &[u8]) -> DedupSet<String> {
    let text = String::from_utf8_lossy(contents);
    let reports = DedupSet::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() || is_timestamp_line(line) {
            if let Some(report) = current.take() {
                reports.add(report);
            }
            continue;
        }

        if is_continuation(line) {
            let fragment = line.trim_start();
            match current.as_mut() {
                Some(report) => {
                    report.push(' ');
                    report.push_str(fragment);
                }
                None => current = Some(fragment.to_string()),
            }
            continue;
        }

        if let Some(report) = current.replace(line.to_string()) {
            reports.add(report);
        }
    }

    if let Some(report) = current {
        reports.add(report);
    }
    reports
}
