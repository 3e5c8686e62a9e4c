//! Generators for synthetic METARs and cycle files.
//!
//! Generated reports are unique per index and already normalized, so tests
//! can compare what went in with what came out of the pipeline.

/// Creates a synthetic report for the given index.
///
/// The station identifier encodes the index, which keeps reports distinct
/// for up to 26^4 indices.
///
/// # Example
///
/// ```
/// use test_utils::synthetic_report;
///
/// assert_eq!(synthetic_report(0), "AAAA 011200Z 00005KT 9999 SCT020 10/05 Q1013");
/// assert_ne!(synthetic_report(1), synthetic_report(2));
/// ```
pub fn synthetic_report(index: usize) -> String {
    let mut station = [b'A'; 4];
    let mut rest = index;
    for slot in station.iter_mut().rev() {
        *slot = b'A' + (rest % 26) as u8;
        rest /= 26;
    }
    let station = String::from_utf8_lossy(&station);
    let wind = (index * 10) % 360;
    format!("{} 011200Z {:03}05KT 9999 SCT020 10/05 Q1013", station, wind)
}

/// Creates `count` distinct synthetic reports.
pub fn synthetic_reports(count: usize) -> Vec<String> {
    (0..count).map(synthetic_report).collect()
}

/// Creates a cycle file containing the given reports, each preceded by a
/// timestamp line. Every third report is wrapped onto a continuation line.
///
/// # Example
///
/// ```
/// use test_utils::synthetic_cycle_file;
///
/// let file = synthetic_cycle_file(&["AAAA 011200Z 00005KT".to_string()]);
/// assert!(file.starts_with("2024/03/01 12:00\n"));
/// ```
pub fn synthetic_cycle_file(reports: &[String]) -> String {
    let mut file = String::new();
    for (i, report) in reports.iter().enumerate() {
        file.push_str("2024/03/01 12:00\n");
        match report.rsplit_once(' ') {
            Some((head, tail)) if i % 3 == 2 => {
                file.push_str(head);
                file.push_str("\n     ");
                file.push_str(tail);
            }
            _ => file.push_str(report),
        }
        file.push_str("\n\n");
    }
    file
}
