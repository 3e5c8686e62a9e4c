//! A cycle file with known contents.
//!
//! The file mirrors the layout of the NOAA cycle files: each report is
//! preceded by the timestamp of its observation, reports are separated by
//! blank lines and long ones wrap onto indented continuation lines.

/// A plain single-line report.
pub const SAMPLE_R1: &str = "KJFK 011251Z 18010KT 10SM FEW250 24/12 A3001";

/// Another plain report.
pub const SAMPLE_R2: &str = "EGLL 011250Z 24010KT 9999 FEW030 08/03 Q1012";

/// The wrapped report of [`SAMPLE_CYCLE_FILE`] with its lines joined.
pub const SAMPLE_WRAPPED_JOINED: &str =
    "KORD 011251Z 27015G25KT 10SM BKN040 02/M05 A2992 RMK AO2 SLP135 T00171050";

/// Cycle file holding [`SAMPLE_R1`], [`SAMPLE_R2`] and a wrapped report.
/// `SAMPLE_R1` appears twice, as it would after a re-issued observation.
pub const SAMPLE_CYCLE_FILE: &str = "\
2024/03/01 12:51
KJFK 011251Z 18010KT 10SM FEW250 24/12 A3001

2024/03/01 12:50
EGLL 011250Z 24010KT 9999 FEW030 08/03 Q1012

2024/03/01 12:51
KORD 011251Z 27015G25KT 10SM BKN040 02/M05 A2992 RMK AO2
     SLP135 T00171050

2024/03/01 12:51
KJFK 011251Z 18010KT 10SM FEW250 24/12 A3001
";

/// The distinct reports contained in [`SAMPLE_CYCLE_FILE`].
pub fn sample_cycle_reports() -> Vec<&'static str> {
    vec![SAMPLE_R1, SAMPLE_R2, SAMPLE_WRAPPED_JOINED]
}
