//! Text fixes applied to raw METARs before they are fed downstream.
//!
//! These solve problems observed in the archive over time: typographic
//! characters slipping into reports, stacked spaces, and a missing `Z`
//! after the day/time group.

/// Characters replaced by their ASCII equivalent.
const REPLACEMENTS: &[(char, char)] = &[
    ('\u{2013}', '-'), // en dash
    ('\u{2014}', '-'), // em dash
    ('\u{2212}', '-'), // minus sign
    ('\u{00A0}', ' '), // no-break space
    ('\u{2007}', ' '), // figure space
    ('\u{202F}', ' '), // narrow no-break space
];

/// Position of the timezone marker following the `DDHHMM` group, e.g. the
/// `Z` in `KJFK 011251Z`.
const TIME_MARKER_INDEX: usize = 11;

fn replace_char(c: char) -> char {
    REPLACEMENTS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
        .unwrap_or(c)
}

/// Normalize a raw METAR.
///
/// Replaces known non-ASCII characters, collapses runs of spaces and
/// inserts a `Z` at character index 11 if that position holds a space.
/// Applying it twice yields the same result as applying it once.
pub fn normalize(raw: &str) -> String {
    let mut clean: Vec<char> = Vec::with_capacity(raw.len());
    for c in raw.chars().map(replace_char) {
        if c == ' ' && clean.last() == Some(&' ') {
            continue;
        }
        clean.push(c);
    }

    if clean.get(TIME_MARKER_INDEX) == Some(&' ') {
        clean.insert(TIME_MARKER_INDEX, 'Z');
    }

    clean.into_iter().collect()
}
