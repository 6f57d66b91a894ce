//! Street line analysis.
//!
//! Dispatch centers print the operation address as one free-form line:
//! street, house number, an optional letter, then trailing detail such as a
//! floor ("1.OG") or building part ("RH"). Some formats put an explicit
//! `Haus-Nr.:` marker before the number; highway alarms put a kilometer or
//! exit number where the house number would be. [`analyze_street_line`]
//! splits all of these into street, number and appendix.

use std::sync::LazyLock;

use regex::Regex;

/// House number used when the line carries none.
pub const DEFAULT_HOUSE_NUMBER: &str = "1";

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)haus-nr\.:").expect("valid marker pattern"));

/// `12`, `12a`
static NUMBER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[[:alpha:]]?$").expect("valid number pattern"));

static BARE_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("valid integer pattern"));

/// Autobahn, Bundesstraße and Staatsstraße designators: `A8`, `A99a`, `B12`, `St2045`.
static HIGHWAY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:A|B|St)\d+[a-z]?$").expect("valid highway pattern"));

/// A street line split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreetLine {
    pub street: String,
    pub number: String,
    pub appendix: String,
}

impl StreetLine {
    fn new(street: impl Into<String>, number: impl Into<String>, appendix: impl Into<String>) -> Self {
        Self {
            street: street.into(),
            number: number.into(),
            appendix: appendix.into(),
        }
    }
}

/// Split one address line into street, house number and appendix.
///
/// Never fails: a line without any number yields the whole line as street
/// and [`DEFAULT_HOUSE_NUMBER`].
pub fn analyze_street_line(line: &str) -> StreetLine {
    let line = line.split_whitespace().collect::<Vec<_>>().join(" ");

    let (before, marker_rest) = match MARKER.find(&line) {
        Some(m) => (line[..m.start()].trim(), Some(line[m.end()..].trim())),
        None => (line.as_str(), None),
    };

    let tokens: Vec<&str> = before.split(' ').filter(|t| !t.is_empty()).collect();
    let is_highway = tokens.iter().any(|t| HIGHWAY_TOKEN.is_match(t));

    match (is_highway, marker_rest) {
        // Everything after the marker describes the position on the highway.
        (true, Some(rest)) => StreetLine::new(before, or_default_number(rest), ""),
        (true, None) => highway_without_marker(&tokens),
        (false, Some(rest)) => {
            let rest: Vec<&str> = rest.split(' ').filter(|t| !t.is_empty()).collect();
            match rest.iter().position(|t| NUMBER_TOKEN.is_match(t)) {
                Some(idx) => {
                    let (number, appendix_start) = number_with_letter(&rest, idx);
                    let mut appendix: Vec<&str> = rest[..idx].to_vec();
                    appendix.extend_from_slice(&rest[appendix_start..]);
                    StreetLine::new(before, number, appendix.join(" "))
                }
                None => StreetLine::new(before, DEFAULT_HOUSE_NUMBER, rest.join(" ")),
            }
        }
        (false, None) => match tokens.iter().rposition(|t| NUMBER_TOKEN.is_match(t)) {
            Some(idx) => {
                let (number, appendix_start) = number_with_letter(&tokens, idx);
                StreetLine::new(
                    tokens[..idx].join(" "),
                    number,
                    tokens[appendix_start..].join(" "),
                )
            }
            None => StreetLine::new(before, DEFAULT_HOUSE_NUMBER, ""),
        },
    }
}

/// The trailing bare integer is the kilometer or exit number; all other
/// tokens, including arrow-separated segment names, form the street.
fn highway_without_marker(tokens: &[&str]) -> StreetLine {
    match tokens.iter().rposition(|t| BARE_INTEGER.is_match(t)) {
        Some(idx) => {
            let street = tokens
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, t)| *t)
                .collect::<Vec<_>>()
                .join(" ");
            StreetLine::new(street, tokens[idx], "")
        }
        None => StreetLine::new(tokens.join(" "), DEFAULT_HOUSE_NUMBER, ""),
    }
}

/// Number token at `idx`, joined with a directly following single letter
/// (`2 a`). Returns the number and the index where the appendix starts.
fn number_with_letter(tokens: &[&str], idx: usize) -> (String, usize) {
    let number = tokens[idx];
    match tokens.get(idx + 1) {
        Some(next) if is_single_letter(next) => (format!("{number} {next}"), idx + 2),
        _ => (number.to_string(), idx + 1),
    }
}

fn is_single_letter(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

fn or_default_number(s: &str) -> &str {
    if s.is_empty() { DEFAULT_HOUSE_NUMBER } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_line(input: &str, street: &str, number: &str, appendix: &str) {
        let parsed = analyze_street_line(input);
        assert_eq!(
            parsed,
            StreetLine::new(street, number, appendix),
            "input: {input:?}"
        );
    }

    #[test]
    fn number_letter_and_appendix() {
        assert_line("Musterstraße 2 a RH", "Musterstraße", "2 a", "RH");
    }

    #[test]
    fn number_and_letter() {
        assert_line("Musterstraße 2 a", "Musterstraße", "2 a", "");
    }

    #[test]
    fn street_only_defaults_number() {
        assert_line("Musterstraße", "Musterstraße", "1", "");
    }

    #[test]
    fn floor_appendix() {
        assert_line("Musterstraße 2 1.OG", "Musterstraße", "2", "1.OG");
    }

    #[test]
    fn attached_letter_stays_in_number() {
        assert_line("Am Anger 14b Hinterhaus", "Am Anger", "14b", "Hinterhaus");
    }

    #[test]
    fn collapses_whitespace() {
        assert_line("  Musterstraße    2   a  ", "Musterstraße", "2 a", "");
    }

    #[test]
    fn multi_word_street() {
        assert_line("Straße des 17. Juni 5", "Straße des 17. Juni", "5", "");
    }

    #[test]
    fn explicit_marker_forms() {
        assert_line("Musterstraße Haus-Nr.: 2 a RH", "Musterstraße", "2 a", "RH");
        assert_line("Musterstraße Haus-Nr.: 2 a", "Musterstraße", "2 a", "");
        assert_line("Musterstraße Haus-Nr.: 2 1.OG", "Musterstraße", "2", "1.OG");
        assert_line("Musterstraße HAUS-NR.: 7", "Musterstraße", "7", "");
    }

    #[test]
    fn explicit_marker_matches_implicit_form() {
        assert_eq!(
            analyze_street_line("Musterstraße Haus-Nr.: 2 a"),
            analyze_street_line("Musterstraße 2 a")
        );
    }

    #[test]
    fn explicit_marker_without_number() {
        assert_line("Musterstraße Haus-Nr.: Rückgebäude", "Musterstraße", "1", "Rückgebäude");
    }

    #[test]
    fn highway_with_trailing_kilometer() {
        assert_line(
            "1.2 A8 Musterstadt > Entenhausen 123",
            "1.2 A8 Musterstadt > Entenhausen",
            "123",
            "",
        );
        assert_line(
            "A99a AD München-Eschenried > AD München-Allach 102",
            "A99a AD München-Eschenried > AD München-Allach",
            "102",
            "",
        );
    }

    #[test]
    fn highway_with_marker_keeps_whole_remainder() {
        assert_line(
            "A8 A Musterstadt > Entenhausen Haus-Nr.: 123 --- km BAB",
            "A8 A Musterstadt > Entenhausen",
            "123 --- km BAB",
            "",
        );
    }

    #[test]
    fn highway_without_number() {
        assert_line("B12 Richtung Passau", "B12 Richtung Passau", "1", "");
    }

    #[test]
    fn empty_line() {
        assert_line("", "", "1", "");
    }
}
