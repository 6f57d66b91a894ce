//! Replace dictionary: ordered literal or regex substitutions applied to
//! extracted field values before they reach the operation.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

/// One substitution rule as stored on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceRule {
    pub find: String,
    /// Missing or empty means the rule does nothing.
    #[serde(default)]
    pub replace: Option<String>,
}

/// On-disk shape of the dictionary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplaceDictionaryDocument {
    #[serde(default)]
    pub interpret_as_regex: bool,
    #[serde(default)]
    pub rules: Vec<ReplaceRule>,
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Pattern(Regex),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    matcher: Matcher,
    replacement: String,
}

/// Ordered substitution table. Rules run in insertion order, each on the
/// output of the previous one.
#[derive(Debug, Clone, Default)]
pub struct ReplaceDictionary {
    rules: Vec<CompiledRule>,
}

impl ReplaceDictionary {
    /// An empty dictionary; every value passes through unchanged.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from rules. Rules with an empty `find` or without a replacement
    /// are dropped; with `interpret_as_regex` every `find` must compile.
    pub fn from_rules(
        rules: impl IntoIterator<Item = ReplaceRule>,
        interpret_as_regex: bool,
    ) -> Result<Self, ConfigError> {
        let mut compiled = Vec::new();
        for rule in rules {
            let Some(replacement) = rule.replace.filter(|r| !r.is_empty()) else {
                debug!(find = %rule.find, "Skipping replace rule without replacement");
                continue;
            };
            if rule.find.is_empty() {
                continue;
            }
            let matcher = if interpret_as_regex {
                let regex = Regex::new(&rule.find).map_err(|source| ConfigError::InvalidPattern {
                    pattern: rule.find.clone(),
                    source,
                })?;
                Matcher::Pattern(regex)
            } else {
                Matcher::Literal(rule.find)
            };
            compiled.push(CompiledRule {
                matcher,
                replacement,
            });
        }
        Ok(Self { rules: compiled })
    }

    /// Load the dictionary from a JSON document.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: ReplaceDictionaryDocument =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_rules(doc.rules, doc.interpret_as_regex)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule to `input`. Blank input is returned unchanged.
    pub fn replace_in_string(&self, input: &str) -> String {
        if input.trim().is_empty() {
            return input.to_string();
        }
        let mut value = input.to_string();
        for rule in &self.rules {
            value = match &rule.matcher {
                Matcher::Literal(find) => value.replace(find.as_str(), &rule.replacement),
                Matcher::Pattern(regex) => regex
                    .replace_all(&value, rule.replacement.as_str())
                    .into_owned(),
            };
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(find: &str, replace: Option<&str>) -> ReplaceRule {
        ReplaceRule {
            find: find.to_string(),
            replace: replace.map(String::from),
        }
    }

    #[test]
    fn literal_rules_apply_in_order() {
        let dict = ReplaceDictionary::from_rules(
            [rule("Strasse", Some("Straße")), rule("Straße", Some("Str."))],
            false,
        )
        .unwrap();
        assert_eq!(dict.replace_in_string("Hauptstrasse"), "Hauptstrasse");
        assert_eq!(dict.replace_in_string("Bahnhof Strasse"), "Bahnhof Str.");
    }

    #[test]
    fn missing_or_empty_replacement_is_a_no_op() {
        let dict = ReplaceDictionary::from_rules(
            [rule("a", None), rule("b", Some("")), rule("", Some("x"))],
            false,
        )
        .unwrap();
        assert!(dict.is_empty());
        assert_eq!(dict.replace_in_string("abc"), "abc");
    }

    #[test]
    fn blank_input_is_returned_unchanged() {
        let dict = ReplaceDictionary::from_rules([rule(" ", Some("_"))], false).unwrap();
        assert_eq!(dict.replace_in_string(""), "");
        assert_eq!(dict.replace_in_string("   "), "   ");
    }

    #[test]
    fn regex_rules_support_groups() {
        let dict =
            ReplaceDictionary::from_rules([rule(r"(\d+)\s*OG", Some("$1. OG"))], true).unwrap();
        assert_eq!(dict.replace_in_string("Haus 3OG"), "Haus 3. OG");
    }

    #[test]
    fn invalid_regex_is_a_config_error() {
        let err = ReplaceDictionary::from_rules([rule("(", Some("x"))], true).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn loads_json_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("replace.json");
        std::fs::write(
            &path,
            r#"{"interpret_as_regex": false, "rules": [{"find": "strabe", "replace": "straße"}, {"find": "x"}]}"#,
        )
        .unwrap();
        let dict = ReplaceDictionary::load(&path).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.replace_in_string("Lindenstrabe"), "Lindenstraße");
    }

    #[test]
    fn literal_rules_are_case_sensitive() {
        let dict = ReplaceDictionary::from_rules([rule("Strabe", Some("Straße"))], false).unwrap();
        assert_eq!(dict.replace_in_string("Lindenstrabe"), "Lindenstrabe");
        assert_eq!(dict.replace_in_string("Strabe 4"), "Straße 4");
    }
}
