//! Field extraction from `PREFIX: VALUE` lines.
//!
//! Each line is split at its first colon. The prefix is normalized and looked
//! up in a fixed table that also lists the usual OCR misreads of each token;
//! the value runs through the replace dictionary and, for address lines,
//! through the street line analyzer.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::parsing::replace::ReplaceDictionary;
use crate::parsing::street::analyze_street_line;

/// A recognized target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    OperationNumber,
    Messenger,
    Timestamp,
    /// Date and time found on an unlabelled line (fax header).
    HeaderTimestamp,
    Priority,
    Comment,
    Picture,
    OperationPlan,
    Loops,
    Keyword,
    EmergencyKeyword,
    KeywordB,
    KeywordR,
    KeywordS,
    KeywordT,
    Location,
    Street,
    StreetNumber,
    StreetAppendix,
    ZipCode,
    City,
    Intersection,
    Property,
    DestinationStreet,
    DestinationStreetNumber,
    DestinationZipCode,
    DestinationCity,
    DestinationProperty,
    ResourceName,
    ResourceAlarmed,
    ResourceEquipment,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OperationNumber => "operation_number",
            Self::Messenger => "messenger",
            Self::Timestamp => "timestamp",
            Self::HeaderTimestamp => "header_timestamp",
            Self::Priority => "priority",
            Self::Comment => "comment",
            Self::Picture => "picture",
            Self::OperationPlan => "operation_plan",
            Self::Loops => "loops",
            Self::Keyword => "keyword",
            Self::EmergencyKeyword => "emergency_keyword",
            Self::KeywordB => "keyword_b",
            Self::KeywordR => "keyword_r",
            Self::KeywordS => "keyword_s",
            Self::KeywordT => "keyword_t",
            Self::Location => "location",
            Self::Street => "street",
            Self::StreetNumber => "street_number",
            Self::StreetAppendix => "street_appendix",
            Self::ZipCode => "zip_code",
            Self::City => "city",
            Self::Intersection => "intersection",
            Self::Property => "property",
            Self::DestinationStreet => "destination_street",
            Self::DestinationStreetNumber => "destination_street_number",
            Self::DestinationZipCode => "destination_zip_code",
            Self::DestinationCity => "destination_city",
            Self::DestinationProperty => "destination_property",
            Self::ResourceName => "resource_name",
            Self::ResourceAlarmed => "resource_alarmed",
            Self::ResourceEquipment => "resource_equipment",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a prefix's value is post-processed.
#[derive(Debug, Clone, Copy)]
enum Target {
    Plain(Field),
    /// Street line: split into street, number and appendix.
    Street {
        street: Field,
        number: Field,
        appendix: Option<Field>,
    },
    /// City line: leading zip code split off, trailing ` - ...` dropped.
    City { zip: Field, city: Field },
}

/// Normalized prefix → target. Upper-casing turns `ß` into `SS`, and OCR
/// tends to read `ß` as `B`, `Ä` as `A` and a leading `O` as `9` or `0`.
static PREFIXES: LazyLock<HashMap<&'static str, Target>> = LazyLock::new(|| {
    use Field::*;
    use Target::Plain;

    let street = Target::Street {
        street: Street,
        number: StreetNumber,
        appendix: Some(StreetAppendix),
    };
    let destination_street = Target::Street {
        street: DestinationStreet,
        number: DestinationStreetNumber,
        appendix: None,
    };
    let city = Target::City { zip: ZipCode, city: City };
    let destination_city = Target::City {
        zip: DestinationZipCode,
        city: DestinationCity,
    };

    HashMap::from([
        ("EINSATZNR", Plain(OperationNumber)),
        ("EINSATZNUMMER", Plain(OperationNumber)),
        ("E-NR", Plain(OperationNumber)),
        ("MITTEILER", Plain(Messenger)),
        ("ALARMZEIT", Plain(Timestamp)),
        ("EINGANGSZEIT", Plain(Timestamp)),
        ("ZEIT", Plain(Timestamp)),
        ("PRIORITÄT", Plain(Priority)),
        ("PRIORITAT", Plain(Priority)),
        ("PRIO", Plain(Priority)),
        ("HINWEIS", Plain(Comment)),
        ("BEMERKUNG", Plain(Comment)),
        ("MELDEBILD", Plain(Picture)),
        ("EINSATZPLAN", Plain(OperationPlan)),
        ("SCHLEIFEN", Plain(Loops)),
        ("ALARMSCHLEIFEN", Plain(Loops)),
        ("SCHLAGW.", Plain(Keyword)),
        ("SCHLAGWORT", Plain(Keyword)),
        ("STICHWORT", Plain(EmergencyKeyword)),
        ("STICHWORT B", Plain(KeywordB)),
        ("STICHWORT R", Plain(KeywordR)),
        ("STICHWORT S", Plain(KeywordS)),
        ("STICHWORT T", Plain(KeywordT)),
        ("EINSATZORT", Plain(Location)),
        ("ORTSTEIL", Plain(Location)),
        ("STRASSE", street),
        ("STRABE", street),
        ("STR.", street),
        ("PLZ", Plain(ZipCode)),
        ("ORT", city),
        ("GEMEINDE", city),
        ("KREUZUNG", Plain(Intersection)),
        ("OBJEKT", Plain(Property)),
        ("9BJEKT", Plain(Property)),
        ("0BJEKT", Plain(Property)),
        ("ZIELSTRASSE", destination_street),
        ("ZIELSTRABE", destination_street),
        ("ZIELORT", destination_city),
        ("ZIELOBJEKT", Plain(DestinationProperty)),
        ("Z9BJEKT", Plain(DestinationProperty)),
        ("NAME", Plain(ResourceName)),
        ("EINSATZMITTEL", Plain(ResourceName)),
        ("ALARMIERT", Plain(ResourceAlarmed)),
        ("GEF. GERÄT", Plain(ResourceEquipment)),
        ("GEF. GERAT", Plain(ResourceEquipment)),
    ])
});

static ZIP_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4,5})\s*(.*)$").expect("valid zip pattern"));

static HEADER_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(0[1-9]|[12][0-9]|3[01])[- /.](0[1-9]|1[012])[- /.](19|20)\d\d.*([01]?[0-9]|2[0-3]):[0-5][0-9]")
        .expect("valid header timestamp pattern")
});

/// Extracted fields in source order. A field may appear more than once
/// (one `NAME` per dispatched resource).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    entries: Vec<(Field, String)>,
}

impl ExtractedFields {
    pub fn push(&mut self, field: Field, value: impl Into<String>) {
        self.entries.push((field, value.into()));
    }

    /// Last value recorded for `field`.
    pub fn get(&self, field: Field) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.entries.iter().map(|(f, v)| (*f, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits raw alarm lines into recognized fields.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    replacements: ReplaceDictionary,
}

impl FieldExtractor {
    pub fn new(replacements: ReplaceDictionary) -> Self {
        Self { replacements }
    }

    /// Extract every recognized field from `lines`.
    pub fn extract<'a>(&self, lines: impl IntoIterator<Item = &'a str>) -> ExtractedFields {
        let mut fields = ExtractedFields::default();
        let mut header_seen = false;

        for line in lines {
            let Some((prefix, value)) = line.split_once(':') else {
                continue;
            };
            let key = normalize_prefix(prefix);
            let Some(target) = PREFIXES.get(key.as_str()) else {
                if !header_seen && HEADER_TIMESTAMP.is_match(line) {
                    fields.push(Field::HeaderTimestamp, line.trim());
                    header_seen = true;
                } else {
                    trace!(prefix = %key, "Ignoring unrecognized field");
                }
                continue;
            };

            let value = self.replacements.replace_in_string(value.trim());
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            push_target(&mut fields, *target, value);
        }

        fields
    }
}

fn push_target(fields: &mut ExtractedFields, target: Target, value: &str) {
    match target {
        Target::Plain(field) => fields.push(field, value),
        Target::Street {
            street,
            number,
            appendix,
        } => {
            let parsed = analyze_street_line(value);
            fields.push(street, parsed.street);
            fields.push(number, parsed.number);
            if let Some(appendix) = appendix
                && !parsed.appendix.is_empty()
            {
                fields.push(appendix, parsed.appendix);
            }
        }
        Target::City { zip, city } => {
            let (zip_code, name) = split_zip_code(value);
            if !zip_code.is_empty() {
                fields.push(zip, zip_code);
            }
            fields.push(city, name);
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// `"83022 Rosenheim - Innenstadt"` → `("83022", "Rosenheim")`.
pub fn split_zip_code(value: &str) -> (&str, &str) {
    let value = value.trim();
    let (zip, rest) = match ZIP_PREFIX.captures(value) {
        Some(caps) => match (caps.get(1), caps.get(2)) {
            (Some(zip), Some(rest)) => (zip.as_str(), rest.as_str()),
            _ => ("", value),
        },
        None => ("", value),
    };
    let city = rest.split(" - ").next().unwrap_or(rest).trim();
    (zip, city)
}
