//! The operation record: one fire/rescue alarm as extracted from source text.

pub mod export;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Custom data key under which the street appendix of the operation location is kept.
pub const CUSTOM_DATA_LOCATION_APPENDIX: &str = "Einsatzort Zusatz";

/// A structured alarm record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Assigned by the operation store.
    pub id: Option<i64>,
    /// Source-defined number, not guaranteed unique.
    pub operation_number: String,
    /// When the alarm entered the system.
    pub timestamp_income: NaiveDateTime,
    /// Alarm time as reported by the source, or the intake time.
    pub timestamp: NaiveDateTime,
    pub messenger: String,
    pub priority: String,
    pub comment: String,
    pub picture: String,
    pub operation_plan: String,
    /// Operation location.
    pub einsatzort: PropertyLocation,
    /// Destination location (patient transports and the like).
    pub zielort: PropertyLocation,
    pub keywords: OperationKeywords,
    pub resources: OperationResources,
    pub loops: OperationLoops,
    pub custom_data: BTreeMap<String, serde_json::Value>,
    pub is_acknowledged: bool,
}

impl Operation {
    /// Create an empty operation that arrived at `income`.
    pub fn new(income: NaiveDateTime) -> Self {
        Self {
            id: None,
            operation_number: String::new(),
            timestamp_income: income,
            timestamp: income,
            messenger: String::new(),
            priority: String::new(),
            comment: String::new(),
            picture: String::new(),
            operation_plan: String::new(),
            einsatzort: PropertyLocation::default(),
            zielort: PropertyLocation::default(),
            keywords: OperationKeywords::default(),
            resources: OperationResources::default(),
            loops: OperationLoops::default(),
            custom_data: BTreeMap::new(),
            is_acknowledged: false,
        }
    }

    /// Insert a custom data value unless the key is already taken.
    ///
    /// Returns `false` if the key existed; the stored value is left untouched.
    pub fn add_custom_data(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> bool {
        let key = key.into();
        if self.custom_data.contains_key(&key) {
            return false;
        }
        self.custom_data.insert(key, value.into());
        true
    }

    /// Custom data value rendered as text (strings without quotes).
    pub fn custom_data_text(&self, key: &str) -> Option<String> {
        self.custom_data.get(key).map(value_text)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) {}, {}",
            self.operation_number,
            self.timestamp.format("%d.%m.%Y %H:%M:%S"),
            self.einsatzort
        )
    }
}

pub(crate) fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ── Location ────────────────────────────────────────────────────────────

/// An address with optional coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyLocation {
    /// Free-text location (district, landmark).
    pub location: String,
    pub zip_code: String,
    pub city: String,
    pub street: String,
    pub street_number: String,
    /// Trailing address detail such as a floor or building part.
    pub appendix: String,
    pub intersection: String,
    /// Named object at the address (school, factory).
    pub property: String,
    pub geo_latitude: Option<f64>,
    pub geo_longitude: Option<f64>,
}

impl PropertyLocation {
    pub fn has_geo_coordinates(&self) -> bool {
        self.geo_latitude.is_some() && self.geo_longitude.is_some()
    }

    /// Whether there is enough of an address to look it up.
    pub fn is_meaningful(&self) -> bool {
        !self.street.is_empty() && (!self.zip_code.is_empty() || !self.city.is_empty())
    }
}

impl fmt::Display for PropertyLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let street = join_nonempty(&[&self.street, &self.street_number]);
        let city = join_nonempty(&[&self.zip_code, &self.city]);
        match (street.is_empty(), city.is_empty()) {
            (false, false) => write!(f, "{street}, {city}"),
            (false, true) => write!(f, "{street}"),
            (true, false) => write!(f, "{city}"),
            (true, true) => write!(f, "{}", self.location),
        }
    }
}

fn join_nonempty(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Keywords ────────────────────────────────────────────────────────────

/// Classification of the alarm.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationKeywords {
    pub keyword: String,
    pub emergency_keyword: String,
    /// Fire ("Brand") category code.
    pub b: String,
    /// Rescue ("Rettungsdienst") category code.
    pub r: String,
    /// Special ("Sondereinsatz") category code.
    pub s: String,
    /// Technical assistance category code.
    pub t: String,
}

// ── Resources ───────────────────────────────────────────────────────────

/// A dispatched vehicle or unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationResource {
    pub full_name: String,
    /// Alarm time as printed by the source; kept verbatim.
    pub timestamp: Option<String>,
    pub requested_equipment: Vec<String>,
}

impl OperationResource {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Default::default()
        }
    }
}

/// Resources in dispatch order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationResources(Vec<OperationResource>);

impl OperationResources {
    /// Append a resource. Resources with a blank name are rejected.
    pub fn add(&mut self, resource: OperationResource) -> bool {
        if resource.full_name.trim().is_empty() {
            return false;
        }
        self.0.push(resource);
        true
    }

    /// Add requested equipment to the named resource, creating it if needed.
    pub fn add_equipment(&mut self, full_name: &str, equipment: impl Into<String>) -> bool {
        if full_name.trim().is_empty() {
            return false;
        }
        let equipment = equipment.into();
        match self.0.iter_mut().find(|r| r.full_name == full_name) {
            Some(resource) => resource.requested_equipment.push(equipment),
            None => {
                let mut resource = OperationResource::new(full_name);
                resource.requested_equipment.push(equipment);
                self.0.push(resource);
            }
        }
        true
    }

    pub fn last_mut(&mut self) -> Option<&mut OperationResource> {
        self.0.last_mut()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OperationResource> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a OperationResources {
    type Item = &'a OperationResource;
    type IntoIter = std::slice::Iter<'a, OperationResource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── Loops ───────────────────────────────────────────────────────────────

/// Separator used when loops travel as a single string.
pub const LOOP_SEPARATOR: char = ';';

/// Set of paging loop codes. Codes are trimmed and compared case-insensitively;
/// the first spelling seen is kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationLoops(Vec<String>);

impl OperationLoops {
    /// Parse a `;`-separated loop list.
    pub fn from_delimited(s: &str) -> Self {
        let mut loops = Self::default();
        loops.extend_delimited(s);
        loops
    }

    pub fn extend_delimited(&mut self, s: &str) {
        for code in s.split(LOOP_SEPARATOR) {
            self.insert(code);
        }
    }

    /// Add a loop code. Blank and duplicate codes are ignored.
    pub fn insert(&mut self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() || self.contains(code) {
            return false;
        }
        self.0.push(code.to_string());
        true
    }

    pub fn contains(&self, code: &str) -> bool {
        let code = code.trim().to_lowercase();
        self.0.iter().any(|c| c.to_lowercase() == code)
    }

    /// Whether any code appears in both sets.
    pub fn intersects<'a>(&self, other: impl IntoIterator<Item = &'a str>) -> bool {
        other.into_iter().any(|code| self.contains(code))
    }

    pub fn to_delimited(&self) -> String {
        self.0.join(&LOOP_SEPARATOR.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 5, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn loops_dedup_case_insensitively_and_skip_blanks() {
        let loops = OperationLoops::from_delimited(" 12345 ; ;abc;ABC;67890");
        assert_eq!(loops.to_delimited(), "12345;abc;67890");
        assert!(loops.contains("Abc"));
        assert!(loops.intersects(["nope", "67890"]));
        assert!(!loops.intersects(["nope"]));
    }

    #[test]
    fn resources_reject_blank_names_and_keep_order() {
        let mut resources = OperationResources::default();
        assert!(!resources.add(OperationResource::new("   ")));
        assert!(resources.add(OperationResource::new("FL MUC 1/1")));
        assert!(resources.add(OperationResource::new("FL MUC 2/1")));
        assert!(resources.add_equipment("FL MUC 1/1", "Drehleiter"));
        assert!(resources.add_equipment("RK 3/1", "Trage"));

        let names: Vec<_> = resources.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, ["FL MUC 1/1", "FL MUC 2/1", "RK 3/1"]);
        assert_eq!(resources.iter().next().unwrap().requested_equipment, ["Drehleiter"]);
    }

    #[test]
    fn custom_data_is_append_only() {
        let mut op = Operation::new(at(12, 0));
        assert!(op.add_custom_data("Key", "first"));
        assert!(!op.add_custom_data("Key", "second"));
        assert!(op.add_custom_data("key", "other case"));
        assert_eq!(op.custom_data_text("Key").as_deref(), Some("first"));
    }

    #[test]
    fn display_shows_number_time_and_address() {
        let mut op = Operation::new(at(8, 30));
        op.operation_number = "B 1.2 123456".to_string();
        op.einsatzort.street = "Musterstraße".to_string();
        op.einsatzort.street_number = "2 a".to_string();
        op.einsatzort.zip_code = "80331".to_string();
        op.einsatzort.city = "München".to_string();
        assert_eq!(
            op.to_string(),
            "(B 1.2 123456) 04.05.2013 08:30:00, Musterstraße 2 a, 80331 München"
        );
    }

    #[test]
    fn location_meaningful_needs_street_and_place() {
        let mut loc = PropertyLocation {
            street: "Hauptstraße".to_string(),
            ..Default::default()
        };
        assert!(!loc.is_meaningful());
        loc.city = "Rosenheim".to_string();
        assert!(loc.is_meaningful());
        assert!(!loc.has_geo_coordinates());
    }
}
