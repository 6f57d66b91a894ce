//! XML export of an operation.
//!
//! The document is flat: one element per scalar field, nested elements for
//! the two locations, keywords, loops, resources and custom data.

use chrono::NaiveDateTime;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::ExportError;
use crate::operation::{Operation, PropertyLocation, value_text};

const ROOT: &str = "AlarmWorkflowOperation";
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Render `operation` as an XML document stamped with `exported_at`.
pub fn to_xml(operation: &Operation, exported_at: NaiveDateTime) -> Result<String, ExportError> {
    let mut out = XmlOut::new();
    out.event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    out.start(ROOT)?;

    out.text("Exported", &exported_at.format(TIME_FORMAT).to_string())?;
    out.text("Id", &operation.id.map(|id| id.to_string()).unwrap_or_default())?;
    out.text("OperationNumber", &operation.operation_number)?;
    out.text(
        "TimestampIncome",
        &operation.timestamp_income.format(TIME_FORMAT).to_string(),
    )?;
    out.text("Timestamp", &operation.timestamp.format(TIME_FORMAT).to_string())?;
    out.text("Messenger", &operation.messenger)?;
    out.text("Comment", &operation.comment)?;
    out.text("OperationPlan", &operation.operation_plan)?;
    out.text("Picture", &operation.picture)?;
    out.text("Priority", &operation.priority)?;
    out.text("IsAcknowledged", if operation.is_acknowledged { "true" } else { "false" })?;

    out.location("Einsatzort", &operation.einsatzort)?;
    out.location("Zielort", &operation.zielort)?;

    let keywords = &operation.keywords;
    out.start("Keywords")?;
    out.text("Keyword", &keywords.keyword)?;
    out.text("EmergencyKeyword", &keywords.emergency_keyword)?;
    out.text("B", &keywords.b)?;
    out.text("R", &keywords.r)?;
    out.text("S", &keywords.s)?;
    out.text("T", &keywords.t)?;
    out.end("Keywords")?;

    out.start("Loops")?;
    for code in operation.loops.iter() {
        out.text("Loop", code)?;
    }
    out.end("Loops")?;

    out.start("Resources")?;
    for resource in &operation.resources {
        out.start("Resource")?;
        out.text("FullName", &resource.full_name)?;
        out.text("Timestamp", resource.timestamp.as_deref().unwrap_or_default())?;
        for equipment in &resource.requested_equipment {
            out.text("Equipment", equipment)?;
        }
        out.end("Resource")?;
    }
    out.end("Resources")?;

    out.start("CustomData")?;
    for (key, value) in &operation.custom_data {
        let value = value_text(value);
        out.event(Event::Empty(
            BytesStart::new("Entry").with_attributes([("Key", key.as_str()), ("Value", value.as_str())]),
        ))?;
    }
    out.end("CustomData")?;

    out.end(ROOT)?;
    out.finish()
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ExportError> {
        self.writer
            .write_event(event)
            .map_err(|e| ExportError::Xml(e.to_string()))
    }

    fn start(&mut self, name: &str) -> Result<(), ExportError> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn end(&mut self, name: &str) -> Result<(), ExportError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    /// `<name>value</name>`, or `<name/>` for empty values.
    fn text(&mut self, name: &str, value: &str) -> Result<(), ExportError> {
        if value.is_empty() {
            return self.event(Event::Empty(BytesStart::new(name)));
        }
        self.start(name)?;
        self.event(Event::Text(BytesText::new(value)))?;
        self.end(name)
    }

    fn location(&mut self, name: &str, location: &PropertyLocation) -> Result<(), ExportError> {
        let coord = |c: Option<f64>| c.map(|v| v.to_string()).unwrap_or_default();

        self.start(name)?;
        self.text("Location", &location.location)?;
        self.text("Street", &location.street)?;
        self.text("StreetNumber", &location.street_number)?;
        self.text("Appendix", &location.appendix)?;
        self.text("ZipCode", &location.zip_code)?;
        self.text("City", &location.city)?;
        self.text("Intersection", &location.intersection)?;
        self.text("Property", &location.property)?;
        self.text("GeoLatitude", &coord(location.geo_latitude))?;
        self.text("GeoLongitude", &coord(location.geo_longitude))?;
        self.end(name)
    }

    fn finish(self) -> Result<String, ExportError> {
        Ok(String::from_utf8(self.writer.into_inner())?)
    }
}
