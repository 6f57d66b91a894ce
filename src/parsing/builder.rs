//! Assembles extracted fields into an [`Operation`].

use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::operation::{CUSTOM_DATA_LOCATION_APPENDIX, Operation, OperationResource};
use crate::parsing::fields::{ExtractedFields, Field};

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(0[1-9]|[12][0-9]|3[01])[- /.](0[1-9]|1[012])[- /.]((?:19|20)\d\d)")
        .expect("valid date pattern")
});

static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([01]?[0-9]|2[0-3]):([0-5][0-9])(?::([0-5][0-9]))?").expect("valid time pattern")
});

/// Builds operations from extracted fields. Never fails: absent text fields
/// stay empty and a missing alarm time falls back to the intake time.
#[derive(Clone)]
pub struct OperationBuilder {
    clock: Arc<dyn Clock>,
}

impl OperationBuilder {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn build(&self, fields: &ExtractedFields) -> Operation {
        let now = self.clock.now();
        let mut op = Operation::new(now);
        let mut timestamp = None;
        let mut header_timestamp = None;

        for (field, value) in fields.iter() {
            match field {
                Field::OperationNumber => op.operation_number = value.to_string(),
                Field::Messenger => op.messenger = value.to_string(),
                Field::Timestamp => timestamp = parse_timestamp(value, now.date()).or(timestamp),
                Field::HeaderTimestamp => header_timestamp = parse_timestamp(value, now.date()),
                Field::Priority => op.priority = value.to_string(),
                Field::Comment => append_line(&mut op.comment, value),
                Field::Picture => append_line(&mut op.picture, value),
                Field::OperationPlan => op.operation_plan = value.to_string(),
                Field::Loops => op.loops.extend_delimited(&value.replace(',', ";")),
                Field::Keyword => op.keywords.keyword = value.to_string(),
                Field::EmergencyKeyword => op.keywords.emergency_keyword = value.to_string(),
                Field::KeywordB => op.keywords.b = value.to_string(),
                Field::KeywordR => op.keywords.r = value.to_string(),
                Field::KeywordS => op.keywords.s = value.to_string(),
                Field::KeywordT => op.keywords.t = value.to_string(),
                Field::Location => op.einsatzort.location = value.to_string(),
                Field::Street => op.einsatzort.street = value.to_string(),
                Field::StreetNumber => op.einsatzort.street_number = value.to_string(),
                Field::StreetAppendix => {
                    op.einsatzort.appendix = value.to_string();
                    op.add_custom_data(CUSTOM_DATA_LOCATION_APPENDIX, value);
                }
                Field::ZipCode => op.einsatzort.zip_code = value.to_string(),
                Field::City => op.einsatzort.city = value.to_string(),
                Field::Intersection => op.einsatzort.intersection = value.to_string(),
                Field::Property => op.einsatzort.property = value.to_string(),
                Field::DestinationStreet => op.zielort.street = value.to_string(),
                Field::DestinationStreetNumber => op.zielort.street_number = value.to_string(),
                Field::DestinationZipCode => op.zielort.zip_code = value.to_string(),
                Field::DestinationCity => op.zielort.city = value.to_string(),
                Field::DestinationProperty => op.zielort.property = value.to_string(),
                Field::ResourceName => {
                    op.resources.add(OperationResource::new(value));
                }
                Field::ResourceAlarmed => match op.resources.last_mut() {
                    Some(resource) => resource.timestamp = Some(value.to_string()),
                    None => debug!(value, "Alarm time without preceding resource"),
                },
                Field::ResourceEquipment => match op.resources.last_mut() {
                    Some(resource) => resource.requested_equipment.push(value.to_string()),
                    None => debug!(value, "Equipment without preceding resource"),
                },
            }
        }

        match timestamp.or(header_timestamp) {
            Some(ts) => op.timestamp = ts,
            None => warn!(
                operation_number = %op.operation_number,
                "No alarm time in source, using intake time"
            ),
        }

        op
    }
}

fn append_line(target: &mut String, value: &str) {
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(value);
}

/// Find a date and a time anywhere in `value`. A time without a date is
/// placed on `today`; a date without a time yields nothing.
pub fn parse_timestamp(value: &str, today: NaiveDate) -> Option<NaiveDateTime> {
    let date = DATE.captures(value).and_then(|caps| {
        let day = caps.get(1)?.as_str().parse().ok()?;
        let month = caps.get(2)?.as_str().parse().ok()?;
        let year = caps.get(3)?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    });

    let time = TIME.captures(value).and_then(|caps| {
        let hour = caps.get(1)?.as_str().parse().ok()?;
        let minute = caps.get(2)?.as_str().parse().ok()?;
        let second = caps
            .get(3)
            .and_then(|s| s.as_str().parse().ok())
            .unwrap_or(0);
        NaiveTime::from_hms_opt(hour, minute, second)
    })?;

    Some(date.unwrap_or(today).and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::parsing::fields::FieldExtractor;

    fn intake() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 5, 4)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap()
    }

    fn build(text: &str) -> Operation {
        let fields = FieldExtractor::default().extract(text.lines());
        OperationBuilder::new(Arc::new(FixedClock(intake()))).build(&fields)
    }

    #[test]
    fn empty_input_yields_defaults() {
        let op = build("");
        assert_eq!(op.operation_number, "");
        assert_eq!(op.einsatzort.street, "");
        assert_eq!(op.timestamp, intake());
        assert_eq!(op.timestamp_income, intake());
        assert!(op.resources.is_empty());
        assert!(op.loops.is_empty());
    }

    #[test]
    fn maps_fields() {
        let op = build(
            "EINSATZNR: B 1.1 130504\n\
             Alarmzeit: 04.05.2013 12:34:56\n\
             Straße: Musterstraße 2 a RH\n\
             Ort: 83022 Rosenheim\n\
             Schlagw.: B3 Wohnhaus\n\
             Stichwort: Brand\n\
             Schleifen: 111, 222;111\n\
             Hinweis: Zufahrt über Hof\n\
             Hinweis: Hydrant defekt",
        );
        assert_eq!(op.operation_number, "B 1.1 130504");
        assert_eq!(
            op.timestamp,
            NaiveDate::from_ymd_opt(2013, 5, 4).unwrap().and_hms_opt(12, 34, 56).unwrap()
        );
        assert_eq!(op.einsatzort.street, "Musterstraße");
        assert_eq!(op.einsatzort.street_number, "2 a");
        assert_eq!(op.einsatzort.appendix, "RH");
        assert_eq!(op.custom_data_text(CUSTOM_DATA_LOCATION_APPENDIX).as_deref(), Some("RH"));
        assert_eq!(op.einsatzort.zip_code, "83022");
        assert_eq!(op.einsatzort.city, "Rosenheim");
        assert_eq!(op.keywords.keyword, "B3 Wohnhaus");
        assert_eq!(op.keywords.emergency_keyword, "Brand");
        assert_eq!(op.loops.to_delimited(), "111;222");
        assert_eq!(op.comment, "Zufahrt über Hof\nHydrant defekt");
    }

    #[test]
    fn resources_collect_alarm_time_and_equipment() {
        let op = build(
            "Name: 1.2.3 ABC 88/8 LF\n\
             Alarmiert: 12:35\n\
             Gef. Gerät: Sprungpolster\n\
             Name: 1.2.3 ABC 30/1 DLK\n\
             Gef. Gerät: Drehleiter",
        );
        let resources: Vec<_> = op.resources.iter().collect();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].full_name, "1.2.3 ABC 88/8 LF");
        assert_eq!(resources[0].timestamp.as_deref(), Some("12:35"));
        assert_eq!(resources[0].requested_equipment, ["Sprungpolster"]);
        assert_eq!(resources[1].requested_equipment, ["Drehleiter"]);
    }

    #[test]
    fn equipment_follows_the_latest_resource_with_repeated_names() {
        let op = build(
            "Name: RTW\n\
             Gef. Gerät: Trage\n\
             Name: LF\n\
             Name: RTW\n\
             Gef. Gerät: Defi",
        );
        let equipment: Vec<_> = op
            .resources
            .iter()
            .map(|r| (r.full_name.as_str(), r.requested_equipment.clone()))
            .collect();
        assert_eq!(
            equipment,
            [
                ("RTW", vec!["Trage".to_string()]),
                ("LF", vec![]),
                ("RTW", vec!["Defi".to_string()]),
            ]
        );
    }

    #[test]
    fn falls_back_to_header_timestamp() {
        let op = build("Fax vom 03.05.2013 um 23:59 Uhr\nEINSATZNR: 1");
        assert_eq!(
            op.timestamp,
            NaiveDate::from_ymd_opt(2013, 5, 3).unwrap().and_hms_opt(23, 59, 0).unwrap()
        );
    }

    #[test]
    fn time_only_uses_intake_date() {
        let today = intake().date();
        assert_eq!(
            parse_timestamp("um 07:05 Uhr", today),
            Some(today.and_hms_opt(7, 5, 0).unwrap())
        );
        assert_eq!(parse_timestamp("04.05.2013", today), None);
        assert_eq!(parse_timestamp("unbekannt", today), None);
    }

    #[test]
    fn parsing_is_idempotent_with_fixed_clock() {
        let text = "EINSATZNR: 7\nStraße: A8 A Musterstadt > Entenhausen Haus-Nr.: 123 --- km BAB\n\
                    Name: RK 1\nSchleifen: 1;2";
        assert_eq!(build(text), build(text));
    }
}
