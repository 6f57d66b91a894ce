//! SMS alerting job.
//!
//! Recipients are the mobile phone entries of the address book that pass
//! the filter chain for the operation. The message lists only resources in
//! the configured EMK list.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::addressing::MobilePhoneEntryObject;
use crate::emk::EmkResourceCollection;
use crate::engine::job::{Job, JobContext, JobPhase};
use crate::error::{JobError, SmsError};
use crate::operation::Operation;
use crate::services::Services;

/// Maximum length of one SMS.
pub const SMS_MAX_CHARS: usize = 160;

/// Delivers text messages. Implementations own their transport and retries.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, recipients: &[String], text: &str) -> Result<(), SmsError>;
}

/// Gateway that only logs what would be sent.
#[derive(Debug, Default)]
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send(&self, recipients: &[String], text: &str) -> Result<(), SmsError> {
        info!(recipients = recipients.len(), text, "SMS (log only)");
        Ok(())
    }
}

/// Post-store job sending an SMS to every accepted mobile phone entry.
pub struct SmsJob {
    gateway: Arc<dyn SmsGateway>,
    services: Option<Services>,
}

impl SmsJob {
    pub fn new() -> Self {
        Self::with_gateway(Arc::new(LogSmsGateway))
    }

    pub fn with_gateway(gateway: Arc<dyn SmsGateway>) -> Self {
        Self {
            gateway,
            services: None,
        }
    }
}

impl Default for SmsJob {
    fn default() -> Self {
        Self::new()
    }
}

/// `"<keyword>: <street number>, <zip city> (<resources>)"`, cut to one SMS.
pub fn format_sms_text(operation: &Operation, emk: &EmkResourceCollection) -> String {
    let keyword = [&operation.keywords.emergency_keyword, &operation.keywords.keyword]
        .into_iter()
        .find(|k| !k.is_empty())
        .map(String::as_str)
        .unwrap_or("Einsatz");

    let resources: Vec<&str> = emk
        .filter_resources(&operation.resources)
        .into_iter()
        .map(|r| r.full_name.as_str())
        .collect();

    let mut text = format!("{keyword}: {}", operation.einsatzort);
    if !resources.is_empty() {
        text.push_str(&format!(" ({})", resources.join(", ")));
    }
    text.chars().take(SMS_MAX_CHARS).collect()
}

#[async_trait]
impl Job for SmsJob {
    fn name(&self) -> &str {
        "Sms"
    }

    fn phase(&self) -> JobPhase {
        JobPhase::AfterOperationStored
    }

    fn is_async(&self) -> bool {
        true
    }

    async fn initialize(&mut self, services: &Services) -> bool {
        self.services = Some(services.clone());
        true
    }

    async fn execute(&self, _ctx: &JobContext, operation: &mut Operation) -> Result<(), JobError> {
        let services = self.services.as_ref().ok_or_else(|| JobError::MissingCollaborator {
            name: self.name().to_string(),
            what: "services".to_string(),
        })?;

        let recipients: Vec<String> = services
            .addressing
            .custom_objects_filtered::<MobilePhoneEntryObject>(Some(operation))
            .into_iter()
            .map(|o| o.item.phone_number.clone())
            .collect();
        if recipients.is_empty() {
            info!(operation_number = %operation.operation_number, "No SMS recipients for operation");
            return Ok(());
        }

        let text = format_sms_text(operation, &services.emk);
        self.gateway.send(&recipients, &text).await?;
        info!(recipients = recipients.len(), "SMS sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::NaiveDateTime;

    use crate::addressing::{
        AddressBook, AddressBookEntry, AddressingService, ByLoopAddressFilter, EntryData,
        EntryDataItem, LoopEntryObject,
    };
    use crate::clock::SystemClock;
    use crate::config::EngineConfig;
    use crate::emk::EmkResource;
    use crate::operation::OperationResource;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(Vec<String>, String)>>);

    #[async_trait]
    impl SmsGateway for Capture {
        async fn send(&self, recipients: &[String], text: &str) -> Result<(), SmsError> {
            self.0.lock().unwrap().push((recipients.to_vec(), text.to_string()));
            Ok(())
        }
    }

    fn entry(name: &str, code: &str, phone: &str) -> AddressBookEntry {
        AddressBookEntry::new(name, "")
            .with_item(EntryDataItem::new(EntryData::Loop(LoopEntryObject {
                code: code.to_string(),
            })))
            .with_item(EntryDataItem::new(EntryData::MobilePhone(MobilePhoneEntryObject {
                phone_number: phone.to_string(),
            })))
    }

    fn operation() -> Operation {
        let mut op = Operation::new(NaiveDateTime::default());
        op.keywords.emergency_keyword = "B3".to_string();
        op.einsatzort.street = "Musterstraße".to_string();
        op.einsatzort.street_number = "2".to_string();
        op.einsatzort.city = "Entenhausen".to_string();
        op.loops.insert("111");
        op.resources.add(OperationResource::new("1.2.3 ABC 88/8 LF"));
        op.resources.add(OperationResource::new("9.9.9 XYZ 11/1 RTW"));
        op
    }

    #[tokio::test]
    async fn sends_to_filtered_recipients_with_emk_resources() {
        let book = AddressBook::new(vec![entry("Anna", "111", "0170 1"), entry("Bert", "222", "0170 2")]);
        let services = Services::new(EngineConfig::default(), Arc::new(SystemClock))
            .with_addressing(AddressingService::new(Arc::new(book), vec![Arc::new(ByLoopAddressFilter)]))
            .with_emk(EmkResourceCollection::new(vec![EmkResource::new("ABC", "88/8")]));

        let capture = Arc::new(Capture::default());
        let mut job = SmsJob::with_gateway(capture.clone());
        assert!(job.initialize(&services).await);

        let ctx = JobContext::new("test", serde_json::Value::Null, JobPhase::AfterOperationStored);
        job.execute(&ctx, &mut operation()).await.unwrap();

        let sent = capture.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ["0170 1"]);
        assert_eq!(sent[0].1, "B3: Musterstraße 2, Entenhausen (1.2.3 ABC 88/8 LF)");
    }

    struct Offline;

    #[async_trait]
    impl SmsGateway for Offline {
        async fn send(&self, _recipients: &[String], _text: &str) -> Result<(), SmsError> {
            Err(SmsError::Unavailable("modem offline".to_string()))
        }
    }

    #[tokio::test]
    async fn gateway_failure_is_a_job_error() {
        let book = AddressBook::new(vec![entry("Anna", "111", "0170 1")]);
        let services = Services::new(EngineConfig::default(), Arc::new(SystemClock))
            .with_addressing(AddressingService::new(Arc::new(book), vec![Arc::new(ByLoopAddressFilter)]));

        let mut job = SmsJob::with_gateway(Arc::new(Offline));
        assert!(job.initialize(&services).await);

        let ctx = JobContext::new("test", serde_json::Value::Null, JobPhase::AfterOperationStored);
        let err = job.execute(&ctx, &mut operation()).await.unwrap_err();
        assert!(matches!(err, JobError::Sms(SmsError::Unavailable(_))));
    }

    #[test]
    fn text_is_cut_to_one_sms() {
        let mut op = operation();
        op.einsatzort.street = "x".repeat(300);
        let text = format_sms_text(&op, &EmkResourceCollection::default());
        assert_eq!(text.chars().count(), SMS_MAX_CHARS);
    }
}
