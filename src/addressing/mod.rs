//! Address book and recipient filtering.
//!
//! Entries are named records owning typed data items (loop codes, phone
//! numbers, mail addresses, push targets). Jobs that notify people ask the
//! [`AddressingService`] for all items of one type that belong to entries
//! accepted by every configured [`AddressFilter`].

pub mod filters;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

pub use filters::{AddressFilter, ByLoopAddressFilter};

use crate::error::{AddressingError, ConfigError};
use crate::operation::Operation;

// ── Entry objects ───────────────────────────────────────────────────────

/// A loop code the entry listens to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopEntryObject {
    #[serde(rename = "loop")]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MobilePhoneEntryObject {
    pub phone_number: String,
}

/// Mail header a recipient is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptType {
    #[default]
    To,
    Cc,
    Bcc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAddressEntryObject {
    pub address: String,
    #[serde(default)]
    pub receipt_type: ReceiptType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEntryObject {
    /// Push service name.
    pub consumer: String,
    pub recipient_api_key: String,
}

/// Payload of a data item, tagged with its type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntryData {
    Loop(LoopEntryObject),
    MobilePhone(MobilePhoneEntryObject),
    Mail(MailAddressEntryObject),
    Push(PushEntryObject),
}

impl EntryData {
    pub fn type_id(&self) -> &'static str {
        match self {
            Self::Loop(_) => LoopEntryObject::TYPE_ID,
            Self::MobilePhone(_) => MobilePhoneEntryObject::TYPE_ID,
            Self::Mail(_) => MailAddressEntryObject::TYPE_ID,
            Self::Push(_) => PushEntryObject::TYPE_ID,
        }
    }
}

/// A typed data item payload that can be looked up by type.
pub trait EntryObject: Sized + 'static {
    const TYPE_ID: &'static str;

    fn from_data(data: &EntryData) -> Option<&Self>;
}

macro_rules! entry_object {
    ($ty:ty, $variant:ident) => {
        impl EntryObject for $ty {
            const TYPE_ID: &'static str = stringify!($variant);

            fn from_data(data: &EntryData) -> Option<&Self> {
                match data {
                    EntryData::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

entry_object!(LoopEntryObject, Loop);
entry_object!(MobilePhoneEntryObject, MobilePhone);
entry_object!(MailAddressEntryObject, Mail);
entry_object!(PushEntryObject, Push);

// ── Entries ─────────────────────────────────────────────────────────────

fn enabled_default() -> bool {
    true
}

/// One data item of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDataItem {
    #[serde(default = "enabled_default")]
    pub is_enabled: bool,
    #[serde(flatten)]
    pub data: EntryData,
}

impl EntryDataItem {
    pub fn new(data: EntryData) -> Self {
        Self {
            is_enabled: true,
            data,
        }
    }

    pub fn disabled(data: EntryData) -> Self {
        Self {
            is_enabled: false,
            data,
        }
    }
}

/// A recipient or unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddressBookEntry {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub data: Vec<EntryDataItem>,
}

impl AddressBookEntry {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            data: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: EntryDataItem) -> Self {
        self.data.push(item);
        self
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Enabled items of type `T`. Disabled items are never returned.
    pub fn data_items<'a, T: EntryObject + 'a>(&'a self) -> impl Iterator<Item = &'a T> {
        self.data
            .iter()
            .filter(|item| item.is_enabled)
            .filter_map(|item| T::from_data(&item.data))
    }

    /// Enabled loop codes of this entry.
    pub fn loops(&self) -> impl Iterator<Item = &str> {
        self.data_items::<LoopEntryObject>().map(|l| l.code.as_str())
    }
}

/// All entries, loaded once per process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    #[serde(default)]
    pub entries: Vec<AddressBookEntry>,
}

impl AddressBook {
    pub fn new(entries: Vec<AddressBookEntry>) -> Self {
        Self { entries }
    }

    /// Load and validate an address book JSON document.
    pub fn load(path: &Path) -> Result<Self, AddressingError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let book: AddressBook = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if book.entries.iter().any(|e| e.display_name().is_empty()) {
            return Err(AddressingError::UnnamedEntry);
        }
        info!(path = %path.display(), entries = book.entries.len(), "Loaded address book");
        Ok(book)
    }
}

// ── Service ─────────────────────────────────────────────────────────────

/// An entry together with one of its data items.
#[derive(Debug, Clone, Copy)]
pub struct CustomObject<'a, T> {
    pub entry: &'a AddressBookEntry,
    pub item: &'a T,
}

/// Address book lookups restricted by the configured filters.
#[derive(Clone, Default)]
pub struct AddressingService {
    book: Arc<AddressBook>,
    filters: Vec<Arc<dyn AddressFilter>>,
}

impl AddressingService {
    pub fn new(book: Arc<AddressBook>, filters: Vec<Arc<dyn AddressFilter>>) -> Self {
        Self { book, filters }
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.book
    }

    /// Every enabled item of type `T`, ignoring filters.
    pub fn custom_objects<T: EntryObject>(&self) -> Vec<CustomObject<'_, T>> {
        self.custom_objects_filtered(None)
    }

    /// Every enabled item of type `T` whose entry is accepted by all filters
    /// for `operation`. Without an operation no filtering happens.
    pub fn custom_objects_filtered<T: EntryObject>(&self, operation: Option<&Operation>) -> Vec<CustomObject<'_, T>> {
        let mut objects = Vec::new();
        for entry in &self.book.entries {
            if let Some(operation) = operation
                && !self.accepts(operation, entry)
            {
                debug!(entry = %entry.display_name(), type_id = T::TYPE_ID, "Entry filtered out");
                continue;
            }
            objects.extend(entry.data_items::<T>().map(|item| CustomObject { entry, item }));
        }
        objects
    }

    /// AND over all filters; stops at the first rejection. A panicking
    /// filter rejects the entry.
    fn accepts(&self, operation: &Operation, entry: &AddressBookEntry) -> bool {
        self.filters.iter().all(|filter| {
            match catch_unwind(AssertUnwindSafe(|| filter.query_accept_entry(operation, entry))) {
                Ok(accepted) => accepted,
                Err(_) => {
                    error!(
                        filter = filter.name(),
                        entry = %entry.display_name(),
                        operation_number = %operation.operation_number,
                        "Address filter panicked, rejecting entry"
                    );
                    false
                }
            }
        })
    }
}
