//! Shared services handed to jobs, sources and the engine.
//!
//! Built once at startup and passed by reference; nothing here is mutated
//! after construction.

use std::sync::Arc;

use tracing::info;

use crate::addressing::{AddressBook, AddressingService};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::emk::EmkResourceCollection;
use crate::engine::registry::PluginRegistry;
use crate::error::Error;
use crate::parsing::{AlarmParser, ReplaceDictionary};

#[derive(Clone)]
pub struct Services {
    pub config: Arc<EngineConfig>,
    pub addressing: AddressingService,
    pub emk: Arc<EmkResourceCollection>,
    pub replacements: ReplaceDictionary,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    /// Services with an empty address book, no EMK list and no replacements.
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            addressing: AddressingService::default(),
            emk: Arc::new(EmkResourceCollection::default()),
            replacements: ReplaceDictionary::empty(),
            clock,
        }
    }

    /// Load every configured document and build the filter chain.
    ///
    /// Fails if the address book, a document or a filter alias cannot be
    /// resolved; the engine must not start in that case.
    pub fn load(config: EngineConfig, registry: &PluginRegistry) -> Result<Self, Error> {
        let book = match &config.address_book_path {
            Some(path) => AddressBook::load(path)?,
            None => {
                info!("No address book configured");
                AddressBook::default()
            }
        };
        let filters = registry.create_filters(&config.filters)?;
        let emk = match &config.emk_path {
            Some(path) => EmkResourceCollection::load(path)?,
            None => EmkResourceCollection::default(),
        };
        let replacements = match &config.replace_dictionary_path {
            Some(path) => ReplaceDictionary::load(path)?,
            None => ReplaceDictionary::empty(),
        };

        Ok(Self {
            config: Arc::new(config),
            addressing: AddressingService::new(Arc::new(book), filters),
            emk: Arc::new(emk),
            replacements,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_addressing(mut self, addressing: AddressingService) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn with_emk(mut self, emk: EmkResourceCollection) -> Self {
        self.emk = Arc::new(emk);
        self
    }

    pub fn with_replacements(mut self, replacements: ReplaceDictionary) -> Self {
        self.replacements = replacements;
        self
    }

    /// A parser using the configured replacements and clock.
    pub fn parser(&self) -> AlarmParser {
        AlarmParser::new(self.replacements.clone(), Arc::clone(&self.clock))
    }
}
