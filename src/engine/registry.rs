//! Plugin registry: alias → factory for jobs, alarm sources and address filters.
//!
//! Populated at startup; the configuration then selects plugins by alias.
//! An alias with no registration is a fatal configuration error.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::addressing::{AddressFilter, ByLoopAddressFilter};
use crate::engine::job::Job;
use crate::error::ConfigError;
use crate::jobs::{GeocodingJob, OperationFileExporterJob, SmsJob};
use crate::sources::{AlarmSource, FileDropSource, StdinSource};

type JobFactory = Box<dyn Fn() -> Box<dyn Job> + Send + Sync>;
type SourceFactory = Box<dyn Fn() -> Box<dyn AlarmSource> + Send + Sync>;
type FilterFactory = Box<dyn Fn() -> Arc<dyn AddressFilter> + Send + Sync>;

/// Registered plugin factories by alias.
#[derive(Default)]
pub struct PluginRegistry {
    jobs: BTreeMap<String, JobFactory>,
    sources: BTreeMap<String, SourceFactory>,
    filters: BTreeMap<String, FilterFactory>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every plugin shipped in this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_job("Geocoding", || Box::new(GeocodingJob::new()));
        registry.register_job("OperationFileExporter", || Box::new(OperationFileExporterJob::new()));
        registry.register_job("Sms", || Box::new(SmsJob::new()));
        registry.register_source("FileDrop", || Box::new(FileDropSource::new()));
        registry.register_source("Stdin", || Box::new(StdinSource::new()));
        registry.register_filter("ByLoop", || Arc::new(ByLoopAddressFilter));
        registry
    }

    pub fn register_job<F>(&mut self, alias: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Job> + Send + Sync + 'static,
    {
        let alias = alias.into();
        debug!("Registered job: {}", alias);
        self.jobs.insert(alias, Box::new(factory));
    }

    pub fn register_source<F>(&mut self, alias: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn AlarmSource> + Send + Sync + 'static,
    {
        let alias = alias.into();
        debug!("Registered alarm source: {}", alias);
        self.sources.insert(alias, Box::new(factory));
    }

    pub fn register_filter<F>(&mut self, alias: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn AddressFilter> + Send + Sync + 'static,
    {
        let alias = alias.into();
        debug!("Registered address filter: {}", alias);
        self.filters.insert(alias, Box::new(factory));
    }

    /// Instantiate jobs in the given order.
    pub fn create_jobs(&self, aliases: &[String]) -> Result<Vec<Box<dyn Job>>, ConfigError> {
        create(&self.jobs, "job", aliases)
    }

    pub fn create_sources(&self, aliases: &[String]) -> Result<Vec<Box<dyn AlarmSource>>, ConfigError> {
        create(&self.sources, "alarm source", aliases)
    }

    pub fn create_filters(&self, aliases: &[String]) -> Result<Vec<Arc<dyn AddressFilter>>, ConfigError> {
        create(&self.filters, "address filter", aliases)
    }

    pub fn job_aliases(&self) -> Vec<&str> {
        self.jobs.keys().map(String::as_str).collect()
    }

    pub fn source_aliases(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn filter_aliases(&self) -> Vec<&str> {
        self.filters.keys().map(String::as_str).collect()
    }
}

fn create<T: ?Sized, P>(
    factories: &BTreeMap<String, Box<T>>,
    kind: &'static str,
    aliases: &[String],
) -> Result<Vec<P>, ConfigError>
where
    T: Fn() -> P,
{
    aliases
        .iter()
        .map(|alias| {
            factories
                .get(alias)
                .map(|factory| factory())
                .ok_or_else(|| ConfigError::UnknownPlugin {
                    kind,
                    alias: alias.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builtins_are_registered() {
        let registry = PluginRegistry::with_builtins();
        assert_eq!(registry.job_aliases(), ["Geocoding", "OperationFileExporter", "Sms"]);
        assert_eq!(registry.source_aliases(), ["FileDrop", "Stdin"]);
        assert_eq!(registry.filter_aliases(), ["ByLoop"]);
    }

    #[test]
    fn creates_in_configured_order() {
        let registry = PluginRegistry::with_builtins();
        let jobs = registry
            .create_jobs(&aliases(&["Sms", "OperationFileExporter"]))
            .unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.name().to_string()).collect();
        assert_eq!(names, ["Sms", "OperationFileExporter"]);
    }

    #[test]
    fn unknown_alias_is_fatal() {
        let registry = PluginRegistry::with_builtins();
        let Err(err) = registry.create_filters(&aliases(&["ByLoop", "ByMoonPhase"])) else {
            panic!("unknown filter alias was accepted");
        };
        assert!(matches!(
            err,
            ConfigError::UnknownPlugin { kind: "address filter", ref alias } if alias == "ByMoonPhase"
        ));
    }
}
