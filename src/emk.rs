//! EMK: the configured list of dispatch resources a unit cares about.
//!
//! Dispatch centers list every resource alarmed for an operation, including
//! neighbouring units. An EMK resource is identified by a site alias and a
//! resource alias; a dispatched resource matches when its full name contains
//! both.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::operation::OperationResource;

fn active_default() -> bool {
    true
}

/// One configured resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmkResource {
    pub site_alias: String,
    pub resource_alias: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub icon_file_name: String,
    #[serde(default = "active_default")]
    pub is_active: bool,
}

impl EmkResource {
    pub fn new(site_alias: impl Into<String>, resource_alias: impl Into<String>) -> Self {
        Self {
            site_alias: site_alias.into(),
            resource_alias: resource_alias.into(),
            display_name: String::new(),
            icon_file_name: String::new(),
            is_active: true,
        }
    }

    /// `site.resource`
    pub fn id(&self) -> String {
        format!("{}.{}", self.site_alias, self.resource_alias)
    }

    pub fn is_match(&self, resource: &OperationResource) -> bool {
        let name = resource.full_name.as_str();
        !name.trim().is_empty() && name.contains(&self.site_alias) && name.contains(&self.resource_alias)
    }
}

/// The configured EMK list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmkResourceCollection(Vec<EmkResource>);

impl EmkResourceCollection {
    pub fn new(resources: Vec<EmkResource>) -> Self {
        Self(resources)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let collection: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), resources = collection.0.len(), "Loaded EMK resources");
        Ok(collection)
    }

    /// Whether an active configured resource matches `resource`.
    pub fn contains_match(&self, resource: &OperationResource) -> bool {
        self.0.iter().any(|item| item.is_active && item.is_match(resource))
    }

    pub fn has_active(&self) -> bool {
        self.0.iter().any(|item| item.is_active)
    }

    /// Resources the unit cares about. With no active EMK entries configured
    /// every resource passes.
    pub fn filter_resources<'a>(
        &self,
        resources: impl IntoIterator<Item = &'a OperationResource>,
    ) -> Vec<&'a OperationResource> {
        let all = !self.has_active();
        resources
            .into_iter()
            .filter(|r| all || self.contains_match(r))
            .collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EmkResource> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str) -> OperationResource {
        OperationResource::new(name)
    }

    #[test]
    fn contains_match_requires_both_aliases() {
        let emk = EmkResourceCollection::new(vec![EmkResource::new("ABC", "88/8")]);
        assert!(emk.contains_match(&resource("1.2.3 ABC 88/8 LF")));
        assert!(!emk.contains_match(&resource("1.2.3 XYZ 88/8 LF")));
        assert!(!emk.contains_match(&resource("")));
    }

    #[test]
    fn inactive_entries_never_match() {
        let mut entry = EmkResource::new("ABC", "88/8");
        entry.is_active = false;
        let emk = EmkResourceCollection::new(vec![entry]);
        assert!(!emk.contains_match(&resource("1.2.3 ABC 88/8 LF")));
    }

    #[test]
    fn filter_passes_everything_without_active_entries() {
        let resources = [resource("A 1"), resource("B 2")];
        let empty = EmkResourceCollection::default();
        assert_eq!(empty.filter_resources(&resources).len(), 2);

        let emk = EmkResourceCollection::new(vec![EmkResource::new("B", "2")]);
        let filtered = emk.filter_resources(&resources);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].full_name, "B 2");
    }

    #[test]
    fn loads_json_with_active_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("emk.json");
        std::fs::write(
            &path,
            r#"[{"site_alias": "ABC", "resource_alias": "88/8", "display_name": "LF 8"}]"#,
        )
        .unwrap();
        let emk = EmkResourceCollection::load(&path).unwrap();
        let first = emk.iter().next().unwrap();
        assert!(first.is_active);
        assert_eq!(first.id(), "ABC.88/8");
    }
}
