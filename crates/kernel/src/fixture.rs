//! Site fixtures: indexes, entities, facets and list configurations in one
//! JSON or YAML document, loaded into the in-memory backends.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::entity::{Entity, MemoryEntityStore};
use crate::facet::{FacetDefinition, FacetSource, MemoryFacetRegistry};
use crate::hierarchy::{HierarchyDirection, HierarchyResolver, TermHierarchy};
use crate::index::IndexInfo;
use crate::index::memory::MemoryIndex;
use crate::list::{ListExecutionManager, ListPageConfiguration};

/// Fixture files larger than this are rejected (10 MB).
const MAX_FIXTURE_SIZE: u64 = 10 * 1024 * 1024;

fn default_parent_field() -> String {
    "parent".to_string()
}

/// A hierarchy built from a parent field of one entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyFixture {
    pub entity_type: String,
    #[serde(default = "default_parent_field")]
    pub parent_field: String,
    #[serde(default)]
    pub direction: HierarchyDirection,
}

/// Everything needed to run lists without external services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteFixture {
    #[serde(default)]
    pub indexes: Vec<IndexInfo>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub facet_sources: Vec<FacetSource>,
    #[serde(default)]
    pub facets: Vec<FacetDefinition>,
    #[serde(default)]
    pub hierarchies: Vec<HierarchyFixture>,
    /// Named list configurations.
    #[serde(default)]
    pub lists: BTreeMap<String, ListPageConfiguration>,
}

/// Backends loaded from a fixture.
pub struct SiteServices {
    pub manager: ListExecutionManager,
    pub index: Arc<MemoryIndex>,
    pub entities: Arc<MemoryEntityStore>,
    pub lists: BTreeMap<String, ListPageConfiguration>,
}

impl SiteFixture {
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("invalid JSON site fixture")
    }

    pub fn from_yaml(input: &str) -> Result<Self> {
        serde_yml::from_str(input).context("invalid YAML site fixture")
    }

    /// Load a fixture file; `.yml`/`.yaml` are read as YAML, anything else as JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        let size = std::fs::metadata(path)
            .with_context(|| format!("cannot stat {}", path.display()))?
            .len();
        if size > MAX_FIXTURE_SIZE {
            bail!("fixture {} is too large ({size} bytes)", path.display());
        }
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => Self::from_yaml(&input),
            _ => Self::from_json(&input),
        }
    }

    /// Load the fixture into in-memory backends and wire a list manager.
    pub fn into_services(self, config: EngineConfig) -> Result<SiteServices> {
        let index = Arc::new(MemoryIndex::new());
        for info in &self.indexes {
            index.add_index(info.clone());
        }
        let mut documents = 0;
        for info in &self.indexes {
            for entity in &self.entities {
                documents += index.index_entity(&info.id, entity)?;
            }
        }

        let mut hierarchy = HierarchyResolver::new();
        for fixture in &self.hierarchies {
            let terms = self.entities.iter().filter(|e| e.entity_type == fixture.entity_type);
            let handler =
                TermHierarchy::from_entities(terms, &fixture.parent_field, fixture.direction);
            hierarchy.register(&fixture.entity_type, Box::new(handler));
            debug!(entity_type = %fixture.entity_type, "hierarchy registered");
        }

        let facets = MemoryFacetRegistry::new();
        for source in self.facet_sources {
            facets.add_source(source);
        }
        for facet in self.facets {
            facets.add_facet(facet);
        }

        let entities = Arc::new(MemoryEntityStore::with_entities(self.entities));
        info!(
            indexes = self.indexes.len(),
            documents,
            entities = entities.len(),
            lists = self.lists.len(),
            "site fixture loaded"
        );

        let manager =
            ListExecutionManager::new(index.clone(), entities.clone(), Arc::new(facets), config)
                .with_hierarchy(Arc::new(hierarchy));

        Ok(SiteServices {
            manager,
            index,
            entities,
            lists: self.lists,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::list::ListRequest;

    const YAML: &str = r#"
indexes:
  - id: content
    datasources:
      - entity_type: node
        bundles: [article]
    fields:
      - id: category
        type: string
        property_path: field_category
        definition:
          name: field_category
          type: entity_reference
          target_type: taxonomy_term
entities:
  - { entity_type: taxonomy_term, bundle: tags, id: "1", label: Root }
  - { entity_type: taxonomy_term, bundle: tags, id: "2", label: Child, fields: { parent: ["1"] } }
  - entity_type: node
    bundle: article
    id: "10"
    label: First
    fields: { field_category: ["2"] }
facets:
  - id: category
    field_identifier: category
    facet_source_id: "list_facet_source:node:article"
hierarchies:
  - entity_type: taxonomy_term
lists:
  articles:
    entity_type: node
    bundle: article
    preset_filters:
      - { facet_id: category, operator: OR_WITH_HIERARCHY, values: ["1"] }
"#;

    #[test]
    fn yaml_fixture_runs_lists() {
        let fixture = SiteFixture::from_yaml(YAML).unwrap();
        let services = fixture.into_services(EngineConfig::default()).unwrap();
        assert_eq!(services.index.document_count("content"), 1);

        let config = &services.lists["articles"];
        let execution = services
            .manager
            .execute_list(config, &ListRequest::new())
            .unwrap()
            .unwrap();
        assert_eq!(execution.results.result_count, 1);
        assert_eq!(execution.results.items[0].entity_id, "10");
    }

    #[test]
    fn json_and_yaml_agree() {
        let yaml = SiteFixture::from_yaml(YAML).unwrap();
        let json = serde_json::to_string(&yaml).unwrap();
        let back = SiteFixture::from_json(&json).unwrap();
        assert_eq!(back.entities, yaml.entities);
        assert_eq!(back.lists, yaml.lists);
    }
}
