//! List sources: the binding of an entity type and bundle to an index.

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::index::{
    BUNDLE_FIELD, ConditionOperator, DATASOURCE_FIELD, IndexClient, IndexInfo, RELEVANCE_FIELD,
    SearchQuery, datasource_id,
};

/// Facet source id of the list of `bundle` of `entity_type`.
pub fn facet_source_id(entity_type: &str, bundle: &str) -> String {
    format!("list_facet_source:{entity_type}:{bundle}")
}

/// An entity type and bundle bound to the index that covers them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListSource {
    pub entity_type: String,
    pub bundle: String,
    pub index_id: String,
    pub facet_source_id: String,
}

/// A field a list can be sorted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortOption {
    pub field: String,
    pub label: String,
}

impl ListSource {
    pub fn new(
        entity_type: impl Into<String>,
        bundle: impl Into<String>,
        index_id: impl Into<String>,
    ) -> Self {
        let entity_type = entity_type.into();
        let bundle = bundle.into();
        Self {
            facet_source_id: facet_source_id(&entity_type, &bundle),
            entity_type,
            bundle,
            index_id: index_id.into(),
        }
    }

    /// Registry key.
    pub fn id(&self) -> String {
        key(&self.entity_type, &self.bundle)
    }

    /// Fresh query restricted to this source, with the page range applied.
    ///
    /// `None` when the index is gone or disabled.
    pub fn query(
        &self,
        client: &dyn IndexClient,
        page: usize,
        limit: usize,
    ) -> Option<SearchQuery> {
        let mut query = client.create_query(&self.index_id)?;
        query
            .add_condition(
                DATASOURCE_FIELD,
                datasource_id(&self.entity_type),
                ConditionOperator::Eq,
            )
            .add_condition(BUNDLE_FIELD, self.bundle.as_str(), ConditionOperator::Eq)
            .range(page.saturating_mul(limit), limit);
        Some(query)
    }

    /// Sortable fields of the index plus relevance.
    pub fn sort_options(&self, index: &IndexInfo) -> Vec<SortOption> {
        let mut options: Vec<SortOption> = index
            .fields
            .iter()
            .filter(|f| f.field_type.is_sortable())
            .map(|f| SortOption {
                field: f.id.clone(),
                label: if f.label.is_empty() { f.id.clone() } else { f.label.clone() },
            })
            .collect();
        options.push(SortOption {
            field: RELEVANCE_FIELD.to_string(),
            label: "Relevance".to_string(),
        });
        options
    }
}

fn key(entity_type: &str, bundle: &str) -> String {
    format!("{entity_type}:{bundle}")
}

/// List sources derived from the enabled indexes.
#[derive(Default)]
pub struct ListSourceRegistry {
    sources: DashMap<String, ListSource>,
}

impl ListSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One source per indexed bundle. When several indexes cover a bundle
    /// the one with the lowest id wins.
    pub fn from_index_client(client: &dyn IndexClient) -> Self {
        let registry = Self::new();
        let mut indexes: Vec<IndexInfo> =
            client.indexes().into_iter().filter(|i| i.enabled).collect();
        indexes.sort_by(|a, b| a.id.cmp(&b.id));

        for index in &indexes {
            for datasource in &index.datasources {
                for bundle in &datasource.bundles {
                    let k = key(&datasource.entity_type, bundle);
                    if registry.sources.contains_key(&k) {
                        debug!(
                            source = %k,
                            index = %index.id,
                            "bundle already bound to another index"
                        );
                        continue;
                    }
                    registry
                        .sources
                        .insert(k, ListSource::new(&datasource.entity_type, bundle, &index.id));
                }
            }
        }
        registry
    }

    pub fn register(&self, source: ListSource) {
        self.sources.insert(source.id(), source);
    }

    pub fn get(&self, entity_type: &str, bundle: &str) -> Option<ListSource> {
        self.sources.get(&key(entity_type, bundle)).map(|s| s.value().clone())
    }

    /// All sources ordered by entity type, then bundle.
    pub fn sources(&self) -> Vec<ListSource> {
        let mut sources: Vec<ListSource> = self.sources.iter().map(|s| s.value().clone()).collect();
        sources.sort_by(|a, b| {
            a.entity_type
                .cmp(&b.entity_type)
                .then_with(|| a.bundle.cmp(&b.bundle))
        });
        sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
