//! List execution.
//!
//! Turns a list configuration and one request into an executed query:
//!
//! 1. resolve the list source of the configured entity type and bundle
//! 2. parse URL filters, dropping those on facets that are not exposed
//! 3. resolve contextual and preset filter values
//! 4. resolve each facet's active items and run its query type
//! 5. execute the query and build the facet results

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::configuration::{ContextualValueSource, ListPageConfiguration};
use super::extension::ListExtensionRegistry;
use super::source::{ListSource, ListSourceRegistry, SortOption};
use crate::config::EngineConfig;
use crate::entity::{Entity, EntityLookup};
use crate::error::ListResult;
use crate::facet::{
    ActiveItemsResolver, FacetDefinition, FacetRegistry, FacetSource, FilterLayers,
    UrlProcessorRegistry, UrlState,
};
use crate::field_type::FieldTypeRegistry;
use crate::filter::FilterValue;
use crate::hierarchy::HierarchyResolver;
use crate::index::{ConditionOperator, IndexClient, ResultSet, SearchQuery};
use crate::query_type::{BuiltFacet, QueryTypeContext, QueryTypeEngine};

/// Request state a list is rendered for.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    /// Raw query string, without the leading `?`.
    pub query_string: String,

    /// Zero-based page.
    pub page: usize,

    /// Entity the list is shown on, source of contextual filter values.
    pub current_entity: Option<Entity>,

    /// Language results and labels are shown in.
    pub langcode: Option<String>,

    /// Named URL arguments for contextual filters.
    pub url_args: BTreeMap<String, String>,

    /// Request time; the current time when unset.
    pub now: Option<DateTime<Utc>>,
}

impl ListRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_string(mut self, query_string: impl Into<String>) -> Self {
        self.query_string = query_string.into();
        self
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn with_current_entity(mut self, entity: Entity) -> Self {
        self.current_entity = Some(entity);
        self
    }

    pub fn with_langcode(mut self, langcode: impl Into<String>) -> Self {
        self.langcode = Some(langcode.into());
        self
    }

    pub fn with_url_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_args.insert(name.into(), value.into());
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }
}

/// An executed list.
#[derive(Debug, Clone, Serialize)]
pub struct ListExecution {
    /// The query as it was executed.
    pub query: SearchQuery,
    pub results: ResultSet,
    pub list_source: ListSource,
    pub configuration: ListPageConfiguration,
    /// Facets of the source in weight order, with their options.
    pub facets: Vec<BuiltFacet>,
    /// URL filters after exposure gating.
    pub url_state: UrlState,
    pub facet_source: FacetSource,
    pub page: usize,
    pub limit: usize,
    pub langcode: Option<String>,
    /// Invalidation tags for whatever caches the rendered list.
    pub cache_tags: BTreeSet<String>,
    /// Request properties the rendered list varies by.
    pub cache_contexts: BTreeSet<String>,
}

/// Collaborators of list execution.
pub struct ListExecutionManager {
    index: Arc<dyn IndexClient>,
    entities: Arc<dyn EntityLookup>,
    facets: Arc<dyn FacetRegistry>,
    hierarchy: Arc<HierarchyResolver>,
    field_types: Arc<FieldTypeRegistry>,
    query_types: Arc<QueryTypeEngine>,
    url_processors: Arc<UrlProcessorRegistry>,
    extensions: Arc<ListExtensionRegistry>,
    sources: ListSourceRegistry,
    config: EngineConfig,
}

impl ListExecutionManager {
    /// Manager with the built-in field types, query types and URL processor.
    ///
    /// List sources are derived from the indexes the client knows now.
    pub fn new(
        index: Arc<dyn IndexClient>,
        entities: Arc<dyn EntityLookup>,
        facets: Arc<dyn FacetRegistry>,
        config: EngineConfig,
    ) -> Self {
        let sources = ListSourceRegistry::from_index_client(index.as_ref());
        debug!(sources = sources.len(), "list sources discovered");
        Self {
            index,
            entities,
            facets,
            hierarchy: Arc::new(HierarchyResolver::new()),
            field_types: Arc::new(FieldTypeRegistry::new()),
            query_types: Arc::new(QueryTypeEngine::new()),
            url_processors: Arc::new(UrlProcessorRegistry::new()),
            extensions: Arc::new(ListExtensionRegistry::new()),
            sources,
            config,
        }
    }

    pub fn with_hierarchy(mut self, hierarchy: Arc<HierarchyResolver>) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    pub fn with_field_types(mut self, field_types: Arc<FieldTypeRegistry>) -> Self {
        self.field_types = field_types;
        self
    }

    pub fn with_query_types(mut self, query_types: Arc<QueryTypeEngine>) -> Self {
        self.query_types = query_types;
        self
    }

    pub fn with_url_processors(mut self, url_processors: Arc<UrlProcessorRegistry>) -> Self {
        self.url_processors = url_processors;
        self
    }

    pub fn with_extensions(mut self, extensions: Arc<ListExtensionRegistry>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn entities(&self) -> &dyn EntityLookup {
        self.entities.as_ref()
    }

    pub fn url_processors(&self) -> &UrlProcessorRegistry {
        &self.url_processors
    }

    pub fn index_client(&self) -> &dyn IndexClient {
        self.index.as_ref()
    }

    /// Sources lists can be built from, after extension vetoes.
    pub fn list_sources(&self) -> Vec<ListSource> {
        self.sources
            .sources()
            .into_iter()
            .filter(|s| self.extensions.allows_source(s))
            .collect()
    }

    /// The usable source for `bundle` of `entity_type`.
    pub fn list_source(&self, entity_type: &str, bundle: &str) -> Option<ListSource> {
        self.sources
            .get(entity_type, bundle)
            .filter(|s| self.extensions.allows_source(s))
    }

    /// Sort options of a source, altered by extensions.
    pub fn sort_options(&self, source: &ListSource) -> Vec<SortOption> {
        let Some(index) = self.index.index(&source.index_id) else {
            return Vec::new();
        };
        let mut options = source.sort_options(&index);
        self.extensions.alter_sort_options(source, &mut options);
        options
    }

    /// Build the query of a list without running it.
    pub fn build_query(
        &self,
        configuration: &ListPageConfiguration,
        request: &ListRequest,
    ) -> ListResult<Option<SearchQuery>> {
        Ok(self.run(configuration, request, false)?.map(|e| e.query))
    }

    /// Execute a list.
    ///
    /// `Ok(None)` means there is nothing to render: the configuration is
    /// incomplete or no enabled index covers its bundle. Backend failures
    /// propagate.
    pub fn execute_list(
        &self,
        configuration: &ListPageConfiguration,
        request: &ListRequest,
    ) -> ListResult<Option<ListExecution>> {
        self.run(configuration, request, true)
    }

    fn run(
        &self,
        configuration: &ListPageConfiguration,
        request: &ListRequest,
        execute: bool,
    ) -> ListResult<Option<ListExecution>> {
        let Some((entity_type, bundle)) = configuration.list_source_key() else {
            debug!("list configuration has no entity type or bundle");
            return Ok(None);
        };
        let Some(source) = self.list_source(entity_type, bundle) else {
            debug!(entity_type, bundle, "no list source for bundle");
            return Ok(None);
        };
        let Some(index) = self.index.index(&source.index_id).filter(|i| i.enabled) else {
            debug!(index = %source.index_id, "list source index unavailable");
            return Ok(None);
        };

        let limit = self.config.effective_limit(configuration.limit);
        let Some(mut query) = source.query(self.index.as_ref(), request.page, limit) else {
            return Ok(None);
        };

        if let Some(langcode) = request.langcode.as_deref() {
            query.languages = Some(vec![langcode.to_string()]);
        }
        if let Some(sort) = &configuration.sort {
            query.sort(sort.field.as_str(), sort.direction);
        }

        let facets = self.facets.facets_by_source(&source.facet_source_id);
        let facet_source = self
            .facets
            .facet_source(&source.facet_source_id)
            .unwrap_or_else(|| FacetSource::new(&source.facet_source_id));

        let mut url_state = self
            .url_processors
            .parse(&facet_source, &facets, &request.query_string);
        url_state.retain(|facet_id| {
            let exposed = facets
                .iter()
                .any(|f| f.id == facet_id && configuration.is_exposed(f));
            if !exposed {
                debug!(facet = facet_id, "URL values for unexposed facet dropped");
            }
            exposed
        });

        let contextual = self.contextual_values(configuration, request, &source, &mut query);
        let preset = configuration.preset_filter_values();
        warn_unknown_facets(&facets, contextual.keys().chain(preset.keys()));

        let langcode = request.langcode.as_deref().unwrap_or_default();
        let ctx = QueryTypeContext {
            index: &index,
            hierarchy: &self.hierarchy,
            field_types: &self.field_types,
            entities: self.entities.as_ref(),
            langcode,
            now: request.now.unwrap_or_else(Utc::now),
            timezone: self.config.timezone(),
        };

        let layers = FilterLayers {
            url: &url_state,
            contextual: &contextual,
            preset: &preset,
        };
        let resolver = ActiveItemsResolver::new(layers, &facets);
        let mut executed = Vec::with_capacity(facets.len());
        for facet in resolver.resolve_all(&facets) {
            let prepared = self.query_types.prepare(&ctx, facet);
            executed.push(self.query_types.execute(&ctx, &mut query, prepared)?);
        }

        self.extensions.alter_query(&source, configuration, &mut query);

        let mut results = if execute {
            self.index.execute(&query)?
        } else {
            ResultSet::default()
        };
        self.extensions.alter_results(&source, &mut results);

        let built: Vec<BuiltFacet> = executed
            .into_iter()
            .map(|facet| self.query_types.build(&ctx, facet, &results))
            .collect();

        let mut cache_tags = BTreeSet::from([
            format!("search_api_list:{}", index.id),
            format!("{}_list", source.entity_type),
        ]);
        if let Some(current) = &request.current_entity {
            cache_tags.insert(format!("{}:{}", current.entity_type, current.id));
        }
        let mut cache_contexts = BTreeSet::from(["url.query_args".to_string()]);
        if request.langcode.is_some() {
            cache_contexts.insert("languages".to_string());
        }

        if execute {
            info!(
                source = %source.id(),
                index = %index.id,
                results = results.result_count,
                active_facets = built.iter().filter(|f| !f.active_items.is_empty()).count(),
                page = request.page,
                "list executed"
            );
        }

        Ok(Some(ListExecution {
            query,
            results,
            list_source: source,
            configuration: configuration.clone(),
            facets: built,
            url_state,
            facet_source,
            page: request.page,
            limit,
            langcode: request.langcode.clone(),
            cache_tags,
            cache_contexts,
        }))
    }

    /// Contextual filter values keyed by facet id.
    ///
    /// Nothing resolves without a current entity. Exclude-self only applies
    /// when the current entity belongs to the listed source.
    fn contextual_values(
        &self,
        configuration: &ListPageConfiguration,
        request: &ListRequest,
        source: &ListSource,
        query: &mut SearchQuery,
    ) -> BTreeMap<String, FilterValue> {
        let mut values: BTreeMap<String, FilterValue> = BTreeMap::new();
        let Some(current) = &request.current_entity else {
            return values;
        };
        let current = match request.langcode.as_deref() {
            Some(langcode) => self.entities.get_translation(current, langcode),
            None => current.clone(),
        };

        let mut exclude_self = false;
        for filter in &configuration.contextual_filters {
            exclude_self |= filter.exclude_self;
            let raw = match &filter.source {
                ContextualValueSource::Values { values } => values.clone(),
                ContextualValueSource::FieldValues { field } => current.field_strings(field),
                ContextualValueSource::Url { parameter } => {
                    request.url_args.get(parameter).cloned().into_iter().collect()
                }
            };
            let value = FilterValue::new(filter.operator, raw);
            if value.is_empty() {
                debug!(facet = %filter.facet_id, "contextual filter resolved to no values");
                continue;
            }
            match values.get_mut(&filter.facet_id) {
                Some(existing) => existing.merge(value),
                None => {
                    values.insert(filter.facet_id.clone(), value);
                }
            }
        }

        if exclude_self {
            if current.entity_type == source.entity_type && current.bundle == source.bundle {
                query.add_condition(
                    self.config.self_id_field.as_str(),
                    current.id.as_str(),
                    ConditionOperator::Ne,
                );
            } else {
                debug!(
                    entity_type = %current.entity_type,
                    bundle = %current.bundle,
                    source = %source.id(),
                    "current entity outside list source; not excluded"
                );
            }
        }
        values
    }
}

fn warn_unknown_facets<'a>(facets: &[FacetDefinition], ids: impl Iterator<Item = &'a String>) {
    for id in ids {
        if !facets.iter().any(|f| &f.id == id) {
            warn!(facet = %id, "filter value for unknown facet ignored");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::entity::MemoryEntityStore;
    use crate::facet::MemoryFacetRegistry;
    use crate::filter::FilterOperator;
    use crate::index::memory::MemoryIndex;
    use crate::index::{
        IndexDatasource, IndexField, IndexFieldType, IndexInfo, LINK_SOURCE_ID_FIELD,
    };
    use crate::list::configuration::{ContextualPresetFilter, ListPresetFilter};

    fn field(id: &str, field_type: IndexFieldType) -> IndexField {
        IndexField {
            id: id.into(),
            label: id.into(),
            field_type,
            property_path: None,
            definition: None,
        }
    }

    fn manager() -> ListExecutionManager {
        let index = MemoryIndex::new();
        index.add_index(IndexInfo {
            id: "content".into(),
            label: "Content".into(),
            enabled: true,
            datasources: vec![IndexDatasource {
                entity_type: "node".into(),
                bundles: vec!["article".into(), "page".into()],
            }],
            fields: vec![
                field("title", IndexFieldType::Fulltext),
                field("status", IndexFieldType::Boolean),
                field("tags", IndexFieldType::String),
            ],
        });
        let articles = [
            ("1", "1", vec!["a"]),
            ("2", "0", vec!["b"]),
            ("3", "1", vec!["a", "b"]),
        ];
        for (id, status, tags) in articles {
            let entity = Entity::new("node", "article", id, format!("Article {id}"))
                .with_field("status", [json!(status)])
                .with_field("tags", tags.into_iter().map(|t| json!(t)));
            index.index_entity("content", &entity).unwrap();
        }

        let facets = MemoryFacetRegistry::new();
        let source = "list_facet_source:node:article";
        let mut status = FacetDefinition::new("status", "status", source);
        status.default_status = Some("1".into());
        facets.add_facet(status);
        facets.add_facet(FacetDefinition::new("tags", "tags", source));

        ListExecutionManager::new(
            Arc::new(index),
            Arc::new(MemoryEntityStore::new()),
            Arc::new(facets),
            EngineConfig::default(),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn incomplete_configuration_renders_nothing() {
        let manager = manager();
        let request = ListRequest::new();

        let empty = ListPageConfiguration::default();
        assert!(manager.execute_list(&empty, &request).unwrap().is_none());

        let unknown = ListPageConfiguration::new("node", "event");
        assert!(manager.execute_list(&unknown, &request).unwrap().is_none());
    }

    #[test]
    fn default_status_applies_without_url_filters() {
        let manager = manager();
        let config = ListPageConfiguration::new("node", "article");
        let execution = manager
            .execute_list(&config, &ListRequest::new().with_now(now()))
            .unwrap()
            .unwrap();

        let conds = execution.query.find_conditions("status");
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].value.as_text().as_deref(), Some("1"));
        assert_eq!(execution.results.result_count, 2);
    }

    #[test]
    fn url_filter_disables_default_status() {
        let manager = manager();
        let config = ListPageConfiguration::new("node", "article");
        let request = ListRequest::new().with_query_string("f[0]=tags:b");
        let execution = manager.execute_list(&config, &request).unwrap().unwrap();

        assert!(execution.query.find_conditions("status").is_empty());
        assert_eq!(execution.results.result_count, 2);
    }

    #[test]
    fn unexposed_facets_ignore_url_values() {
        let manager = manager();
        let mut config = ListPageConfiguration::new("node", "article");
        config.exposed_filters_overridden = true;
        config.exposed_filters.insert("status".into(), true);

        let request = ListRequest::new().with_query_string("f[0]=tags:b");
        let execution = manager.execute_list(&config, &request).unwrap().unwrap();
        assert!(execution.url_state.is_empty());
        assert!(execution.query.find_conditions("tags").is_empty());
    }

    #[test]
    fn url_values_beat_presets() {
        let manager = manager();
        let mut config = ListPageConfiguration::new("node", "article");
        config
            .preset_filters
            .push(ListPresetFilter::new("tags", FilterOperator::Or, ["a"]));

        let request = ListRequest::new().with_query_string("f[0]=tags:b");
        let execution = manager.execute_list(&config, &request).unwrap().unwrap();
        let conds = execution.query.find_conditions("tags");
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].value.as_text().as_deref(), Some("b"));
    }

    #[test]
    fn exclude_self_requires_matching_source() {
        let manager = manager();
        let mut config = ListPageConfiguration::new("node", "article");
        config.contextual_filters.push(ContextualPresetFilter {
            facet_id: "tags".into(),
            operator: FilterOperator::Or,
            source: ContextualValueSource::FieldValues { field: "tags".into() },
            exclude_self: true,
        });

        let same = Entity::new("node", "article", "5", "Five").with_field("tags", [json!("a")]);
        let query = manager
            .build_query(&config, &ListRequest::new().with_current_entity(same))
            .unwrap()
            .unwrap();
        let conds = query.find_conditions(LINK_SOURCE_ID_FIELD);
        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].operator, ConditionOperator::Ne);
        assert_eq!(conds[0].value.as_text().as_deref(), Some("5"));
        assert_eq!(query.find_conditions("tags")[0].value.as_text().as_deref(), Some("a"));

        let other = Entity::new("node", "page", "5", "Five").with_field("tags", [json!("a")]);
        let query = manager
            .build_query(&config, &ListRequest::new().with_current_entity(other))
            .unwrap()
            .unwrap();
        assert!(query.find_conditions(LINK_SOURCE_ID_FIELD).is_empty());
    }

    #[test]
    fn cache_metadata_names_index_and_type() {
        let manager = manager();
        let config = ListPageConfiguration::new("node", "article");
        let execution = manager
            .execute_list(&config, &ListRequest::new().with_langcode("en"))
            .unwrap()
            .unwrap();

        assert!(execution.cache_tags.contains("search_api_list:content"));
        assert!(execution.cache_tags.contains("node_list"));
        assert!(execution.cache_contexts.contains("url.query_args"));
        assert!(execution.cache_contexts.contains("languages"));
        assert_eq!(execution.query.languages, Some(vec!["en".to_string()]));
    }

    #[test]
    fn limit_and_page_set_the_range() {
        let manager = manager();
        let mut config = ListPageConfiguration::new("node", "article");
        config.limit = Some(1);
        let request = ListRequest::new().with_page(1).with_query_string("f[0]=tags:a");
        let execution = manager
            .execute_list(&config, &request)
            .unwrap()
            .unwrap();

        assert_eq!(execution.query.offset, 1);
        assert_eq!(execution.results.items.len(), 1);
        assert_eq!(execution.results.result_count, 2);
    }
}
