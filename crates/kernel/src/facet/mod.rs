//! Facets: filterable dimensions over a list source's index.
//!
//! A facet binds one index field to a query type and a URL alias. Facets are
//! grouped by facet source; each list source owns one facet source.

pub mod active_items;
pub mod url;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::filter::FilterOperator;
use crate::query_type::QueryTypeId;

pub use active_items::{ActiveItemsOrigin, ActiveItemsResolver, FilterLayers, ResolvedFacet};
pub use url::{QueryStringUrlProcessor, UrlProcessor, UrlProcessorRegistry, UrlState};

/// Marker prefix of the missing-value sentinel `!(v1,v2,...)`.
pub const MISSING_PREFIX: &str = "!(";

/// Build the missing-value sentinel listing every other value.
pub fn missing_sentinel(other_values: &[String]) -> String {
    format!("{MISSING_PREFIX}{})", other_values.join(","))
}

/// Values listed in a missing-value sentinel, or `None` for regular values.
pub fn parse_missing_sentinel(raw: &str) -> Option<Vec<String>> {
    let inner = raw.strip_prefix(MISSING_PREFIX)?.strip_suffix(')')?;
    Some(
        inner
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn default_url_processor() -> String {
    url::QUERY_STRING_PROCESSOR.to_string()
}

fn default_filter_key() -> String {
    "f".to_string()
}

fn default_separator() -> String {
    ":".to_string()
}

/// A group of facets sharing URL handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetSource {
    pub id: String,

    /// URL processor id.
    #[serde(default = "default_url_processor")]
    pub url_processor: String,

    /// Query parameter carrying active filters.
    #[serde(default = "default_filter_key")]
    pub filter_key: String,

    /// Separator between URL alias and value.
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl FacetSource {
    /// Facet source with the default query-string settings.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url_processor: default_url_processor(),
            filter_key: default_filter_key(),
            separator: default_separator(),
        }
    }
}

fn default_widget() -> String {
    "checkbox".to_string()
}

/// Widget settings of a facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default = "default_widget")]
    pub id: String,

    /// Fulltext widgets search every fulltext field instead of their own.
    #[serde(default)]
    pub search_all_fields: bool,

    #[serde(default)]
    pub config: serde_json::Value,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            id: default_widget(),
            search_all_fields: false,
            config: serde_json::Value::Null,
        }
    }
}

fn default_min_count() -> usize {
    1
}

fn default_missing_label() -> String {
    "Other".to_string()
}

/// A configured facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetDefinition {
    pub id: String,

    #[serde(default)]
    pub label: String,

    /// Index field the facet filters on.
    pub field_identifier: String,

    pub facet_source_id: String,

    /// Query type; chosen from the field type and widget when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_type: Option<QueryTypeId>,

    #[serde(default)]
    pub widget: WidgetConfig,

    /// Operator combining active items.
    #[serde(default)]
    pub operator: FilterOperator,

    /// Exclude matches instead of restricting to them.
    #[serde(default)]
    pub exclude: bool,

    /// Value applied when no facet of the source has URL items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_status: Option<String>,

    /// Name used in URLs; defaults to the facet id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_alias: Option<String>,

    #[serde(default = "default_min_count")]
    pub min_count: usize,

    /// Maximum number of results shown, 0 for all.
    #[serde(default)]
    pub hard_limit: usize,

    /// Offer a bucket for items without a value.
    #[serde(default)]
    pub missing: bool,

    #[serde(default = "default_missing_label")]
    pub missing_label: String,

    #[serde(default)]
    pub weight: i32,
}

impl FacetDefinition {
    /// Facet with default settings.
    pub fn new(
        id: impl Into<String>,
        field_identifier: impl Into<String>,
        facet_source_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            field_identifier: field_identifier.into(),
            facet_source_id: facet_source_id.into(),
            query_type: None,
            widget: WidgetConfig::default(),
            operator: FilterOperator::Or,
            exclude: false,
            default_status: None,
            url_alias: None,
            min_count: default_min_count(),
            hard_limit: 0,
            missing: false,
            missing_label: default_missing_label(),
            weight: 0,
        }
    }

    /// Name used in URLs.
    pub fn url_alias(&self) -> &str {
        self.url_alias.as_deref().unwrap_or(&self.id)
    }
}

/// One option of a built facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetResult {
    pub raw_value: String,
    pub display_value: String,
    pub count: usize,
    #[serde(default)]
    pub active: bool,
}

impl FacetResult {
    pub fn new(
        raw_value: impl Into<String>,
        display_value: impl Into<String>,
        count: usize,
    ) -> Self {
        Self {
            raw_value: raw_value.into(),
            display_value: display_value.into(),
            count,
            active: false,
        }
    }
}

/// Facet configuration storage.
pub trait FacetRegistry: Send + Sync {
    /// Facets of a source ordered by weight, then id.
    fn facets_by_source(&self, facet_source_id: &str) -> Vec<FacetDefinition>;

    fn facet(&self, facet_id: &str) -> Option<FacetDefinition>;

    fn facet_source(&self, facet_source_id: &str) -> Option<FacetSource>;
}

/// In-memory facet configuration.
#[derive(Default)]
pub struct MemoryFacetRegistry {
    facets: DashMap<String, FacetDefinition>,
    sources: DashMap<String, FacetSource>,
}

impl MemoryFacetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a facet.
    pub fn add_facet(&self, facet: FacetDefinition) {
        self.facets.insert(facet.id.clone(), facet);
    }

    /// Add or replace a facet source.
    pub fn add_source(&self, source: FacetSource) {
        self.sources.insert(source.id.clone(), source);
    }
}

impl FacetRegistry for MemoryFacetRegistry {
    fn facets_by_source(&self, facet_source_id: &str) -> Vec<FacetDefinition> {
        let mut facets: Vec<FacetDefinition> = self
            .facets
            .iter()
            .filter(|f| f.facet_source_id == facet_source_id)
            .map(|f| f.value().clone())
            .collect();
        facets.sort_by(|a, b| a.weight.cmp(&b.weight).then_with(|| a.id.cmp(&b.id)));
        facets
    }

    fn facet(&self, facet_id: &str) -> Option<FacetDefinition> {
        self.facets.get(facet_id).map(|f| f.value().clone())
    }

    fn facet_source(&self, facet_source_id: &str) -> Option<FacetSource> {
        self.sources.get(facet_source_id).map(|s| s.value().clone())
    }
}
