//! List page configuration.
//!
//! Stored as a flat key-value map on the content entity that renders the
//! list ("entity meta"). The map carries a `version` key so older shapes can
//! be told apart from newer ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ListError, ListResult};
use crate::facet::FacetDefinition;
use crate::filter::{FilterOperator, FilterValue};
use crate::index::SortDirection;

/// Shape version written by [`ListPageConfiguration::to_meta`].
pub const CONFIGURATION_VERSION: u32 = 1;

fn default_version() -> u32 {
    CONFIGURATION_VERSION
}

fn default_true() -> bool {
    true
}

/// Sort of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// A filter value configured by an editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPresetFilter {
    pub facet_id: String,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

impl ListPresetFilter {
    pub fn new<I, S>(facet_id: impl Into<String>, operator: FilterOperator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            facet_id: facet_id.into(),
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn filter_value(&self) -> FilterValue {
        FilterValue::new(self.operator, self.values.iter().map(String::as_str))
    }
}

/// Where a contextual filter takes its values from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ContextualValueSource {
    /// Literal configured values.
    Values {
        #[serde(default)]
        values: Vec<String>,
    },
    /// Values of a field on the current entity.
    FieldValues { field: String },
    /// A named argument of the current URL.
    Url { parameter: String },
}

/// A filter whose values are derived from the current entity at render time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualPresetFilter {
    pub facet_id: String,

    #[serde(default)]
    pub operator: FilterOperator,

    #[serde(flatten)]
    pub source: ContextualValueSource,

    /// Drop the current entity itself from the results.
    #[serde(default)]
    pub exclude_self: bool,
}

/// Everything an editor configures for one list page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPageConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,

    /// Items per page; the engine default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,

    /// Facet id (or field) to enabled flag. Only consulted when overridden.
    #[serde(default)]
    pub exposed_filters: BTreeMap<String, bool>,

    #[serde(default)]
    pub exposed_filters_overridden: bool,

    #[serde(default)]
    pub preset_filters: Vec<ListPresetFilter>,

    #[serde(default)]
    pub contextual_filters: Vec<ContextualPresetFilter>,

    /// Whether preset filter values apply.
    #[serde(default = "default_true")]
    pub default_filter_values_allowed: bool,

    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for ListPageConfiguration {
    fn default() -> Self {
        Self {
            entity_type: None,
            bundle: None,
            limit: None,
            sort: None,
            exposed_filters: BTreeMap::new(),
            exposed_filters_overridden: false,
            preset_filters: Vec::new(),
            contextual_filters: Vec::new(),
            default_filter_values_allowed: true,
            version: CONFIGURATION_VERSION,
        }
    }
}

impl ListPageConfiguration {
    /// Configuration listing `bundle` of `entity_type`.
    pub fn new(entity_type: impl Into<String>, bundle: impl Into<String>) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            bundle: Some(bundle.into()),
            ..Self::default()
        }
    }

    /// `(entity_type, bundle)` once both are set.
    pub fn list_source_key(&self) -> Option<(&str, &str)> {
        let entity_type = self.entity_type.as_deref().filter(|s| !s.is_empty())?;
        let bundle = self.bundle.as_deref().filter(|s| !s.is_empty())?;
        Some((entity_type, bundle))
    }

    /// Whether `facet` accepts values from the URL.
    pub fn is_exposed(&self, facet: &FacetDefinition) -> bool {
        if !self.exposed_filters_overridden {
            return true;
        }
        self.exposed_filters
            .get(&facet.id)
            .or_else(|| self.exposed_filters.get(&facet.field_identifier))
            .copied()
            .unwrap_or(false)
    }

    /// Preset filter values keyed by facet id.
    ///
    /// Filters on the same facet are merged; the first filter's operator
    /// wins. Nothing applies while default filter values are disallowed.
    pub fn preset_filter_values(&self) -> BTreeMap<String, FilterValue> {
        let mut values: BTreeMap<String, FilterValue> = BTreeMap::new();
        if !self.default_filter_values_allowed {
            if !self.preset_filters.is_empty() {
                debug!(count = self.preset_filters.len(), "preset filters disallowed");
            }
            return values;
        }
        for filter in &self.preset_filters {
            let value = filter.filter_value();
            match values.get_mut(&filter.facet_id) {
                Some(existing) => existing.merge(value),
                None => {
                    values.insert(filter.facet_id.clone(), value);
                }
            }
        }
        values.retain(|_, v| !v.is_empty());
        values
    }

    /// Read a configuration from entity meta.
    pub fn from_meta(meta: &Map<String, Value>) -> ListResult<Self> {
        let config: Self = serde_json::from_value(Value::Object(meta.clone()))
            .map_err(|e| ListError::InvalidConfiguration(e.to_string()))?;
        if config.version > CONFIGURATION_VERSION {
            return Err(ListError::InvalidConfiguration(format!(
                "unsupported configuration version {}",
                config.version
            )));
        }
        Ok(config)
    }

    /// Write the configuration as entity meta.
    pub fn to_meta(&self) -> ListResult<Map<String, Value>> {
        let mut config = self.clone();
        config.version = CONFIGURATION_VERSION;
        match serde_json::to_value(config) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ListError::InvalidConfiguration(
                "configuration did not serialize to a map".to_string(),
            )),
            Err(e) => Err(ListError::InvalidConfiguration(e.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn meta_round_trip_keeps_shape() {
        let mut config = ListPageConfiguration::new("node", "article");
        config.limit = Some(5);
        config.sort = Some(SortSpec {
            field: "created".into(),
            direction: SortDirection::Desc,
        });
        config.preset_filters.push(ListPresetFilter::new(
            "category",
            FilterOperator::OrWithHierarchy,
            ["42"],
        ));
        config.contextual_filters.push(ContextualPresetFilter {
            facet_id: "tags".into(),
            operator: FilterOperator::Or,
            source: ContextualValueSource::FieldValues { field: "tags".into() },
            exclude_self: true,
        });

        let meta = config.to_meta().unwrap();
        assert_eq!(meta["version"], json!(1));
        assert_eq!(meta["sort"], json!({"field": "created", "direction": "DESC"}));
        assert_eq!(
            meta["preset_filters"],
            json!([{"facet_id": "category", "operator": "OR_WITH_HIERARCHY", "values": ["42"]}])
        );
        assert_eq!(meta["contextual_filters"][0]["source"], json!("field_values"));

        let back = ListPageConfiguration::from_meta(&meta).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn from_meta_reads_minimal_maps() {
        let meta = json!({"entity_type": "node"});
        let config = ListPageConfiguration::from_meta(meta.as_object().unwrap()).unwrap();
        assert!(config.list_source_key().is_none());
        assert!(config.default_filter_values_allowed);
    }

    #[test]
    fn from_meta_rejects_bad_shapes() {
        let meta = json!({"preset_filters": [{"facet_id": "x", "operator": "XOR"}]});
        let err = ListPageConfiguration::from_meta(meta.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, ListError::InvalidConfiguration(_)));

        let meta = json!({"version": 99});
        let err = ListPageConfiguration::from_meta(meta.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, ListError::InvalidConfiguration(_)));
    }

    #[test]
    fn exposure_only_gated_when_overridden() {
        let facet = FacetDefinition::new("tags", "field_tags", "src");
        let mut config = ListPageConfiguration::new("node", "article");
        assert!(config.is_exposed(&facet));

        config.exposed_filters_overridden = true;
        assert!(!config.is_exposed(&facet));

        config.exposed_filters.insert("field_tags".into(), true);
        assert!(config.is_exposed(&facet));

        config.exposed_filters.insert("tags".into(), false);
        assert!(!config.is_exposed(&facet));
    }

    #[test]
    fn preset_values_merge_per_facet() {
        let mut config = ListPageConfiguration::new("node", "article");
        config.preset_filters = vec![
            ListPresetFilter::new("tags", FilterOperator::And, ["1", "2"]),
            ListPresetFilter::new("tags", FilterOperator::Or, ["2", "3"]),
            ListPresetFilter::new("empty", FilterOperator::Or, [" "]),
        ];

        let values = config.preset_filter_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values["tags"].operator, FilterOperator::And);
        assert_eq!(values["tags"].values, vec!["1", "2", "3"]);

        config.default_filter_values_allowed = false;
        assert!(config.preset_filter_values().is_empty());
    }
}
