//! Active item resolution.
//!
//! Each facet's active items come from exactly one layer, highest first:
//! URL values, contextual values, preset values, then the facet's default
//! status. Default status only applies while no facet of the source carries
//! URL values; that is decided once per request before any facet resolves.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::{FacetDefinition, UrlState};
use crate::filter::{FilterOperator, FilterValue};

/// Layer the active items of a facet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveItemsOrigin {
    Url,
    Contextual,
    Preset,
    DefaultStatus,
    /// The facet has no effect on the query.
    Inactive,
}

/// A facet with its request-scoped active items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFacet {
    pub definition: FacetDefinition,

    /// Operator for the active items. Preset and contextual layers may
    /// override the facet's own operator.
    pub operator: FilterOperator,

    pub active_items: Vec<String>,

    pub origin: ActiveItemsOrigin,
}

impl ResolvedFacet {
    /// Whether the facet restricts the query.
    pub fn is_active(&self) -> bool {
        !self.active_items.is_empty()
    }

    /// Whether `raw` is one of the active items.
    pub fn is_active_value(&self, raw: &str) -> bool {
        self.active_items.iter().any(|v| v == raw)
    }
}

/// Filter values of one request, by layer. Maps are keyed by facet id.
#[derive(Debug, Clone, Copy)]
pub struct FilterLayers<'a> {
    pub url: &'a UrlState,
    pub contextual: &'a BTreeMap<String, FilterValue>,
    pub preset: &'a BTreeMap<String, FilterValue>,
}

/// Resolves active items for the facets of one source.
pub struct ActiveItemsResolver<'a> {
    layers: FilterLayers<'a>,
    source_has_url_items: bool,
}

impl<'a> ActiveItemsResolver<'a> {
    /// Snapshot the URL state of `facets` before resolving any of them.
    pub fn new(layers: FilterLayers<'a>, facets: &[FacetDefinition]) -> Self {
        let source_has_url_items = facets.iter().any(|f| layers.url.get(&f.id).is_some());
        Self {
            layers,
            source_has_url_items,
        }
    }

    /// Whether any facet of the source had URL values.
    pub fn source_has_url_items(&self) -> bool {
        self.source_has_url_items
    }

    /// Resolve one facet.
    pub fn resolve(&self, facet: &FacetDefinition) -> ResolvedFacet {
        let resolved = |operator: FilterOperator, items: Vec<String>, origin: ActiveItemsOrigin| {
            debug!(facet = %facet.id, ?origin, items = ?items, "facet active items resolved");
            ResolvedFacet {
                definition: facet.clone(),
                operator,
                active_items: items,
                origin,
            }
        };

        if let Some(values) = self.layers.url.get(&facet.id) {
            return resolved(facet.operator, values.to_vec(), ActiveItemsOrigin::Url);
        }

        if let Some(value) = self.layers.contextual.get(&facet.id).filter(|v| !v.is_empty()) {
            return resolved(value.operator, value.values.clone(), ActiveItemsOrigin::Contextual);
        }

        if let Some(value) = self.layers.preset.get(&facet.id).filter(|v| !v.is_empty()) {
            return resolved(value.operator, value.values.clone(), ActiveItemsOrigin::Preset);
        }

        if !self.source_has_url_items
            && let Some(status) = facet.default_status.as_deref().filter(|s| !s.is_empty())
        {
            return resolved(
                facet.operator,
                vec![status.to_string()],
                ActiveItemsOrigin::DefaultStatus,
            );
        }

        ResolvedFacet {
            definition: facet.clone(),
            operator: facet.operator,
            active_items: Vec::new(),
            origin: ActiveItemsOrigin::Inactive,
        }
    }

    /// Resolve every facet in order.
    pub fn resolve_all(&self, facets: &[FacetDefinition]) -> Vec<ResolvedFacet> {
        facets.iter().map(|f| self.resolve(f)).collect()
    }
}
