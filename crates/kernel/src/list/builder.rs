//! Presentation data for an executed list.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use super::execution::{ListExecution, ListExecutionManager};
use crate::entity::Entity;
use crate::facet::FacetDefinition;
use crate::query_type::BuiltFacet;

/// Paging state of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagerInfo {
    /// Zero-based current page.
    pub page: usize,
    pub per_page: usize,
    /// Matches across all pages.
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PagerInfo {
    /// Pager with derived page counts.
    pub fn new(total: usize, page: usize, per_page: usize) -> Self {
        let total_pages = if per_page > 0 { total.div_ceil(per_page) } else { 1 };
        Self {
            page,
            per_page,
            total,
            total_pages,
            has_next: page.saturating_add(1) < total_pages,
            has_prev: page > 0,
        }
    }
}

/// A URL filter value with a link removing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedFilter {
    pub facet_id: String,
    pub facet_label: String,
    pub raw_value: String,
    pub display_value: String,
    /// Query string with this value removed.
    pub remove_query_string: String,
}

/// One loaded result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem {
    pub item_id: String,
    pub score: f64,
    pub entity: Entity,
}

/// A list ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct ListBuild {
    pub items: Vec<ListItem>,
    pub pager: PagerInfo,
    pub facets: Vec<BuiltFacet>,
    pub selected_filters: Vec<SelectedFilter>,
    pub cache_tags: BTreeSet<String>,
    pub cache_contexts: BTreeSet<String>,
}

/// Builds rendering data from list executions.
pub struct ListBuilder<'a> {
    manager: &'a ListExecutionManager,
}

impl<'a> ListBuilder<'a> {
    pub fn new(manager: &'a ListExecutionManager) -> Self {
        Self { manager }
    }

    pub fn build(&self, execution: &ListExecution) -> ListBuild {
        ListBuild {
            items: self.load_items(execution),
            pager: PagerInfo::new(execution.results.result_count, execution.page, execution.limit),
            facets: execution.facets.clone(),
            selected_filters: self.selected_filters(execution),
            cache_tags: execution.cache_tags.clone(),
            cache_contexts: execution.cache_contexts.clone(),
        }
    }

    /// Result entities in result order. Entities deleted since indexing are skipped.
    fn load_items(&self, execution: &ListExecution) -> Vec<ListItem> {
        let entities = self.manager.entities();
        execution
            .results
            .items
            .iter()
            .filter_map(|item| {
                let Some(entity) = entities.load(&item.entity_type, &item.entity_id) else {
                    debug!(item = %item.id, "indexed entity no longer exists; skipped");
                    return None;
                };
                let langcode = execution.langcode.as_deref().unwrap_or(&item.langcode);
                Some(ListItem {
                    item_id: item.id.clone(),
                    score: item.score,
                    entity: entities.get_translation(&entity, langcode),
                })
            })
            .collect()
    }

    /// URL filter values of the list, with links removing each one.
    fn selected_filters(&self, execution: &ListExecution) -> Vec<SelectedFilter> {
        let definitions: Vec<FacetDefinition> =
            execution.facets.iter().map(|f| f.definition.clone()).collect();
        let mut selected = Vec::new();
        for facet in &execution.facets {
            let Some(values) = execution.url_state.get(&facet.definition.id) else {
                continue;
            };
            for value in values {
                let display_value = facet
                    .results
                    .iter()
                    .find(|r| &r.raw_value == value)
                    .map(|r| r.display_value.clone())
                    .unwrap_or_else(|| value.clone());
                let remaining = execution.url_state.without(&facet.definition.id, value);
                selected.push(SelectedFilter {
                    facet_id: facet.definition.id.clone(),
                    facet_label: facet.definition.label.clone(),
                    raw_value: value.clone(),
                    display_value,
                    remove_query_string: self.manager.url_processors().build(
                        &execution.facet_source,
                        &definitions,
                        &remaining,
                    ),
                });
            }
        }
        selected
    }
}
