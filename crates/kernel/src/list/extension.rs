//! Extension points of list execution.
//!
//! Extensions are registered with an explicit weight and run lowest weight
//! first at fixed points of the pipeline. Equal weights keep registration
//! order.

use super::configuration::ListPageConfiguration;
use super::source::{ListSource, SortOption};
use crate::index::{ResultSet, SearchQuery};

// ---------------------------------------------------------------------------
// Extension trait
// ---------------------------------------------------------------------------

/// Hooks into list source discovery and list execution.
pub trait ListExtension: Send + Sync {
    /// Machine name, used in logs.
    fn id(&self) -> &str;

    /// Lower weights run first.
    fn weight(&self) -> i32 {
        0
    }

    /// Whether lists may be built from `source`.
    fn allows_source(&self, _source: &ListSource) -> bool {
        true
    }

    /// Add, remove or relabel sort options of a source.
    fn alter_sort_options(&self, _source: &ListSource, _options: &mut Vec<SortOption>) {}

    /// Change the query after all filters are applied, before it runs.
    fn alter_query(
        &self,
        _source: &ListSource,
        _configuration: &ListPageConfiguration,
        _query: &mut SearchQuery,
    ) {
    }

    /// Change the results before facets are built.
    fn alter_results(&self, _source: &ListSource, _results: &mut ResultSet) {}
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registered extensions in execution order.
#[derive(Default)]
pub struct ListExtensionRegistry {
    extensions: Vec<Box<dyn ListExtension>>,
}

impl ListExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extension, keeping the list ordered by weight.
    pub fn register(&mut self, extension: Box<dyn ListExtension>) {
        tracing::debug!(
            extension = extension.id(),
            weight = extension.weight(),
            "list extension registered"
        );
        self.extensions.push(extension);
        // Stable sort keeps registration order among equal weights.
        self.extensions.sort_by_key(|e| e.weight());
    }

    /// Extension ids in execution order.
    pub fn ids(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// A source is usable unless some extension vetoes it.
    pub fn allows_source(&self, source: &ListSource) -> bool {
        match self.extensions.iter().find(|e| !e.allows_source(source)) {
            Some(extension) => {
                tracing::debug!(
                    extension = extension.id(),
                    source = %source.id(),
                    "list source vetoed"
                );
                false
            }
            None => true,
        }
    }

    pub fn alter_sort_options(&self, source: &ListSource, options: &mut Vec<SortOption>) {
        for extension in &self.extensions {
            extension.alter_sort_options(source, options);
        }
    }

    pub fn alter_query(
        &self,
        source: &ListSource,
        configuration: &ListPageConfiguration,
        query: &mut SearchQuery,
    ) {
        for extension in &self.extensions {
            extension.alter_query(source, configuration, query);
        }
    }

    pub fn alter_results(&self, source: &ListSource, results: &mut ResultSet) {
        for extension in &self.extensions {
            extension.alter_results(source, results);
        }
    }
}
