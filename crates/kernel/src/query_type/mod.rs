//! Query type strategies.
//!
//! A query type turns a facet's active items into query conditions and turns
//! the backend's raw counts back into facet results. Each facet moves through
//! the pipeline once per request:
//!
//! `ResolvedFacet -> PreparedFacet -> ExecutedFacet -> BuiltFacet`

mod date;
mod date_status;
mod fulltext;
mod hierarchy;
mod string;

pub use date::DateQueryType;
pub use date_status::{DateStatusQueryType, PAST, UPCOMING};
pub use fulltext::FulltextQueryType;
pub use hierarchy::HierarchyQueryType;
pub use string::StringQueryType;

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::EntityLookup;
use crate::error::ListResult;
use crate::facet::{FacetDefinition, FacetResult, ResolvedFacet};
use crate::field_type::{FieldDefinition, FieldTypeContext, FieldTypeRegistry};
use crate::hierarchy::HierarchyResolver;
use crate::index::{FacetRequest, IndexFieldType, IndexInfo, RawFacetValue, ResultSet, SearchQuery};

/// Query type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryTypeId {
    /// Keyword search, or exact match on unstemmed fields.
    Fulltext,
    /// Membership of raw values.
    String,
    /// Comparison against a day or a range of days.
    Date,
    /// Upcoming versus past relative to now.
    DateStatus,
    /// Membership expanded through a hierarchy.
    Hierarchy,
}

/// Widget id that turns a date facet into an upcoming/past switch.
pub const DATE_STATUS_WIDGET: &str = "date_status";

/// Widget id that turns any facet into a keyword search.
pub const FULLTEXT_WIDGET: &str = "fulltext";

/// Collaborators available to query types.
#[derive(Clone, Copy)]
pub struct QueryTypeContext<'a> {
    pub index: &'a IndexInfo,
    pub hierarchy: &'a HierarchyResolver,
    pub field_types: &'a FieldTypeRegistry,
    pub entities: &'a dyn EntityLookup,
    pub langcode: &'a str,
    pub now: DateTime<Utc>,
    pub timezone: FixedOffset,
}

impl<'a> QueryTypeContext<'a> {
    /// Entity field behind an index field.
    pub fn field_definition(&self, field_id: &str) -> Option<&'a FieldDefinition> {
        self.index.field(field_id).and_then(|f| f.definition.as_ref())
    }

    /// Field type context for labelling values of an index field.
    pub fn field_type_context(&self, field_id: &str) -> FieldTypeContext<'a> {
        FieldTypeContext::new(self.field_definition(field_id), self.entities, self.langcode)
    }

    /// Display label of a raw value of an index field.
    pub fn display_label(&self, field_id: &str, raw: &str) -> String {
        let field = self.field_definition(field_id);
        let ctx = self.field_type_context(field_id);
        self.field_types.strategy_for(field).display_label(&ctx, raw)
    }
}

/// A facet with active items in the shape its query type reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedFacet {
    pub facet: ResolvedFacet,
    pub query_type: QueryTypeId,
    /// Structured active items (date facets hold `[operator, date1, date2?]`).
    pub items: Vec<String>,
}

/// A facet whose conditions are on the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedFacet {
    pub facet: ResolvedFacet,
    pub query_type: QueryTypeId,
    pub items: Vec<String>,
    /// Whether the query was changed.
    pub applied: bool,
}

/// A facet with its result options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltFacet {
    pub definition: FacetDefinition,
    pub query_type: QueryTypeId,
    pub active_items: Vec<String>,
    pub results: Vec<FacetResult>,
}

/// One query type.
pub trait QueryTypeStrategy: Send + Sync {
    fn id(&self) -> QueryTypeId;

    /// Shape active items for [`QueryTypeStrategy::execute`].
    fn prepare(&self, facet: &ResolvedFacet) -> Vec<String> {
        facet.active_items.clone()
    }

    /// Add conditions for active items. Returns whether the query changed.
    fn execute(
        &self,
        ctx: &QueryTypeContext<'_>,
        query: &mut SearchQuery,
        facet: &PreparedFacet,
    ) -> ListResult<bool>;

    /// Counts the backend should report for the facet.
    fn facet_request(&self, facet: &PreparedFacet) -> Option<FacetRequest> {
        let definition = &facet.facet.definition;
        Some(FacetRequest {
            facet_id: definition.id.clone(),
            field: definition.field_identifier.clone(),
            operator: facet.facet.operator.base(),
            limit: 0,
            min_count: definition.min_count,
            missing: definition.missing,
        })
    }

    /// Facet results from raw counts.
    fn build(
        &self,
        ctx: &QueryTypeContext<'_>,
        facet: &ExecutedFacet,
        raw: &[RawFacetValue],
        results: &ResultSet,
    ) -> Vec<FacetResult>;
}

/// Query type strategies by id.
pub struct QueryTypeEngine {
    strategies: HashMap<QueryTypeId, Box<dyn QueryTypeStrategy>>,
}

impl Default for QueryTypeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTypeEngine {
    /// Engine with the built-in query types.
    pub fn new() -> Self {
        let mut engine = Self {
            strategies: HashMap::new(),
        };
        engine.register(Box::new(FulltextQueryType));
        engine.register(Box::new(StringQueryType));
        engine.register(Box::new(DateQueryType));
        engine.register(Box::new(DateStatusQueryType));
        engine.register(Box::new(HierarchyQueryType));
        engine
    }

    /// Add or replace a strategy.
    pub fn register(&mut self, strategy: Box<dyn QueryTypeStrategy>) {
        self.strategies.insert(strategy.id(), strategy);
    }

    /// Query type of a facet: the configured one, else derived from the
    /// field type, widget and hierarchy support.
    pub fn select(&self, ctx: &QueryTypeContext<'_>, definition: &FacetDefinition) -> QueryTypeId {
        if let Some(id) = definition.query_type {
            return id;
        }
        if definition.widget.id == FULLTEXT_WIDGET {
            return QueryTypeId::Fulltext;
        }
        match ctx.index.field_type(&definition.field_identifier) {
            Some(IndexFieldType::Fulltext | IndexFieldType::FulltextUnstemmed) => {
                QueryTypeId::Fulltext
            }
            Some(IndexFieldType::Date) if definition.widget.id == DATE_STATUS_WIDGET => {
                QueryTypeId::DateStatus
            }
            Some(IndexFieldType::Date) => QueryTypeId::Date,
            _ => {
                let hierarchical = ctx
                    .field_definition(&definition.field_identifier)
                    .and_then(FieldDefinition::target_type)
                    .is_some_and(|target| ctx.hierarchy.supports(target));
                if hierarchical {
                    QueryTypeId::Hierarchy
                } else {
                    QueryTypeId::String
                }
            }
        }
    }

    fn strategy(&self, id: QueryTypeId) -> Option<&dyn QueryTypeStrategy> {
        self.strategies.get(&id).map(|s| s.as_ref())
    }

    /// Select the query type and shape the active items.
    pub fn prepare(&self, ctx: &QueryTypeContext<'_>, facet: ResolvedFacet) -> PreparedFacet {
        let query_type = match self.select(ctx, &facet.definition) {
            // Preset and contextual layers may ask for hierarchy expansion on any membership facet.
            QueryTypeId::String if facet.operator.with_hierarchy() => QueryTypeId::Hierarchy,
            selected => selected,
        };
        let items = match self.strategy(query_type) {
            Some(strategy) => strategy.prepare(&facet),
            None => Vec::new(),
        };
        PreparedFacet {
            facet,
            query_type,
            items,
        }
    }

    /// Apply a facet to the query and request its counts.
    ///
    /// A facet whose query type is not registered leaves the query untouched.
    pub fn execute(
        &self,
        ctx: &QueryTypeContext<'_>,
        query: &mut SearchQuery,
        prepared: PreparedFacet,
    ) -> ListResult<ExecutedFacet> {
        let Some(strategy) = self.strategy(prepared.query_type) else {
            debug!(
                facet = %prepared.facet.definition.id,
                query_type = ?prepared.query_type,
                "no query type registered; facet ignored"
            );
            return Ok(ExecutedFacet {
                facet: prepared.facet,
                query_type: prepared.query_type,
                items: prepared.items,
                applied: false,
            });
        };

        let applied = if prepared.items.is_empty() {
            false
        } else {
            strategy.execute(ctx, query, &prepared)?
        };
        if let Some(request) = strategy.facet_request(&prepared) {
            query.add_facet(request);
        }

        Ok(ExecutedFacet {
            facet: prepared.facet,
            query_type: prepared.query_type,
            items: prepared.items,
            applied,
        })
    }

    /// Build facet results after the query ran.
    pub fn build(
        &self,
        ctx: &QueryTypeContext<'_>,
        executed: ExecutedFacet,
        results: &ResultSet,
    ) -> BuiltFacet {
        let raw = results
            .facets
            .get(&executed.facet.definition.id)
            .map(|v| v.as_slice())
            .unwrap_or_default();
        let facet_results = self
            .strategy(executed.query_type)
            .map(|strategy| strategy.build(ctx, &executed, raw, results))
            .unwrap_or_default();

        BuiltFacet {
            query_type: executed.query_type,
            active_items: executed.facet.active_items,
            definition: executed.facet.definition,
            results: facet_results,
        }
    }
}
