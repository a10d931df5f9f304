//! Facets that feed their values into the fulltext search keys.

use super::{ExecutedFacet, PreparedFacet, QueryTypeContext, QueryTypeId, QueryTypeStrategy};
use crate::error::ListResult;
use crate::facet::FacetResult;
use crate::index::{
    ConditionOperator, FacetRequest, IndexFieldType, RawFacetValue, ResultSet, SearchQuery,
};

/// Keyword search on the facet's field.
///
/// Stemmed fulltext fields take lower-cased keywords. Unstemmed and plain
/// fields match each item exactly.
pub struct FulltextQueryType;

impl QueryTypeStrategy for FulltextQueryType {
    fn id(&self) -> QueryTypeId {
        QueryTypeId::Fulltext
    }

    fn execute(
        &self,
        ctx: &QueryTypeContext<'_>,
        query: &mut SearchQuery,
        facet: &PreparedFacet,
    ) -> ListResult<bool> {
        let definition = &facet.facet.definition;
        let field = definition.field_identifier.as_str();

        if ctx.index.field_type(field) == Some(IndexFieldType::Fulltext) {
            for item in &facet.items {
                query.add_key(item.to_lowercase());
            }
            if !definition.widget.search_all_fields {
                query.add_fulltext_field(field);
            }
        } else {
            for item in &facet.items {
                query.add_condition(field, item.as_str(), ConditionOperator::Eq);
            }
        }
        Ok(true)
    }

    fn facet_request(&self, _facet: &PreparedFacet) -> Option<FacetRequest> {
        None
    }

    fn build(
        &self,
        _ctx: &QueryTypeContext<'_>,
        _facet: &ExecutedFacet,
        _raw: &[RawFacetValue],
        _results: &ResultSet,
    ) -> Vec<FacetResult> {
        Vec::new()
    }
}
