//! Facets whose selected values expand to their hierarchy descendants.

use tracing::debug;

use super::string::{build_results, membership_group};
use super::{ExecutedFacet, PreparedFacet, QueryTypeContext, QueryTypeId, QueryTypeStrategy};
use crate::error::{ListError, ListResult};
use crate::facet::FacetResult;
use crate::field_type::FieldDefinition;
use crate::hierarchy::HierarchyLookup;
use crate::index::{RawFacetValue, ResultSet, SearchQuery};

/// Membership with `*_WITH_HIERARCHY` operators expanding each value.
///
/// Without a hierarchy operator this behaves exactly like the string type.
/// Entity types without a hierarchy handler match values literally. A value
/// unknown to an existing handler is a configuration error.
pub struct HierarchyQueryType;

impl QueryTypeStrategy for HierarchyQueryType {
    fn id(&self) -> QueryTypeId {
        QueryTypeId::Hierarchy
    }

    fn execute(
        &self,
        ctx: &QueryTypeContext<'_>,
        query: &mut SearchQuery,
        facet: &PreparedFacet,
    ) -> ListResult<bool> {
        let definition = &facet.facet.definition;
        let operator = facet.facet.operator;
        let target_type = ctx
            .field_definition(&definition.field_identifier)
            .and_then(FieldDefinition::target_type);

        let group = membership_group(
            &definition.field_identifier,
            &facet.items,
            operator,
            definition.exclude,
            |value| {
                let Some(target_type) = target_type.filter(|_| operator.with_hierarchy()) else {
                    return Ok(vec![value.to_string()]);
                };
                match ctx.hierarchy.lookup(target_type, value) {
                    HierarchyLookup::Resolved(ids) => Ok(ids),
                    HierarchyLookup::Unsupported => {
                        debug!(
                            facet = %definition.id,
                            target_type,
                            "entity type has no hierarchy; matching literally"
                        );
                        Ok(vec![value.to_string()])
                    }
                    HierarchyLookup::NotFound => Err(ListError::HierarchyUnresolvable {
                        entity_type: target_type.to_string(),
                        value: value.to_string(),
                    }),
                }
            },
        )?;

        let applied = !group.is_empty();
        query.add_condition_group(group);
        Ok(applied)
    }

    fn build(
        &self,
        ctx: &QueryTypeContext<'_>,
        facet: &ExecutedFacet,
        raw: &[RawFacetValue],
        _results: &ResultSet,
    ) -> Vec<FacetResult> {
        build_results(ctx, facet, raw)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::super::test_support::*;
    use super::super::StringQueryType;
    use super::*;
    use crate::filter::FilterOperator;
    use crate::index::{ConditionOperator, ConditionValue};

    fn run(field: &str, operator: FilterOperator, items: &[&str]) -> ListResult<SearchQuery> {
        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut query = SearchQuery::new("content");
        let facet = resolved(field, operator, items);
        let prepared = prepared(QueryTypeId::Hierarchy, facet, &HierarchyQueryType);
        HierarchyQueryType.execute(&ctx, &mut query, &prepared)?;
        Ok(query)
    }

    #[test]
    fn or_with_hierarchy_expands_to_in() {
        let query = run("category", FilterOperator::OrWithHierarchy, &["42"]).unwrap();
        let conds = query.find_conditions("category");

        assert_eq!(conds.len(), 1);
        assert_eq!(conds[0].operator, ConditionOperator::In);
        assert_eq!(
            conds[0].value,
            ConditionValue::List(vec!["42".into(), "43".into(), "44".into()])
        );
    }

    #[test]
    fn not_with_hierarchy_expands_to_not_in() {
        let query = run("category", FilterOperator::NotWithHierarchy, &["42"]).unwrap();
        let conds = query.find_conditions("category");
        assert_eq!(conds[0].operator, ConditionOperator::NotIn);
    }

    #[test]
    fn leaf_term_stays_equality() {
        let query = run("category", FilterOperator::OrWithHierarchy, &["43"]).unwrap();
        let conds = query.find_conditions("category");
        assert_eq!(conds[0].operator, ConditionOperator::Eq);
        assert_eq!(conds[0].value, ConditionValue::Text("43".into()));
    }

    #[test]
    fn unknown_term_is_a_hard_error() {
        let err = run("category", FilterOperator::OrWithHierarchy, &["99"]).unwrap_err();
        assert!(matches!(err, ListError::HierarchyUnresolvable { ref value, .. } if value == "99"));

        let err = run("category", FilterOperator::OrWithHierarchy, &["!(99)"]).unwrap_err();
        assert!(matches!(err, ListError::HierarchyUnresolvable { .. }));
    }

    #[test]
    fn plain_operator_is_literal() {
        let query = run("category", FilterOperator::Or, &["42"]).unwrap();
        let conds = query.find_conditions("category");
        assert_eq!(conds[0].operator, ConditionOperator::Eq);
    }

    #[test]
    fn no_handler_matches_like_plain_operator() {
        let hierarchical = run("author", FilterOperator::OrWithHierarchy, &["7"]).unwrap();

        let fixture = Fixture::new();
        let ctx = fixture.ctx();
        let mut plain = SearchQuery::new("content");
        let prepared = prepared(
            QueryTypeId::String,
            resolved("author", FilterOperator::Or, &["7"]),
            &StringQueryType,
        );
        StringQueryType.execute(&ctx, &mut plain, &prepared).unwrap();

        assert_eq!(hierarchical.root, plain.root);
    }

    #[test]
    fn missing_sentinel_expands_listed_values() {
        let query = run("category", FilterOperator::OrWithHierarchy, &["!(42)"]).unwrap();
        let conds = query.find_conditions("category");
        assert_eq!(conds[0].operator, ConditionOperator::NotIn);
        assert_eq!(
            conds[0].value,
            ConditionValue::List(vec!["42".into(), "43".into(), "44".into()])
        );
    }
}
