//! Plain value facets: OR/AND membership, NOT exclusion and the missing sentinel.

use super::{ExecutedFacet, PreparedFacet, QueryTypeContext, QueryTypeId, QueryTypeStrategy};
use crate::error::ListResult;
use crate::facet::{FacetResult, missing_sentinel, parse_missing_sentinel};
use crate::filter::FilterOperator;
use crate::index::{
    ConditionGroup, ConditionOperator, ConditionValue, Conjunction, MISSING_RAW_VALUE,
    RawFacetValue, ResultSet, SearchQuery, facet_tag,
};

/// Membership of raw values combined with AND, OR or NOT.
pub struct StringQueryType;

/// Build the membership group of a facet.
///
/// `expand` maps one raw value to the values it stands for; a single value
/// equal to the input becomes `=`/`<>`, anything else `IN`/`NOT IN`. The
/// missing-value sentinel `!(v1,...)` matches items holding none of the
/// listed values.
pub(crate) fn membership_group(
    field: &str,
    items: &[String],
    operator: FilterOperator,
    exclude: bool,
    mut expand: impl FnMut(&str) -> ListResult<Vec<String>>,
) -> ListResult<ConditionGroup> {
    let operator = operator.base();
    let negated = exclude != (operator == FilterOperator::Not);
    // NOT behaves as a negated OR. Negation flips the conjunction:
    // NOT (a AND b) is (!a OR !b), NOT (a OR b) is (!a AND !b).
    let conjunction = match (operator == FilterOperator::And, negated) {
        (true, false) | (false, true) => Conjunction::And,
        (true, true) | (false, false) => Conjunction::Or,
    };

    let mut group = ConditionGroup::new(conjunction).with_tag(facet_tag(field));
    for item in items {
        if let Some(others) = parse_missing_sentinel(item) {
            let mut expanded = Vec::new();
            for value in &others {
                for id in expand(value)? {
                    if !expanded.contains(&id) {
                        expanded.push(id);
                    }
                }
            }
            if expanded.is_empty() {
                let op = if negated { ConditionOperator::Ne } else { ConditionOperator::Eq };
                group.add_condition(field, ConditionValue::Null, op);
            } else {
                let op = if negated { ConditionOperator::In } else { ConditionOperator::NotIn };
                group.add_condition(field, ConditionValue::List(expanded), op);
            }
            continue;
        }

        let expanded = expand(item)?;
        match expanded.as_slice() {
            [single] if single == item => {
                let op = if negated { ConditionOperator::Ne } else { ConditionOperator::Eq };
                group.add_condition(field, item.as_str(), op);
            }
            _ => {
                let op = if negated { ConditionOperator::NotIn } else { ConditionOperator::In };
                group.add_condition(field, ConditionValue::List(expanded), op);
            }
        }
    }
    Ok(group)
}

/// Facet results for raw values, labelled through the field type.
pub(crate) fn build_results(
    ctx: &QueryTypeContext<'_>,
    facet: &ExecutedFacet,
    raw: &[RawFacetValue],
) -> Vec<FacetResult> {
    let definition = &facet.facet.definition;
    let field = definition.field_identifier.as_str();
    let regular: Vec<String> = raw
        .iter()
        .filter(|r| r.raw != MISSING_RAW_VALUE)
        .map(|r| r.raw.clone())
        .collect();

    let mut results: Vec<FacetResult> = raw
        .iter()
        .filter(|r| r.count >= definition.min_count || facet.facet.is_active_value(&r.raw))
        .filter_map(|r| {
            if r.raw == MISSING_RAW_VALUE {
                if !definition.missing {
                    return None;
                }
                let mut result = FacetResult::new(
                    missing_sentinel(&regular),
                    &definition.missing_label,
                    r.count,
                );
                result.active =
                    facet.facet.active_items.iter().any(|a| parse_missing_sentinel(a).is_some());
                return Some(result);
            }
            let mut result = FacetResult::new(&r.raw, ctx.display_label(field, &r.raw), r.count);
            result.active = facet.facet.is_active_value(&r.raw);
            Some(result)
        })
        .collect();

    if definition.hard_limit > 0 {
        results.truncate(definition.hard_limit);
    }
    results
}

impl QueryTypeStrategy for StringQueryType {
    fn id(&self) -> QueryTypeId {
        QueryTypeId::String
    }

    fn execute(
        &self,
        _ctx: &QueryTypeContext<'_>,
        query: &mut SearchQuery,
        facet: &PreparedFacet,
    ) -> ListResult<bool> {
        let definition = &facet.facet.definition;
        let group = membership_group(
            &definition.field_identifier,
            &facet.items,
            facet.facet.operator,
            definition.exclude,
            |value| Ok(vec![value.to_string()]),
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
