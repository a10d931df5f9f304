//! Upcoming and past facets relative to the request time.

use tracing::debug;

use super::{ExecutedFacet, PreparedFacet, QueryTypeContext, QueryTypeId, QueryTypeStrategy};
use crate::error::ListResult;
use crate::facet::FacetResult;
use crate::filter::FilterOperator;
use crate::index::{
    ConditionGroup, ConditionOperator, ConditionValue, Conjunction, FacetRequest, MISSING_RAW_VALUE,
    RawFacetValue, ResultSet, SearchQuery, SortDirection, facet_tag,
};

/// Items dated after now, or not dated at all.
pub const UPCOMING: &str = "upcoming";

/// Items dated now or earlier.
pub const PAST: &str = "past";

/// Upcoming versus past relative to the request time.
///
/// Also orders the list on the same field: newest first when past items are
/// shown, soonest first otherwise.
pub struct DateStatusQueryType;

impl QueryTypeStrategy for DateStatusQueryType {
    fn id(&self) -> QueryTypeId {
        QueryTypeId::DateStatus
    }

    fn execute(
        &self,
        ctx: &QueryTypeContext<'_>,
        query: &mut SearchQuery,
        facet: &PreparedFacet,
    ) -> ListResult<bool> {
        let field = facet.facet.definition.field_identifier.as_str();
        let now = ctx.now.timestamp();
        let past = facet.items.iter().any(|i| i == PAST);
        let upcoming = facet.items.iter().any(|i| i == UPCOMING);

        let mut group = ConditionGroup::new(Conjunction::Or).with_tag(facet_tag(field));
        if past {
            group.add_condition(field, now, ConditionOperator::Lte);
        }
        if upcoming {
            let mut future = ConditionGroup::new(Conjunction::Or);
            future
                .add_condition(field, now, ConditionOperator::Gt)
                .add_condition(field, ConditionValue::Null, ConditionOperator::Eq);
            group.add_group(future);
        }
        if group.is_empty() {
            debug!(
                facet = %facet.facet.definition.id,
                items = ?facet.items,
                "no date status selected"
            );
            return Ok(false);
        }

        query.add_condition_group(group);
        let direction = if past { SortDirection::Desc } else { SortDirection::Asc };
        query.sort(field, direction);
        Ok(true)
    }

    fn facet_request(&self, facet: &PreparedFacet) -> Option<FacetRequest> {
        let definition = &facet.facet.definition;
        Some(FacetRequest {
            facet_id: definition.id.clone(),
            field: definition.field_identifier.clone(),
            operator: FilterOperator::Or,
            limit: 0,
            min_count: 1,
            missing: true,
        })
    }

    fn build(
        &self,
        ctx: &QueryTypeContext<'_>,
        facet: &ExecutedFacet,
        raw: &[RawFacetValue],
        _results: &ResultSet,
    ) -> Vec<FacetResult> {
        let now = ctx.now.timestamp();
        let (mut upcoming, mut past) = (0, 0);
        for value in raw {
            if value.raw == MISSING_RAW_VALUE {
                upcoming += value.count;
                continue;
            }
            match value.raw.parse::<i64>() {
                Ok(ts) if ts > now => upcoming += value.count,
                Ok(_) => past += value.count,
                Err(_) => debug!(raw = %value.raw, "non-timestamp date value skipped"),
            }
        }

        [(UPCOMING, "Upcoming", upcoming), (PAST, "Past", past)]
            .into_iter()
            .filter(|(_, _, count)| *count > 0)
            .map(|(raw, label, count)| {
                let mut result = FacetResult::new(raw, label, count);
                result.active = facet.facet.is_active_value(raw);
                result
            })
            .collect()
    }
}
