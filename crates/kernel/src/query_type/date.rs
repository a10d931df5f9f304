//! Date facets: comparison operators and inclusive day ranges.

use chrono::{FixedOffset, NaiveDate, NaiveTime};
use tracing::debug;

use super::{ExecutedFacet, PreparedFacet, QueryTypeContext, QueryTypeId, QueryTypeStrategy};
use crate::error::ListResult;
use crate::facet::{FacetResult, ResolvedFacet};
use crate::index::{ConditionOperator, FacetRequest, RawFacetValue, ResultSet, SearchQuery};

/// Separator of the packed `op|date1|date2` URL form.
const PACKED_SEPARATOR: char = '|';

const DISPLAY_FORMAT: &str = "%-d %B %Y";

/// Comparison against a day (`gt`, `lt`) or an inclusive range of days (`bt`).
///
/// Active items are `[operator, date1, date2?]`. A single packed item
/// `bt|2020-01-01|2020-01-31` is unpacked during prepare.
pub struct DateQueryType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateOperator {
    After,
    Before,
    Between,
}

impl DateOperator {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gt" => Some(Self::After),
            "lt" => Some(Self::Before),
            "bt" => Some(Self::Between),
            _ => None,
        }
    }
}

/// A well-formed date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateFilter {
    operator: DateOperator,
    first: NaiveDate,
    second: Option<NaiveDate>,
}

impl DateFilter {
    /// `None` unless the operator and first date parse; `bt` also needs the second date.
    fn parse(items: &[String]) -> Option<Self> {
        let operator = DateOperator::parse(items.first()?)?;
        let first = parse_date(items.get(1)?)?;
        let second = items.get(2).and_then(|d| parse_date(d));
        if operator == DateOperator::Between && second.is_none() {
            return None;
        }
        Some(Self {
            operator,
            first,
            second,
        })
    }

    fn label(&self) -> String {
        match (self.operator, self.second) {
            (DateOperator::After, _) => format!("After {}", self.first.format(DISPLAY_FORMAT)),
            (DateOperator::Before, _) => format!("Before {}", self.first.format(DISPLAY_FORMAT)),
            (DateOperator::Between, Some(second)) => format!(
                "Between {} and {}",
                self.first.format(DISPLAY_FORMAT),
                second.format(DISPLAY_FORMAT)
            ),
            (DateOperator::Between, None) => String::new(),
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d-%m-%Y"))
        .ok()
}

/// Timestamp of the first second of `date` in `timezone`.
fn start_of_day(date: NaiveDate, timezone: FixedOffset) -> Option<i64> {
    date.and_time(NaiveTime::MIN)
        .and_local_timezone(timezone)
        .single()
        .map(|dt| dt.timestamp())
}

/// Timestamp of the last second of `date` in `timezone`.
fn end_of_day(date: NaiveDate, timezone: FixedOffset) -> Option<i64> {
    let last = NaiveTime::from_hms_opt(23, 59, 59)?;
    date.and_time(last)
        .and_local_timezone(timezone)
        .single()
        .map(|dt| dt.timestamp())
}

impl QueryTypeStrategy for DateQueryType {
    fn id(&self) -> QueryTypeId {
        QueryTypeId::Date
    }

    fn prepare(&self, facet: &ResolvedFacet) -> Vec<String> {
        match facet.active_items.as_slice() {
            [packed] if packed.contains(PACKED_SEPARATOR) => {
                packed.split(PACKED_SEPARATOR).map(str::to_string).collect()
            }
            items => items.to_vec(),
        }
    }

    fn execute(
        &self,
        ctx: &QueryTypeContext<'_>,
        query: &mut SearchQuery,
        facet: &PreparedFacet,
    ) -> ListResult<bool> {
        let field = facet.facet.definition.field_identifier.as_str();
        let Some(filter) = DateFilter::parse(&facet.items) else {
            debug!(
                facet = %facet.facet.definition.id,
                items = ?facet.items,
                "incomplete date filter ignored"
            );
            return Ok(false);
        };

        let tz = ctx.timezone;
        match filter.operator {
            DateOperator::After => {
                let Some(ts) = end_of_day(filter.first, tz) else {
                    return Ok(false);
                };
                query.add_condition(field, ts, ConditionOperator::Gt);
            }
            DateOperator::Before => {
                let Some(ts) = start_of_day(filter.first, tz) else {
                    return Ok(false);
                };
                query.add_condition(field, ts, ConditionOperator::Lt);
            }
            DateOperator::Between => {
                let from = start_of_day(filter.first, tz);
                let to = filter.second.and_then(|d| end_of_day(d, tz));
                let (Some(from), Some(to)) = (from, to) else {
                    return Ok(false);
                };
                query.add_condition(field, from, ConditionOperator::Gte);
                query.add_condition(field, to, ConditionOperator::Lte);
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
        facet: &ExecutedFacet,
        _raw: &[RawFacetValue],
        results: &ResultSet,
    ) -> Vec<FacetResult> {
        let Some(filter) = DateFilter::parse(&facet.items) else {
            return Vec::new();
        };
        let raw_value = facet.items.join(&PACKED_SEPARATOR.to_string());
        let mut result = FacetResult::new(raw_value, filter.label(), results.result_count);
        result.active = true;
        vec![result]
    }
}
