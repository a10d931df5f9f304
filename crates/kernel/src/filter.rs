//! Filter operators and normalized filter values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Suffix marking operators that expand values through a hierarchy.
const HIERARCHY_SUFFIX: &str = "_WITH_HIERARCHY";

/// Boolean operator applied to a filter's values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "AND", alias = "and")]
    And,
    #[default]
    #[serde(rename = "OR", alias = "or")]
    Or,
    #[serde(rename = "NOT", alias = "not")]
    Not,
    #[serde(rename = "AND_WITH_HIERARCHY", alias = "and_with_hierarchy")]
    AndWithHierarchy,
    #[serde(rename = "OR_WITH_HIERARCHY", alias = "or_with_hierarchy")]
    OrWithHierarchy,
    #[serde(rename = "NOT_WITH_HIERARCHY", alias = "not_with_hierarchy")]
    NotWithHierarchy,
}

impl FilterOperator {
    /// Wire name of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::And => "AND",
            FilterOperator::Or => "OR",
            FilterOperator::Not => "NOT",
            FilterOperator::AndWithHierarchy => "AND_WITH_HIERARCHY",
            FilterOperator::OrWithHierarchy => "OR_WITH_HIERARCHY",
            FilterOperator::NotWithHierarchy => "NOT_WITH_HIERARCHY",
        }
    }

    /// The operator with any hierarchy suffix stripped.
    pub fn base(self) -> FilterOperator {
        match self {
            FilterOperator::AndWithHierarchy => FilterOperator::And,
            FilterOperator::OrWithHierarchy => FilterOperator::Or,
            FilterOperator::NotWithHierarchy => FilterOperator::Not,
            other => other,
        }
    }

    /// Whether values are expanded through a hierarchy before matching.
    pub fn with_hierarchy(self) -> bool {
        self.as_str().ends_with(HIERARCHY_SUFFIX)
    }

    /// Whether the operator negates membership.
    pub fn is_negated(self) -> bool {
        self.base() == FilterOperator::Not
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown operator name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter operator '{0}'")]
pub struct UnknownOperator(pub String);

impl FromStr for FilterOperator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(FilterOperator::And),
            "OR" => Ok(FilterOperator::Or),
            "NOT" => Ok(FilterOperator::Not),
            "AND_WITH_HIERARCHY" => Ok(FilterOperator::AndWithHierarchy),
            "OR_WITH_HIERARCHY" => Ok(FilterOperator::OrWithHierarchy),
            "NOT_WITH_HIERARCHY" => Ok(FilterOperator::NotWithHierarchy),
            _ => Err(UnknownOperator(s.to_string())),
        }
    }
}

/// One filter's operator and raw values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterValue {
    /// Operator combining the values.
    #[serde(default)]
    pub operator: FilterOperator,

    /// Raw, facet-storable values.
    #[serde(default)]
    pub values: Vec<String>,
}

impl FilterValue {
    /// Create a normalized filter value.
    pub fn new<I, S>(operator: FilterOperator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operator,
            values: values.into_iter().map(Into::into).collect(),
        }
        .normalized()
    }

    /// Trim values, drop empty ones and duplicates, keeping first-seen order.
    pub fn normalized(mut self) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.values = self
            .values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty() && seen.insert(v.clone()))
            .collect();
        self
    }

    /// Append values from another filter on the same facet.
    pub fn merge(&mut self, other: FilterValue) {
        self.values.extend(other.values);
        let merged = std::mem::take(self).normalized();
        *self = merged;
    }

    /// Whether the filter carries no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn base_strips_hierarchy_suffix() {
        assert_eq!(FilterOperator::AndWithHierarchy.base(), FilterOperator::And);
        assert_eq!(FilterOperator::OrWithHierarchy.base(), FilterOperator::Or);
        assert_eq!(FilterOperator::NotWithHierarchy.base(), FilterOperator::Not);
        assert_eq!(FilterOperator::Or.base(), FilterOperator::Or);
    }

    #[test]
    fn with_hierarchy_flags() {
        assert!(FilterOperator::OrWithHierarchy.with_hierarchy());
        assert!(!FilterOperator::Not.with_hierarchy());
        assert!(FilterOperator::NotWithHierarchy.is_negated());
        assert!(!FilterOperator::And.is_negated());
    }

    #[test]
    fn parse_accepts_lowercase() {
        assert_eq!("and".parse::<FilterOperator>(), Ok(FilterOperator::And));
        assert_eq!(
            " or_with_hierarchy ".parse::<FilterOperator>(),
            Ok(FilterOperator::OrWithHierarchy)
        );
        assert!("xor".parse::<FilterOperator>().is_err());
    }

    #[test]
    fn operator_serde_uses_wire_names() {
        let json = serde_json::to_string(&FilterOperator::NotWithHierarchy).unwrap();
        assert_eq!(json, "\"NOT_WITH_HIERARCHY\"");
        let parsed: FilterOperator = serde_json::from_str("\"and\"").unwrap();
        assert_eq!(parsed, FilterOperator::And);
    }

    #[test]
    fn filter_value_normalizes() {
        let value = FilterValue::new(FilterOperator::Or, [" 1 ", "", "2", "1"]);
        assert_eq!(value.values, vec!["1", "2"]);
    }

    #[test]
    fn filter_value_merge_dedupes() {
        let mut value = FilterValue::new(FilterOperator::And, ["a", "b"]);
        value.merge(FilterValue::new(FilterOperator::Or, ["b", "c"]));
        assert_eq!(value.operator, FilterOperator::And);
        assert_eq!(value.values, vec!["a", "b", "c"]);
    }
}
