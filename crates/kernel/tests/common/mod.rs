#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Shared site for list integration tests.
//!
//! The site is built with the test-utils fixture builders and loaded through
//! the same fixture path the CLI uses, so tests exercise the real in-memory
//! backends end to end.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

use list_pages::config::EngineConfig;
use list_pages::fixture::{SiteFixture, SiteServices};
use list_pages::index::{Condition, ConditionGroup, ConditionNode, SearchQuery};
use list_pages::list::{ListExecution, ListPageConfiguration, ListRequest};
use list_pages::query_type::BuiltFacet;
use list_pages_test_utils::{
    TestSite, facet_source, list_configuration, test_entity, test_facet, test_index, test_site,
    test_term,
};

/// Facet source of the article list.
pub fn articles_source() -> String {
    facet_source("node", "article")
}

/// Request time used by every test: 1 January 2025.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

/// Articles about science and art, tagged from a small term tree:
///
/// ```text
/// 42 Science
/// ├── 43 Physics
/// └── 44 Biology
/// 50 Arts
/// ```
pub fn site() -> TestSite {
    let source = articles_source();
    test_site()
        .with_index(
            test_index("content")
                .with_datasource("node", &["article", "page"])
                .with_field("title", "string")
                .with_boolean_field("status", "Published", "Unpublished")
                .with_reference_field("category", "taxonomy_term")
                .with_reference_field("author", "user")
                .with_defined_field(
                    "related",
                    "string",
                    json!({ "name": "related", "type": "link" }),
                )
                .with_field("created", "date")
                .with_field("event_date", "date")
                .with_field("body", "fulltext"),
        )
        .with_entities([
            test_term("42", "Science", &[]),
            test_term("43", "Physics", &["42"]),
            test_term("44", "Biology", &["42"]),
            test_term("50", "Arts", &[]),
            test_entity("user", "user", "1", "Alice"),
            test_entity("user", "user", "2", "Bob"),
            test_entity("node", "article", "1", "Quantum leaps")
                .with_values("status", &["1"])
                .with_values("category", &["43"])
                .with_values("author", &["1"])
                .with_values("related", &["entity:node/4"])
                .with_values("created", &["2020-01-15"])
                .with_values("event_date", &["2030-05-01"])
                .with_values("body", &["Particles and waves"]),
            test_entity("node", "article", "2", "Cells")
                .with_values("status", &["1"])
                .with_values("category", &["44"])
                .with_values("author", &["2"])
                .with_values("created", &["2020-02-10"])
                .with_values("event_date", &["2019-03-01"])
                .with_values("body", &["Membranes and particles"]),
            test_entity("node", "article", "3", "Draft on science")
                .with_values("status", &["0"])
                .with_values("category", &["42"])
                .with_values("author", &["1"])
                .with_values("created", &["2020-01-31"]),
            test_entity("node", "article", "4", "Painting")
                .with_values("status", &["1"])
                .with_values("category", &["50"])
                .with_values("author", &["2"])
                .with_values("related", &["entity:node/1"])
                .with_values("created", &["2021-06-01"])
                .with_values("event_date", &["2031-01-01"]),
            test_entity("node", "page", "5", "About")
                .with_values("status", &["1"])
                .with_values("category", &["42"]),
        ])
        .with_facet(test_facet("status", "status", &source).with_default_status("1"))
        .with_facet(
            test_facet("category", "category", &source)
                .with_operator("OR_WITH_HIERARCHY")
                .with_missing("No category"),
        )
        .with_facet(test_facet("author", "author", &source))
        .with_facet(test_facet("related", "related", &source))
        .with_facet(test_facet("created", "created", &source))
        .with_facet(test_facet("event_status", "event_date", &source).with_widget("date_status"))
        .with_facet(test_facet("search", "body", &source))
        .with_hierarchy("taxonomy_term")
        .with_list("articles", list_configuration("node", "article"))
        .with_list("pages", list_configuration("node", "page"))
}

/// Load a site into in-memory services.
pub fn services(site: &TestSite) -> SiteServices {
    SiteFixture::from_json(&site.to_json().to_string())
        .unwrap()
        .into_services(EngineConfig::default())
        .unwrap()
}

/// Parse a list configuration document.
pub fn configuration(value: Value) -> ListPageConfiguration {
    serde_json::from_value(value).unwrap()
}

/// Article list configuration with extra settings merged in.
pub fn articles_with(extra: Value) -> ListPageConfiguration {
    let mut base = list_configuration("node", "article");
    if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }
    configuration(base)
}

/// Request at the shared request time.
pub fn request(query_string: &str) -> ListRequest {
    ListRequest::new().with_query_string(query_string).with_now(now())
}

/// Execute a list, expecting it to render.
pub fn execute(
    services: &SiteServices,
    configuration: &ListPageConfiguration,
    request: &ListRequest,
) -> ListExecution {
    services
        .manager
        .execute_list(configuration, request)
        .unwrap()
        .expect("list should render")
}

/// Result entity ids in result order.
pub fn ids(execution: &ListExecution) -> Vec<String> {
    execution.results.items.iter().map(|i| i.entity_id.clone()).collect()
}

/// Result entity ids sorted numerically.
pub fn sorted_ids(execution: &ListExecution) -> Vec<String> {
    let mut ids = ids(execution);
    ids.sort_by_key(|id| id.parse::<u64>().unwrap_or(u64::MAX));
    ids
}

pub fn facet<'a>(execution: &'a ListExecution, id: &str) -> &'a BuiltFacet {
    execution
        .facets
        .iter()
        .find(|f| f.definition.id == id)
        .unwrap_or_else(|| panic!("facet {id} not built"))
}

/// Every condition of a query, nested groups flattened.
pub fn conditions(query: &SearchQuery) -> Vec<Condition> {
    fn collect(group: &ConditionGroup, out: &mut Vec<Condition>) {
        for node in &group.conditions {
            match node {
                ConditionNode::Condition(c) => out.push(c.clone()),
                ConditionNode::Group(g) => collect(g, out),
            }
        }
    }
    let mut out = Vec::new();
    collect(&query.root, &mut out);
    out
}

/// Conditions on one field.
pub fn conditions_on(query: &SearchQuery, field: &str) -> Vec<Condition> {
    conditions(query).into_iter().filter(|c| c.field == field).collect()
}
