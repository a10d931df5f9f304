#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Facet resolution integration tests.
//!
//! Layer precedence, default status, hierarchy expansion, labels of facet
//! options and list extensions, exercised through full list executions.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{articles_with, conditions_on, execute, facet, request, services, site, sorted_ids};
use list_pages::entity::{Entity, EntityLookup};
use list_pages::field_type::{FieldDefinition, FieldKind, FieldTypeContext, FieldTypeRegistry};
use list_pages::hierarchy::{HierarchyDirection, HierarchyResolver, TermHierarchy};
use list_pages::index::{ResultSet, SearchQuery};
use list_pages::list::{ListExtension, ListExtensionRegistry, ListPageConfiguration, ListSource};

// -------------------------------------------------------------------------
// Layer precedence
// -------------------------------------------------------------------------

#[test]
fn url_values_beat_preset_values() {
    let services = services(&site());
    let configuration = articles_with(json!({
        "preset_filters": [{ "facet_id": "category", "operator": "OR", "values": ["50"] }],
    }));

    let execution = execute(&services, &configuration, &request("f[0]=category:44"));
    assert_eq!(facet(&execution, "category").active_items, vec!["44"]);
    assert_eq!(sorted_ids(&execution), vec!["2"]);
}

#[test]
fn contextual_values_beat_preset_values() {
    let services = services(&site());
    let configuration = articles_with(json!({
        "preset_filters": [{ "facet_id": "category", "values": ["50"] }],
        "contextual_filters": [{ "facet_id": "category", "source": "values", "values": ["44"] }],
    }));
    let current = services.entities.load("node", "1").unwrap();

    let execution = execute(&services, &configuration, &request("").with_current_entity(current));
    assert_eq!(facet(&execution, "category").active_items, vec!["44"]);
    assert_eq!(sorted_ids(&execution), vec!["2"]);
}

#[test]
fn preset_values_beat_default_status() {
    let services = services(&site());
    let configuration = articles_with(json!({
        "preset_filters": [{ "facet_id": "status", "values": ["0"] }],
    }));

    let execution = execute(&services, &configuration, &request(""));
    assert_eq!(facet(&execution, "status").active_items, vec!["0"]);
    assert_eq!(sorted_ids(&execution), vec!["3"]);
}

#[test]
fn presets_can_be_switched_off() {
    let services = services(&site());
    let configuration = articles_with(json!({
        "preset_filters": [{ "facet_id": "status", "values": ["0"] }],
        "default_filter_values_allowed": false,
    }));

    let execution = execute(&services, &configuration, &request(""));
    assert_eq!(facet(&execution, "status").active_items, vec!["1"]);
    assert_eq!(sorted_ids(&execution), vec!["1", "2", "4"]);
}

#[test]
fn url_items_on_another_facet_clear_default_status() {
    let services = services(&site());
    let execution = execute(&services, &services.lists["articles"], &request("f[0]=author:2"));

    assert!(facet(&execution, "status").active_items.is_empty());
    assert_eq!(facet(&execution, "author").active_items, vec!["2"]);
}

#[test]
fn unexposed_facets_ignore_url_values() {
    let services = services(&site());
    let configuration = articles_with(json!({
        "exposed_filters_overridden": true,
        "exposed_filters": { "author": false, "status": true },
    }));

    let execution = execute(&services, &configuration, &request("f[0]=author:1"));
    assert!(execution.url_state.is_empty());
    // Nothing came from the URL, so default status applies again.
    assert_eq!(sorted_ids(&execution), vec!["1", "2", "4"]);
}

// -------------------------------------------------------------------------
// Hierarchy
// -------------------------------------------------------------------------

#[test]
fn hierarchy_expansion_is_stable() {
    let terms = [
        Entity::new("taxonomy_term", "tags", "42", "Science"),
        Entity::new("taxonomy_term", "tags", "43", "Physics").with_field("parent", ["42"]),
    ];
    let mut resolver = HierarchyResolver::new();
    resolver.register(
        "taxonomy_term",
        Box::new(TermHierarchy::from_entities(&terms, "parent", HierarchyDirection::Descendants)),
    );

    let once = resolver.get_hierarchy("taxonomy_term", "42");
    assert_eq!(once, vec!["42", "43"]);
    assert_eq!(resolver.get_hierarchy("taxonomy_term", "42"), once);
    assert!(resolver.get_hierarchy("user", "1").is_empty());
}

#[test]
fn selecting_a_descendant_again_changes_nothing() {
    let services = services(&site());
    let parent = execute(&services, &services.lists["articles"], &request("f[0]=category:42"));
    let both = execute(
        &services,
        &services.lists["articles"],
        &request("f[0]=category:42&f[1]=category:43"),
    );
    assert_eq!(sorted_ids(&parent), sorted_ids(&both));
}

#[test]
fn hierarchy_operator_without_handler_matches_literally() {
    let services = services(&site());
    let preset = |operator: &str| -> ListPageConfiguration {
        articles_with(json!({
            "preset_filters": [{ "facet_id": "author", "operator": operator, "values": ["1"] }],
        }))
    };

    let plain = execute(&services, &preset("OR"), &request(""));
    let expanded = execute(&services, &preset("OR_WITH_HIERARCHY"), &request(""));

    assert_eq!(sorted_ids(&plain), vec!["1"]);
    assert_eq!(sorted_ids(&expanded), sorted_ids(&plain));
    assert_eq!(
        conditions_on(&expanded.query, "author"),
        conditions_on(&plain.query, "author")
    );
}

// -------------------------------------------------------------------------
// Labels
// -------------------------------------------------------------------------

#[test]
fn options_use_field_labels() {
    let services = services(&site());
    let execution = execute(&services, &services.lists["articles"], &request(""));

    let status = facet(&execution, "status");
    let published = status.results.iter().find(|r| r.raw_value == "1").unwrap();
    assert_eq!(published.display_value, "Published");
    assert!(published.active);

    let category = facet(&execution, "category");
    let arts = category.results.iter().find(|r| r.raw_value == "50").unwrap();
    assert_eq!(arts.display_value, "Arts");

    let related = facet(&execution, "related");
    let quantum = related.results.iter().find(|r| r.raw_value == "entity:node/1").unwrap();
    assert_eq!(quantum.display_value, "Quantum leaps (1)");
}

#[test]
fn deleted_targets_fall_back_to_raw_values() {
    let services = services(&site());
    services.entities.delete("taxonomy_term", "50");
    services.entities.delete("node", "4");

    let execution = execute(&services, &services.lists["articles"], &request(""));

    let category = facet(&execution, "category");
    let arts = category.results.iter().find(|r| r.raw_value == "50").unwrap();
    assert_eq!(arts.display_value, "50");

    let related = facet(&execution, "related");
    let painting = related.results.iter().find(|r| r.raw_value == "entity:node/4").unwrap();
    assert_eq!(painting.display_value, "entity:node/4");
}

#[test]
fn default_value_labels_survive_deleted_entities() {
    let services = services(&site());
    let registry = FieldTypeRegistry::new();

    let category = FieldDefinition::new(
        "category",
        "Category",
        FieldKind::EntityReference {
            target_type: "taxonomy_term".into(),
            handler: "default".into(),
            target_bundles: vec!["tags".into()],
        },
    );
    let values = vec!["42".to_string(), "43".to_string()];
    services.entities.delete("taxonomy_term", "43");

    let ctx = FieldTypeContext::new(Some(&category), services.entities.as_ref(), "en");
    let strategy = registry.strategy_for(Some(&category));
    assert_eq!(strategy.default_values(&ctx, &values).len(), 1);
    assert_eq!(strategy.default_values_label(&ctx, &values), "Science");

    let related = FieldDefinition::new("related", "Related", FieldKind::Link);
    let links = vec!["entity:node/1".to_string(), "entity:node/4".to_string()];
    services.entities.delete("node", "4");

    let ctx = FieldTypeContext::new(Some(&related), services.entities.as_ref(), "en");
    let strategy = registry.strategy_for(Some(&related));
    assert_eq!(
        strategy.default_values_label(&ctx, &links),
        "Quantum leaps (1), entity:node/4"
    );
}

// -------------------------------------------------------------------------
// Extensions
// -------------------------------------------------------------------------

struct OnlyFirstPage;

impl ListExtension for OnlyFirstPage {
    fn id(&self) -> &str {
        "only_first_page"
    }

    fn alter_query(&self, _: &ListSource, _: &ListPageConfiguration, query: &mut SearchQuery) {
        query.range(0, 1);
    }

    fn alter_results(&self, _: &ListSource, results: &mut ResultSet) {
        results.facets.clear();
    }
}

struct NoPages;

impl ListExtension for NoPages {
    fn id(&self) -> &str {
        "no_pages"
    }

    fn allows_source(&self, source: &ListSource) -> bool {
        source.bundle != "page"
    }
}

#[test]
fn extensions_alter_queries_and_results() {
    let services = services(&site());
    let mut extensions = ListExtensionRegistry::new();
    extensions.register(Box::new(OnlyFirstPage));
    extensions.register(Box::new(NoPages));
    let manager = services.manager.with_extensions(Arc::new(extensions));

    let execution = manager
        .execute_list(&services.lists["articles"], &request(""))
        .unwrap()
        .unwrap();
    assert_eq!(execution.results.items.len(), 1);
    assert_eq!(execution.results.result_count, 3);
    assert!(facet(&execution, "category").results.is_empty());

    assert!(manager.execute_list(&services.lists["pages"], &request("")).unwrap().is_none());
    assert!(manager.list_sources().iter().all(|s| s.bundle != "page"));
}
