//! List Pages test utilities.
//!
//! Builders for site fixture documents (indexes, entities, facets and list
//! configurations) as JSON, plus assertion helpers. The documents match the
//! kernel's fixture format without depending on the kernel.

use serde_json::{Map, Value as JsonValue, json};

/// Facet source id of the list of `bundle` of `entity_type`.
pub fn facet_source(entity_type: &str, bundle: &str) -> String {
    format!("list_facet_source:{entity_type}:{bundle}")
}

/// Create a test entity.
pub fn test_entity(entity_type: &str, bundle: &str, id: &str, label: &str) -> TestEntity {
    TestEntity {
        entity_type: entity_type.to_string(),
        bundle: bundle.to_string(),
        id: id.to_string(),
        label: label.to_string(),
        langcode: "en".to_string(),
        fields: Map::new(),
        translations: Map::new(),
    }
}

/// Create a taxonomy term with optional parents.
pub fn test_term(id: &str, label: &str, parents: &[&str]) -> TestEntity {
    let term = test_entity("taxonomy_term", "tags", id, label);
    if parents.is_empty() {
        term
    } else {
        term.with_values("parent", parents)
    }
}

/// An entity builder.
#[derive(Debug, Clone)]
pub struct TestEntity {
    pub entity_type: String,
    pub bundle: String,
    pub id: String,
    pub label: String,
    pub langcode: String,
    pub fields: Map<String, JsonValue>,
    pub translations: Map<String, JsonValue>,
}

impl TestEntity {
    /// Set a field to a list of raw values.
    pub fn with_field(mut self, name: &str, values: JsonValue) -> Self {
        let values = match values {
            JsonValue::Array(_) => values,
            single => JsonValue::Array(vec![single]),
        };
        self.fields.insert(name.to_string(), values);
        self
    }

    /// Set a field to string values.
    pub fn with_values(self, name: &str, values: &[&str]) -> Self {
        self.with_field(name, json!(values))
    }

    /// Set the default language.
    pub fn with_langcode(mut self, langcode: &str) -> Self {
        self.langcode = langcode.to_string();
        self
    }

    /// Add a translated label.
    pub fn with_translation(mut self, langcode: &str, label: &str) -> Self {
        self.translations
            .insert(langcode.to_string(), json!({ "label": label }));
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "entity_type": self.entity_type,
            "bundle": self.bundle,
            "id": self.id,
            "label": self.label,
            "langcode": self.langcode,
            "fields": self.fields,
            "translations": self.translations,
        })
    }
}

/// Create a test index.
pub fn test_index(id: &str) -> TestIndex {
    TestIndex {
        id: id.to_string(),
        enabled: true,
        datasources: Vec::new(),
        fields: Vec::new(),
    }
}

/// An index definition builder.
#[derive(Debug, Clone)]
pub struct TestIndex {
    pub id: String,
    pub enabled: bool,
    pub datasources: Vec<JsonValue>,
    pub fields: Vec<JsonValue>,
}

impl TestIndex {
    /// Index `bundles` of `entity_type`.
    pub fn with_datasource(mut self, entity_type: &str, bundles: &[&str]) -> Self {
        self.datasources
            .push(json!({ "entity_type": entity_type, "bundles": bundles }));
        self
    }

    /// Add a field read from the entity property of the same name.
    pub fn with_field(mut self, id: &str, field_type: &str) -> Self {
        self.fields
            .push(json!({ "id": id, "label": id, "type": field_type }));
        self
    }

    /// Add a field with an entity field definition.
    pub fn with_defined_field(mut self, id: &str, field_type: &str, definition: JsonValue) -> Self {
        self.fields.push(json!({
            "id": id,
            "label": id,
            "type": field_type,
            "definition": definition,
        }));
        self
    }

    /// Add a string field referencing `target_type` entities.
    pub fn with_reference_field(self, id: &str, target_type: &str) -> Self {
        self.with_defined_field(
            id,
            "string",
            json!({
                "name": id,
                "label": id,
                "type": "entity_reference",
                "target_type": target_type,
            }),
        )
    }

    /// Add a boolean field with display labels.
    pub fn with_boolean_field(self, id: &str, on_label: &str, off_label: &str) -> Self {
        self.with_defined_field(
            id,
            "boolean",
            json!({
                "name": id,
                "label": id,
                "type": "boolean",
                "on_label": on_label,
                "off_label": off_label,
            }),
        )
    }

    /// Mark the index as disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "id": self.id,
            "label": self.id,
            "enabled": self.enabled,
            "datasources": self.datasources,
            "fields": self.fields,
        })
    }
}

/// Create a test facet on `field` of a facet source.
pub fn test_facet(id: &str, field: &str, source: &str) -> TestFacet {
    let mut settings = Map::new();
    settings.insert("id".to_string(), json!(id));
    settings.insert("label".to_string(), json!(id));
    settings.insert("field_identifier".to_string(), json!(field));
    settings.insert("facet_source_id".to_string(), json!(source));
    TestFacet { settings }
}

/// A facet definition builder.
#[derive(Debug, Clone)]
pub struct TestFacet {
    pub settings: Map<String, JsonValue>,
}

impl TestFacet {
    fn set(mut self, key: &str, value: JsonValue) -> Self {
        self.settings.insert(key.to_string(), value);
        self
    }

    pub fn with_operator(self, operator: &str) -> Self {
        self.set("operator", json!(operator))
    }

    pub fn with_default_status(self, status: &str) -> Self {
        self.set("default_status", json!(status))
    }

    pub fn with_url_alias(self, alias: &str) -> Self {
        self.set("url_alias", json!(alias))
    }

    pub fn with_widget(self, widget: &str) -> Self {
        self.set("widget", json!({ "id": widget }))
    }

    pub fn with_query_type(self, query_type: &str) -> Self {
        self.set("query_type", json!(query_type))
    }

    pub fn with_weight(self, weight: i32) -> Self {
        self.set("weight", json!(weight))
    }

    pub fn with_missing(self, label: &str) -> Self {
        self.set("missing", json!(true)).set("missing_label", json!(label))
    }

    pub fn excluding(self) -> Self {
        self.set("exclude", json!(true))
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.settings.clone())
    }
}

/// Create an empty site fixture.
pub fn test_site() -> TestSite {
    TestSite::default()
}

/// A site fixture builder.
#[derive(Debug, Clone, Default)]
pub struct TestSite {
    pub indexes: Vec<JsonValue>,
    pub entities: Vec<JsonValue>,
    pub facets: Vec<JsonValue>,
    pub hierarchies: Vec<JsonValue>,
    pub lists: Map<String, JsonValue>,
}

impl TestSite {
    pub fn with_index(mut self, index: TestIndex) -> Self {
        self.indexes.push(index.to_json());
        self
    }

    pub fn with_entity(mut self, entity: TestEntity) -> Self {
        self.entities.push(entity.to_json());
        self
    }

    pub fn with_entities(self, entities: impl IntoIterator<Item = TestEntity>) -> Self {
        entities.into_iter().fold(self, Self::with_entity)
    }

    pub fn with_facet(mut self, facet: TestFacet) -> Self {
        self.facets.push(facet.to_json());
        self
    }

    /// Build a hierarchy for `entity_type` from its `parent` field.
    pub fn with_hierarchy(mut self, entity_type: &str) -> Self {
        self.hierarchies
            .push(json!({ "entity_type": entity_type, "parent_field": "parent" }));
        self
    }

    /// Add a named list configuration.
    pub fn with_list(mut self, name: &str, configuration: JsonValue) -> Self {
        self.lists.insert(name.to_string(), configuration);
        self
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "indexes": self.indexes,
            "entities": self.entities,
            "facets": self.facets,
            "hierarchies": self.hierarchies,
            "lists": self.lists,
        })
    }
}

/// Configuration listing `bundle` of `entity_type`.
pub fn list_configuration(entity_type: &str, bundle: &str) -> JsonValue {
    json!({ "entity_type": entity_type, "bundle": bundle })
}

/// Assertion helpers for JSON documents.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{key}', got: {value}"
        );
    }

    /// Assert that a JSON value equals expected.
    pub fn json_eq(actual: &Value, expected: &Value) {
        assert_eq!(
            actual,
            expected,
            "JSON mismatch:\nactual: {}\nexpected: {}",
            serde_json::to_string_pretty(actual).unwrap_or_default(),
            serde_json::to_string_pretty(expected).unwrap_or_default()
        );
    }

    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }
}
