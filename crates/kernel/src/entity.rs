//! Entity records and storage lookup.
//!
//! The list engine never persists entities. It loads them to resolve
//! contextual filter values, reference labels, hierarchies and result items.

use std::collections::BTreeMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

fn default_langcode() -> String {
    "en".to_string()
}

/// A content entity (node, taxonomy term, user, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity type machine name (e.g., "node", "taxonomy_term").
    pub entity_type: String,

    /// Bundle machine name (e.g., "article").
    pub bundle: String,

    /// Entity identifier.
    pub id: String,

    /// Label in the entity's own language.
    pub label: String,

    /// Language of the default translation.
    #[serde(default = "default_langcode")]
    pub langcode: String,

    /// Field values keyed by field name. Multi-valued fields keep their delta order.
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<serde_json::Value>>,

    /// Translations keyed by langcode.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub translations: BTreeMap<String, EntityTranslation>,
}

/// Translated label and field overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTranslation {
    pub label: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<serde_json::Value>>,
}

impl Entity {
    /// Create an entity with no fields.
    pub fn new(
        entity_type: impl Into<String>,
        bundle: impl Into<String>,
        id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            bundle: bundle.into(),
            id: id.into(),
            label: label.into(),
            langcode: default_langcode(),
            fields: BTreeMap::new(),
            translations: BTreeMap::new(),
        }
    }

    /// Set a field's values.
    pub fn with_field<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        self.fields
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Add a translation.
    pub fn with_translation(
        mut self,
        langcode: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.translations.insert(
            langcode.into(),
            EntityTranslation {
                label: label.into(),
                fields: BTreeMap::new(),
            },
        );
        self
    }

    /// Raw values of a field (empty when the field is absent).
    pub fn field_values(&self, name: &str) -> &[serde_json::Value] {
        self.fields.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Field values flattened to the raw strings facets store.
    ///
    /// Reference items contribute their `target_id`, link items their `uri`,
    /// and formatted items their `value`.
    pub fn field_strings(&self, name: &str) -> Vec<String> {
        self.field_values(name)
            .iter()
            .filter_map(json_value_to_string)
            .collect()
    }

    /// Whether a translation exists for `langcode` (the default language counts).
    pub fn has_translation(&self, langcode: &str) -> bool {
        self.langcode == langcode || self.translations.contains_key(langcode)
    }

    /// The entity in `langcode`, or unchanged when no such translation exists.
    pub fn translation(&self, langcode: &str) -> Entity {
        let Some(translation) = self.translations.get(langcode) else {
            return self.clone();
        };
        let mut translated = self.clone();
        translated.langcode = langcode.to_string();
        translated.label = translation.label.clone();
        for (name, values) in &translation.fields {
            translated.fields.insert(name.clone(), values.clone());
        }
        translated.translations.clear();
        translated
    }

    /// Label as rendered by entity autocomplete widgets: `Label (id)`.
    pub fn autocomplete_label(&self) -> String {
        format!("{} ({})", self.label, self.id)
    }
}

/// Convert a stored field item into its raw string form.
///
/// Returns `None` for null values so missing data never matches.
pub fn json_value_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        serde_json::Value::Null => None,
        serde_json::Value::Object(map) => ["target_id", "uri", "value"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(json_value_to_string),
        serde_json::Value::Array(_) => None,
    }
}

/// Entity storage as seen by the list engine.
pub trait EntityLookup: Send + Sync {
    /// Load one entity; `None` when it does not exist (e.g., deleted).
    fn load(&self, entity_type: &str, id: &str) -> Option<Entity>;

    /// Load several entities, silently skipping missing ones.
    fn load_multiple(&self, entity_type: &str, ids: &[String]) -> Vec<Entity> {
        ids.iter()
            .filter_map(|id| self.load(entity_type, id))
            .collect()
    }

    /// The translation of `entity` for `langcode`, falling back to the entity itself.
    fn get_translation(&self, entity: &Entity, langcode: &str) -> Entity {
        entity.translation(langcode)
    }
}

/// In-memory entity storage.
#[derive(Default)]
pub struct MemoryEntityStore {
    entities: DashMap<(String, String), Entity>,
}

impl MemoryEntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `entities`.
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let store = Self::new();
        for entity in entities {
            store.insert(entity);
        }
        store
    }

    /// Insert or replace an entity.
    pub fn insert(&self, entity: Entity) {
        self.entities
            .insert((entity.entity_type.clone(), entity.id.clone()), entity);
    }

    /// Delete an entity. Returns whether it existed.
    pub fn delete(&self, entity_type: &str, id: &str) -> bool {
        self.entities
            .remove(&(entity_type.to_string(), id.to_string()))
            .is_some()
    }

    /// All entities of one type, ordered by id.
    pub fn entities_of_type(&self, entity_type: &str) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self
            .entities
            .iter()
            .filter(|e| e.key().0 == entity_type)
            .map(|e| e.value().clone())
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntityLookup for MemoryEntityStore {
    fn load(&self, entity_type: &str, id: &str) -> Option<Entity> {
        self.entities
            .get(&(entity_type.to_string(), id.to_string()))
            .map(|e| e.value().clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_strings_flatten_items() {
        let entity = Entity::new("node", "article", "5", "Hello")
            .with_field("tags", [json!({"target_id": "42"}), json!({"target_id": 43})])
            .with_field("link", [json!({"uri": "entity:node/7", "title": "Seven"})])
            .with_field("flag", [json!(true)])
            .with_field("empty", [json!(null)]);

        assert_eq!(entity.field_strings("tags"), vec!["42", "43"]);
        assert_eq!(entity.field_strings("link"), vec!["entity:node/7"]);
        assert_eq!(entity.field_strings("flag"), vec!["1"]);
        assert!(entity.field_strings("empty").is_empty());
        assert!(entity.field_strings("missing").is_empty());
    }

    #[test]
    fn translation_overrides_label() {
        let entity = Entity::new("node", "article", "5", "Hello").with_translation("nl", "Hallo");

        assert!(entity.has_translation("en"));
        assert!(entity.has_translation("nl"));
        assert!(!entity.has_translation("fr"));
        assert_eq!(entity.translation("nl").label, "Hallo");
        assert_eq!(entity.translation("nl").langcode, "nl");
        assert_eq!(entity.translation("fr").label, "Hello");
    }

    #[test]
    fn autocomplete_label_includes_id() {
        let entity = Entity::new("node", "page", "12", "About us");
        assert_eq!(entity.autocomplete_label(), "About us (12)");
    }

    #[test]
    fn memory_store_load_and_delete() {
        let store = MemoryEntityStore::with_entities([
            Entity::new("node", "article", "1", "One"),
            Entity::new("node", "article", "2", "Two"),
            Entity::new("taxonomy_term", "tags", "1", "Term"),
        ]);

        assert_eq!(store.len(), 3);
        assert_eq!(store.load("node", "1").unwrap().label, "One");
        assert_eq!(store.load("taxonomy_term", "1").unwrap().label, "Term");

        assert!(store.delete("node", "1"));
        assert!(store.load("node", "1").is_none());

        let loaded = store.load_multiple("node", &["1".to_string(), "2".to_string()]);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "2");
    }
}
