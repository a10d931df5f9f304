//! Field type strategies for filter fields.
//!
//! Each strategy knows how one kind of field presents filter values: the
//! default-value input an editor fills in, the loaded default values, and
//! the display label of a raw value. The registry resolves strategies in
//! ascending weight order; the string strategy always applies last.

mod boolean;
mod entity_reference;
mod link;
mod list_enum;
mod string;

pub use boolean::BooleanFieldType;
pub use entity_reference::EntityReferenceFieldType;
pub use link::LinkFieldType;
pub use list_enum::ListEnumFieldType;
pub use string::StringFieldType;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityLookup};
use crate::form::FormElement;

/// Storage kind of an entity field with its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Boolean {
        #[serde(default = "default_on_label")]
        on_label: String,
        #[serde(default = "default_off_label")]
        off_label: String,
    },
    ListString {
        /// `(value, label)` pairs in display order.
        allowed_values: Vec<(String, String)>,
    },
    EntityReference {
        target_type: String,
        #[serde(default = "default_handler")]
        handler: String,
        #[serde(default)]
        target_bundles: Vec<String>,
    },
    Link,
    String,
    Text,
    Integer,
    Datetime,
}

fn default_on_label() -> String {
    "On".to_string()
}

fn default_off_label() -> String {
    "Off".to_string()
}

fn default_handler() -> String {
    "default".to_string()
}

/// An entity field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Field machine name.
    pub name: String,

    #[serde(default)]
    pub label: String,

    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
        }
    }

    /// Target entity type of a reference field.
    pub fn target_type(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::EntityReference { target_type, .. } => Some(target_type),
            _ => None,
        }
    }
}

/// What a strategy needs to resolve values.
#[derive(Clone, Copy)]
pub struct FieldTypeContext<'a> {
    /// Field the filter is bound to, when it resolves to one.
    pub field: Option<&'a FieldDefinition>,
    pub entities: &'a dyn EntityLookup,
    /// Language labels are shown in.
    pub langcode: &'a str,
}

impl<'a> FieldTypeContext<'a> {
    pub fn new(
        field: Option<&'a FieldDefinition>,
        entities: &'a dyn EntityLookup,
        langcode: &'a str,
    ) -> Self {
        Self {
            field,
            entities,
            langcode,
        }
    }

    /// Load an entity in the context language.
    pub fn load_translated(&self, entity_type: &str, id: &str) -> Option<Entity> {
        self.entities
            .load(entity_type, id)
            .map(|entity| self.entities.get_translation(&entity, self.langcode))
    }
}

/// A resolved default value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefaultValue {
    /// A value used as is.
    Raw { value: String, label: String },
    /// A loaded referenced entity.
    Entity { entity: Entity },
    /// A link with its display label.
    Link { uri: String, label: String },
}

impl DefaultValue {
    /// Text shown for the value.
    pub fn label(&self) -> &str {
        match self {
            DefaultValue::Raw { label, .. } | DefaultValue::Link { label, .. } => label,
            DefaultValue::Entity { entity } => &entity.label,
        }
    }
}

/// Per-field-type handling of filter values.
pub trait FieldTypeStrategy: Send + Sync {
    /// Strategy identifier.
    fn id(&self) -> &'static str;

    /// Lower weights are tried first.
    fn weight(&self) -> i32 {
        0
    }

    /// Whether the strategy handles `field`.
    fn applies(&self, field: Option<&FieldDefinition>) -> bool;

    /// Input used to edit the default values.
    fn build_default_value_form(
        &self,
        ctx: &FieldTypeContext<'_>,
        values: &[String],
    ) -> FormElement;

    /// Default values resolved for display. Values that no longer resolve are skipped.
    fn default_values(&self, ctx: &FieldTypeContext<'_>, values: &[String]) -> Vec<DefaultValue> {
        values
            .iter()
            .map(|v| DefaultValue::Raw {
                value: v.clone(),
                label: self.display_label(ctx, v),
            })
            .collect()
    }

    /// Comma separated labels of the default values.
    fn default_values_label(&self, ctx: &FieldTypeContext<'_>, values: &[String]) -> String {
        self.default_values(ctx, values)
            .iter()
            .map(DefaultValue::label)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Display label of a raw facet value.
    fn display_label(&self, ctx: &FieldTypeContext<'_>, raw: &str) -> String;
}

/// Field type strategies ordered by weight.
pub struct FieldTypeRegistry {
    strategies: Vec<Box<dyn FieldTypeStrategy>>,
    fallback: StringFieldType,
}

impl Default for FieldTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldTypeRegistry {
    /// Registry with the built-in strategies.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(BooleanFieldType));
        registry.register(Box::new(ListEnumFieldType));
        registry.register(Box::new(EntityReferenceFieldType));
        registry.register(Box::new(LinkFieldType));
        registry.register(Box::new(StringFieldType));
        registry
    }

    /// Registry holding only the fallback.
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
            fallback: StringFieldType,
        }
    }

    /// Add a strategy. Equal weights keep registration order.
    pub fn register(&mut self, strategy: Box<dyn FieldTypeStrategy>) {
        self.strategies.push(strategy);
        self.strategies.sort_by_key(|s| s.weight());
    }

    /// First strategy that applies to `field`.
    pub fn strategy_for(&self, field: Option<&FieldDefinition>) -> &dyn FieldTypeStrategy {
        self.strategies
            .iter()
            .find(|s| s.applies(field))
            .map(|s| s.as_ref())
            .unwrap_or(&self.fallback)
    }

    /// Strategy ids in resolution order.
    pub fn ids(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }
}
