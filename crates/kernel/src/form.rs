//! Default-value widgets for preset filters.
//!
//! Field type strategies describe the input an editor uses to pick a
//! filter's default values. Rendering is left to the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A default-value input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormElement {
    /// Widget with its settings.
    #[serde(flatten)]
    pub element_type: ElementType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Value the widget starts with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    #[serde(default)]
    pub required: bool,

    /// Nested elements (containers only).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, FormElement>,
}

/// Widget kinds used for filter default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementType {
    /// Free text; multiple values are comma separated.
    Textfield,

    /// Choice from a fixed option list of `(value, label)` pairs.
    Select {
        options: Vec<(String, String)>,
        #[serde(default)]
        multiple: bool,
    },

    /// Entity search by label.
    EntityAutocomplete {
        target_type: String,
        selection_handler: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        target_bundles: Vec<String>,
        /// Accepts several comma separated entities.
        #[serde(default)]
        tags: bool,
    },

    /// Wrapper without an input of its own.
    Container,
}

impl ElementType {
    /// Widget name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementType::Textfield => "textfield",
            ElementType::Select { .. } => "select",
            ElementType::EntityAutocomplete { .. } => "entity_autocomplete",
            ElementType::Container => "container",
        }
    }
}

impl FormElement {
    fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            title: None,
            description: None,
            default_value: None,
            required: false,
            children: BTreeMap::new(),
        }
    }

    pub fn textfield() -> Self {
        Self::new(ElementType::Textfield)
    }

    pub fn select(options: Vec<(String, String)>) -> Self {
        Self::new(ElementType::Select {
            options,
            multiple: false,
        })
    }

    pub fn multi_select(options: Vec<(String, String)>) -> Self {
        Self::new(ElementType::Select {
            options,
            multiple: true,
        })
    }

    /// Autocomplete over entities of `target_type`.
    pub fn entity_autocomplete(
        target_type: impl Into<String>,
        selection_handler: impl Into<String>,
        target_bundles: Vec<String>,
    ) -> Self {
        Self::new(ElementType::EntityAutocomplete {
            target_type: target_type.into(),
            selection_handler: selection_handler.into(),
            target_bundles,
            tags: true,
        })
    }

    /// Empty container, used when no input can be offered.
    pub fn empty() -> Self {
        Self::new(ElementType::Container)
    }

    /// Whether this is an empty container.
    pub fn is_empty(&self) -> bool {
        self.element_type == ElementType::Container && self.children.is_empty()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn child(mut self, name: impl Into<String>, element: FormElement) -> Self {
        self.children.insert(name.into(), element);
        self
    }

    /// Option list of a select element.
    pub fn options(&self) -> &[(String, String)] {
        match &self.element_type {
            ElementType::Select { options, .. } => options,
            _ => &[],
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn select_serializes_with_type_tag() {
        let element =
            FormElement::multi_select(vec![("1".into(), "Yes".into())]).title("Published");
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["type"], "select");
        assert_eq!(json["multiple"], true);
        assert_eq!(json["title"], "Published");
    }

    #[test]
    fn empty_container() {
        assert!(FormElement::empty().is_empty());
        assert!(!FormElement::empty().child("x", FormElement::textfield()).is_empty());
        assert!(!FormElement::textfield().is_empty());
    }
}
