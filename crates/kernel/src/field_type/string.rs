//! Free text fields.

use super::{FieldDefinition, FieldTypeContext, FieldTypeStrategy};
use crate::form::FormElement;

/// Fallback for every field: free text in, raw value out.
pub struct StringFieldType;

impl FieldTypeStrategy for StringFieldType {
    fn id(&self) -> &'static str {
        "string"
    }

    fn weight(&self) -> i32 {
        100
    }

    fn applies(&self, _field: Option<&FieldDefinition>) -> bool {
        true
    }

    fn build_default_value_form(
        &self,
        _ctx: &FieldTypeContext<'_>,
        values: &[String],
    ) -> FormElement {
        FormElement::textfield()
            .description("Separate multiple values with a comma.")
            .default_value(values.join(", "))
    }

    fn display_label(&self, _ctx: &FieldTypeContext<'_>, raw: &str) -> String {
        raw.to_string()
    }
}
