//! Allowed-values list fields.

use super::{FieldDefinition, FieldKind, FieldTypeContext, FieldTypeStrategy};
use crate::form::FormElement;

/// Fields restricted to a static allowed-values list.
pub struct ListEnumFieldType;

fn allowed_values(field: Option<&FieldDefinition>) -> Option<&[(String, String)]> {
    match field.map(|f| &f.kind) {
        Some(FieldKind::ListString { allowed_values }) => Some(allowed_values.as_slice()),
        _ => None,
    }
}

impl FieldTypeStrategy for ListEnumFieldType {
    fn id(&self) -> &'static str {
        "list_enum"
    }

    fn applies(&self, field: Option<&FieldDefinition>) -> bool {
        allowed_values(field).is_some()
    }

    fn build_default_value_form(
        &self,
        ctx: &FieldTypeContext<'_>,
        values: &[String],
    ) -> FormElement {
        let Some(allowed) = allowed_values(ctx.field) else {
            return FormElement::empty();
        };
        FormElement::multi_select(allowed.to_vec()).default_value(values.to_vec())
    }

    fn default_values_label(&self, ctx: &FieldTypeContext<'_>, values: &[String]) -> String {
        if allowed_values(ctx.field).is_none() {
            return String::new();
        }
        values
            .iter()
            .map(|v| self.display_label(ctx, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn display_label(&self, ctx: &FieldTypeContext<'_>, raw: &str) -> String {
        allowed_values(ctx.field)
            .and_then(|allowed| allowed.iter().find(|(value, _)| value == raw))
            .map(|(_, label)| label.clone())
            .unwrap_or_else(|| raw.to_string())
    }
}
