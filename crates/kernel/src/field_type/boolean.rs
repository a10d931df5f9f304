//! Boolean field options and labels.

use super::{FieldDefinition, FieldKind, FieldTypeContext, FieldTypeStrategy};
use crate::form::FormElement;

/// On/off fields. Raw values are `1` and `0`.
pub struct BooleanFieldType;

impl BooleanFieldType {
    fn labels(field: Option<&FieldDefinition>) -> Option<(&str, &str)> {
        match field.map(|f| &f.kind) {
            Some(FieldKind::Boolean { on_label, off_label }) => {
                Some((on_label.as_str(), off_label.as_str()))
            }
            _ => None,
        }
    }
}

impl FieldTypeStrategy for BooleanFieldType {
    fn id(&self) -> &'static str {
        "boolean"
    }

    fn applies(&self, field: Option<&FieldDefinition>) -> bool {
        Self::labels(field).is_some()
    }

    fn build_default_value_form(
        &self,
        ctx: &FieldTypeContext<'_>,
        values: &[String],
    ) -> FormElement {
        if Self::labels(ctx.field).is_none() {
            return FormElement::empty();
        }
        // Options go through the same labelling as facet results for 1 and 0.
        let options = ["1", "0"]
            .iter()
            .map(|raw| (raw.to_string(), self.display_label(ctx, raw)))
            .collect();
        let mut element = FormElement::select(options);
        if let Some(value) = values.first() {
            element = element.default_value(value.as_str());
        }
        element
    }

    fn default_values_label(&self, ctx: &FieldTypeContext<'_>, values: &[String]) -> String {
        if Self::labels(ctx.field).is_none() {
            return String::new();
        }
        values
            .iter()
            .map(|v| self.display_label(ctx, v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn display_label(&self, ctx: &FieldTypeContext<'_>, raw: &str) -> String {
        match (Self::labels(ctx.field), raw) {
            (Some((on, _)), "1" | "true") => on.to_string(),
            (Some((_, off)), "0" | "false") => off.to_string(),
            _ => raw.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::entity::MemoryEntityStore;

    fn field() -> FieldDefinition {
        FieldDefinition::new(
            "status",
            "Published",
            FieldKind::Boolean {
                on_label: "Published".into(),
                off_label: "Unpublished".into(),
            },
        )
    }

    #[test]
    fn form_has_two_labelled_options() {
        let store = MemoryEntityStore::new();
        let field = field();
        let ctx = FieldTypeContext::new(Some(&field), &store, "en");
        let form = BooleanFieldType.build_default_value_form(&ctx, &["1".to_string()]);

        assert_eq!(
            form.options(),
            &[
                ("1".to_string(), "Published".to_string()),
                ("0".to_string(), "Unpublished".to_string())
            ]
        );
        assert_eq!(form.default_value, Some(serde_json::json!("1")));
    }

    #[test]
    fn label_uses_on_off_labels() {
        let store = MemoryEntityStore::new();
        let field = field();
        let ctx = FieldTypeContext::new(Some(&field), &store, "en");
        assert_eq!(BooleanFieldType.default_values_label(&ctx, &["0".to_string()]), "Unpublished");
    }

    #[test]
    fn without_field_everything_is_empty() {
        let store = MemoryEntityStore::new();
        let ctx = FieldTypeContext::new(None, &store, "en");
        assert!(BooleanFieldType.build_default_value_form(&ctx, &[]).is_empty());
        assert_eq!(BooleanFieldType.default_values_label(&ctx, &["1".to_string()]), "");
    }
}
