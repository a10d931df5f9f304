//! Link fields labelled by the linked entity or the bare URI.

use super::{DefaultValue, FieldDefinition, FieldKind, FieldTypeContext, FieldTypeStrategy};
use crate::form::FormElement;

/// URI schemes stripped for display.
const DISPLAY_SCHEMES: [&str; 3] = ["internal:", "entity:", "route:"];

/// Link fields. Raw values are URIs such as `entity:node/5` or `internal:/about`.
pub struct LinkFieldType;

/// Split `entity:<type>/<id>` into its parts.
fn entity_target(uri: &str) -> Option<(&str, &str)> {
    let (entity_type, id) = uri.strip_prefix("entity:")?.split_once('/')?;
    (!entity_type.is_empty() && !id.is_empty()).then_some((entity_type, id))
}

impl LinkFieldType {
    fn link_label(ctx: &FieldTypeContext<'_>, uri: &str) -> String {
        if let Some((entity_type, id)) = entity_target(uri) {
            // Deleted targets keep the raw URI.
            return ctx
                .load_translated(entity_type, id)
                .map(|entity| entity.autocomplete_label())
                .unwrap_or_else(|| uri.to_string());
        }
        DISPLAY_SCHEMES
            .iter()
            .find_map(|scheme| uri.strip_prefix(*scheme))
            .unwrap_or(uri)
            .to_string()
    }
}

impl FieldTypeStrategy for LinkFieldType {
    fn id(&self) -> &'static str {
        "link"
    }

    fn applies(&self, field: Option<&FieldDefinition>) -> bool {
        matches!(field.map(|f| &f.kind), Some(FieldKind::Link))
    }

    fn build_default_value_form(
        &self,
        ctx: &FieldTypeContext<'_>,
        values: &[String],
    ) -> FormElement {
        if ctx.field.is_none() {
            return FormElement::empty();
        }
        let current = values
            .iter()
            .map(|uri| Self::link_label(ctx, uri))
            .collect::<Vec<_>>()
            .join(", ");
        FormElement::textfield()
            .description("Start typing a title or enter a path.")
            .default_value(current)
    }

    fn default_values(&self, ctx: &FieldTypeContext<'_>, values: &[String]) -> Vec<DefaultValue> {
        if ctx.field.is_none() {
            return Vec::new();
        }
        values
            .iter()
            .map(|uri| DefaultValue::Link {
                uri: uri.clone(),
                label: Self::link_label(ctx, uri),
            })
            .collect()
    }

    fn display_label(&self, ctx: &FieldTypeContext<'_>, raw: &str) -> String {
        Self::link_label(ctx, raw)
    }
}
