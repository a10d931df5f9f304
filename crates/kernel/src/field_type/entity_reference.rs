//! Entity reference fields labelled by the referenced entity.

use tracing::debug;

use super::{DefaultValue, FieldDefinition, FieldKind, FieldTypeContext, FieldTypeStrategy};
use crate::form::FormElement;

/// Fields referencing other entities. Raw values are target ids.
pub struct EntityReferenceFieldType;

impl FieldTypeStrategy for EntityReferenceFieldType {
    fn id(&self) -> &'static str {
        "entity_reference"
    }

    fn applies(&self, field: Option<&FieldDefinition>) -> bool {
        matches!(field.map(|f| &f.kind), Some(FieldKind::EntityReference { .. }))
    }

    fn build_default_value_form(
        &self,
        ctx: &FieldTypeContext<'_>,
        values: &[String],
    ) -> FormElement {
        let Some(FieldKind::EntityReference {
            target_type,
            handler,
            target_bundles,
        }) = ctx.field.map(|f| &f.kind)
        else {
            return FormElement::empty();
        };

        let current = self
            .default_values(ctx, values)
            .iter()
            .filter_map(|v| match v {
                DefaultValue::Entity { entity } => Some(entity.autocomplete_label()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(", ");

        FormElement::entity_autocomplete(target_type, handler, target_bundles.clone())
            .default_value(current)
    }

    fn default_values(&self, ctx: &FieldTypeContext<'_>, values: &[String]) -> Vec<DefaultValue> {
        let Some(target_type) = ctx.field.and_then(FieldDefinition::target_type) else {
            return Vec::new();
        };
        values
            .iter()
            .filter_map(|id| {
                let entity = ctx.load_translated(target_type, id);
                if entity.is_none() {
                    debug!(
                        target_type,
                        id = %id,
                        "referenced entity missing; skipping default value"
                    );
                }
                entity
            })
            .map(|entity| DefaultValue::Entity { entity })
            .collect()
    }

    fn display_label(&self, ctx: &FieldTypeContext<'_>, raw: &str) -> String {
        ctx.field
            .and_then(FieldDefinition::target_type)
            .and_then(|target_type| ctx.load_translated(target_type, raw))
            .map(|entity| entity.label)
            .unwrap_or_else(|| raw.to_string())
    }
}
