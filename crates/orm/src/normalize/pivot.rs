//! Pivot Creator - materializes junction rows after normalization

use crate::error::OrmResult;
use crate::normalize::NormalizedData;
use crate::relationships::Relationship;
use crate::schema::SchemaRegistry;

/// Scan every entity present in `data` and materialize pivot rows for its
/// many-to-many relationships. Entities added by pivot creation itself are
/// not revisited; pivot entities declare no pivot relations of their own.
pub(crate) fn create_pivots(
    registry: &SchemaRegistry,
    data: &mut NormalizedData,
) -> OrmResult<()> {
    for entity in data.entity_names() {
        let schema = registry.schema(&entity)?;
        let relations: Vec<(String, Relationship)> = schema
            .fields()
            .iter()
            .filter_map(|(name, field)| {
                field
                    .as_relation()
                    .filter(|relation| relation.requires_pivot())
                    .map(|relation| (name.clone(), relation.clone()))
            })
            .collect();
        for (name, relation) in relations {
            relation
                .resolver()
                .create_pivots(&name, &entity, registry, data)?;
        }
    }
    Ok(())
}
