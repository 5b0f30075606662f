//! The common resolver contract shared by every relationship kind

use crate::error::OrmResult;
use crate::normalize::NormalizedData;
use crate::query::EagerLoadSpec;
use crate::schema::SchemaRegistry;
use crate::store::Store;
use crate::Record;

/// Behavior every relationship kind implements.
///
/// `name` is the field the relationship is declared under; after
/// normalization that field holds the related index id(s), and after eager
/// loading it holds the matched row(s).
pub trait Relation {
    /// Target entity, when fixed at declaration time. Polymorphic inverse
    /// relations resolve their target per record and return `None`.
    fn related_entity(&self) -> Option<&str>;

    /// True when the relationship yields a collection. Collection kinds
    /// always eager-load to an array (`[]` when unmatched); singular kinds
    /// always load to an object or null.
    fn is_collection(&self) -> bool;

    /// Fill in the relationship's foreign key(s) on normalized rows.
    /// Explicitly provided values are never overwritten.
    fn attach(
        &self,
        name: &str,
        parent_entity: &str,
        parent_id: &str,
        registry: &SchemaRegistry,
        data: &mut NormalizedData,
    ) -> OrmResult<()>;

    /// Materialize junction rows. Only many-to-many kinds override this.
    fn create_pivots(
        &self,
        _name: &str,
        _parent_entity: &str,
        _registry: &SchemaRegistry,
        _data: &mut NormalizedData,
    ) -> OrmResult<()> {
        Ok(())
    }

    /// Eager-load matched rows onto each base record under `name`.
    fn load(
        &self,
        store: &Store,
        parent_entity: &str,
        name: &str,
        records: &mut [Record],
        spec: &EagerLoadSpec,
    ) -> OrmResult<()>;
}
