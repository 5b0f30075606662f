//! Relationship declarations and their resolvers
//!
//! One resolver per relationship kind, all behind a single [`Relation`]
//! trait: `attach` injects foreign keys during normalization,
//! `create_pivots` materializes junction rows, and `load` performs the
//! eager-loading half of the contract. Dictionary-building helpers are
//! shared across the variants instead of an inheritance chain.

pub mod belongs_to;
pub mod belongs_to_many;
pub mod dictionary;
pub mod has_many;
pub mod has_many_by;
pub mod has_one;
pub mod metadata;
pub mod morph_many;
pub mod morph_one;
pub mod morph_to;
pub mod traits;

pub use belongs_to::BelongsTo;
pub use belongs_to_many::BelongsToMany;
pub use has_many::HasMany;
pub use has_many_by::HasManyBy;
pub use has_one::HasOne;
pub use metadata::Relationship;
pub use morph_many::MorphMany;
pub use morph_one::MorphOne;
pub use morph_to::MorphTo;
pub use traits::Relation;
