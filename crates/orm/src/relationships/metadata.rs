//! The closed set of relationship kinds
//!
//! Polymorphic dispatch is a tagged-variant lookup, never runtime
//! reflection: each variant carries its key configuration and resolves to
//! its [`Relation`] implementation through [`Relationship::resolver`].

use serde::{Deserialize, Serialize};

use crate::relationships::{
    BelongsTo, BelongsToMany, HasMany, HasManyBy, HasOne, MorphMany, MorphOne, MorphTo, Relation,
};

/// A declared relationship between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    /// One-to-one; the related record carries the foreign key
    HasOne(HasOne),
    /// One-to-many; each related record carries the foreign key
    HasMany(HasMany),
    /// Many-to-one; the owning record carries the foreign key
    BelongsTo(BelongsTo),
    /// One-to-many by id list held on the owner
    HasManyBy(HasManyBy),
    /// Many-to-many through a pivot entity
    BelongsToMany(BelongsToMany),
    /// Polymorphic one-to-one
    MorphOne(MorphOne),
    /// Polymorphic one-to-many
    MorphMany(MorphMany),
    /// Polymorphic inverse; target entity read from the type field
    MorphTo(MorphTo),
}

impl Relationship {
    /// Resolver implementing this kind's behavior.
    pub fn resolver(&self) -> &dyn Relation {
        match self {
            Self::HasOne(r) => r,
            Self::HasMany(r) => r,
            Self::BelongsTo(r) => r,
            Self::HasManyBy(r) => r,
            Self::BelongsToMany(r) => r,
            Self::MorphOne(r) => r,
            Self::MorphMany(r) => r,
            Self::MorphTo(r) => r,
        }
    }

    /// Target entity, when fixed at declaration time.
    pub fn related_entity(&self) -> Option<&str> {
        self.resolver().related_entity()
    }

    /// True when the relationship yields a collection.
    pub fn is_collection(&self) -> bool {
        self.resolver().is_collection()
    }

    /// True for the polymorphic kinds.
    pub fn is_polymorphic(&self) -> bool {
        matches!(self, Self::MorphOne(_) | Self::MorphMany(_) | Self::MorphTo(_))
    }

    /// True when the relationship joins through a pivot entity.
    pub fn requires_pivot(&self) -> bool {
        matches!(self, Self::BelongsToMany(_))
    }
}

impl From<HasOne> for Relationship {
    fn from(r: HasOne) -> Self {
        Self::HasOne(r)
    }
}

impl From<HasMany> for Relationship {
    fn from(r: HasMany) -> Self {
        Self::HasMany(r)
    }
}

impl From<BelongsTo> for Relationship {
    fn from(r: BelongsTo) -> Self {
        Self::BelongsTo(r)
    }
}

impl From<HasManyBy> for Relationship {
    fn from(r: HasManyBy) -> Self {
        Self::HasManyBy(r)
    }
}

impl From<BelongsToMany> for Relationship {
    fn from(r: BelongsToMany) -> Self {
        Self::BelongsToMany(r)
    }
}

impl From<MorphOne> for Relationship {
    fn from(r: MorphOne) -> Self {
        Self::MorphOne(r)
    }
}

impl From<MorphMany> for Relationship {
    fn from(r: MorphMany) -> Self {
        Self::MorphMany(r)
    }
}

impl From<MorphTo> for Relationship {
    fn from(r: MorphTo) -> Self {
        Self::MorphTo(r)
    }
}
