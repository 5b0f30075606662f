//! Query engine - filtering, ordering, pagination, and eager loading
//!
//! Queries are fluent builders over one entity's table. Conditions
//! combine as `(all AND clauses) || (any OR clause)` and evaluate
//! against hydrated copies, so schema defaults are filterable; ordering
//! is a stable multi-key sort; pagination applies after filtering and
//! sorting; eager loads run only on the final page.

pub mod builder;
pub mod execution;
pub mod has;
pub mod ordering;
pub mod where_clause;
pub mod with;

pub use builder::Query;
pub use ordering::OrderDirection;
pub use with::{EagerLoadSpec, QueryScope};

pub(crate) use with::fetch_related;
