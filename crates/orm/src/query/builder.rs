//! Query builder state

use std::fmt;

use crate::error::OrmResult;
use crate::query::has::HasFilter;
use crate::query::ordering::Order;
use crate::query::where_clause::Condition;
use crate::query::with::EagerLoadSpec;
use crate::store::Store;

/// Fluent query over a single entity's table.
///
/// Built from [`Store::query`]; consuming executors live in the
/// execution module.
pub struct Query<'a> {
    pub(crate) store: &'a Store,
    pub(crate) entity: String,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) orders: Vec<Order>,
    pub(crate) limit: Option<usize>,
    pub(crate) offset: usize,
    pub(crate) loads: Vec<EagerLoadSpec>,
    pub(crate) has_filters: Vec<HasFilter>,
}

impl<'a> Query<'a> {
    /// Unknown entities error here, at the outermost call.
    pub(crate) fn new(store: &'a Store, entity: &str) -> OrmResult<Self> {
        store.registry().schema(entity)?;
        Ok(Self {
            store,
            entity: entity.to_string(),
            conditions: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: 0,
            loads: Vec::new(),
            has_filters: Vec::new(),
        })
    }

    /// Entity this query reads from.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Cap the result at `limit` records, applied after filtering,
    /// sorting, and the offset.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` records of the filtered, sorted result.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("entity", &self.entity)
            .field("conditions", &self.conditions.len())
            .field("orders", &self.orders)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("loads", &self.loads.len())
            .field("has_filters", &self.has_filters.len())
            .finish()
    }
}
