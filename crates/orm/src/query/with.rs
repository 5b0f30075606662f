//! Eager loading - relation paths, constraints, and the load orchestrator
//!
//! Paths compose with dots for nesting (`posts.comments`), pipes for
//! sibling relations at one level (`posts.comments|likes`), and `*` for
//! every declared relation.
//! Unknown relation names are ignored with a debug log rather than
//! failing the whole query.

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::OrmResult;
use crate::query::builder::Query;
use crate::schema::EntitySchema;
use crate::store::Store;
use crate::Record;

/// Reusable constraint applied to a relation's sub-query.
pub type QueryScope = Rc<dyn for<'q> Fn(Query<'q>) -> Query<'q>>;

const WILDCARD: &str = "*";

/// One relation to eager-load: optional sub-query constraints, nested
/// loads for deeper levels, and a remaining wildcard recursion depth.
#[derive(Clone, Default)]
pub struct EagerLoadSpec {
    pub relation: String,
    pub(crate) constraints: Vec<QueryScope>,
    pub nested: Vec<EagerLoadSpec>,
    pub(crate) recurse: Option<u32>,
}

impl EagerLoadSpec {
    pub(crate) fn named(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            ..Self::default()
        }
    }

    fn wildcard(depth: u32) -> Self {
        Self {
            recurse: Some(depth),
            ..Self::named(WILDCARD)
        }
    }

    /// Parse a load path into spec chains. Dots separate nesting levels;
    /// pipes name sibling relations at one level, each inheriting the
    /// remainder of the path (`posts.comments|likes` loads `comments`
    /// and `likes` under `posts`).
    fn parse(path: &str) -> Vec<Self> {
        let levels: Vec<Vec<&str>> = path
            .split('.')
            .map(|level| {
                level
                    .split('|')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .collect::<Vec<&str>>()
            })
            .filter(|names| !names.is_empty())
            .collect();
        Self::expand_levels(&levels)
    }

    fn expand_levels(levels: &[Vec<&str>]) -> Vec<Self> {
        let Some((first, rest)) = levels.split_first() else {
            return Vec::new();
        };
        first
            .iter()
            .map(|name| {
                let mut node = Self::named(*name);
                node.nested = Self::expand_levels(rest);
                node
            })
            .collect()
    }

    /// Push a constraint onto every leaf of a freshly parsed chain;
    /// `with_constraint` scopes apply to the path's final level.
    fn constrain_leaves(&mut self, scope: &QueryScope) {
        if self.nested.is_empty() {
            self.constraints.push(Rc::clone(scope));
        } else {
            for child in &mut self.nested {
                child.constrain_leaves(scope);
            }
        }
    }
}

impl fmt::Debug for EagerLoadSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerLoadSpec")
            .field("relation", &self.relation)
            .field("constraints", &self.constraints.len())
            .field("nested", &self.nested)
            .field("recurse", &self.recurse)
            .finish()
    }
}

/// Merge a spec into a list, folding duplicates of the same relation
/// together instead of loading it twice.
fn merge_into(specs: &mut Vec<EagerLoadSpec>, spec: EagerLoadSpec) {
    if let Some(existing) = specs
        .iter_mut()
        .find(|existing| existing.relation == spec.relation)
    {
        existing.constraints.extend(spec.constraints);
        existing.recurse = existing.recurse.max(spec.recurse);
        for child in spec.nested {
            merge_into(&mut existing.nested, child);
        }
    } else {
        specs.push(spec);
    }
}

impl<'a> Query<'a> {
    /// Eager-load the relation path(s) onto the result.
    pub fn with(mut self, path: &str) -> Self {
        for spec in EagerLoadSpec::parse(path) {
            merge_into(&mut self.loads, spec);
        }
        self
    }

    /// Eager-load with a constraint on the path's final relation.
    pub fn with_constraint<F>(mut self, path: &str, constraint: F) -> Self
    where
        F: for<'q> Fn(Query<'q>) -> Query<'q> + 'static,
    {
        let scope: QueryScope = Rc::new(constraint);
        for mut spec in EagerLoadSpec::parse(path) {
            spec.constrain_leaves(&scope);
            merge_into(&mut self.loads, spec);
        }
        self
    }

    /// Eager-load every declared relation, one level deep.
    pub fn with_all(self) -> Self {
        self.with_all_recursive(0)
    }

    /// Eager-load every declared relation, recursing `depth` further
    /// levels below the first.
    pub fn with_all_recursive(mut self, depth: u32) -> Self {
        merge_into(&mut self.loads, EagerLoadSpec::wildcard(depth));
        self
    }
}

/// Run every spec against the records, expanding wildcards against the
/// entity's declared relations.
pub(crate) fn eager_load_into(
    store: &Store,
    entity: &str,
    records: &mut [Record],
    specs: &[EagerLoadSpec],
) -> OrmResult<()> {
    if records.is_empty() || specs.is_empty() {
        return Ok(());
    }
    let schema = store.registry().schema(entity)?;
    for spec in specs {
        if spec.relation == WILDCARD {
            let depth = spec.recurse.unwrap_or(0);
            for name in schema.relation_names() {
                let mut expanded = EagerLoadSpec::named(name);
                if let Some(remaining) = depth.checked_sub(1) {
                    expanded.nested.push(EagerLoadSpec::wildcard(remaining));
                }
                load_one(store, entity, schema, records, &expanded)?;
            }
        } else {
            load_one(store, entity, schema, records, spec)?;
        }
    }
    Ok(())
}

fn load_one(
    store: &Store,
    entity: &str,
    schema: &EntitySchema,
    records: &mut [Record],
    spec: &EagerLoadSpec,
) -> OrmResult<()> {
    let Some(relationship) = schema.relationship(&spec.relation) else {
        debug!(entity, relation = %spec.relation, "ignoring unknown eager-load relation");
        return Ok(());
    };
    relationship
        .resolver()
        .load(store, entity, &spec.relation, records, spec)
}

/// Related rows for one load: the spec's constraints applied as a
/// sub-query, `keep` narrowing to joinable rows, then the spec's nested
/// loads on the result.
pub(crate) fn fetch_related<K>(
    store: &Store,
    entity: &str,
    spec: &EagerLoadSpec,
    keep: K,
) -> OrmResult<Vec<Record>>
where
    K: Fn(&Record) -> bool,
{
    let mut query = store.query(entity)?;
    for scope in &spec.constraints {
        query = scope(query);
    }
    let mut rows = query.get_filtered(keep)?;
    eager_load_into(store, entity, &mut rows, &spec.nested)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_path_builds_a_nested_chain() {
        let specs = EagerLoadSpec::parse("posts.comments.author");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].relation, "posts");
        assert_eq!(specs[0].nested[0].relation, "comments");
        assert_eq!(specs[0].nested[0].nested[0].relation, "author");
    }

    #[test]
    fn piped_path_branches() {
        let specs = EagerLoadSpec::parse("posts|profile");
        let names: Vec<&str> = specs.iter().map(|spec| spec.relation.as_str()).collect();
        assert_eq!(names, ["posts", "profile"]);
    }

    #[test]
    fn piped_segment_fans_out_under_its_parent() {
        let specs = EagerLoadSpec::parse("posts.comments|likes");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].relation, "posts");
        let nested: Vec<&str> = specs[0]
            .nested
            .iter()
            .map(|spec| spec.relation.as_str())
            .collect();
        assert_eq!(nested, ["comments", "likes"]);
    }

    #[test]
    fn piped_segment_siblings_share_the_remainder_of_the_path() {
        let specs = EagerLoadSpec::parse("posts|threads.comments");
        let names: Vec<&str> = specs.iter().map(|spec| spec.relation.as_str()).collect();
        assert_eq!(names, ["posts", "threads"]);
        for spec in &specs {
            assert_eq!(spec.nested[0].relation, "comments");
        }
    }

    #[test]
    fn duplicate_relations_merge() {
        let mut loads = Vec::new();
        for spec in EagerLoadSpec::parse("posts.comments") {
            merge_into(&mut loads, spec);
        }
        for spec in EagerLoadSpec::parse("posts.tags") {
            merge_into(&mut loads, spec);
        }
        assert_eq!(loads.len(), 1);
        let nested: Vec<&str> = loads[0]
            .nested
            .iter()
            .map(|spec| spec.relation.as_str())
            .collect();
        assert_eq!(nested, ["comments", "tags"]);
    }
}
