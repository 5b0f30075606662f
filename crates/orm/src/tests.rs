//! Integration tests over the full write/read pipeline

use serde_json::{json, Value};

use crate::{EntitySchema, Mutation, OrmError, Record, SchemaRegistry, Store};

fn blog_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register(
        EntitySchema::new("users")
            .attr("id")
            .attr_default("name", json!(""))
            .attr("age")
            .attr_default("active", json!(false))
            .has_many("posts", "posts", "user_id", "id")
            .has_one("profile", "profiles", "user_id", "id")
            .belongs_to_many("roles", "roles", "role_user", "user_id", "role_id", "id", "id"),
    );
    registry.register(
        EntitySchema::new("posts")
            .attr("id")
            .attr("user_id")
            .attr_default("title", json!(""))
            .attr_default("published", json!(false))
            .has_many("comments", "comments", "post_id", "id")
            .has_many("likes", "likes", "post_id", "id")
            .belongs_to("author", "users", "user_id", "id"),
    );
    registry.register(
        EntitySchema::new("likes")
            .attr("id")
            .attr("post_id"),
    );
    registry.register(
        EntitySchema::new("comments")
            .attr("id")
            .attr("post_id")
            .attr_default("body", json!("")),
    );
    registry.register(
        EntitySchema::new("profiles")
            .attr("id")
            .attr("user_id")
            .attr("avatar"),
    );
    registry.register(
        EntitySchema::new("roles")
            .attr("id")
            .attr_default("name", json!("")),
    );
    registry.register(
        EntitySchema::new("role_user")
            .attr("id")
            .attr("user_id")
            .attr("role_id")
            .attr("level"),
    );
    registry
}

fn blog_store() -> Store {
    Store::new(blog_registry())
}

fn ids(rows: &[Record]) -> Vec<i64> {
    rows.iter()
        .filter_map(|record| record.get("id"))
        .filter_map(Value::as_i64)
        .collect()
}

#[test]
fn nested_payload_round_trips_two_levels() {
    let mut store = blog_store();
    store
        .create(
            "users",
            &json!({
                "id": 1,
                "name": "John",
                "posts": [
                    {
                        "id": 10,
                        "title": "first",
                        "comments": [{ "id": 100, "body": "nice" }]
                    },
                    { "id": 11, "title": "second" }
                ]
            }),
        )
        .unwrap();

    // everything flattened into per-entity tables with foreign keys set
    assert_eq!(store.table("posts").unwrap().len(), 2);
    assert_eq!(store.table("comments").unwrap()["100"]["post_id"], json!(10));

    let users = store
        .query("users")
        .unwrap()
        .with("posts.comments")
        .get()
        .unwrap();
    assert_eq!(users.len(), 1);
    let posts = users[0]["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["user_id"], json!(1));
    assert_eq!(posts[0]["comments"][0]["body"], json!("nice"));
    assert_eq!(posts[1]["comments"], json!([]));
}

#[test]
fn create_replaces_the_root_table_only() {
    let mut store = blog_store();
    store
        .create("users", &json!([{ "id": 1, "posts": [{ "id": 10 }] }]))
        .unwrap();
    store
        .create("users", &json!([{ "id": 2, "posts": [{ "id": 11 }] }]))
        .unwrap();

    let users = store.table("users").unwrap();
    assert!(!users.contains_key("1"));
    assert!(users.contains_key("2"));
    // related tables merge additively
    let posts = store.table("posts").unwrap();
    assert!(posts.contains_key("10") && posts.contains_key("11"));
}

#[test]
fn insert_merges_colliding_records_field_wise() {
    let mut store = blog_store();
    store
        .insert("users", &json!({ "id": 1, "name": "Ada" }))
        .unwrap();
    store.insert("users", &json!({ "id": 1, "age": 36 })).unwrap();

    let record = &store.table("users").unwrap()["1"];
    assert_eq!(record["name"], json!("Ada"));
    assert_eq!(record["age"], json!(36));
}

#[test]
fn bad_payloads_and_unknown_entities_error() {
    let mut store = blog_store();
    assert!(matches!(
        store.insert("ghosts", &json!({})),
        Err(OrmError::UnknownEntity(_))
    ));
    assert!(matches!(
        store.insert("users", &json!(42)),
        Err(OrmError::Schema(_))
    ));
    // null payload is a no-op, not an error
    store.insert("users", &Value::Null).unwrap();
    assert!(store.table("users").unwrap().is_empty());
}

#[test]
fn unmatched_eager_loads_keep_their_cardinality() {
    let mut store = blog_store();
    store.insert("users", &json!({ "id": 1 })).unwrap();

    let users = store
        .query("users")
        .unwrap()
        .with("posts|profile")
        .get()
        .unwrap();
    assert_eq!(users[0]["posts"], json!([]));
    assert_eq!(users[0]["profile"], Value::Null);
}

#[test]
fn piped_segments_load_siblings_under_the_same_parent() {
    let mut store = blog_store();
    store
        .create(
            "users",
            &json!({
                "id": 1,
                "posts": [{
                    "id": 10,
                    "comments": [{ "id": 100 }],
                    "likes": [{ "id": 200 }]
                }]
            }),
        )
        .unwrap();

    let users = store
        .query("users")
        .unwrap()
        .with("posts.comments|likes")
        .get()
        .unwrap();
    let post = &users[0]["posts"][0];
    assert_eq!(post["comments"][0]["id"], json!(100));
    assert_eq!(post["likes"][0]["id"], json!(200));
}

#[test]
fn and_clauses_bind_tighter_than_or() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([
                { "id": 1, "age": 20, "active": true },
                { "id": 2, "age": 24, "active": true },
                { "id": 3, "age": 30, "active": false }
            ]),
        )
        .unwrap();

    // (active && age == 20) || id == 2
    let rows = store
        .query("users")
        .unwrap()
        .where_eq("active", true)
        .where_eq("age", 20)
        .or_where_eq("id", 2)
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![1, 2]);
}

#[test]
fn nested_condition_groups_scope_their_or() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([
                { "id": 1, "age": 20, "active": true },
                { "id": 2, "age": 24, "active": true },
                { "id": 3, "age": 24, "active": false }
            ]),
        )
        .unwrap();

    let rows = store
        .query("users")
        .unwrap()
        .where_eq("active", true)
        .where_query(|q| q.where_eq("age", 20).or_where_eq("age", 24))
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![1, 2]);
}

#[test]
fn where_in_and_field_closures() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([
                { "id": 1, "age": 20 },
                { "id": 2, "age": 24 },
                { "id": 3, "age": 30 }
            ]),
        )
        .unwrap();

    let rows = store
        .query("users")
        .unwrap()
        .where_in("id", [1, 3])
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![1, 3]);

    let rows = store
        .query("users")
        .unwrap()
        .where_field("age", |age| age.as_i64().map_or(false, |n| n > 21))
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![2, 3]);
}

#[test]
fn sorting_is_stable_for_equal_keys() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([
                { "id": 1, "name": "John" },
                { "id": 4, "name": "Andy" },
                { "id": 2, "name": "Andy" }
            ]),
        )
        .unwrap();

    let rows = store.query("users").unwrap().order_by("name").get().unwrap();
    // the two Andys keep their insertion order
    assert_eq!(ids(&rows), vec![4, 2, 1]);
}

#[test]
fn sorting_mixes_directions_across_keys() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([
                { "id": 1, "name": "John" },
                { "id": 2, "name": "Andy" },
                { "id": 4, "name": "Andy" }
            ]),
        )
        .unwrap();

    // name ascending, ties broken by id descending
    let rows = store
        .query("users")
        .unwrap()
        .order_by("name")
        .order_by_desc("id")
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![4, 2, 1]);
}

#[test]
fn pagination_applies_after_sorting() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([
                { "id": 1 }, { "id": 2 }, { "id": 3 }, { "id": 4 }, { "id": 5 }
            ]),
        )
        .unwrap();

    let rows = store
        .query("users")
        .unwrap()
        .order_by_desc("id")
        .offset(1)
        .limit(2)
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![4, 3]);
}

#[test]
fn find_bypasses_conditions_but_honors_loads() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([
                { "id": 1 },
                { "id": 2, "posts": [{ "id": 10 }] }
            ]),
        )
        .unwrap();

    let found = store
        .query("users")
        .unwrap()
        .where_eq("id", 1)
        .with("posts")
        .find(&json!(2))
        .unwrap()
        .unwrap();
    assert_eq!(found["id"], json!(2));
    assert_eq!(found["posts"][0]["id"], json!(10));

    assert!(store
        .query("users")
        .unwrap()
        .find(&json!(99))
        .unwrap()
        .is_none());
}

#[test]
fn aggregates_over_the_filtered_result() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([
                { "id": 1, "age": 20, "active": true },
                { "id": 2, "age": 24, "active": true },
                { "id": 3, "age": 30, "active": false }
            ]),
        )
        .unwrap();

    let active = store.query("users").unwrap().where_eq("active", true);
    assert_eq!(active.count().unwrap(), 2);
    assert!(store
        .query("users")
        .unwrap()
        .where_eq("age", 24)
        .exists()
        .unwrap());
    assert_eq!(store.query("users").unwrap().max("age").unwrap(), Some(30.0));
    assert_eq!(
        store
            .query("users")
            .unwrap()
            .where_eq("active", true)
            .min("age")
            .unwrap(),
        Some(20.0)
    );
    assert_eq!(store.query("users").unwrap().max("name").unwrap(), None);
}

#[test]
fn existence_filters_compare_related_counts() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([
                { "id": 1, "posts": [{ "id": 10 }] },
                { "id": 2, "posts": [{ "id": 11 }, { "id": 12, "published": true }] },
                { "id": 3 }
            ]),
        )
        .unwrap();

    let rows = store.query("users").unwrap().has("posts").get().unwrap();
    assert_eq!(ids(&rows), vec![1, 2]);

    let rows = store
        .query("users")
        .unwrap()
        .has_op("posts", ">", 1)
        .unwrap()
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![2]);

    let rows = store.query("users").unwrap().has_not("posts").get().unwrap();
    assert_eq!(ids(&rows), vec![3]);

    let rows = store
        .query("users")
        .unwrap()
        .where_has("posts", |q| q.where_eq("published", true))
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![2]);

    let rows = store
        .query("users")
        .unwrap()
        .where_has_not("posts", |q| q.where_eq("published", true))
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![1, 3]);
}

#[test]
fn pivot_rows_are_deterministic_and_reinserts_are_idempotent() {
    let mut store = blog_store();
    let payload = json!({
        "id": 1,
        "roles": [{ "id": 10, "name": "admin", "pivot": { "level": 5 } }]
    });
    store.insert("users", &payload).unwrap();
    store.insert("users", &payload).unwrap();

    let pivots = store.table("role_user").unwrap();
    assert_eq!(pivots.len(), 1);
    let row = &pivots["1_10"];
    assert_eq!(row["user_id"], json!(1));
    assert_eq!(row["role_id"], json!(10));
    // inline pivot data landed on the junction row
    assert_eq!(row["level"], json!(5));

    let users = store.query("users").unwrap().with("roles").get().unwrap();
    let roles = users[0]["roles"].as_array().unwrap();
    assert_eq!(roles[0]["name"], json!("admin"));
    assert_eq!(roles[0]["pivot"]["level"], json!(5));
}

#[test]
fn auto_increment_assigns_and_rekeys_synthetic_ids() {
    let mut registry = SchemaRegistry::new();
    registry.register(
        EntitySchema::new("notes")
            .increment("id")
            .attr_default("body", json!("")),
    );
    let mut store = Store::new(registry);

    store.insert("notes", &json!({ "body": "a" })).unwrap();
    store.insert("notes", &json!({ "body": "b" })).unwrap();

    let notes = store.table("notes").unwrap();
    let keys: Vec<&String> = notes.keys().collect();
    assert_eq!(keys, ["1", "2"]);
    assert_eq!(notes["2"]["id"], json!(2));

    // explicit ids push the sequence forward
    store.insert("notes", &json!({ "id": 10 })).unwrap();
    store.insert("notes", &json!({ "body": "c" })).unwrap();
    assert!(store.table("notes").unwrap().contains_key("11"));
}

#[test]
fn incremented_parent_keys_propagate_to_children() {
    let mut registry = SchemaRegistry::new();
    registry.register(
        EntitySchema::new("lists")
            .increment("id")
            .has_many("items", "items", "list_id", "id"),
    );
    registry.register(EntitySchema::new("items").attr("id").attr("list_id"));
    let mut store = Store::new(registry);

    store
        .insert("lists", &json!({ "items": [{ "id": 7 }] }))
        .unwrap();

    assert!(store.table("lists").unwrap().contains_key("1"));
    assert_eq!(store.table("items").unwrap()["7"]["list_id"], json!(1));
}

#[test]
fn update_requires_the_primary_key() {
    let mut store = blog_store();
    store.insert("users", &json!({ "id": 1 })).unwrap();
    assert!(matches!(
        store.update("users", &json!({ "name": "x" })),
        Err(OrmError::InvalidUpdate(_))
    ));
    assert!(matches!(
        store.update("users", &json!([1, 2])),
        Err(OrmError::InvalidUpdate(_))
    ));
}

#[test]
fn update_merges_declared_fields_only() {
    let mut store = blog_store();
    store
        .insert("users", &json!({ "id": 1, "name": "Ada", "age": 36 }))
        .unwrap();

    let updated = store
        .update("users", &json!({ "id": 1, "name": "Grace", "bogus": true }))
        .unwrap()
        .unwrap();
    assert_eq!(updated["name"], json!("Grace"));
    assert_eq!(updated["age"], json!(36));
    assert!(updated.get("bogus").is_none());

    // unknown target is a miss, not an error
    assert!(store
        .update("users", &json!({ "id": 9, "name": "x" }))
        .unwrap()
        .is_none());
}

#[test]
fn update_where_and_closure_updates() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([
                { "id": 1, "age": 20 },
                { "id": 2, "age": 24 },
                { "id": 3, "age": 30 }
            ]),
        )
        .unwrap();

    let updated = store
        .update_where("users", &json!({ "active": true }), |record| {
            record.get("age").and_then(Value::as_i64).map_or(false, |age| age > 21)
        })
        .unwrap();
    assert_eq!(ids(&updated), vec![2, 3]);
    assert_eq!(store.table("users").unwrap()["2"]["active"], json!(true));
    assert!(store.table("users").unwrap()["1"].get("active").is_none());

    store
        .update_by_id_with("users", &json!(1), |record| {
            record.insert("age".to_string(), json!(21));
        })
        .unwrap();
    assert_eq!(store.table("users").unwrap()["1"]["age"], json!(21));
}

#[test]
fn composite_keys_key_by_json_array() {
    let mut registry = SchemaRegistry::new();
    registry.register(
        EntitySchema::new("subscriptions")
            .composite_key(["user_id", "plan"])
            .attr("user_id")
            .attr("plan")
            .attr_default("active", json!(false)),
    );
    let mut store = Store::new(registry);
    store
        .insert(
            "subscriptions",
            &json!({ "user_id": 1, "plan": "pro", "active": false }),
        )
        .unwrap();

    assert!(store
        .table("subscriptions")
        .unwrap()
        .contains_key("[1,\"pro\"]"));

    let found = store
        .query("subscriptions")
        .unwrap()
        .find(&json!([1, "pro"]))
        .unwrap();
    assert!(found.is_some());

    // a scalar id cannot address a composite-key record
    assert!(matches!(
        store.update_by_id_with("subscriptions", &json!(1), |_| {}),
        Err(OrmError::InvalidUpdate(_))
    ));

    let updated = store
        .update_by_id("subscriptions", &json!([1, "pro"]), &json!({ "active": true }))
        .unwrap()
        .unwrap();
    assert_eq!(updated["active"], json!(true));
}

#[test]
fn deletes_by_id_predicate_and_all() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([{ "id": 1, "age": 20 }, { "id": 2, "age": 30 }, { "id": 3, "age": 40 }]),
        )
        .unwrap();

    let deleted = store.delete("users", &json!(1)).unwrap().unwrap();
    assert_eq!(deleted["id"], json!(1));
    assert!(store.delete("users", &json!(1)).unwrap().is_none());

    let count = store
        .delete_where("users", |record| {
            record.get("age").and_then(Value::as_i64).map_or(false, |age| age > 35)
        })
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(store.table("users").unwrap().len(), 1);

    store.delete_all("users").unwrap();
    assert!(store.table("users").unwrap().is_empty());
}

#[test]
fn before_hooks_veto_individual_records() {
    let mut store = blog_store();
    store.hooks_mut().before(Mutation::Create, |_, record| {
        record.get("id") != Some(&json!(2))
    });
    store
        .insert("users", &json!([{ "id": 1 }, { "id": 2 }, { "id": 3 }]))
        .unwrap();

    let users = store.table("users").unwrap();
    assert_eq!(users.len(), 2);
    assert!(!users.contains_key("2"));
}

#[test]
fn insert_or_update_routes_collisions_through_update_hooks() {
    use std::cell::Cell;
    use std::rc::Rc;

    let mut store = blog_store();
    let updates = Rc::new(Cell::new(0));
    let counter = Rc::clone(&updates);
    store.hooks_mut().after(Mutation::Update, move |_, _| {
        counter.set(counter.get() + 1);
    });

    store
        .insert_or_update("users", &json!({ "id": 1, "name": "Ada" }))
        .unwrap();
    assert_eq!(updates.get(), 0);

    store
        .insert_or_update("users", &json!({ "id": 1, "age": 36 }))
        .unwrap();
    assert_eq!(updates.get(), 1);
    let record = &store.table("users").unwrap()["1"];
    assert_eq!(record["name"], json!("Ada"));
    assert_eq!(record["age"], json!(36));
}

#[test]
fn hydration_fills_defaults_and_applies_mutators() {
    let mut registry = SchemaRegistry::new();
    registry.register(
        EntitySchema::new("people")
            .attr("id")
            .attr_mutated("name", json!(""), |value| {
                Value::String(value.as_str().unwrap_or("").to_uppercase())
            })
            .attr_default("role", json!("guest")),
    );
    let mut store = Store::new(registry);
    store.insert("people", &json!({ "id": 1, "name": "ada" })).unwrap();

    let rows = store.all("people").unwrap();
    assert_eq!(rows[0]["name"], json!("ADA"));
    assert_eq!(rows[0]["role"], json!("guest"));
    // the stored record stays raw
    assert_eq!(store.table("people").unwrap()["1"]["name"], json!("ada"));
    assert!(store.table("people").unwrap()["1"].get("role").is_none());
}

#[test]
fn conditions_match_against_hydrated_defaults() {
    let mut store = blog_store();
    store
        .insert(
            "users",
            &json!([{ "id": 1 }, { "id": 2, "active": true }]),
        )
        .unwrap();

    // user 1 never stored "active"; the schema default makes it filterable
    let rows = store
        .query("users")
        .unwrap()
        .where_eq("active", false)
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![1]);

    let rows = store
        .query("users")
        .unwrap()
        .where_query(|q| q.where_eq("active", false))
        .get()
        .unwrap();
    assert_eq!(ids(&rows), vec![1]);
}

#[test]
fn wildcard_loads_one_level_and_recursion_goes_deeper() {
    let mut store = blog_store();
    store
        .create(
            "users",
            &json!({
                "id": 1,
                "posts": [{ "id": 10, "comments": [{ "id": 100, "body": "nice" }] }]
            }),
        )
        .unwrap();

    let users = store.query("users").unwrap().with_all().get().unwrap();
    assert_eq!(users[0]["profile"], Value::Null);
    assert_eq!(users[0]["roles"], json!([]));
    // depth 0 stops below the first level: the post still holds raw ids
    assert_eq!(users[0]["posts"][0]["comments"], json!(["100"]));

    let users = store
        .query("users")
        .unwrap()
        .with_all_recursive(1)
        .get()
        .unwrap();
    assert_eq!(users[0]["posts"][0]["comments"][0]["body"], json!("nice"));
}

#[test]
fn eager_load_constraints_filter_and_order_related_rows() {
    let mut store = blog_store();
    store
        .create(
            "users",
            &json!({
                "id": 1,
                "posts": [
                    { "id": 10, "published": true },
                    { "id": 11, "published": false },
                    { "id": 12, "published": true }
                ]
            }),
        )
        .unwrap();

    let users = store
        .query("users")
        .unwrap()
        .with_constraint("posts", |q| q.where_eq("published", true))
        .get()
        .unwrap();
    let post_ids: Vec<i64> = users[0]["posts"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|post| post["id"].as_i64())
        .collect();
    assert_eq!(post_ids, vec![10, 12]);

    let users = store
        .query("users")
        .unwrap()
        .with_constraint("posts", |q| q.order_by_desc("id"))
        .get()
        .unwrap();
    let posts = users[0]["posts"].as_array().unwrap();
    assert_eq!(posts[0]["id"], json!(12));
    assert_eq!(posts[2]["id"], json!(10));
}

#[test]
fn unknown_relations_in_load_paths_are_ignored() {
    let mut store = blog_store();
    store.insert("users", &json!({ "id": 1 })).unwrap();
    let users = store.query("users").unwrap().with("bogus").get().unwrap();
    assert!(users[0].get("bogus").is_none());
}

#[test]
fn belongs_to_attaches_and_loads_the_owner() {
    let mut store = blog_store();
    store
        .insert(
            "posts",
            &json!({ "id": 10, "author": { "id": 1, "name": "Ada" } }),
        )
        .unwrap();

    assert_eq!(store.table("posts").unwrap()["10"]["user_id"], json!(1));

    let posts = store.query("posts").unwrap().with("author").get().unwrap();
    assert_eq!(posts[0]["author"]["name"], json!("Ada"));
}

#[test]
fn has_many_by_follows_the_id_list_order() {
    let mut registry = SchemaRegistry::new();
    registry.register(
        EntitySchema::new("playlists")
            .attr("id")
            .attr("track_ids")
            .has_many_by("tracks", "tracks", "track_ids", "id"),
    );
    registry.register(
        EntitySchema::new("tracks")
            .attr("id")
            .attr_default("title", json!("")),
    );
    let mut store = Store::new(registry);
    store
        .insert(
            "playlists",
            &json!({ "id": 1, "tracks": [{ "id": 6 }, { "id": 5 }] }),
        )
        .unwrap();

    assert_eq!(
        store.table("playlists").unwrap()["1"]["track_ids"],
        json!([6, 5])
    );
    let playlists = store.query("playlists").unwrap().with("tracks").get().unwrap();
    let tracks = playlists[0]["tracks"].as_array().unwrap();
    assert_eq!(tracks[0]["id"], json!(6));
    assert_eq!(tracks[1]["id"], json!(5));
}

#[test]
fn polymorphic_relations_resolve_per_type() {
    let mut registry = SchemaRegistry::new();
    registry.register(
        EntitySchema::new("posts")
            .attr("id")
            .morph_many("comments", "comments", "commentable_id", "commentable_type", "id"),
    );
    registry.register(
        EntitySchema::new("videos")
            .attr("id")
            .attr_default("url", json!(""))
            .morph_many("comments", "comments", "commentable_id", "commentable_type", "id"),
    );
    registry.register(
        EntitySchema::new("comments")
            .attr("id")
            .attr_default("body", json!(""))
            .attr("commentable_id")
            .attr("commentable_type")
            .morph_to("commentable", "commentable_id", "commentable_type"),
    );
    let mut store = Store::new(registry);
    store
        .insert(
            "posts",
            &json!({ "id": 1, "comments": [{ "id": 100, "body": "a" }] }),
        )
        .unwrap();
    store
        .insert(
            "videos",
            &json!({ "id": 9, "url": "v", "comments": [{ "id": 101, "body": "b" }] }),
        )
        .unwrap();

    let comments = store.table("comments").unwrap();
    assert_eq!(comments["100"]["commentable_type"], json!("posts"));
    assert_eq!(comments["100"]["commentable_id"], json!(1));

    let posts = store.query("posts").unwrap().with("comments").get().unwrap();
    assert_eq!(posts[0]["comments"][0]["id"], json!(100));

    // the inverse dispatches per record type
    let loaded = store
        .query("comments")
        .unwrap()
        .with("commentable")
        .get()
        .unwrap();
    assert_eq!(loaded[0]["commentable"]["id"], json!(1));
    assert_eq!(loaded[1]["commentable"]["url"], json!("v"));
}
