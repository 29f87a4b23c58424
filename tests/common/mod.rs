#![cfg(feature = "rusqlite")]
#![allow(dead_code)]

use std::sync::Arc;

use datatables::sqlite::SqliteDriver;
use datatables::{
    Builder, Config, DataTable, Entity, Pivot, Query, RelationKind, Request, Schema, Source,
};
use serde_json::{Value, json};

const TABLES: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        password TEXT NOT NULL
    );
    CREATE TABLE posts (
        id INTEGER PRIMARY KEY,
        user_id INTEGER REFERENCES users (id),
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        meta TEXT,
        deleted_at TEXT
    );
    CREATE TABLE comments (
        id INTEGER PRIMARY KEY,
        post_id INTEGER NOT NULL REFERENCES posts (id),
        body TEXT NOT NULL,
        deleted_at TEXT
    );
    CREATE TABLE categories (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );
    CREATE TABLE category_post (
        category_id INTEGER NOT NULL REFERENCES categories (id),
        post_id INTEGER NOT NULL REFERENCES posts (id),
        position INTEGER NOT NULL
    );
";

const SEED: &str = r#"
    INSERT INTO users (id, name, email, password) VALUES
        (1, 'Alice', 'alice@example.com', 'hunter2'),
        (2, 'Bob', 'bob@example.com', 'hunter3'),
        (3, 'Carol', 'carol@example.com', 'hunter4');
    INSERT INTO posts (id, user_id, title, content, meta, deleted_at) VALUES
        (1, 1, 'First post', '<b>hello</b>', '{"color":"red"}', NULL),
        (2, 2, 'Second post', 'plain text', '{"color":"blue"}', NULL),
        (3, 1, 'Third post', 'more text', '{"color":"red"}', NULL),
        (4, 3, 'Fourth post', 'last text', '{"color":"green"}', NULL),
        (5, 2, 'Removed post', 'gone', NULL, '2024-01-01 00:00:00');
    INSERT INTO comments (id, post_id, body, deleted_at) VALUES
        (1, 1, 'Nice', NULL),
        (2, 1, 'Spam', '2024-01-01 00:00:00'),
        (3, 2, 'Great', NULL);
    INSERT INTO categories (id, name) VALUES
        (1, 'News'),
        (2, 'Tech');
    INSERT INTO category_post (category_id, post_id, position) VALUES
        (1, 1, 2),
        (1, 2, 1),
        (2, 1, 1),
        (2, 3, 3);
"#;

/// An in-memory database with users, posts, comments and categories.
pub fn setup_db() -> SqliteDriver {
    let driver = SqliteDriver::open_in_memory().expect("Failed to create in-memory database");
    driver
        .conn()
        .execute_batch(TABLES)
        .expect("Failed to create tables");
    driver.conn().execute_batch(SEED).expect("Failed to seed");
    driver
}

pub fn schema() -> Arc<Schema> {
    let categories = Pivot::new("category_post", "post_id", "category_id").with_pivot(["position"]);
    let posts = Pivot::new("category_post", "category_id", "post_id").with_pivot(["position"]);

    Arc::new(
        Schema::new()
            .entity(Entity::new("users").has_many("posts", "posts", "user_id"))
            .entity(
                Entity::new("posts")
                    .soft_deletes("deleted_at")
                    .belongs_to("user", "users", "user_id")
                    .has_many("comments", "comments", "post_id")
                    .belongs_to_many("categories", "categories", categories)
                    .relation(
                        "subject",
                        "users",
                        RelationKind::MorphTo {
                            type_column: "subject_type".into(),
                            id_column: "subject_id".into(),
                        },
                    ),
            )
            .entity(
                Entity::new("comments")
                    .soft_deletes("deleted_at")
                    .belongs_to("post", "posts", "post_id"),
            )
            .entity(Entity::new("categories").belongs_to_many("posts", "posts", posts)),
    )
}

/// Every live post with its author loaded.
pub fn posts() -> Source {
    let schema = schema();
    let query = Query::table(&schema, "posts")
        .expect("posts is in the schema")
        .with(["user"]);
    Source::new(schema, query)
}

/// A request for `columns` (`data` names, all searchable and orderable).
pub fn request(columns: &[&str], extra: Value) -> Request {
    let mut body = json!({
        "draw": "1",
        "start": "0",
        "length": "10",
        "columns": columns
            .iter()
            .map(|data| json!({ "data": data, "searchable": "true", "orderable": "true" }))
            .collect::<Vec<_>>(),
    });
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    Request::from_value(&body)
}

pub fn build(request: &Request, source: &Source, config: &Config) -> DataTable {
    let driver = setup_db();
    Builder::new(request, source, config).build(&driver)
}

/// Values of `key` across the rows of a response.
pub fn column(table: &DataTable, key: &str) -> Vec<Value> {
    table
        .data
        .iter()
        .map(|row| row.get(key).cloned().unwrap_or(Value::Null))
        .collect()
}
