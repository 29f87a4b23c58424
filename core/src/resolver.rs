//! Resolves dotted column paths against the schema.
//!
//! `title` is a root column, `user.name` walks the `user` relation,
//! `user.team.name` walks two, and `pivot.position` addresses the pivot
//! table of a many-to-many source. A dotted remainder that does not name a
//! relation is a JSON path inside the leaf column (`meta.author`).

use compact_str::{CompactString, format_compact};

use crate::error::{DataTablesError, Result};
use crate::join::Join;
use crate::query::Query;
use crate::schema::{Entity, Relation, RelationKind, Schema};
use crate::sql::ColumnRef;

/// A resolved column and the joins that resolving it added to the query.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved {
    pub column: ColumnRef,
    pub joins: Vec<CompactString>,
}

/// Alias under which a related table is joined.
///
/// Aliases are keyed by table only: two relations reaching the same table
/// (`user.name` and `comments.author.name`) share one join, and the later
/// path reuses the ON condition of the first.
pub fn join_alias(table: &str) -> CompactString {
    format_compact!("{table}_join")
}

#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    schema: &'a Schema,
}

impl<'a> Resolver<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    pub fn resolve(&self, query: &mut Query, path: &str) -> Result<Resolved> {
        let mut joins = Vec::new();

        if let Some(pivot) = query.pivot() {
            if let Some((accessor, column)) = path.split_once('.') {
                if pivot.accessor == accessor {
                    return Ok(Resolved {
                        column: ColumnRef::with_json(pivot.table.clone(), column),
                        joins,
                    });
                }
            }
        }

        let mut entity = self.schema.get(query.entity())?;
        let mut alias = CompactString::from(query.table_name());
        let mut rest = path;

        while let Some((segment, remainder)) = rest.split_once('.') {
            let Some(relation) = entity.find_relation(segment) else {
                break;
            };
            let related = self.schema.get(&relation.target)?;

            if let RelationKind::BelongsToMany(pivot) = &relation.kind {
                let (accessor_segment, pivot_column) =
                    remainder.split_once('.').unwrap_or((remainder, ""));
                if pivot.accessor == accessor_segment && !pivot_column.is_empty() {
                    self.join_pivot(query, &alias, relation, &mut joins);
                    return Ok(Resolved {
                        column: ColumnRef::with_json(pivot.table.clone(), pivot_column),
                        joins,
                    });
                }
            }

            alias = self.join_related(query, entity, &alias, relation, related, &mut joins)?;
            entity = related;
            rest = remainder;
        }

        Ok(Resolved {
            column: ColumnRef::with_json(alias, rest),
            joins,
        })
    }

    fn join_pivot(
        &self,
        query: &mut Query,
        parent_alias: &str,
        relation: &Relation,
        joins: &mut Vec<CompactString>,
    ) {
        let RelationKind::BelongsToMany(pivot) = &relation.kind else {
            return;
        };
        let join = Join::left(
            pivot.table.clone(),
            ColumnRef::new(pivot.table.clone(), pivot.foreign_pivot_key.clone()),
            ColumnRef::new(parent_alias, pivot.parent_key.clone()),
        );
        if query.join(join) {
            joins.push(pivot.table.clone());
        }
    }

    /// Joins `related` onto the table addressed by `parent_alias` and
    /// returns the alias the related table is reachable under.
    fn join_related(
        &self,
        query: &mut Query,
        parent: &Entity,
        parent_alias: &str,
        relation: &Relation,
        related: &Entity,
        joins: &mut Vec<CompactString>,
    ) -> Result<CompactString> {
        let alias = join_alias(&related.table);
        let related_key = |column: &CompactString| ColumnRef::new(alias.clone(), column.clone());

        let join = match &relation.kind {
            RelationKind::HasOne {
                foreign_key,
                local_key,
            }
            | RelationKind::HasMany {
                foreign_key,
                local_key,
            } => Join::left(
                related.table.clone(),
                related_key(foreign_key),
                ColumnRef::new(parent_alias, local_key.clone()),
            ),
            RelationKind::BelongsTo {
                foreign_key,
                owner_key,
            } => Join::left(
                related.table.clone(),
                ColumnRef::new(parent_alias, foreign_key.clone()),
                related_key(owner_key),
            ),
            RelationKind::BelongsToMany(pivot) => {
                self.join_pivot(query, parent_alias, relation, joins);
                Join::left(
                    related.table.clone(),
                    ColumnRef::new(pivot.table.clone(), pivot.related_pivot_key.clone()),
                    related_key(&pivot.related_key),
                )
            }
            kind @ RelationKind::MorphTo { .. } => {
                return Err(DataTablesError::UnsupportedRelation {
                    entity: parent.name.to_string(),
                    relation: relation.name.to_string(),
                    kind: kind.name(),
                });
            }
        };

        let mut join = join.alias(alias.clone());
        if let Some(deleted_at) = &related.deleted_at {
            join = join.without_trashed(ColumnRef::new(alias.clone(), deleted_at.clone()));
        }
        if query.join(join) {
            joins.push(alias.clone());
        }
        Ok(alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Pivot;
    use crate::Dialect;

    fn schema() -> Schema {
        Schema::new()
            .entity(
                Entity::new("posts")
                    .belongs_to("user", "users", "user_id")
                    .has_many("comments", "comments", "post_id")
                    .belongs_to_many(
                        "categories",
                        "categories",
                        Pivot::new("category_post", "post_id", "category_id").with_pivot(["position"]),
                    )
                    .relation(
                        "commentable",
                        "users",
                        RelationKind::MorphTo {
                            type_column: "commentable_type".into(),
                            id_column: "commentable_id".into(),
                        },
                    ),
            )
            .entity(Entity::new("users").has_one("profile", "profiles", "user_id"))
            .entity(Entity::new("profiles"))
            .entity(
                Entity::new("comments")
                    .soft_deletes("deleted_at")
                    .belongs_to("author", "users", "author_id"),
            )
            .entity(Entity::new("categories"))
    }

    fn from_sql(query: &Query) -> String {
        query.to_count_sql().sql(Dialect::SQLite)
    }

    #[test]
    fn root_column() {
        let schema = schema();
        let mut query = Query::table(&schema, "posts").unwrap();
        let resolved = Resolver::new(&schema).resolve(&mut query, "title").unwrap();
        assert_eq!(resolved.column, ColumnRef::new("posts", "title"));
        assert!(resolved.joins.is_empty());
        assert!(query.joins().is_empty());
    }

    #[test]
    fn json_leaf_column() {
        let schema = schema();
        let mut query = Query::table(&schema, "posts").unwrap();
        let resolved = Resolver::new(&schema).resolve(&mut query, "meta.author").unwrap();
        assert_eq!(resolved.column, ColumnRef::with_json("posts", "meta.author"));
    }

    #[test]
    fn belongs_to_joins_once() {
        let schema = schema();
        let resolver = Resolver::new(&schema);
        let mut query = Query::table(&schema, "posts").unwrap();

        let first = resolver.resolve(&mut query, "user.name").unwrap();
        let second = resolver.resolve(&mut query, "user.email").unwrap();

        assert_eq!(first.column, ColumnRef::new("users_join", "name"));
        assert_eq!(first.joins, vec![CompactString::from("users_join")]);
        assert!(second.joins.is_empty());
        assert_eq!(
            from_sql(&query),
            r#"SELECT COUNT(*) AS "aggregate" FROM "posts" LEFT JOIN "users" AS "users_join" ON "posts"."user_id" = "users_join"."id""#
        );
    }

    #[test]
    fn joins_are_keyed_by_table() {
        let schema = schema();
        let resolver = Resolver::new(&schema);
        let mut query = Query::table(&schema, "posts").unwrap();

        resolver.resolve(&mut query, "user.name").unwrap();
        let author = resolver
            .resolve(&mut query, "comments.author.name")
            .unwrap();

        assert_eq!(author.column, ColumnRef::new("users_join", "name"));
        assert_eq!(author.joins, vec![CompactString::from("comments_join")]);
        assert_eq!(query.joins().len(), 2);
        let sql = from_sql(&query);
        assert!(sql.contains(r#"ON "posts"."user_id" = "users_join"."id""#), "{sql}");
        assert!(!sql.contains("author_id"), "{sql}");
    }

    #[test]
    fn nested_relations() {
        let schema = schema();
        let mut query = Query::table(&schema, "posts").unwrap();
        let resolved = Resolver::new(&schema)
            .resolve(&mut query, "user.profile.bio")
            .unwrap();

        assert_eq!(resolved.column, ColumnRef::new("profiles_join", "bio"));
        assert_eq!(query.joins().len(), 2);
        assert!(from_sql(&query).ends_with(
            r#"LEFT JOIN "profiles" AS "profiles_join" ON "profiles_join"."user_id" = "users_join"."id""#
        ));
    }

    #[test]
    fn has_many_with_soft_deletes() {
        let schema = schema();
        let mut query = Query::table(&schema, "posts").unwrap();
        Resolver::new(&schema)
            .resolve(&mut query, "comments.body")
            .unwrap();
        assert!(from_sql(&query).ends_with(
            r#"LEFT JOIN "comments" AS "comments_join" ON "comments_join"."post_id" = "posts"."id" AND "comments_join"."deleted_at" IS NULL"#
        ));
    }

    #[test]
    fn belongs_to_many_joins_pivot_then_related() {
        let schema = schema();
        let resolver = Resolver::new(&schema);
        let mut query = Query::table(&schema, "posts").unwrap();

        let name = resolver.resolve(&mut query, "categories.name").unwrap();
        let position = resolver
            .resolve(&mut query, "categories.pivot.position")
            .unwrap();

        assert_eq!(name.column, ColumnRef::new("categories_join", "name"));
        assert_eq!(position.column, ColumnRef::new("category_post", "position"));
        assert!(position.joins.is_empty());
        assert_eq!(
            from_sql(&query),
            concat!(
                r#"SELECT COUNT(*) AS "aggregate" FROM "posts" "#,
                r#"LEFT JOIN "category_post" ON "category_post"."post_id" = "posts"."id" "#,
                r#"LEFT JOIN "categories" AS "categories_join" ON "category_post"."category_id" = "categories_join"."id""#
            )
        );
    }

    #[test]
    fn pivot_accessor_of_relation_scope() {
        let schema = schema()
            .entity(Entity::new("tags").belongs_to_many(
                "posts",
                "posts",
                Pivot::new("post_tag", "tag_id", "post_id"),
            ));
        let mut query = Query::for_relation(&schema, "tags", "posts", 1).unwrap();
        let resolved = Resolver::new(&schema)
            .resolve(&mut query, "pivot.tag_id")
            .unwrap();

        assert_eq!(resolved.column, ColumnRef::new("post_tag", "tag_id"));
        assert!(resolved.joins.is_empty());
        assert_eq!(query.joins().len(), 1);
    }

    #[test]
    fn morph_to_is_unsupported() {
        let schema = schema();
        let mut query = Query::table(&schema, "posts").unwrap();
        let err = Resolver::new(&schema)
            .resolve(&mut query, "commentable.name")
            .unwrap_err();
        assert!(matches!(
            err,
            DataTablesError::UnsupportedRelation { kind: "morphTo", .. }
        ));
    }
}
