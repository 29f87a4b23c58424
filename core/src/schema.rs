//! Entity and relation metadata consulted by the relation path resolver and
//! eager loader.

use compact_str::CompactString;
use hashbrown::HashMap;

use crate::error::{DataTablesError, Result};

/// Default accessor under which pivot columns are exposed.
pub const PIVOT_ACCESSOR: &str = "pivot";

/// Join-table metadata of a many-to-many relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pivot {
    /// The pivot table, e.g. `category_post`.
    pub table: CompactString,
    /// Pivot column referencing the parent (`category_id`).
    pub foreign_pivot_key: CompactString,
    /// Pivot column referencing the related entity (`post_id`).
    pub related_pivot_key: CompactString,
    /// Parent column matched by `foreign_pivot_key`.
    pub parent_key: CompactString,
    /// Related column matched by `related_pivot_key`.
    pub related_key: CompactString,
    pub accessor: CompactString,
    /// Extra pivot columns exposed under the accessor.
    pub columns: Vec<CompactString>,
}

impl Pivot {
    pub fn new(
        table: impl Into<CompactString>,
        foreign_pivot_key: impl Into<CompactString>,
        related_pivot_key: impl Into<CompactString>,
    ) -> Self {
        Self {
            table: table.into(),
            foreign_pivot_key: foreign_pivot_key.into(),
            related_pivot_key: related_pivot_key.into(),
            parent_key: "id".into(),
            related_key: "id".into(),
            accessor: PIVOT_ACCESSOR.into(),
            columns: Vec::new(),
        }
    }

    pub fn keys(
        mut self,
        parent_key: impl Into<CompactString>,
        related_key: impl Into<CompactString>,
    ) -> Self {
        self.parent_key = parent_key.into();
        self.related_key = related_key.into();
        self
    }

    pub fn accessor(mut self, accessor: impl Into<CompactString>) -> Self {
        self.accessor = accessor.into();
        self
    }

    pub fn with_pivot<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }
}

/// The closed set of relation kinds.
///
/// Each variant carries the key names its join shape needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationKind {
    /// `related.foreign_key = parent.local_key`, at most one row.
    HasOne {
        foreign_key: CompactString,
        local_key: CompactString,
    },
    /// `related.foreign_key = parent.local_key`, any number of rows.
    HasMany {
        foreign_key: CompactString,
        local_key: CompactString,
    },
    /// `parent.foreign_key = related.owner_key`.
    BelongsTo {
        foreign_key: CompactString,
        owner_key: CompactString,
    },
    /// Through a pivot table.
    BelongsToMany(Pivot),
    /// Polymorphic owner; the target table depends on row data.
    MorphTo {
        type_column: CompactString,
        id_column: CompactString,
    },
}

impl RelationKind {
    pub const fn name(&self) -> &'static str {
        match self {
            RelationKind::HasOne { .. } => "hasOne",
            RelationKind::HasMany { .. } => "hasMany",
            RelationKind::BelongsTo { .. } => "belongsTo",
            RelationKind::BelongsToMany(_) => "belongsToMany",
            RelationKind::MorphTo { .. } => "morphTo",
        }
    }

    /// Whether the relation yields at most one related record.
    pub const fn is_to_one(&self) -> bool {
        matches!(
            self,
            RelationKind::HasOne { .. } | RelationKind::BelongsTo { .. } | RelationKind::MorphTo { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
    pub name: CompactString,
    /// Name of the related entity in the schema.
    pub target: CompactString,
    pub kind: RelationKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    pub name: CompactString,
    pub table: CompactString,
    pub primary_key: CompactString,
    pub deleted_at: Option<CompactString>,
    relations: Vec<Relation>,
}

impl Entity {
    /// An entity whose name is also its table name, keyed by `id`.
    pub fn new(table: impl Into<CompactString>) -> Self {
        let table = table.into();
        Self {
            name: table.clone(),
            table,
            primary_key: "id".into(),
            deleted_at: None,
            relations: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<CompactString>) -> Self {
        self.table = table.into();
        self
    }

    pub fn primary_key(mut self, key: impl Into<CompactString>) -> Self {
        self.primary_key = key.into();
        self
    }

    /// Marks the entity as soft-deleting through the given timestamp column.
    pub fn soft_deletes(mut self, column: impl Into<CompactString>) -> Self {
        self.deleted_at = Some(column.into());
        self
    }

    pub fn relation(
        mut self,
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        kind: RelationKind,
    ) -> Self {
        self.relations.push(Relation {
            name: name.into(),
            target: target.into(),
            kind,
        });
        self
    }

    pub fn has_one(
        self,
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        foreign_key: impl Into<CompactString>,
    ) -> Self {
        let local_key = self.primary_key.clone();
        self.relation(
            name,
            target,
            RelationKind::HasOne {
                foreign_key: foreign_key.into(),
                local_key,
            },
        )
    }

    pub fn has_many(
        self,
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        foreign_key: impl Into<CompactString>,
    ) -> Self {
        let local_key = self.primary_key.clone();
        self.relation(
            name,
            target,
            RelationKind::HasMany {
                foreign_key: foreign_key.into(),
                local_key,
            },
        )
    }

    pub fn belongs_to(
        self,
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        foreign_key: impl Into<CompactString>,
    ) -> Self {
        self.relation(
            name,
            target,
            RelationKind::BelongsTo {
                foreign_key: foreign_key.into(),
                owner_key: "id".into(),
            },
        )
    }

    pub fn belongs_to_many(
        self,
        name: impl Into<CompactString>,
        target: impl Into<CompactString>,
        pivot: Pivot,
    ) -> Self {
        self.relation(name, target, RelationKind::BelongsToMany(pivot))
    }

    pub fn find_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }
}

/// Registry of entities addressed by name.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    entities: HashMap<CompactString, Entity>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    pub fn get(&self, name: &str) -> Result<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| DataTablesError::UnknownEntity(name.to_string()))
    }

    /// Looks up a relation and the entity it points to.
    pub fn related<'e>(
        &'e self,
        entity: &'e Entity,
        relation: &str,
    ) -> Result<(&'e Relation, &'e Entity)> {
        let relation = entity
            .find_relation(relation)
            .ok_or_else(|| DataTablesError::UnknownRelation {
                entity: entity.name.to_string(),
                relation: relation.to_string(),
            })?;
        let target = self.get(&relation.target)?;
        Ok((relation, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new()
            .entity(Entity::new("users"))
            .entity(Entity::new("posts").belongs_to("user", "users", "user_id"))
    }

    #[test]
    fn related_follows_a_relation_to_its_target() {
        let schema = schema();
        let posts = schema.get("posts").unwrap();

        let (relation, target) = schema.related(posts, "user").unwrap();

        assert_eq!(relation.name, "user");
        assert_eq!(target.table, "users");
    }

    #[test]
    fn related_accepts_entities_outside_the_schema() {
        let schema = schema();
        let draft = Entity::new("drafts").belongs_to("author", "users", "author_id");

        let (relation, target) = schema.related(&draft, "author").unwrap();
        assert_eq!(relation.target, "users");
        assert_eq!(target.table, "users");

        assert!(matches!(
            schema.related(&draft, "editor"),
            Err(DataTablesError::UnknownRelation { .. })
        ));
        let orphan = Entity::new("drafts").belongs_to("owner", "owners", "owner_id");
        assert!(matches!(
            schema.related(&orphan, "owner"),
            Err(DataTablesError::UnknownEntity(_))
        ));
    }
}
