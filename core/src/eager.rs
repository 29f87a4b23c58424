//! Loads declared relations onto fetched records.
//!
//! One query per relation and nesting level: the keys of every parent
//! record are collected and the related rows are fetched with `IN (...)`.

use compact_str::CompactString;
use hashbrown::HashMap;
use serde_json::Value;

use crate::driver::{Driver, Record};
use crate::error::{DataTablesError, Result};
use crate::query::{OrderBy, Query};
use crate::schema::{RelationKind, Schema};
use crate::sql::ColumnRef;

/// Splits `["user", "user.team", "tags"]` into
/// `[("user", ["team"]), ("tags", [])]`, keeping first-seen order.
fn group_paths<S: AsRef<str>>(paths: &[S]) -> Vec<(CompactString, Vec<String>)> {
    let mut groups: Vec<(CompactString, Vec<String>)> = Vec::new();
    for path in paths {
        let (head, tail) = match path.as_ref().split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (path.as_ref(), None),
        };
        let index = match groups.iter().position(|(name, _)| name == head) {
            Some(index) => index,
            None => {
                groups.push((head.into(), Vec::new()));
                groups.len() - 1
            }
        };
        if let Some(tail) = tail {
            groups[index].1.push(tail.to_string());
        }
    }
    groups
}

fn key_of(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn collect_keys(records: &[Record], column: &str) -> Vec<Value> {
    let mut seen = hashbrown::HashSet::new();
    records
        .iter()
        .filter_map(|record| {
            let value = record.get(column)?;
            let key = key_of(Some(value))?;
            seen.insert(key).then(|| value.clone())
        })
        .collect()
}

fn group_by<F>(records: Vec<Record>, key: F) -> HashMap<String, Vec<Record>>
where
    F: Fn(&Record) -> Option<String>,
{
    let mut groups: HashMap<String, Vec<Record>> = HashMap::new();
    for record in records {
        if let Some(key) = key(&record) {
            groups.entry(key).or_default().push(record);
        }
    }
    groups
}

/// Attaches the relations named by `paths` to `records` of `entity`.
pub fn load<D, S>(
    schema: &Schema,
    driver: &D,
    entity: &str,
    records: &mut [Record],
    paths: &[S],
) -> Result<()>
where
    D: Driver + ?Sized,
    S: AsRef<str>,
{
    if records.is_empty() {
        return Ok(());
    }
    let parent = schema.get(entity)?;

    for (name, nested) in group_paths(paths) {
        let (relation, related) = schema.related(parent, &name)?;
        let mut query = Query::table(schema, &related.name)?;

        // (parent column holding the key, related-side key extractor)
        let (parent_column, related_key): (&str, Box<dyn Fn(&Record) -> Option<String>>) =
            match &relation.kind {
                RelationKind::HasOne {
                    foreign_key,
                    local_key,
                }
                | RelationKind::HasMany {
                    foreign_key,
                    local_key,
                } => {
                    let keys = collect_keys(records, local_key);
                    let column = query.qualify(foreign_key.clone());
                    query.where_mut().where_in(column, keys);
                    let foreign_key = foreign_key.clone();
                    (
                        local_key.as_str(),
                        Box::new(move |record: &Record| key_of(record.get(foreign_key.as_str()))),
                    )
                }
                RelationKind::BelongsTo {
                    foreign_key,
                    owner_key,
                } => {
                    let keys = collect_keys(records, foreign_key);
                    let column = query.qualify(owner_key.clone());
                    query.where_mut().where_in(column, keys);
                    let owner_key = owner_key.clone();
                    (
                        foreign_key.as_str(),
                        Box::new(move |record: &Record| key_of(record.get(owner_key.as_str()))),
                    )
                }
                RelationKind::BelongsToMany(pivot) => {
                    let keys = collect_keys(records, &pivot.parent_key);
                    query.through(pivot).select_root();
                    query.where_mut().where_in(
                        ColumnRef::new(pivot.table.clone(), pivot.foreign_pivot_key.clone()),
                        keys,
                    );
                    let accessor = pivot.accessor.clone();
                    let foreign_pivot_key = pivot.foreign_pivot_key.clone();
                    (
                        pivot.parent_key.as_str(),
                        Box::new(move |record: &Record| {
                            let pivot = record.get(accessor.as_str())?;
                            key_of(pivot.get(foreign_pivot_key.as_str()))
                        }),
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

        query.order_by_column(query.qualify(related.primary_key.clone()), OrderBy::Asc);
        let mut children = driver.get(&query)?;
        load(schema, driver, &related.name, &mut children, nested.as_slice())?;

        let groups = group_by(children, related_key);
        for record in records.iter_mut() {
            let matches = key_of(record.get(parent_column))
                .and_then(|key| groups.get(&key))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let value = if relation.kind.is_to_one() {
                matches
                    .first()
                    .cloned()
                    .map(Value::Object)
                    .unwrap_or(Value::Null)
            } else {
                Value::Array(matches.iter().cloned().map(Value::Object).collect())
            };
            record.insert(name.to_string(), value);
        }
    }

    Ok(())
}
