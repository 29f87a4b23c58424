//! The data-source seam.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::query::Query;
use crate::Dialect;

/// A fetched row keyed by column name.
pub type Record = Map<String, Value>;

/// Executes rendered queries against a store.
///
/// Implementations render with [`Query::to_count_sql`] and
/// [`Query::to_select_sql`] for their [`Dialect`] and convert rows into
/// [`Record`]s; dotted column aliases are nested with [`nest_dotted`].
pub trait Driver {
    fn dialect(&self) -> Dialect;

    /// Number of rows matching the query's filters.
    fn count(&self, query: &Query) -> Result<u64>;

    /// Rows selected by the query, in order.
    fn get(&self, query: &Query) -> Result<Vec<Record>>;
}

impl<D: Driver + ?Sized> Driver for &D {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn count(&self, query: &Query) -> Result<u64> {
        (**self).count(query)
    }

    fn get(&self, query: &Query) -> Result<Vec<Record>> {
        (**self).get(query)
    }
}

/// Moves `pivot.position`-style keys under a nested `pivot` object.
pub fn nest_dotted(record: Record) -> Record {
    if !record.keys().any(|key| key.contains('.')) {
        return record;
    }

    let mut nested = Map::new();
    for (key, value) in record {
        let Some((head, tail)) = key.split_once('.') else {
            nested.insert(key, value);
            continue;
        };
        let entry = nested
            .entry(head.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(inner) = entry {
            inner.insert(tail.to_string(), value);
        }
    }

    nested
        .into_iter()
        .map(|(key, value)| match value {
            Value::Object(inner) => (key, Value::Object(nest_dotted(inner))),
            other => (key, other),
        })
        .collect()
}
