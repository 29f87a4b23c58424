//! Typed view of a DataTables server-side request.
//!
//! Parsing never fails on malformed parameters: anything that does not
//! validate is dropped or left unset, the way the client-side library
//! tolerates partial requests.

use compact_str::CompactString;
use serde_json::{Map, Value};

use crate::error::{DataTablesError, Result};
use crate::query::OrderBy;

/// The `length` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Length {
    /// The `-1` sentinel: every row.
    All,
    Rows(u64),
}

/// A search term with its regex flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Search {
    pub value: String,
    pub regex: bool,
}

/// One entry of the `order` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Order {
    /// Index into the request's `columns` array.
    pub column: usize,
    pub dir: OrderBy,
}

/// Position of a column in the requested ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnOrder {
    pub dir: OrderBy,
    /// Position in the `order` array; lower sorts first.
    pub priority: usize,
}

/// One requested column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    /// Position in the request's `columns` array.
    pub index: usize,
    /// Output key of the column.
    pub data: CompactString,
    /// Source path used for searching and ordering; defaults to `data`.
    pub name: CompactString,
    pub searchable: bool,
    pub orderable: bool,
    pub search: Option<Search>,
    pub order: Option<ColumnOrder>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Request {
    draw: i64,
    start: Option<u64>,
    length: Option<Length>,
    search: Option<Search>,
    order: Vec<Order>,
    columns: Vec<Column>,
}

impl Request {
    /// Parses a decoded request body.
    ///
    /// Input that is not an object yields an empty request.
    pub fn from_value(value: &Value) -> Self {
        let Some(params) = value.as_object() else {
            return Self::default();
        };

        let order = params.get("order").map(parse_order).unwrap_or_default();
        let columns = params
            .get("columns")
            .map(|columns| parse_columns(columns, &order))
            .unwrap_or_default();

        Self {
            draw: params.get("draw").and_then(parse_int).unwrap_or(0),
            start: params
                .get("start")
                .and_then(parse_int)
                .and_then(|start| u64::try_from(start).ok()),
            length: params.get("length").and_then(parse_length),
            search: params.get("search").and_then(parse_search),
            order,
            columns,
        }
    }

    /// Parses a JSON request body.
    pub fn from_json(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)?;
        if !value.is_object() {
            return Err(DataTablesError::InvalidRequest(
                "request body must be a JSON object".to_string(),
            ));
        }
        Ok(Self::from_value(&value))
    }

    pub fn draw(&self) -> i64 {
        self.draw
    }

    pub fn start(&self) -> Option<u64> {
        self.start
    }

    pub fn length(&self) -> Option<Length> {
        self.length
    }

    /// The number of rows requested, `None` when unbounded or unset.
    pub fn real_length(&self) -> Option<u64> {
        match self.length {
            Some(Length::Rows(rows)) => Some(rows),
            Some(Length::All) | None => None,
        }
    }

    pub fn has_paging(&self) -> bool {
        self.start.is_some() && self.length.is_some()
    }

    pub fn search(&self) -> Option<&Search> {
        self.search.as_ref()
    }

    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    pub fn order(&self) -> &[Order] {
        &self.order
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn searchable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| column.searchable)
    }

    /// Searchable columns carrying their own search term.
    pub fn search_columns(&self) -> impl Iterator<Item = &Column> {
        self.searchable_columns()
            .filter(|column| column.search.is_some())
    }

    pub fn orderable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| column.orderable)
    }

    /// Orderable columns named by the `order` parameter, by priority.
    pub fn order_columns(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self
            .orderable_columns()
            .filter(|column| column.order.is_some())
            .collect();
        columns.sort_by_key(|column| column.order.map(|order| order.priority));
        columns
    }
}

/// Integers arrive as JSON numbers or as numeric strings.
fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn parse_bool(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_i64() == Some(1),
        Value::String(text) => matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        _ => false,
    }
}

fn parse_length(value: &Value) -> Option<Length> {
    match parse_int(value)? {
        -1 => Some(Length::All),
        rows => u64::try_from(rows).ok().map(Length::Rows),
    }
}

fn parse_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Both `value` and `regex` must be present and the value non-empty.
fn parse_search(value: &Value) -> Option<Search> {
    let search = value.as_object()?;
    let regex = parse_bool(search.get("regex")?);
    let value = parse_text(search.get("value")?)?;
    if value.is_empty() {
        return None;
    }
    Some(Search { value, regex })
}

fn parse_order(value: &Value) -> Vec<Order> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let entry = entry.as_object()?;
            let column = usize::try_from(parse_int(entry.get("column")?)?).ok()?;
            let dir = OrderBy::parse(entry.get("dir")?.as_str()?)?;
            Some(Order { column, dir })
        })
        .collect()
}

fn parse_columns(value: &Value, order: &[Order]) -> Vec<Column> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| parse_column(index, entry.as_object()?, order))
        .collect()
}

fn parse_column(index: usize, column: &Map<String, Value>, order: &[Order]) -> Option<Column> {
    let data = column.get("data").and_then(parse_text)?;
    if data.is_empty() {
        return None;
    }
    let name = column
        .get("name")
        .and_then(parse_text)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| data.clone());

    let order = order
        .iter()
        .position(|entry| entry.column == index)
        .map(|priority| ColumnOrder {
            dir: order[priority].dir,
            priority,
        });

    Some(Column {
        index,
        data: data.into(),
        name: name.into(),
        searchable: column.get("searchable").is_some_and(parse_bool),
        orderable: column.get("orderable").is_some_and(parse_bool),
        search: column.get("search").and_then(parse_search),
        order,
    })
}
