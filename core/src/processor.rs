//! Shapes fetched records into output rows.
//!
//! Each record is flattened to dotted keys, filtered through the output
//! gate, escaped unless marked raw, extended with addon columns and finally
//! backfilled so every requested column has a value.
//!
//! A requested path that reaches into a text column holding a JSON object or
//! array (`meta.color` over `meta = '{"color":"red"}'`) decodes that text
//! first, so the leaf is displayed rather than backfilled.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;
use hashbrown::HashSet;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::driver::Record;
use crate::gate::ColumnGate;

pub type AddonFn = Arc<dyn Fn(&Record) -> Value + Send + Sync>;

/// How an addon column obtains its value.
#[derive(Clone)]
pub enum AddonData {
    /// Computed from the record; string results are escaped unless raw.
    Callback(AddonFn),
    /// Rendered by the configured [`TemplateResolver`]; never re-escaped.
    Template(String),
    /// A fixed value.
    Value(Value),
}

impl fmt::Debug for AddonData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddonData::Callback(_) => f.write_str("Callback(..)"),
            AddonData::Template(template) => f.debug_tuple("Template").field(template).finish(),
            AddonData::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// A computed column appended to every row.
#[derive(Clone, Debug)]
pub struct Addon {
    pub name: CompactString,
    pub data: AddonData,
}

impl Addon {
    pub fn callback<F>(name: impl Into<CompactString>, callback: F) -> Self
    where
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            data: AddonData::Callback(Arc::new(callback)),
        }
    }

    pub fn template(name: impl Into<CompactString>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: AddonData::Template(template.into()),
        }
    }

    pub fn value(name: impl Into<CompactString>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            data: AddonData::Value(value.into()),
        }
    }
}

/// Renders template addon values against a record.
pub trait TemplateResolver: Send + Sync {
    fn render(&self, template: &str, record: &Record) -> String;
}

/// Substitutes `{{ path }}` with the escaped value at `path` in the record
/// and `{!! path !!}` with the raw value.
#[derive(Clone, Copy, Debug, Default)]
pub struct Interpolate;

impl TemplateResolver for Interpolate {
    fn render(&self, template: &str, record: &Record) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        loop {
            let escaped = rest.find("{{");
            let raw = rest.find("{!!");
            let (start, open, close, escape) = match (escaped, raw) {
                (Some(e), Some(r)) if r < e => (r, "{!!", "!!}", false),
                (Some(e), _) => (e, "{{", "}}", true),
                (None, Some(r)) => (r, "{!!", "!!}", false),
                (None, None) => break,
            };
            let body = &rest[start + open.len()..];
            let Some(end) = body.find(close) else {
                break;
            };

            out.push_str(&rest[..start]);
            let path = body[..end].trim();
            let text = lookup(record, path).map(display).unwrap_or_default();
            if escape {
                out.push_str(&escape_str(&text));
            } else {
                out.push_str(&text);
            }
            rest = &body[end + close.len()..];
        }

        out.push_str(rest);
        out
    }
}

fn lookup<'r>(record: &'r Record, path: &str) -> Option<&'r Value> {
    let mut segments = path.split('.');
    let mut value = record.get(segments.next()?)?;
    for segment in segments {
        value = match value {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// HTML-escapes the five significant characters.
pub fn escape_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes string values; other values pass through.
pub fn escape_html(value: Value) -> Value {
    match value {
        Value::String(text) => Value::String(escape_str(&text)),
        other => other,
    }
}

/// Flattens nested objects and arrays into dotted keys.
///
/// Empty containers are kept as leaves.
pub fn flatten(record: &Record) -> Vec<(String, Value)> {
    fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, Value)>) {
        let key = |segment: &str| {
            if prefix.is_empty() {
                segment.to_string()
            } else {
                format!("{prefix}.{segment}")
            }
        };
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (segment, value) in map {
                    walk(&key(segment), value, out);
                }
            }
            Value::Array(items) if !items.is_empty() => {
                for (index, value) in items.iter().enumerate() {
                    walk(&key(&index.to_string()), value, out);
                }
            }
            leaf => out.push((prefix.to_string(), leaf.clone())),
        }
    }

    let mut out = Vec::new();
    for (key, value) in record {
        walk(key, value, &mut out);
    }
    out
}

/// An output row addressed by dotted paths.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.0, path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Whether a proper prefix of `path` holds a scalar that writing `path`
    /// would replace.
    pub fn is_shadowed(&self, path: &str) -> bool {
        path.match_indices('.').any(|(end, _)| {
            self.get(&path[..end]).is_some_and(|value| {
                !matches!(value, Value::Null | Value::Object(_) | Value::Array(_))
            })
        })
    }

    /// Sets a value, creating intermediate containers. A numeric segment
    /// below a missing container creates an array.
    pub fn set(&mut self, path: &str, value: Value) {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return;
        };
        let rest: Vec<&str> = segments.collect();
        let node = self.0.entry(first.to_string()).or_insert(Value::Null);
        set_in(node, &rest, value);
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Row> for Value {
    fn from(row: Row) -> Self {
        Value::Object(row.0)
    }
}

fn set_in(node: &mut Value, segments: &[&str], value: Value) {
    let Some((segment, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    ensure_container(node, segment);
    let slot = match node {
        Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
        Value::Array(items) => {
            let Ok(index) = segment.parse::<usize>() else {
                return;
            };
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            &mut items[index]
        }
        _ => return,
    };
    set_in(slot, rest, value);
}

/// Turns a scalar (or a container of the wrong shape) into the container
/// the next segment addresses.
fn ensure_container(node: &mut Value, segment: &str) {
    let numeric = segment.parse::<usize>().is_ok();
    match node {
        Value::Object(_) => {}
        Value::Array(_) if numeric => {}
        Value::Array(items) => {
            let map = items
                .drain(..)
                .enumerate()
                .map(|(index, value)| (index.to_string(), value))
                .collect();
            *node = Value::Object(map);
        }
        _ if numeric => *node = Value::Array(Vec::new()),
        _ => *node = Value::Object(Map::new()),
    }
}

/// Replaces JSON text found along `path` with the decoded object or array.
fn decode_json_path(record: &mut Record, path: &str) {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return;
    };
    let rest: Vec<&str> = segments.collect();
    if let Some(node) = record.get_mut(first) {
        decode_in(node, &rest);
    }
}

fn decode_in(node: &mut Value, segments: &[&str]) {
    let Some((segment, rest)) = segments.split_first() else {
        return;
    };
    let decoded = match node {
        Value::String(text) => serde_json::from_str::<Value>(text).ok(),
        _ => None,
    };
    if let Some(decoded @ (Value::Object(_) | Value::Array(_))) = decoded {
        *node = decoded;
    }
    let next = match node {
        Value::Object(map) => map.get_mut(*segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get_mut(index)),
        _ => None,
    };
    if let Some(next) = next {
        decode_in(next, rest);
    }
}

/// Applies the row-shaping rules of a [`Config`](crate::Config).
pub struct Processor<'a> {
    output: &'a ColumnGate,
    raw: &'a HashSet<CompactString>,
    addons: &'a [Addon],
    templates: &'a dyn TemplateResolver,
    requested: Vec<CompactString>,
}

impl<'a> Processor<'a> {
    pub fn new(
        output: &'a ColumnGate,
        raw: &'a HashSet<CompactString>,
        addons: &'a [Addon],
        templates: &'a dyn TemplateResolver,
    ) -> Self {
        Self {
            output,
            raw,
            addons,
            templates,
            requested: Vec::new(),
        }
    }

    /// Output keys the client asked for; missing ones are backfilled.
    pub fn request<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.requested.extend(columns.into_iter().map(Into::into));
        self
    }

    fn should_escape(&self, key: &str) -> bool {
        !self.raw.contains(key)
    }

    pub fn process(&self, records: &[Record]) -> Vec<Row> {
        records.iter().map(|record| self.process_record(record)).collect()
    }

    /// The record with JSON text decoded along every requested dotted path.
    fn decoded<'r>(&self, record: &'r Record) -> Cow<'r, Record> {
        let mut paths = self
            .requested
            .iter()
            .filter(|column| column.contains('.'))
            .peekable();
        if paths.peek().is_none() {
            return Cow::Borrowed(record);
        }
        let mut owned = record.clone();
        for path in paths {
            decode_json_path(&mut owned, path);
        }
        Cow::Owned(owned)
    }

    pub fn process_record(&self, record: &Record) -> Row {
        let record = self.decoded(record);
        let record = record.as_ref();
        let mut row = Row::new();

        for (key, value) in flatten(record) {
            if self.output.permits(&key) {
                let value = if self.should_escape(&key) {
                    escape_html(value)
                } else {
                    value
                };
                row.set(&key, value);
            }
        }

        for addon in self.addons {
            if !self.output.permits(&addon.name) {
                continue;
            }
            let value = match &addon.data {
                AddonData::Callback(callback) => {
                    let value = callback(record);
                    if self.should_escape(&addon.name) {
                        escape_html(value)
                    } else {
                        value
                    }
                }
                AddonData::Template(template) => {
                    Value::String(self.templates.render(template, record))
                }
                AddonData::Value(value) => value.clone(),
            };
            row.set(&addon.name, value);
        }

        for column in &self.requested {
            if !row.contains(column) && !row.is_shadowed(column) {
                row.set(column, Value::String(String::new()));
            }
        }

        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("record must be an object"),
        }
    }

    fn process(processor: &Processor<'_>, value: Value) -> Value {
        processor.process_record(&record(value)).into()
    }

    struct Setup {
        output: ColumnGate,
        raw: HashSet<CompactString>,
        addons: Vec<Addon>,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                output: ColumnGate::new(),
                raw: HashSet::new(),
                addons: Vec::new(),
            }
        }

        fn processor(&self) -> Processor<'_> {
            Processor::new(&self.output, &self.raw, &self.addons, &Interpolate)
        }
    }

    #[test]
    fn backfills_requested_columns() {
        let setup = Setup::new();
        let processor = setup.processor().request(["category", "user.name"]);
        assert_eq!(
            process(&processor, json!({ "name": "First Post" })),
            json!({ "name": "First Post", "category": "", "user": { "name": "" } })
        );
    }

    #[test]
    fn backfill_keeps_existing_values() {
        let setup = Setup::new();
        let processor = setup.processor().request(["name", "views"]);
        assert_eq!(
            process(&processor, json!({ "name": "First Post", "views": 0 })),
            json!({ "name": "First Post", "views": 0 })
        );
    }

    #[test]
    fn json_text_is_decoded_for_requested_paths() {
        let setup = Setup::new();
        let processor = setup.processor().request(["title", "meta.color", "meta.size"]);
        assert_eq!(
            process(
                &processor,
                json!({ "title": "First", "meta": r#"{"color":"<red>"}"# })
            ),
            json!({ "title": "First", "meta": { "color": "&lt;red&gt;", "size": "" } })
        );
    }

    #[test]
    fn backfill_never_replaces_scalars() {
        let setup = Setup::new();
        let processor = setup.processor().request(["meta.color", "notes.0"]);
        assert_eq!(
            process(&processor, json!({ "meta": "not json", "notes": 3 })),
            json!({ "meta": "not json", "notes": 3 })
        );

        let row = processor.process_record(&record(json!({ "meta": "red", "user": null })));
        assert!(row.is_shadowed("meta.color"));
        assert!(!row.is_shadowed("user.name"));
        assert!(!row.is_shadowed("meta"));
    }

    #[test]
    fn callback_addons() {
        let mut setup = Setup::new();
        setup.addons.push(Addon::callback("category", |record| {
            json!(format!("Category of {}", record["name"].as_str().unwrap_or_default()))
        }));
        setup.addons.push(Addon::callback("html", |_| json!("<b>Blog</b>")));
        setup.addons.push(Addon::callback("count", |_| json!(3)));

        assert_eq!(
            process(&setup.processor(), json!({ "name": "First Post" })),
            json!({
                "name": "First Post",
                "category": "Category of First Post",
                "html": "&lt;b&gt;Blog&lt;/b&gt;",
                "count": 3
            })
        );
    }

    #[test]
    fn template_addons_are_not_escaped_twice() {
        let mut setup = Setup::new();
        setup.addons.push(Addon::template(
            "link",
            r#"<a href="/posts/{{ id }}">{{ title }}</a> {!! title !!}"#,
        ));

        let row = process(&setup.processor(), json!({ "id": 7, "title": "<i>x</i>" }));
        assert_eq!(
            row["link"],
            json!(r#"<a href="/posts/7">&lt;i&gt;x&lt;/i&gt;</a> <i>x</i>"#)
        );
    }

    #[test]
    fn escapes_unless_raw() {
        let mut setup = Setup::new();
        setup.raw.insert("raw".into());

        assert_eq!(
            process(
                &setup.processor(),
                json!({ "category": "<b>Blog</b>", "raw": "<b>Test</b>", "quote": "it's" })
            ),
            json!({
                "category": "&lt;b&gt;Blog&lt;/b&gt;",
                "raw": "<b>Test</b>",
                "quote": "it&#039;s"
            })
        );
    }

    #[test]
    fn include_and_exclude() {
        let mut setup = Setup::new();
        setup.output = ColumnGate::new().allow(["name", "user.name"]);
        assert_eq!(
            process(
                &setup.processor(),
                json!({ "id": 1, "name": "a", "user": { "name": "b", "email": "c" } })
            ),
            json!({ "name": "a", "user": { "name": "b" } })
        );

        setup.output = ColumnGate::new().deny(["id"]);
        assert_eq!(
            process(&setup.processor(), json!({ "id": 1, "name": "a" })),
            json!({ "name": "a" })
        );
    }

    #[test]
    fn nested_arrays_round_trip_through_dotted_keys() {
        let setup = Setup::new();
        let value = json!({
            "title": "a",
            "categories": [{ "name": "x", "pivot": { "position": 1 } }, { "name": "y" }],
            "tags": [],
            "user": null
        });

        let flat = flatten(&record(value.clone()));
        assert!(flat.contains(&("categories.0.pivot.position".to_string(), json!(1))));
        assert!(flat.contains(&("tags".to_string(), json!([]))));
        assert_eq!(process(&setup.processor(), value.clone()), value);
    }
}
