//! Configuration of a datatable build.
//!
//! [`ConfigBuilder`] collects addon columns, column lists and callbacks and
//! validates them once in [`ConfigBuilder::build`]. The declarative subset
//! ([`Settings`]) can also be loaded from TOML:
//!
//! ```toml
//! debug = false
//! max_page_length = 50
//! whitelist = ["title", "user.name"]
//! raw = ["actions"]
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::expressions::WhereGroup;
use crate::gate::ColumnGate;
use crate::processor::{Addon, Interpolate, Processor, TemplateResolver};
use crate::query::{OrderBy, Query};

/// Default cap on the number of rows returned per page.
pub const DEFAULT_MAX_PAGE_LENGTH: u64 = 100;

/// Per-column search override: adds its own predicates for `(value, regex)`
/// to the group, joining on the query when it needs related columns.
pub type FilterFn = Arc<dyn Fn(&mut Query, &mut WhereGroup, &str, bool) + Send + Sync>;

/// Per-column ordering override.
pub type SortFn = Arc<dyn Fn(&mut Query, OrderBy) + Send + Sync>;

/// Whole-query filter or sort step.
pub type QueryFn = Arc<dyn Fn(&mut Query) + Send + Sync>;

fn default_max_page_length() -> Option<u64> {
    Some(DEFAULT_MAX_PAGE_LENGTH)
}

fn enabled() -> bool {
    true
}

/// Declarative configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Expose the real error message in failed responses.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_max_page_length")]
    pub max_page_length: Option<u64>,
    #[serde(default = "enabled")]
    pub default_filter: bool,
    #[serde(default = "enabled")]
    pub default_sort: bool,
    #[serde(default)]
    pub whitelist: Vec<CompactString>,
    #[serde(default)]
    pub blacklist: Vec<CompactString>,
    #[serde(default)]
    pub include: Vec<CompactString>,
    #[serde(default)]
    pub exclude: Vec<CompactString>,
    #[serde(default)]
    pub raw: Vec<CompactString>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            max_page_length: default_max_page_length(),
            default_filter: true,
            default_sort: true,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            raw: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.into())
            } else {
                ConfigError::Io(path.into(), e)
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.into(), e))
    }
}

/// Immutable configuration consumed by the [`Builder`](crate::Builder).
#[derive(Clone)]
pub struct Config {
    debug: bool,
    max_page_length: Option<u64>,
    default_filter: bool,
    default_sort: bool,
    columns: ColumnGate,
    output: ColumnGate,
    raw: HashSet<CompactString>,
    addons: Vec<Addon>,
    column_filters: HashMap<CompactString, FilterFn>,
    column_sorts: HashMap<CompactString, SortFn>,
    filter: Option<QueryFn>,
    sort: Option<QueryFn>,
    templates: Arc<dyn TemplateResolver>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            max_page_length: default_max_page_length(),
            default_filter: true,
            default_sort: true,
            columns: ColumnGate::new(),
            output: ColumnGate::new(),
            raw: HashSet::new(),
            addons: Vec::new(),
            column_filters: HashMap::new(),
            column_sorts: HashMap::new(),
            filter: None,
            sort: None,
            templates: Arc::new(Interpolate),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("debug", &self.debug)
            .field("max_page_length", &self.max_page_length)
            .field("default_filter", &self.default_filter)
            .field("default_sort", &self.default_sort)
            .field("columns", &self.columns)
            .field("output", &self.output)
            .field("raw", &self.raw)
            .field("addons", &self.addons)
            .field("column_filters", &self.column_filters.keys().collect::<Vec<_>>())
            .field("column_sorts", &self.column_sorts.keys().collect::<Vec<_>>())
            .field("filter", &self.filter.is_some())
            .field("sort", &self.sort.is_some())
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn max_page_length(&self) -> Option<u64> {
        self.max_page_length
    }

    pub fn default_filter(&self) -> bool {
        self.default_filter
    }

    pub fn default_sort(&self) -> bool {
        self.default_sort
    }

    /// Whether a column may be searched or ordered.
    pub fn is_safe(&self, column: &str) -> bool {
        self.columns.permits(column)
    }

    /// Whether an output key is kept in processed rows.
    pub fn is_included(&self, key: &str) -> bool {
        self.output.permits(key)
    }

    pub fn is_raw(&self, key: &str) -> bool {
        self.raw.contains(key)
    }

    pub fn addons(&self) -> &[Addon] {
        &self.addons
    }

    pub fn column_filter(&self, column: &str) -> Option<&FilterFn> {
        self.column_filters.get(column)
    }

    pub fn column_sort(&self, column: &str) -> Option<&SortFn> {
        self.column_sorts.get(column)
    }

    pub fn filter(&self) -> Option<&QueryFn> {
        self.filter.as_ref()
    }

    pub fn sort(&self) -> Option<&QueryFn> {
        self.sort.as_ref()
    }

    pub fn templates(&self) -> &dyn TemplateResolver {
        self.templates.as_ref()
    }

    /// A row processor applying this configuration.
    pub fn processor(&self) -> Processor<'_> {
        Processor::new(&self.output, &self.raw, &self.addons, self.templates())
    }
}

/// Assembles a [`Config`].
#[derive(Clone)]
pub struct ConfigBuilder {
    debug: bool,
    max_page_length: Option<u64>,
    default_filter: bool,
    default_sort: bool,
    whitelist: Vec<CompactString>,
    blacklist: Vec<CompactString>,
    include: Vec<CompactString>,
    exclude: Vec<CompactString>,
    raw: Vec<CompactString>,
    addons: Vec<Addon>,
    column_filters: Vec<(CompactString, FilterFn)>,
    column_sorts: Vec<(CompactString, SortFn)>,
    filter: Option<QueryFn>,
    sort: Option<QueryFn>,
    templates: Arc<dyn TemplateResolver>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::from_settings(Settings::default())
    }
}

fn collect<I, S>(items: I) -> Vec<CompactString>
where
    I: IntoIterator<Item = S>,
    S: Into<CompactString>,
{
    items.into_iter().map(Into::into).collect()
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self {
            debug: settings.debug,
            max_page_length: settings.max_page_length,
            default_filter: settings.default_filter,
            default_sort: settings.default_sort,
            whitelist: settings.whitelist,
            blacklist: settings.blacklist,
            include: settings.include,
            exclude: settings.exclude,
            raw: settings.raw,
            addons: Vec::new(),
            column_filters: Vec::new(),
            column_sorts: Vec::new(),
            filter: None,
            sort: None,
            templates: Arc::new(Interpolate),
        }
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Caps the page size, including `length=-1` requests; `None` lifts the cap.
    pub fn max_page_length(mut self, max: Option<u64>) -> Self {
        self.max_page_length = max;
        self
    }

    pub fn default_filter(mut self, enabled: bool) -> Self {
        self.default_filter = enabled;
        self
    }

    pub fn default_sort(mut self, enabled: bool) -> Self {
        self.default_sort = enabled;
        self
    }

    /// Adds a computed column.
    pub fn add(mut self, addon: Addon) -> Self {
        self.addons.push(addon);
        self
    }

    pub fn raw<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.raw = collect(keys);
        self
    }

    pub fn include<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.include = collect(keys);
        self
    }

    pub fn exclude<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.exclude = collect(keys);
        self
    }

    /// Replaces the allow list of searchable and orderable columns.
    pub fn whitelist<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.whitelist = collect(columns);
        self
    }

    pub fn push_to_whitelist<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.whitelist.extend(collect(columns));
        self
    }

    /// Replaces the deny list. Ignored while the allow list is non-empty.
    pub fn blacklist<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.blacklist = collect(columns);
        self
    }

    pub fn push_to_blacklist<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CompactString>,
    {
        self.blacklist.extend(collect(columns));
        self
    }

    /// Replaces the default search predicate of one column.
    pub fn filter_column<F>(mut self, column: impl Into<CompactString>, filter: F) -> Self
    where
        F: Fn(&mut Query, &mut WhereGroup, &str, bool) + Send + Sync + 'static,
    {
        self.column_filters.push((column.into(), Arc::new(filter)));
        self
    }

    /// Replaces the default ordering of one column.
    pub fn sort_column<F>(mut self, column: impl Into<CompactString>, sort: F) -> Self
    where
        F: Fn(&mut Query, OrderBy) + Send + Sync + 'static,
    {
        self.column_sorts.push((column.into(), Arc::new(sort)));
        self
    }

    /// Runs after the column filters.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&mut Query) + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Runs after the column ordering.
    pub fn sort<F>(mut self, sort: F) -> Self
    where
        F: Fn(&mut Query) + Send + Sync + 'static,
    {
        self.sort = Some(Arc::new(sort));
        self
    }

    pub fn templates(mut self, resolver: impl TemplateResolver + 'static) -> Self {
        self.templates = Arc::new(resolver);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let lists = [
            ("whitelist", &self.whitelist),
            ("blacklist", &self.blacklist),
            ("include", &self.include),
            ("exclude", &self.exclude),
            ("raw", &self.raw),
        ];
        for (list, names) in lists {
            if names.iter().any(|name| name.is_empty()) {
                return Err(ConfigError::Invalid(format!("empty column name in {list}")));
            }
        }

        let mut seen = HashSet::new();
        for addon in &self.addons {
            if addon.name.is_empty() {
                return Err(ConfigError::Invalid("empty addon column name".into()));
            }
            if !seen.insert(addon.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate addon column: {}",
                    addon.name
                )));
            }
        }

        let callback_keys = self
            .column_filters
            .iter()
            .map(|(name, _)| name)
            .chain(self.column_sorts.iter().map(|(name, _)| name));
        for name in callback_keys {
            if name.is_empty() {
                return Err(ConfigError::Invalid("empty column name for callback".into()));
            }
        }

        if self.max_page_length == Some(0) {
            return Err(ConfigError::Invalid(
                "max_page_length must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        self.validate()?;

        Ok(Config {
            debug: self.debug,
            max_page_length: self.max_page_length,
            default_filter: self.default_filter,
            default_sort: self.default_sort,
            columns: ColumnGate::new().allow(self.whitelist).deny(self.blacklist),
            output: ColumnGate::new().allow(self.include).deny(self.exclude),
            raw: self.raw.into_iter().collect(),
            addons: self.addons,
            column_filters: self.column_filters.into_iter().collect(),
            column_sorts: self.column_sorts.into_iter().collect(),
            filter: self.filter,
            sort: self.sort,
            templates: self.templates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::builder().build().unwrap();
        assert!(!config.debug());
        assert_eq!(config.max_page_length(), Some(DEFAULT_MAX_PAGE_LENGTH));
        assert!(config.default_filter());
        assert!(config.default_sort());
        assert!(config.is_safe("anything"));
        assert!(config.is_included("anything"));
    }

    #[test]
    fn whitelist_wins_over_blacklist() {
        let config = Config::builder()
            .blacklist(["title", "content"])
            .whitelist(["title"])
            .build()
            .unwrap();
        assert!(config.is_safe("title"));
        assert!(!config.is_safe("content"));
        assert!(!config.is_safe("id"));
    }

    #[test]
    fn push_extends_lists() {
        let config = Config::builder()
            .blacklist(["a"])
            .push_to_blacklist(["b"])
            .build()
            .unwrap();
        assert!(!config.is_safe("a"));
        assert!(!config.is_safe("b"));

        let config = Config::builder()
            .whitelist(["a"])
            .whitelist(["b"])
            .build()
            .unwrap();
        assert!(!config.is_safe("a"));
        assert!(config.is_safe("b"));
    }

    #[test]
    fn rejects_invalid_settings() {
        let duplicate = Config::builder()
            .add(Addon::value("actions", "x"))
            .add(Addon::value("actions", "y"))
            .build();
        assert!(matches!(duplicate, Err(ConfigError::Invalid(_))));

        let empty = Config::builder().raw([""]).build();
        assert!(matches!(empty, Err(ConfigError::Invalid(_))));

        let zero = Config::builder().max_page_length(Some(0)).build();
        assert!(matches!(zero, Err(ConfigError::Invalid(_))));

        let callback = Config::builder().sort_column("", |_, _| {}).build();
        assert!(matches!(callback, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn settings_from_toml() {
        let settings = Settings::from_toml_str(
            r#"
            debug = true
            max_page_length = 25
            default_sort = false
            whitelist = ["title"]
            raw = ["actions"]
            "#,
        )
        .unwrap();

        assert!(settings.debug);
        assert_eq!(settings.max_page_length, Some(25));
        assert!(settings.default_filter);
        assert!(!settings.default_sort);

        let config = ConfigBuilder::from_settings(settings).build().unwrap();
        assert!(config.is_raw("actions"));
        assert!(!config.is_safe("content"));
        assert_eq!(config.max_page_length(), Some(25));
    }

    #[test]
    fn settings_reject_unknown_keys() {
        assert!(matches!(
            Settings::from_toml_str("colour = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datatables.toml");
        std::fs::write(&path, "exclude = [\"password\"]\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.exclude, vec![CompactString::from("password")]);
        assert_eq!(settings, Settings { exclude: settings.exclude.clone(), ..Settings::default() });

        let missing = Settings::load_from(&dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::NotFound(_))));
    }
}
