//! Global and per-column search.

use crate::config::Config;
use crate::error::Result;
use crate::expressions::{Boolean, Condition, WhereGroup};
use crate::query::Query;
use crate::request::{Column, Search};
use crate::resolver::Resolver;
use crate::sql::ColumnRef;

/// Builds the predicate a search term contributes for one column.
pub fn search_condition(column: ColumnRef, search: &Search) -> Condition {
    if search.regex {
        Condition::Regexp {
            column,
            pattern: search.value.clone(),
        }
    } else {
        Condition::Like {
            column,
            pattern: format!("%{}%", search.value),
        }
    }
}

pub struct Filter<'a> {
    resolver: Resolver<'a>,
    config: &'a Config,
}

impl<'a> Filter<'a> {
    pub fn new(resolver: Resolver<'a>, config: &'a Config) -> Self {
        Self { resolver, config }
    }

    /// Appends the predicate `search` contributes for `column` to `group`.
    ///
    /// A custom column filter writes into its own nested group and may join
    /// relations on `query`. Addon columns are searched like any other
    /// column, so an addon overriding a source column stays searchable.
    fn search(
        &self,
        query: &mut Query,
        group: &mut WhereGroup,
        boolean: Boolean,
        column: &Column,
        search: &Search,
    ) -> Result<()> {
        if let Some(filter) = self.config.column_filter(&column.name) {
            let mut scoped = WhereGroup::new();
            filter(query, &mut scoped, &search.value, search.regex);
            group.push(boolean, Condition::Group(scoped));
            return Ok(());
        }

        let resolved = self.resolver.resolve(query, &column.name)?;
        group.push(boolean, search_condition(resolved.column, search));
        Ok(())
    }

    /// One OR-combined group across every safe, searchable column.
    pub fn global<'c, I>(&self, query: &mut Query, search: &Search, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = &'c Column>,
    {
        let mut group = WhereGroup::new();
        for column in columns {
            if !column.searchable || !self.config.is_safe(&column.name) {
                continue;
            }
            self.search(query, &mut group, Boolean::Or, column, search)?;
        }
        query.filter_group(group);
        Ok(())
    }

    /// One AND-combined predicate per safe column carrying its own term.
    pub fn columns<'c, I>(&self, query: &mut Query, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = &'c Column>,
    {
        let mut group = WhereGroup::new();
        for column in columns {
            let Some(search) = &column.search else {
                continue;
            };
            if !column.searchable || !self.config.is_safe(&column.name) {
                continue;
            }
            self.search(query, &mut group, Boolean::And, column, search)?;
        }
        for (boolean, condition) in group.clauses() {
            query.where_mut().push(*boolean, condition.clone());
        }
        Ok(())
    }

    /// The caller's whole-query filter, if any.
    pub fn custom(&self, query: &mut Query) {
        if let Some(filter) = self.config.filter() {
            filter(query);
        }
    }
}
