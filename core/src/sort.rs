//! Column-driven ordering.

use crate::config::Config;
use crate::error::Result;
use crate::query::Query;
use crate::request::Column;
use crate::resolver::Resolver;

pub struct Sort<'a> {
    resolver: Resolver<'a>,
    config: &'a Config,
}

impl<'a> Sort<'a> {
    pub fn new(resolver: Resolver<'a>, config: &'a Config) -> Self {
        Self { resolver, config }
    }

    /// Orders by every safe, orderable column that carries an order, lowest
    /// priority first.
    pub fn columns<'c, I>(&self, query: &mut Query, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = &'c Column>,
    {
        let mut ordered: Vec<&Column> = columns
            .into_iter()
            .filter(|column| column.orderable && column.order.is_some())
            .filter(|column| self.config.is_safe(&column.name))
            .collect();
        ordered.sort_by_key(|column| column.order.map(|order| order.priority));

        for column in ordered {
            let Some(order) = column.order else {
                continue;
            };
            if let Some(sort) = self.config.column_sort(&column.name) {
                sort(query, order.dir);
                continue;
            }
            let resolved = self.resolver.resolve(query, &column.name)?;
            query.order_by_column(resolved.column, order.dir);
        }
        Ok(())
    }

    /// The caller's whole-query ordering, if any.
    pub fn custom(&self, query: &mut Query) {
        if let Some(sort) = self.config.sort() {
            sort(query);
        }
    }
}
