//! Orchestrates one request against a source.
//!
//! A build runs once: count all, filter, count filtered, select, sort, page,
//! fetch, load relations, process. It stops early with an empty page when
//! either count is zero.

use std::sync::Arc;

use crate::config::Config;
use crate::driver::{Driver, Record};
use crate::eager;
use crate::error::Result;
use crate::filter::Filter;
use crate::paging::Page;
use crate::query::Query;
use crate::request::Request;
use crate::resolver::Resolver;
use crate::response::{DataTable, GENERIC_ERROR};
use crate::schema::Schema;
use crate::sort::Sort;
use crate::{datatables_trace_error, datatables_trace_stage};

/// The pristine scope every build starts from.
#[derive(Clone, Debug)]
pub struct Source {
    schema: Arc<Schema>,
    query: Query,
}

impl Source {
    pub fn new(schema: impl Into<Arc<Schema>>, query: Query) -> Self {
        Self {
            schema: schema.into(),
            query,
        }
    }

    /// Every row of `entity`.
    pub fn table(schema: impl Into<Arc<Schema>>, entity: &str) -> Result<Self> {
        let schema = schema.into();
        let query = Query::table(&schema, entity)?;
        Ok(Self { schema, query })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

struct Results {
    total: u64,
    filtered: u64,
    records: Vec<Record>,
}

impl Results {
    fn empty(total: u64) -> Self {
        Self {
            total,
            filtered: 0,
            records: Vec::new(),
        }
    }
}

pub struct Builder<'a> {
    request: &'a Request,
    source: &'a Source,
    config: &'a Config,
}

impl<'a> Builder<'a> {
    pub fn new(request: &'a Request, source: &'a Source, config: &'a Config) -> Self {
        Self {
            request,
            source,
            config,
        }
    }

    /// Builds the response, converting any failure into a failed envelope.
    pub fn build<D: Driver + ?Sized>(&self, driver: &D) -> DataTable {
        match self.try_build(driver) {
            Ok(table) => table,
            Err(error) => {
                datatables_trace_error!(error);
                let message = if self.config.debug() {
                    error.to_string()
                } else {
                    GENERIC_ERROR.to_string()
                };
                DataTable::failed(self.request.draw(), message)
            }
        }
    }

    /// Builds the response, propagating failures.
    pub fn try_build<D: Driver + ?Sized>(&self, driver: &D) -> Result<DataTable> {
        let draw = self.request.draw();
        let results = self.results(driver)?;

        datatables_trace_stage!("process", rows = results.records.len());
        let data = self
            .config
            .processor()
            .request(self.request.columns().iter().map(|column| column.data.clone()))
            .process(&results.records);

        Ok(DataTable::new(draw, results.total, results.filtered, data))
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self.source.schema())
    }

    fn apply_filters(&self, query: &mut Query) -> Result<()> {
        let filter = Filter::new(self.resolver(), self.config);
        if self.config.default_filter() {
            if let Some(search) = self.request.search() {
                filter.global(query, search, self.request.columns())?;
            }
            filter.columns(query, self.request.columns())?;
        }
        filter.custom(query);
        Ok(())
    }

    fn apply_sort(&self, query: &mut Query) -> Result<()> {
        let sort = Sort::new(self.resolver(), self.config);
        if self.config.default_sort() {
            sort.columns(query, self.request.columns())?;
        }
        sort.custom(query);
        Ok(())
    }

    fn results<D: Driver + ?Sized>(&self, driver: &D) -> Result<Results> {
        let mut query = self.source.query().clone();

        let total = driver.count(&query)?;
        datatables_trace_stage!("count_all", total = total);
        if total == 0 {
            datatables_trace_stage!("empty");
            return Ok(Results::empty(0));
        }

        self.apply_filters(&mut query)?;
        datatables_trace_stage!("filters", joins = query.joins().len());

        let filtered = driver.count(&query)?;
        datatables_trace_stage!("count_filtered", filtered = filtered);
        if filtered == 0 {
            datatables_trace_stage!("empty_filtered");
            return Ok(Results::empty(total));
        }

        if query.selects_all() {
            query.select_root();
        }
        datatables_trace_stage!("select");

        self.apply_sort(&mut query)?;
        datatables_trace_stage!("sort", orders = query.orders().len());

        let page = Page::from_request(self.request, self.config.max_page_length());
        page.apply(&mut query);
        datatables_trace_stage!("paging", offset = page.offset, limit = page.limit.unwrap_or(u64::MAX));

        let mut records = driver.get(&query)?;
        if !query.eager().is_empty() {
            eager::load(
                self.source.schema(),
                driver,
                query.entity(),
                &mut records,
                query.eager(),
            )?;
        }
        datatables_trace_stage!("fetch", records = records.len());

        Ok(Results {
            total,
            filtered,
            records,
        })
    }
}
