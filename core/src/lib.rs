//! Server-side processing for DataTables requests.
//!
//! A [`Request`] describes the columns, search terms, ordering and page the
//! client wants. The [`Builder`] applies them to a [`Query`] over a
//! [`Schema`]-described source, runs it through a [`Driver`] and shapes the
//! fetched records into a [`DataTable`] envelope.

pub mod builder;
pub mod config;
pub mod dialect;
pub mod driver;
pub mod eager;
pub mod error;
pub mod expressions;
pub mod filter;
pub mod gate;
pub mod join;
pub mod paging;
pub mod processor;
pub mod query;
pub mod request;
pub mod resolver;
pub mod response;
pub mod schema;
pub mod sort;
pub mod sql;
pub mod tracing;

pub use builder::{Builder, Source};
pub use config::{Config, ConfigBuilder, FilterFn, QueryFn, Settings, SortFn};
pub use dialect::Dialect;
pub use driver::{Driver, Record, nest_dotted};
pub use error::{ConfigError, DataTablesError, Result};
pub use expressions::{Boolean, Condition, WhereGroup};
pub use gate::ColumnGate;
pub use join::{Join, JoinType};
pub use paging::Page;
pub use processor::{Addon, AddonData, Interpolate, Processor, Row, TemplateResolver};
pub use query::{OrderBy, Query};
pub use request::{Column, ColumnOrder, Length, Order, Request, Search};
pub use resolver::{Resolved, Resolver, join_alias};
pub use response::{DataTable, GENERIC_ERROR};
pub use schema::{Entity, Pivot, Relation, RelationKind, Schema};
pub use sql::{ColumnRef, SQL, SQLChunk, Token};
