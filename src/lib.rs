//! # DataTables for Rust
//!
//! Server-side processing for the [DataTables](https://datatables.net) AJAX
//! protocol: parse the request, filter, order and page a query over your
//! schema, and answer with the `{draw, recordsTotal, recordsFiltered, data}`
//! envelope.
//!
//! ## Quick Start
//!
//! ```rust
//! # #[cfg(feature = "rusqlite")]
//! # fn main() -> datatables::Result<()> {
//! use datatables::prelude::*;
//! use datatables::sqlite::SqliteDriver;
//!
//! let schema = Schema::new()
//!     .entity(Entity::new("posts").belongs_to("user", "users", "user_id"))
//!     .entity(Entity::new("users"));
//!
//! let driver = SqliteDriver::open_in_memory()?;
//! driver.conn().execute_batch(
//!     "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);
//!      CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT);
//!      INSERT INTO users VALUES (1, 'Alice');
//!      INSERT INTO posts VALUES (1, 1, 'First post');",
//! )?;
//!
//! let request = Request::from_json(
//!     r#"{"draw": "1", "start": "0", "length": "10",
//!         "search": {"value": "first", "regex": "false"},
//!         "columns": [{"data": "title", "searchable": "true", "orderable": "true"}]}"#,
//! )?;
//! let source = Source::table(schema, "posts")?;
//! let config = Config::default();
//!
//! let table = Builder::new(&request, &source, &config).build(&driver);
//! assert_eq!(table.records_filtered, 1);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "rusqlite"))]
//! # fn main() {}
//! ```
//!
//! ## Database Support
//!
//! | Database | Driver   | Feature Flag |
//! |----------|----------|--------------|
//! | SQLite   | rusqlite | `rusqlite`   |
//!
//! Other data sources implement [`Driver`].

pub use datatables_core::*;

/// SQLite support through rusqlite.
#[cfg(feature = "rusqlite")]
pub mod sqlite {
    pub use datatables_sqlite::*;
    pub use rusqlite;
}

pub mod prelude {
    pub use datatables_core::{
        Addon, Builder, Config, DataTable, Driver, Entity, OrderBy, Pivot, Query, Request,
        Schema, Source,
    };
}
