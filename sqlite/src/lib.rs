//! SQLite driver for datatables
//!
//! Renders queries in the SQLite dialect, binds `serde_json` parameters
//! through rusqlite and returns rows as JSON records.

pub mod connection;
pub mod functions;
pub mod values;

pub use connection::SqliteDriver;
pub use functions::register_regexp;
