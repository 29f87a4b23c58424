use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::processor::Row;

/// Message sent to the client when the real error is hidden.
pub const GENERIC_ERROR: &str = "Server Error";

/// The response envelope.
///
/// `error` is omitted from the JSON unless the build failed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTable {
    pub draw: i64,
    pub records_total: u64,
    pub records_filtered: u64,
    pub data: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DataTable {
    pub fn new(draw: i64, records_total: u64, records_filtered: u64, data: Vec<Row>) -> Self {
        Self {
            draw,
            records_total,
            records_filtered,
            data,
            error: None,
        }
    }

    /// A failed response: zero counts, no rows.
    pub fn failed(draw: i64, error: impl Into<String>) -> Self {
        Self {
            draw,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
