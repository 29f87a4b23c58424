//! Offset/limit window with an upper bound on page size.

use crate::query::Query;
use crate::request::{Length, Request};

/// The rows a response covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    /// `None` is unbounded.
    pub limit: Option<u64>,
}

impl Page {
    /// Derives the window from the request, capped at `max` rows.
    ///
    /// The cap also applies when the request asks for every row
    /// (`length=-1`) or carries no paging at all.
    pub fn from_request(request: &Request, max: Option<u64>) -> Self {
        let cap = |rows: u64| max.map_or(rows, |max| rows.min(max));

        match (request.start(), request.length()) {
            (Some(offset), Some(Length::Rows(rows))) => Self {
                offset,
                limit: Some(cap(rows)),
            },
            (Some(offset), Some(Length::All)) => Self { offset, limit: max },
            _ => Self {
                offset: 0,
                limit: max,
            },
        }
    }

    pub fn apply(&self, query: &mut Query) {
        if self.offset > 0 {
            query.offset(self.offset);
        }
        if let Some(limit) = self.limit {
            query.limit(limit);
        }
    }
}
