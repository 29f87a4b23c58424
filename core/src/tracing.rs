//! Tracing utilities for query and pipeline observability.
//!
//! Enable the `tracing` feature to emit events via the `tracing` crate.
//! These macros no-op when the feature is disabled, avoiding `#[cfg]` boilerplate
//! at every call site.

#[cfg(feature = "tracing")]
#[doc(hidden)]
pub use ::tracing as __tracing;

/// Emit a debug-level tracing event with the SQL text and parameter count.
///
/// ```ignore
/// datatables_trace_query!(&sql_str, params.len());
/// ```
#[macro_export]
macro_rules! datatables_trace_query {
    ($sql:expr, $param_count:expr) => {
        #[cfg(feature = "tracing")]
        $crate::tracing::__tracing::debug!(sql = %$sql, params = $param_count, "datatables.query");
    };
}

/// Emit a debug-level tracing event for an orchestrator stage transition.
///
/// ```ignore
/// datatables_trace_stage!("count_all", total = total);
/// ```
#[macro_export]
macro_rules! datatables_trace_stage {
    ($stage:literal) => {
        #[cfg(feature = "tracing")]
        $crate::tracing::__tracing::debug!(stage = $stage, "datatables.build");
    };
    ($stage:literal, $($field:ident = $value:expr),+ $(,)?) => {
        #[cfg(feature = "tracing")]
        $crate::tracing::__tracing::debug!(stage = $stage, $($field = $value),+, "datatables.build");
    };
}

/// Emit an error-level tracing event when a build fails.
#[macro_export]
macro_rules! datatables_trace_error {
    ($error:expr) => {
        #[cfg(feature = "tracing")]
        $crate::tracing::__tracing::error!(error = %$error, "datatables.failed");
    };
}
