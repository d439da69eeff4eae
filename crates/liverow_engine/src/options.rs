//! Per-attach configuration.

use crate::diag::{DiagnosticSink, TracingSink};
use std::fmt;
use std::sync::Arc;

/// Configuration for one engine attach.
///
/// Immutable for the lifetime of the engine instance; changing any field
/// means detaching and re-attaching.
#[derive(Clone)]
pub struct RowOptions {
    /// Schema qualifier for reads, updates, and the change-feed filter.
    pub schema: String,
    /// Column used for lookup, update, and the equality filter.
    pub primary_key: String,
    /// Whether local edits trigger an asynchronous persist.
    pub auto_sync: bool,
    /// Select expression for the initial read.
    pub select: String,
    /// Suppresses the missing-key diagnostic and short-circuits silently.
    pub skip_if_no_key: bool,
    /// Destination for absorbed failures.
    pub sink: Arc<dyn DiagnosticSink>,
}

impl RowOptions {
    /// Creates options with the documented defaults.
    pub fn new() -> Self {
        Self {
            schema: "public".into(),
            primary_key: "id".into(),
            auto_sync: true,
            select: "*".into(),
            skip_if_no_key: false,
            sink: Arc::new(TracingSink),
        }
    }

    /// Sets the schema qualifier.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the primary-key column.
    pub fn with_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Enables or disables automatic persistence of local edits.
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self {
        self.auto_sync = auto_sync;
        self
    }

    /// Sets the select expression for the initial read.
    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = select.into();
        self
    }

    /// Suppresses the missing-key diagnostic.
    pub fn with_skip_if_no_key(mut self, skip: bool) -> Self {
        self.skip_if_no_key = skip;
        self
    }

    /// Sets the diagnostic sink.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }
}

impl Default for RowOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RowOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowOptions")
            .field("schema", &self.schema)
            .field("primary_key", &self.primary_key)
            .field("auto_sync", &self.auto_sync)
            .field("select", &self.select)
            .field("skip_if_no_key", &self.skip_if_no_key)
            .finish_non_exhaustive()
    }
}
