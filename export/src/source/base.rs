use futures::Stream;
use std::future::Future;

use crate::error::ExportResult;
use crate::source::SourceQuery;
use crate::types::Row;

/// Read-only access to the tenant database.
///
/// [`Source`] implementations execute the parameterized queries described by
/// [`SourceQuery`] and page through whole tables for discovery. They never write.
///
/// Implementations are expected to be cheap to clone and safe to call concurrently, since the
/// category assembler issues sibling table loads at the same time.
pub trait Source {
    /// Executes a single query and returns every resulting row.
    fn query(&self, query: &SourceQuery) -> impl Future<Output = ExportResult<Vec<Row>>> + Send;

    /// Lazily scans `table` in pages of at most `batch_size` rows.
    ///
    /// The stream ends after the last page or after the first error.
    fn scan_table(
        &self,
        table: &'static str,
        batch_size: usize,
    ) -> impl Stream<Item = ExportResult<Vec<Row>>> + Send + '_;
}
