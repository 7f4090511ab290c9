//! Index capabilities consumed by facet aggregation
//!
//! The aggregator never touches storage directly: it asks a [`FacetIndex`]
//! for result sets, hit counts and per-encoding facet-count views.

pub mod document;
pub mod memory;
pub mod tantivy_index;

pub use document::{DocumentBuilder, FacetEntry, IndexDocument};
pub use memory::MemoryIndex;
pub use tantivy_index::TantivyFacetIndex;

use crate::facet::{DimensionConfig, EncodingKind, FacetValue, LabelValue};
use crate::query::{DrillDownQuery, IndexQuery};
use crate::Result;

pub type DocId = u32;

/// Facet counts over one result set, for dimensions of one encoding.
pub trait FacetCounts: Send + Sync {
    /// Highest-valued children of the dimension root, value descending then
    /// label ascending. Empty when the dimension has no data here.
    fn top_children(&self, top: usize, dimension: &DimensionConfig) -> Result<Vec<LabelValue>>;

    /// Value of one path (index form), `None` when no document carries it.
    fn specific_value(
        &self,
        dimension: &DimensionConfig,
        path: &[String],
    ) -> Result<Option<FacetValue>>;
}

/// Read side of an index, as seen by facet aggregation.
pub trait FacetIndex: Send + Sync {
    type Hits: Send + Sync;

    /// Run `query` once and keep the full result set.
    fn collect(&self, query: &IndexQuery) -> Result<Self::Hits>;

    /// Counting backend for one encoding over `hits`. `None` when the index
    /// cannot provide this encoding for the result set.
    fn facet_counts<'a>(
        &'a self,
        kind: EncodingKind,
        hits: &'a Self::Hits,
    ) -> Result<Option<Box<dyn FacetCounts + 'a>>>;

    /// Filter-only hit count.
    fn count(&self, query: &IndexQuery) -> Result<u64>;

    /// Whether any ordinal facet data exists in the current reader.
    fn ordinal_data_available(&self) -> bool;

    /// Whether ordinal facet data exists for `dimension`.
    fn has_ordinal_data(&self, dimension: &str) -> bool;

    /// Counts with drill-sideways semantics: a drilled dimension is counted
    /// as if its own clause were removed.
    fn drill_sideways<'a>(
        &'a self,
        query: &DrillDownQuery,
        dimensions: &[DimensionConfig],
    ) -> Result<Box<dyn FacetCounts + 'a>>;
}

/// Sort by value descending, then label ascending, and keep `top`.
pub(crate) fn rank_children(mut children: Vec<LabelValue>, top: usize) -> Vec<LabelValue> {
    children.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.label.cmp(&b.label))
    });
    children.truncate(top);
    children
}
