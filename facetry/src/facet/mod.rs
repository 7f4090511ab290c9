//! Facet configuration, requests, aggregation and results

pub mod aggregator;
pub mod config;
pub mod ordered;
pub mod request;
pub mod result;

pub use aggregator::{FacetAggregator, FacetResults};
pub use config::{
    BackendKinds, DimensionConfig, EncodingKind, FacetsConfigurator, TAXONOMY_FIELD,
    TAXONOMY_FLOAT_FIELD, TAXONOMY_INT_FIELD,
};
pub use ordered::OrderedMap;
pub use request::{FacetRequest, FacetRequests, FacetSort, DEFAULT_TOP};
pub use result::{FacetResult, FacetResultBuilder, FacetValue, LabelValue};
