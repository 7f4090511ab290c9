//! Field schema resolution and faceted counting for document search indexes.
//!
//! A collection schema is compiled into a [`field::FieldRegistry`]; every
//! field reference, at indexing and at query time, is resolved through the
//! same [`field::FieldResolver`]. Facet dimensions are assigned an encoding on
//! first use and counted by [`facet::FacetAggregator`] over any
//! [`index::FacetIndex`].

pub mod config;
pub mod error;
pub mod facet;
pub mod field;
pub mod index;
pub mod query;
pub mod schema;

pub use config::Config;
pub use error::{Error, Result};
pub use facet::{FacetAggregator, FacetRequest, FacetRequests, FacetResults, FacetValue};
pub use index::{DocumentBuilder, FacetIndex, MemoryIndex, TantivyFacetIndex};
pub use query::Predicate;
pub use schema::{IndexSchema, SchemaLoader};
