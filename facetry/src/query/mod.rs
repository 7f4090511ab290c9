//! Facet-aware query predicates
//!
//! Predicates are written against schema field names and resolved into
//! `IndexQuery` trees that index implementations evaluate.

pub mod predicate;

pub use predicate::{DimPath, DrillClause, DrillDownQuery, IndexQuery, Predicate};
