pub mod facets;
pub mod lint;
pub mod resolve;

pub use facets::run_facets;
pub use lint::run_lint;
pub use resolve::run_resolve;
