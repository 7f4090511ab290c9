//! Field plans: how values of a field name are stored, and how a name is
//! resolved to its plan.

pub mod copy;
pub mod infer;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod wildcard;

pub use copy::CopyGraph;
pub use infer::infer_plan;
pub use plan::{Capabilities, FacetSpec, FieldPlan, PlanOrigin};
pub use registry::FieldRegistry;
pub use resolver::FieldResolver;
pub use wildcard::WildcardMatcher;
