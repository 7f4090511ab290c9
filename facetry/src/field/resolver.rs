use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::infer::infer_plan;
use super::plan::{Capabilities, FieldPlan};
use super::registry::FieldRegistry;
use crate::{Error, Result};

/// Resolves generic/concrete field names to plans.
///
/// The registry is immutable; plans inferred from sample values live in a
/// separate cache so later lookups of the same name succeed without a sample.
#[derive(Debug)]
pub struct FieldResolver {
    registry: Arc<FieldRegistry>,
    derived: RwLock<HashMap<String, Arc<FieldPlan>>>,
}

impl FieldResolver {
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        Self {
            registry,
            derived: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    /// Lookup without inference.
    pub fn find(&self, generic: Option<&str>, concrete: Option<&str>) -> Option<Arc<FieldPlan>> {
        if let Some(plan) = self.registry.find(generic, concrete) {
            return Some(plan);
        }
        let name = concrete.or(generic)?;
        self.derived.read().get(name).cloned()
    }

    pub fn resolve(
        &self,
        generic: Option<&str>,
        concrete: Option<&str>,
        sample: Option<&Value>,
    ) -> Result<Arc<FieldPlan>> {
        if generic.is_none() && concrete.is_none() {
            return Err(Error::InvalidQuery(
                "a generic or concrete field name is required".to_string(),
            ));
        }
        if let Some(plan) = self.find(generic, concrete) {
            return Ok(plan);
        }

        let name = concrete.or(generic).unwrap_or_default();
        let inferred = sample.and_then(|value| infer_plan(name, value));
        let Some(plan) = inferred else {
            return Err(Error::FieldNotFound(name.to_string()));
        };

        let mut derived = self.derived.write();
        // another caller may have inferred the same name meanwhile
        let plan = derived
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(
                    field = %name,
                    value_type = ?plan.value_type,
                    "Inferred field plan from sample value"
                );
                metrics::counter!("facetry_field_plans_inferred_total").increment(1);
                Arc::new(plan)
            })
            .clone();
        Ok(plan)
    }

    /// Resolve and check the plan exposes every capability in `required`.
    pub fn resolve_with(
        &self,
        generic: Option<&str>,
        concrete: Option<&str>,
        sample: Option<&Value>,
        required: Capabilities,
    ) -> Result<Arc<FieldPlan>> {
        let plan = self.resolve(generic, concrete, sample)?;
        let missing = plan.missing(required);
        if !missing.is_empty() {
            return Err(Error::UnsupportedFieldUsage {
                field: concrete.or(generic).unwrap_or(plan.name.as_str()).to_string(),
                capability: missing.describe().to_string(),
            });
        }
        Ok(plan)
    }

    /// Number of plans inferred so far.
    pub fn derived_count(&self) -> usize {
        self.derived.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::PlanOrigin;
    use crate::schema::{FieldType, SchemaDefinition};
    use serde_json::json;

    fn resolver() -> FieldResolver {
        let schema: SchemaDefinition = serde_yaml::from_str(
            r#"
collection: test
primary_key: id
fields:
  - name: title
    type: text
    indexed: true
    stored: true
  - name: category
    type: string
    facet: taxonomy
"#,
        )
        .unwrap();
        FieldResolver::new(Arc::new(FieldRegistry::build(&schema).unwrap()))
    }

    #[test]
    fn test_unknown_field_without_sample() {
        let err = resolver().resolve(None, Some("missing"), None).unwrap_err();
        assert!(matches!(err, Error::FieldNotFound(ref name) if name == "missing"));
    }

    #[test]
    fn test_inferred_plan_is_cached() {
        let resolver = resolver();
        let first = resolver
            .resolve(None, Some("views"), Some(&json!(12)))
            .unwrap();
        assert_eq!(first.origin, PlanOrigin::Inferred);
        assert_eq!(first.value_type, Some(FieldType::Integer));

        let second = resolver.resolve(None, Some("views"), None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.derived_count(), 1);
    }

    #[test]
    fn test_declared_plan_ignores_sample() {
        let resolver = resolver();
        let plan = resolver
            .resolve(None, Some("title"), Some(&json!(12)))
            .unwrap();
        assert_eq!(plan.value_type, Some(FieldType::Text));
        assert_eq!(resolver.derived_count(), 0);
    }

    #[test]
    fn test_resolve_with_missing_capability() {
        let err = resolver()
            .resolve_with(None, Some("title"), None, Capabilities::FACET)
            .unwrap_err();
        match err {
            Error::UnsupportedFieldUsage { field, capability } => {
                assert_eq!(field, "title");
                assert_eq!(capability, "facets");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolve_with_satisfied() {
        let plan = resolver()
            .resolve_with(None, Some("category"), None, Capabilities::FACET)
            .unwrap();
        assert_eq!(plan.name, "category");
    }

    #[test]
    fn test_no_names_is_invalid() {
        assert!(matches!(
            resolver().resolve(None, None, Some(&json!("x"))),
            Err(Error::InvalidQuery(_))
        ));
    }
}
