use std::collections::HashMap;
use std::sync::Arc;

use super::copy::CopyGraph;
use super::plan::{FieldPlan, PlanOrigin};
use super::wildcard::WildcardMatcher;
use crate::schema::{FieldType, SchemaDefinition};
use crate::{Error, Result};

/// Field plans of one schema version. Built once, read-only afterwards.
#[derive(Debug)]
pub struct FieldRegistry {
    primary_key: Option<String>,
    record_field: Option<String>,
    /// Concrete names and wildcard patterns, keyed by declared name
    plans: HashMap<String, Arc<FieldPlan>>,
    /// Wildcard plans in declaration order
    wildcards: Vec<(WildcardMatcher, Arc<FieldPlan>)>,
    copy_graph: CopyGraph,
    primary_key_plan: Option<Arc<FieldPlan>>,
    record_plan: Option<Arc<FieldPlan>>,
}

impl FieldRegistry {
    pub fn build(schema: &SchemaDefinition) -> Result<Self> {
        let mut plans = HashMap::new();
        let mut wildcards = Vec::new();

        for definition in &schema.fields {
            if definition.name.is_empty() {
                return Err(Error::Schema("Field name must not be empty".to_string()));
            }
            if plans.contains_key(&definition.name) {
                return Err(Error::Schema(format!(
                    "Field '{}' is declared more than once",
                    definition.name
                )));
            }
            if definition.field_type == FieldType::Binary
                && (definition.indexed || definition.facet.is_some())
            {
                return Err(Error::Schema(format!(
                    "Binary field '{}' can only be stored",
                    definition.name
                )));
            }

            let plan = Arc::new(FieldPlan::from_definition(definition));
            if definition.is_wildcard() {
                wildcards.push((WildcardMatcher::new(&definition.name)?, plan.clone()));
            }
            plans.insert(definition.name.clone(), plan);
        }

        let copy_graph = CopyGraph::build(&schema.fields)?;
        for endpoint in copy_graph.endpoints() {
            if !plans.contains_key(endpoint) {
                tracing::debug!(field = %endpoint, "Synthesizing pass-through copy plan");
                plans.insert(
                    endpoint.to_string(),
                    Arc::new(FieldPlan::pass_through(endpoint)),
                );
            }
        }
        for issue in copy_type_conflicts(&plans, &copy_graph) {
            tracing::warn!(collection = %schema.collection, "{}", issue);
        }

        Ok(Self {
            primary_key_plan: schema
                .primary_key
                .as_deref()
                .map(|name| Arc::new(FieldPlan::primary_key(name))),
            record_plan: schema
                .record_field
                .as_deref()
                .map(|name| Arc::new(FieldPlan::record(name))),
            primary_key: schema.primary_key.clone(),
            record_field: schema.record_field.clone(),
            plans,
            wildcards,
            copy_graph,
        })
    }

    /// Exact, reserved-name, then wildcard lookup. No inference.
    pub fn find(&self, generic: Option<&str>, concrete: Option<&str>) -> Option<Arc<FieldPlan>> {
        // generic names may address a wildcard plan directly by its pattern
        if let Some(plan) = generic.and_then(|name| self.plans.get(name)) {
            return Some(plan.clone());
        }
        if let Some(plan) = concrete.and_then(|name| self.plans.get(name)) {
            return Some(plan.clone());
        }

        if let Some(concrete) = concrete {
            if self.record_field.as_deref() == Some(concrete) {
                return self.record_plan.clone();
            }
            if self.primary_key.as_deref() == Some(concrete) {
                return self.primary_key_plan.clone();
            }
        }

        let search = concrete.or(generic)?;
        self.wildcards
            .iter()
            .find(|(matcher, _)| matcher.matches(search))
            .map(|(_, plan)| plan.clone())
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn record_field(&self) -> Option<&str> {
        self.record_field.as_deref()
    }

    pub fn copy_graph(&self) -> &CopyGraph {
        &self.copy_graph
    }

    /// Declared and synthesized plans (concrete and wildcard), in no particular order.
    pub fn plans(&self) -> impl Iterator<Item = &Arc<FieldPlan>> {
        self.plans.values()
    }

    pub fn wildcard_patterns(&self) -> impl Iterator<Item = &str> {
        self.wildcards.iter().map(|(matcher, _)| matcher.pattern())
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Copy edges whose destination type cannot hold the source's values.
    pub fn copy_type_issues(&self) -> Vec<String> {
        copy_type_conflicts(&self.plans, &self.copy_graph)
    }
}

/// Copy destinations declared with a value type that cannot hold the source's values.
pub(crate) fn copy_type_conflicts(
    plans: &HashMap<String, Arc<FieldPlan>>,
    graph: &CopyGraph,
) -> Vec<String> {
    let mut issues = Vec::new();
    for source in graph.endpoints() {
        let Some(source_type) = plans.get(source).and_then(|p| p.value_type) else {
            continue;
        };
        for destination in graph.destinations(source) {
            let Some(dest_plan) = plans.get(destination) else {
                continue;
            };
            if dest_plan.origin == PlanOrigin::CopyPassThrough {
                continue;
            }
            if let Some(dest_type) = dest_plan.value_type {
                if !dest_type.accepts(source_type) {
                    issues.push(format!(
                        "copy from '{}' ({}) into '{}' ({}) mixes incompatible value types",
                        source,
                        source_type.as_str(),
                        destination,
                        dest_type.as_str()
                    ));
                }
            }
        }
    }
    issues
}
