use bitflags::bitflags;
use serde::Serialize;
use serde_json::Value;

use crate::schema::{FacetTemplate, FieldDefinition, FieldType};
use crate::{Error, Result};

bitflags! {
    /// What a field plan does with the values it receives.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const INDEXED = 1;
        const STORED = 1 << 1;
        const DOC_VALUES = 1 << 2;
        const POINT = 1 << 3;
        const FACET = 1 << 4;
    }
}

impl Capabilities {
    /// Name of the first capability in `self`, used in error messages.
    pub fn describe(self) -> &'static str {
        if self.contains(Capabilities::INDEXED) {
            "indexing"
        } else if self.contains(Capabilities::STORED) {
            "stored values"
        } else if self.contains(Capabilities::DOC_VALUES) {
            "doc-values"
        } else if self.contains(Capabilities::POINT) {
            "point indexing"
        } else if self.contains(Capabilities::FACET) {
            "facets"
        } else {
            "nothing"
        }
    }
}

impl Serialize for Capabilities {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        names.serialize(serializer)
    }
}

/// Where a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOrigin {
    Declared,
    Wildcard,
    /// Synthesized for an undeclared copy endpoint; accepts anything, indexes nothing
    CopyPassThrough,
    PrimaryKey,
    Record,
    Inferred,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetSpec {
    pub template: FacetTemplate,
    pub hierarchical: bool,
    pub multi_valued: bool,
}

/// Resolved description of how values of a field name are stored.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPlan {
    pub name: String,
    pub origin: PlanOrigin,
    /// `None` accepts any value
    pub value_type: Option<FieldType>,
    pub capabilities: Capabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facet: Option<FacetSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub copy_to: Vec<String>,
}

impl FieldPlan {
    pub(crate) fn from_definition(definition: &FieldDefinition) -> Self {
        let field_type = definition.field_type;
        let mut capabilities = Capabilities::empty();
        if definition.indexed {
            if field_type.is_numeric() {
                capabilities |= Capabilities::POINT;
            } else {
                capabilities |= Capabilities::INDEXED;
            }
        }
        if definition.stored {
            capabilities |= Capabilities::STORED;
        }
        if definition.sort {
            capabilities |= Capabilities::DOC_VALUES;
        }
        let facet = definition.facet.map(|template| {
            capabilities |= Capabilities::FACET;
            FacetSpec {
                template,
                hierarchical: definition
                    .facet_hierarchical
                    .unwrap_or_else(|| template.default_hierarchical()),
                multi_valued: definition.facet_multivalued.unwrap_or(false),
            }
        });
        Self {
            name: definition.name.clone(),
            origin: if definition.is_wildcard() {
                PlanOrigin::Wildcard
            } else {
                PlanOrigin::Declared
            },
            value_type: Some(field_type),
            capabilities,
            analyzer: definition.analyzer.clone(),
            facet,
            copy_to: definition.copy_to.clone(),
        }
    }

    pub(crate) fn pass_through(name: &str) -> Self {
        Self {
            name: name.to_string(),
            origin: PlanOrigin::CopyPassThrough,
            value_type: None,
            capabilities: Capabilities::empty(),
            analyzer: None,
            facet: None,
            copy_to: Vec::new(),
        }
    }

    pub(crate) fn primary_key(name: &str) -> Self {
        Self {
            name: name.to_string(),
            origin: PlanOrigin::PrimaryKey,
            value_type: Some(FieldType::String),
            capabilities: Capabilities::INDEXED | Capabilities::STORED | Capabilities::DOC_VALUES,
            analyzer: None,
            facet: None,
            copy_to: Vec::new(),
        }
    }

    pub(crate) fn record(name: &str) -> Self {
        Self {
            name: name.to_string(),
            origin: PlanOrigin::Record,
            value_type: None,
            capabilities: Capabilities::STORED,
            analyzer: None,
            facet: None,
            copy_to: Vec::new(),
        }
    }

    pub(crate) fn inferred(name: &str, value_type: FieldType, capabilities: Capabilities) -> Self {
        Self {
            name: name.to_string(),
            origin: PlanOrigin::Inferred,
            value_type: Some(value_type),
            capabilities,
            analyzer: None,
            facet: None,
            copy_to: Vec::new(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.origin == PlanOrigin::Wildcard
    }

    pub fn supports(&self, required: Capabilities) -> bool {
        self.capabilities.contains(required)
    }

    /// Capabilities in `required` this plan lacks.
    pub fn missing(&self, required: Capabilities) -> Capabilities {
        required.difference(self.capabilities)
    }

    /// Index terms for one scalar value. Text is split into lowercase tokens;
    /// every other type yields a single canonical term.
    pub fn index_terms(&self, value: &Value) -> Result<Vec<String>> {
        let invalid = |reason: &str| Error::invalid_value(&self.name, reason);
        match (self.value_type, value) {
            (_, Value::Null | Value::Array(_) | Value::Object(_)) => {
                Err(invalid("expected a scalar value"))
            }
            (Some(FieldType::Binary), _) => Err(invalid("binary values cannot be indexed")),
            (Some(FieldType::Text), Value::String(s)) => Ok(tokenize(s)),
            (Some(FieldType::Integer), v) => {
                let n = integer_value(v).ok_or_else(|| invalid("expected an integer"))?;
                i32::try_from(n)
                    .map(|n| vec![n.to_string()])
                    .map_err(|_| invalid("integer out of 32-bit range"))
            }
            (Some(FieldType::Long), v) => integer_value(v)
                .map(|n| vec![n.to_string()])
                .ok_or_else(|| invalid("expected an integer")),
            (Some(FieldType::Float | FieldType::Double), v) => float_value(v)
                .map(|n| vec![n.to_string()])
                .ok_or_else(|| invalid("expected a number")),
            (_, Value::String(s)) => Ok(vec![s.clone()]),
            (_, Value::Number(n)) => Ok(vec![n.to_string()]),
            (_, Value::Bool(b)) => Ok(vec![b.to_string()]),
        }
    }
}

pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|f: &f64| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_indexed_means_point() {
        let mut def = FieldDefinition::new("price", FieldType::Double);
        def.indexed = true;
        def.sort = true;
        let plan = FieldPlan::from_definition(&def);
        assert!(plan.supports(Capabilities::POINT | Capabilities::DOC_VALUES));
        assert!(!plan.supports(Capabilities::INDEXED));
        assert_eq!(plan.origin, PlanOrigin::Declared);
    }

    #[test]
    fn test_facet_spec_defaults() {
        let mut def = FieldDefinition::new("tags_*", FieldType::String);
        def.facet = Some(FacetTemplate::SortedSet);
        let plan = FieldPlan::from_definition(&def);
        assert_eq!(plan.origin, PlanOrigin::Wildcard);
        let facet = plan.facet.unwrap();
        assert!(!facet.hierarchical);
        assert!(!facet.multi_valued);
        assert!(plan.capabilities.contains(Capabilities::FACET));
    }

    #[test]
    fn test_missing_capabilities() {
        let plan = FieldPlan::record("$record$");
        let missing = plan.missing(Capabilities::STORED | Capabilities::DOC_VALUES);
        assert_eq!(missing, Capabilities::DOC_VALUES);
        assert_eq!(missing.describe(), "doc-values");
    }

    #[test]
    fn test_index_terms_by_type() {
        let text = FieldPlan::from_definition(&FieldDefinition::new("title", FieldType::Text));
        assert_eq!(
            text.index_terms(&serde_json::json!("Hello, World-2")).unwrap(),
            vec!["hello", "world", "2"]
        );

        let long = FieldPlan::from_definition(&FieldDefinition::new("views", FieldType::Long));
        assert_eq!(long.index_terms(&serde_json::json!("42")).unwrap(), vec!["42"]);
        assert!(long.index_terms(&serde_json::json!("many")).is_err());

        let int = FieldPlan::from_definition(&FieldDefinition::new("n", FieldType::Integer));
        assert!(int.index_terms(&serde_json::json!(i64::MAX)).is_err());

        let double = FieldPlan::from_definition(&FieldDefinition::new("price", FieldType::Double));
        assert_eq!(double.index_terms(&serde_json::json!(5)).unwrap(), vec!["5"]);
        assert_eq!(double.index_terms(&serde_json::json!(2.5)).unwrap(), vec!["2.5"]);

        let exact = FieldPlan::from_definition(&FieldDefinition::new("tag", FieldType::String));
        assert_eq!(exact.index_terms(&serde_json::json!("Red Car")).unwrap(), vec!["Red Car"]);
        assert_eq!(exact.index_terms(&serde_json::json!(true)).unwrap(), vec!["true"]);
        assert!(exact.index_terms(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn test_capabilities_serialize_as_names() {
        let json = serde_json::to_value(Capabilities::INDEXED | Capabilities::FACET).unwrap();
        assert_eq!(json, serde_json::json!(["INDEXED", "FACET"]));
    }
}
