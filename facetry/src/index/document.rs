//! Turning JSON documents into index-ready documents
//!
//! Every field name goes through the same resolver the query side uses, so a
//! value is indexed exactly the way a later term or facet query expects it.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::facet::{DimensionConfig, EncodingKind, FacetValue};
use crate::field::{Capabilities, FieldPlan, PlanOrigin};
use crate::schema::{FieldType, IndexSchema};
use crate::{Error, Result};

/// One facet value of a document
#[derive(Debug, Clone, PartialEq)]
pub struct FacetEntry {
    pub encoding: EncodingKind,
    pub dimension: String,
    /// Index form: flat dimensions have a single component
    pub path: Vec<String>,
    /// Set for association encodings only
    pub weight: Option<FacetValue>,
}

/// A document after field resolution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexDocument {
    pub id: Option<String>,
    /// (concrete field, term)
    pub terms: Vec<(String, String)>,
    pub stored: Map<String, Value>,
    pub doc_values: Vec<(String, Value)>,
    pub facets: Vec<FacetEntry>,
}

impl IndexDocument {
    pub fn has_term(&self, field: &str, term: &str) -> bool {
        self.terms.iter().any(|(f, t)| f == field && t == term)
    }
}

pub struct DocumentBuilder<'a> {
    schema: &'a IndexSchema,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(schema: &'a IndexSchema) -> Self {
        Self { schema }
    }

    pub fn build(&self, source: &Map<String, Value>) -> Result<IndexDocument> {
        let mut doc = IndexDocument::default();
        let resolver = self.schema.resolver();
        let copies = self.schema.registry().copy_graph();

        for (name, value) in source {
            if value.is_null() {
                continue;
            }
            let plan = resolver.resolve(None, Some(name.as_str()), Some(value))?;
            self.add_value(&mut doc, name, &plan, value)?;

            // one hop: a destination's own copy declarations are not followed
            for destination in copies.destinations(&plan.name) {
                let dest_plan = resolver.resolve(None, Some(destination.as_str()), Some(value))?;
                self.add_value(&mut doc, destination, &dest_plan, value)?;
            }
        }

        check_multi_valued(&doc, self.schema)?;
        Ok(doc)
    }

    fn add_value(
        &self,
        doc: &mut IndexDocument,
        name: &str,
        plan: &FieldPlan,
        value: &Value,
    ) -> Result<()> {
        match plan.origin {
            PlanOrigin::CopyPassThrough => return Ok(()),
            PlanOrigin::Record => {
                doc.stored.insert(name.to_string(), value.clone());
                return Ok(());
            }
            PlanOrigin::PrimaryKey => {
                let id = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(Error::invalid_value(name, "primary key must be a string or number")),
                };
                doc.terms.push((name.to_string(), id.clone()));
                doc.stored.insert(name.to_string(), Value::String(id.clone()));
                doc.doc_values.push((name.to_string(), Value::String(id.clone())));
                doc.id = Some(id);
                return Ok(());
            }
            _ => {}
        }

        if plan.value_type == Some(FieldType::Binary) {
            if !value.is_string() {
                return Err(Error::invalid_value(name, "binary values must be base64 strings"));
            }
            if plan.supports(Capabilities::STORED) {
                doc.stored.insert(name.to_string(), value.clone());
            }
            return Ok(());
        }

        if plan.facet.is_some() {
            if let Some(config) = self.schema.facets().ensure_configured(None, name)? {
                doc.facets.extend(facet_entries(&config, name, value)?);
            }
        }

        let scalar_caps = Capabilities::INDEXED | Capabilities::POINT | Capabilities::DOC_VALUES;
        if plan.capabilities.intersects(scalar_caps) {
            for item in scalars(value) {
                let terms = plan.index_terms(item)?;
                if plan.capabilities.intersects(Capabilities::INDEXED | Capabilities::POINT) {
                    doc.terms
                        .extend(terms.into_iter().map(|term| (name.to_string(), term)));
                }
                if plan.supports(Capabilities::DOC_VALUES) {
                    doc.doc_values.push((name.to_string(), item.clone()));
                }
            }
        }

        if plan.supports(Capabilities::STORED) {
            doc.stored.insert(name.to_string(), value.clone());
        }
        Ok(())
    }
}

/// Array items one level deep; a scalar is its own single item.
fn scalars(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).collect(),
        other => vec![other],
    }
}

fn facet_entries(config: &DimensionConfig, name: &str, value: &Value) -> Result<Vec<FacetEntry>> {
    let mut entries = Vec::new();
    if matches!(value, Value::Array(items) if items.is_empty()) {
        return Ok(entries);
    }
    if config.encoding.is_weighted() {
        for item in scalars(value) {
            let (path, weight) = weighted_path(config, name, item)?;
            entries.push(entry(config, path, Some(weight)));
        }
        return Ok(entries);
    }

    match (config.encoding, value) {
        // an array of strings is one path; an array of arrays is several
        (EncodingKind::Taxonomy, Value::Array(items)) if items.iter().all(|v| !v.is_array()) => {
            entries.push(entry(config, components(name, items)?, None));
        }
        (EncodingKind::Taxonomy, Value::Array(items)) => {
            for item in items {
                let path = match item {
                    Value::Array(parts) => components(name, parts)?,
                    other => split_label(config, name, other)?,
                };
                entries.push(entry(config, path, None));
            }
        }
        (_, Value::Array(items)) => {
            for item in items.iter().filter(|v| !v.is_null()) {
                entries.push(entry(config, split_label(config, name, item)?, None));
            }
        }
        (_, other) => entries.push(entry(config, split_label(config, name, other)?, None)),
    }
    Ok(entries)
}

fn entry(config: &DimensionConfig, path: Vec<String>, weight: Option<FacetValue>) -> FacetEntry {
    FacetEntry {
        encoding: config.encoding,
        dimension: config.dimension.clone(),
        path: config.index_path(&path),
        weight,
    }
}

fn label_of(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::invalid_value(name, "facet labels must be scalar values")),
    }
}

/// A raw label, split into levels when the dimension is hierarchical.
fn split_label(config: &DimensionConfig, name: &str, value: &Value) -> Result<Vec<String>> {
    let label = label_of(name, value)?;
    let path: Vec<String> = if config.hierarchical {
        label.split(config.separator.as_str()).map(str::to_string).collect()
    } else {
        vec![label]
    };
    check_components(name, path)
}

fn components(name: &str, parts: &[Value]) -> Result<Vec<String>> {
    let path = parts
        .iter()
        .map(|part| label_of(name, part))
        .collect::<Result<Vec<_>>>()?;
    check_components(name, path)
}

fn check_components(name: &str, path: Vec<String>) -> Result<Vec<String>> {
    if path.is_empty() || path.iter().any(|c| c.is_empty()) {
        return Err(Error::invalid_value(name, "facet path components must not be empty"));
    }
    Ok(path)
}

/// `{"path": "A/B" | ["A", "B"], "weight": n}`
fn weighted_path(
    config: &DimensionConfig,
    name: &str,
    item: &Value,
) -> Result<(Vec<String>, FacetValue)> {
    let Value::Object(fields) = item else {
        return Err(Error::invalid_value(
            name,
            "association facets expect {\"path\": ..., \"weight\": ...}",
        ));
    };
    let path = match fields.get("path") {
        Some(Value::Array(parts)) => components(name, parts)?,
        Some(other) => split_label(config, name, other)?,
        None => return Err(Error::invalid_value(name, "association facet without a path")),
    };
    let weight = match (config.encoding, fields.get("weight")) {
        (EncodingKind::TaxonomyInt, Some(w)) => w
            .as_i64()
            .map(FacetValue::Int)
            .ok_or_else(|| Error::invalid_value(name, "integer association weight expected"))?,
        (_, Some(w)) => w
            .as_f64()
            .map(FacetValue::Float)
            .ok_or_else(|| Error::invalid_value(name, "numeric association weight expected"))?,
        (_, None) => return Err(Error::invalid_value(name, "association facet without a weight")),
    };
    Ok((path, weight))
}

fn check_multi_valued(doc: &IndexDocument, schema: &IndexSchema) -> Result<()> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for facet in &doc.facets {
        *counts.entry(facet.dimension.as_str()).or_default() += 1;
    }
    for (dimension, count) in counts {
        if count < 2 {
            continue;
        }
        let multi_valued = schema
            .facets()
            .get(dimension)
            .map(|config| config.multi_valued)
            .unwrap_or(false);
        if !multi_valued {
            return Err(Error::invalid_value(
                dimension,
                format!("dimension is not multi-valued but got {} values", count),
            ));
        }
    }
    Ok(())
}
