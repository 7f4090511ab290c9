//! In-process index over roaring bitmaps
//!
//! Holds every encoding, including the weighted ones, and is small enough to
//! drive tests and the offline CLI.

use std::collections::HashMap;

use roaring::RoaringBitmap;
use serde_json::{Map, Value};

use super::document::IndexDocument;
use super::{rank_children, DocId, FacetCounts, FacetIndex};
use crate::facet::{DimensionConfig, EncodingKind, FacetValue, LabelValue};
use crate::query::{DrillDownQuery, IndexQuery};
use crate::{Error, Result};

#[derive(Debug)]
struct FacetPosting {
    doc: DocId,
    path: Vec<String>,
    weight: Option<FacetValue>,
}

#[derive(Debug)]
struct DimensionData {
    encoding: EncodingKind,
    postings: Vec<FacetPosting>,
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    ids: Vec<Option<String>>,
    stored: Vec<Map<String, Value>>,
    all: RoaringBitmap,
    /// field -> term -> docs
    terms: HashMap<String, HashMap<String, RoaringBitmap>>,
    /// field -> doc -> values, in document order
    doc_values: HashMap<String, HashMap<DocId, Vec<Value>>>,
    dimensions: HashMap<String, DimensionData>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, document: IndexDocument) -> Result<DocId> {
        for facet in &document.facets {
            if let Some(data) = self.dimensions.get(&facet.dimension) {
                if data.encoding != facet.encoding {
                    return Err(Error::Backend(format!(
                        "dimension '{}' is stored as {} but got {}",
                        facet.dimension,
                        data.encoding.as_str(),
                        facet.encoding.as_str()
                    )));
                }
            }
        }

        let doc = DocId::try_from(self.ids.len())
            .map_err(|_| Error::Backend("memory index is full".to_string()))?;
        for (field, term) in document.terms {
            self.terms
                .entry(field)
                .or_default()
                .entry(term)
                .or_default()
                .insert(doc);
        }
        for (field, value) in document.doc_values {
            self.doc_values
                .entry(field)
                .or_default()
                .entry(doc)
                .or_default()
                .push(value);
        }
        for facet in document.facets {
            self.dimensions
                .entry(facet.dimension)
                .or_insert_with(|| DimensionData {
                    encoding: facet.encoding,
                    postings: Vec::new(),
                })
                .postings
                .push(FacetPosting {
                    doc,
                    path: facet.path,
                    weight: facet.weight,
                });
        }
        self.ids.push(document.id);
        self.stored.push(document.stored);
        self.all.insert(doc);
        Ok(doc)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn stored(&self, doc: DocId) -> Option<&Map<String, Value>> {
        self.stored.get(doc as usize)
    }

    pub fn id(&self, doc: DocId) -> Option<&str> {
        self.ids.get(doc as usize).and_then(|id| id.as_deref())
    }

    /// Per-document values of a doc-values field.
    pub fn doc_values(&self, doc: DocId, field: &str) -> &[Value] {
        self.doc_values
            .get(field)
            .and_then(|docs| docs.get(&doc))
            .map_or(&[], Vec::as_slice)
    }

    pub fn search(&self, query: &IndexQuery) -> RoaringBitmap {
        match query {
            IndexQuery::MatchAll => self.all.clone(),
            IndexQuery::Term { field, value } => self
                .terms
                .get(field)
                .and_then(|terms| terms.get(value))
                .cloned()
                .unwrap_or_default(),
            IndexQuery::FacetPath {
                encoding,
                dimension,
                path,
            } => self
                .dimensions
                .get(dimension)
                .filter(|data| data.encoding == *encoding)
                .map(|data| {
                    data.postings
                        .iter()
                        .filter(|p| p.path.starts_with(path))
                        .map(|p| p.doc)
                        .collect()
                })
                .unwrap_or_default(),
            IndexQuery::Bool {
                must,
                should,
                must_not,
            } => {
                let mut docs = self.all.clone();
                for clause in must {
                    docs &= self.search(clause);
                }
                if must.is_empty() && !should.is_empty() {
                    let mut any = RoaringBitmap::new();
                    for clause in should {
                        any |= self.search(clause);
                    }
                    docs &= any;
                }
                for clause in must_not {
                    docs -= self.search(clause);
                }
                docs
            }
            IndexQuery::DrillDown(drill) => self.search(&drill.to_query()),
        }
    }

    fn count_children(
        &self,
        docs: &RoaringBitmap,
        top: usize,
        dimension: &DimensionConfig,
    ) -> Vec<LabelValue> {
        let Some(data) = self.data_for(dimension) else {
            return Vec::new();
        };
        if top == 0 {
            return Vec::new();
        }

        let children: Vec<LabelValue> = if dimension.encoding.is_weighted() {
            let mut sums: HashMap<&str, FacetValue> = HashMap::new();
            for posting in data.postings.iter().filter(|p| docs.contains(p.doc)) {
                let Some(child) = posting.path.first() else {
                    continue;
                };
                let weight = posting.weight.unwrap_or(FacetValue::ZERO);
                let sum = sums.entry(child.as_str()).or_insert(match weight {
                    FacetValue::Int(_) => FacetValue::Int(0),
                    FacetValue::Float(_) => FacetValue::Float(0.0),
                });
                *sum = add(*sum, weight);
            }
            sums.into_iter()
                .map(|(label, value)| LabelValue::new(label, value))
                .collect()
        } else {
            let mut child_docs: HashMap<&str, RoaringBitmap> = HashMap::new();
            for posting in data.postings.iter().filter(|p| docs.contains(p.doc)) {
                if let Some(child) = posting.path.first() {
                    child_docs.entry(child.as_str()).or_default().insert(posting.doc);
                }
            }
            child_docs
                .into_iter()
                .map(|(label, docs)| LabelValue::new(label, docs.len()))
                .collect()
        };
        rank_children(children, top)
    }

    fn value_of(
        &self,
        docs: &RoaringBitmap,
        dimension: &DimensionConfig,
        path: &[String],
    ) -> Option<FacetValue> {
        let data = self.data_for(dimension)?;
        let matching = data
            .postings
            .iter()
            .filter(|p| docs.contains(p.doc) && p.path.starts_with(path));

        if dimension.encoding.is_weighted() {
            matching
                .filter_map(|p| p.weight)
                .reduce(add)
        } else {
            let docs: RoaringBitmap = matching.map(|p| p.doc).collect();
            (!docs.is_empty()).then(|| FacetValue::from(docs.len()))
        }
    }

    fn data_for(&self, dimension: &DimensionConfig) -> Option<&DimensionData> {
        self.dimensions
            .get(&dimension.dimension)
            .filter(|data| data.encoding == dimension.encoding)
    }
}

fn add(a: FacetValue, b: FacetValue) -> FacetValue {
    match (a, b) {
        (FacetValue::Int(x), FacetValue::Int(y)) => FacetValue::Int(x.saturating_add(y)),
        (x, y) => FacetValue::Float(x.as_f64() + y.as_f64()),
    }
}

/// Counts over one result set
struct BitmapCounts<'a> {
    index: &'a MemoryIndex,
    docs: &'a RoaringBitmap,
}

impl FacetCounts for BitmapCounts<'_> {
    fn top_children(&self, top: usize, dimension: &DimensionConfig) -> Result<Vec<LabelValue>> {
        Ok(self.index.count_children(self.docs, top, dimension))
    }

    fn specific_value(
        &self,
        dimension: &DimensionConfig,
        path: &[String],
    ) -> Result<Option<FacetValue>> {
        Ok(self.index.value_of(self.docs, dimension, path))
    }
}

/// Drill-sideways counts: drilled dimensions use their own result set
struct SidewaysCounts<'a> {
    index: &'a MemoryIndex,
    hits: RoaringBitmap,
    sideways: HashMap<String, RoaringBitmap>,
}

impl SidewaysCounts<'_> {
    fn docs_for(&self, dimension: &DimensionConfig) -> &RoaringBitmap {
        self.sideways
            .get(&dimension.dimension)
            .unwrap_or(&self.hits)
    }
}

impl FacetCounts for SidewaysCounts<'_> {
    fn top_children(&self, top: usize, dimension: &DimensionConfig) -> Result<Vec<LabelValue>> {
        Ok(self
            .index
            .count_children(self.docs_for(dimension), top, dimension))
    }

    fn specific_value(
        &self,
        dimension: &DimensionConfig,
        path: &[String],
    ) -> Result<Option<FacetValue>> {
        Ok(self.index.value_of(self.docs_for(dimension), dimension, path))
    }
}

impl FacetIndex for MemoryIndex {
    type Hits = RoaringBitmap;

    fn collect(&self, query: &IndexQuery) -> Result<RoaringBitmap> {
        Ok(self.search(query))
    }

    fn facet_counts<'a>(
        &'a self,
        kind: EncodingKind,
        hits: &'a RoaringBitmap,
    ) -> Result<Option<Box<dyn FacetCounts + 'a>>> {
        if kind == EncodingKind::Ordinal && !self.ordinal_data_available() {
            return Ok(None);
        }
        Ok(Some(Box::new(BitmapCounts { index: self, docs: hits })))
    }

    fn count(&self, query: &IndexQuery) -> Result<u64> {
        Ok(self.search(query).len())
    }

    fn ordinal_data_available(&self) -> bool {
        self.dimensions
            .values()
            .any(|data| data.encoding == EncodingKind::Ordinal && !data.postings.is_empty())
    }

    fn has_ordinal_data(&self, dimension: &str) -> bool {
        self.dimensions
            .get(dimension)
            .is_some_and(|data| data.encoding == EncodingKind::Ordinal && !data.postings.is_empty())
    }

    fn drill_sideways<'a>(
        &'a self,
        query: &DrillDownQuery,
        dimensions: &[DimensionConfig],
    ) -> Result<Box<dyn FacetCounts + 'a>> {
        let sideways = dimensions
            .iter()
            .filter(|dim| query.is_drilled(&dim.dimension))
            .map(|dim| {
                (
                    dim.dimension.clone(),
                    self.search(&query.without(&dim.dimension)),
                )
            })
            .collect();
        Ok(Box::new(SidewaysCounts {
            index: self,
            hits: self.search(&query.to_query()),
            sideways,
        }))
    }
}
