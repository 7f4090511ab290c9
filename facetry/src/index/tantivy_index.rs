//! Facet index over tantivy
//!
//! Taxonomy and ordinal dimensions live in two tantivy facet fields, with the
//! dimension name as the first facet component. Terms of every schema field
//! share one raw string field as `field\u{1f}value`.

use std::collections::HashMap;

use parking_lot::Mutex;
use tantivy::collector::{Count, FacetCollector};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Facet, FacetOptions, Field, IndexRecordOption, Schema, STORED, STRING};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};

use super::document::IndexDocument;
use super::{rank_children, FacetCounts, FacetIndex};
use crate::config::FacetSettings;
use crate::facet::{DimensionConfig, EncodingKind, FacetValue, LabelValue, TAXONOMY_FIELD};
use crate::query::{DrillDownQuery, IndexQuery};
use crate::{Error, Result};

const ID_FIELD: &str = "$id";
const TERMS_FIELD: &str = "$terms";
const TERM_SEPARATOR: char = '\u{1f}';

pub struct TantivyFacetIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    id_field: Field,
    terms_field: Field,
    taxonomy_field: Field,
    ordinal_field: Field,
}

/// A collected result set: the query and the searcher it ran against.
pub struct TantivyHits {
    searcher: Searcher,
    query: Box<dyn Query>,
}

impl TantivyHits {
    pub fn searcher(&self) -> &Searcher {
        &self.searcher
    }
}

impl TantivyFacetIndex {
    pub fn create_in_ram(settings: &FacetSettings) -> Result<Self> {
        let mut builder = Schema::builder();
        let id_field = builder.add_text_field(ID_FIELD, STRING | STORED);
        let terms_field = builder.add_text_field(TERMS_FIELD, STRING);
        let taxonomy_field = builder.add_facet_field(TAXONOMY_FIELD, FacetOptions::default());
        let ordinal_field =
            builder.add_facet_field(&settings.sorted_set_facet_field, FacetOptions::default());
        let index = Index::create_in_ram(builder.build());

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer = Mutex::new(index.writer(50_000_000)?);

        Ok(Self {
            index,
            reader,
            writer,
            id_field,
            terms_field,
            taxonomy_field,
            ordinal_field,
        })
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn add_document(&self, document: &IndexDocument) -> Result<()> {
        let mut doc = TantivyDocument::default();
        if let Some(id) = &document.id {
            doc.add_text(self.id_field, id);
        }
        for (field, term) in &document.terms {
            doc.add_text(self.terms_field, term_text(field, term));
        }
        for facet in &document.facets {
            let field = self.facet_field(facet.encoding)?;
            doc.add_facet(field, facet_of(&facet.dimension, &facet.path));
        }
        self.writer.lock().add_document(doc)?;
        Ok(())
    }

    /// Commit pending documents and make them visible to searches.
    pub fn commit(&self) -> Result<()> {
        self.writer.lock().commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    fn facet_field(&self, encoding: EncodingKind) -> Result<Field> {
        match encoding {
            EncodingKind::Taxonomy => Ok(self.taxonomy_field),
            EncodingKind::Ordinal => Ok(self.ordinal_field),
            other => Err(Error::Backend(format!(
                "{} facets are not supported by the tantivy index",
                other.as_str()
            ))),
        }
    }

    fn to_query(&self, query: &IndexQuery) -> Result<Box<dyn Query>> {
        Ok(match query {
            IndexQuery::MatchAll => Box::new(AllQuery),
            IndexQuery::Term { field, value } => Box::new(TermQuery::new(
                Term::from_field_text(self.terms_field, &term_text(field, value)),
                IndexRecordOption::Basic,
            )),
            IndexQuery::FacetPath {
                encoding,
                dimension,
                path,
            } => Box::new(TermQuery::new(
                Term::from_facet(self.facet_field(*encoding)?, &facet_of(dimension, path)),
                IndexRecordOption::Basic,
            )),
            IndexQuery::Bool {
                must,
                should,
                must_not,
            } => {
                let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
                for clause in must {
                    clauses.push((Occur::Must, self.to_query(clause)?));
                }
                if must.is_empty() {
                    if should.is_empty() {
                        clauses.push((Occur::Must, Box::new(AllQuery)));
                    }
                    for clause in should {
                        clauses.push((Occur::Should, self.to_query(clause)?));
                    }
                }
                for clause in must_not {
                    clauses.push((Occur::MustNot, self.to_query(clause)?));
                }
                Box::new(BooleanQuery::new(clauses))
            }
            IndexQuery::DrillDown(drill) => self.to_query(&drill.to_query())?,
        })
    }

    fn ordinal_terms(&self, searcher: &Searcher) -> bool {
        searcher.segment_readers().iter().any(|segment| {
            segment
                .inverted_index(self.ordinal_field)
                .map(|inverted| inverted.terms().num_terms() > 0)
                .unwrap_or(false)
        })
    }
}

fn term_text(field: &str, value: &str) -> String {
    format!("{}{}{}", field, TERM_SEPARATOR, value)
}

fn facet_of(dimension: &str, path: &[String]) -> Facet {
    Facet::from_path(std::iter::once(dimension).chain(path.iter().map(String::as_str)))
}

/// Children of `dimension/parent` over the docs matched by `query`.
fn facet_children(
    searcher: &Searcher,
    query: &dyn Query,
    field_name: &str,
    dimension: &str,
    parent: &[String],
) -> Result<Vec<(String, u64)>> {
    let parent_facet = facet_of(dimension, parent);
    let mut collector = FacetCollector::for_field(field_name);
    collector.add_facet(parent_facet.clone());
    let counts = searcher.search(query, &collector)?;
    Ok(counts
        .get(parent_facet)
        .filter_map(|(facet, count)| {
            facet
                .to_path()
                .last()
                .map(|label| (label.to_string(), count))
        })
        .collect())
}

fn top_children(
    searcher: &Searcher,
    query: &dyn Query,
    top: usize,
    dimension: &DimensionConfig,
) -> Result<Vec<LabelValue>> {
    if top == 0 {
        return Ok(Vec::new());
    }
    let children = facet_children(
        searcher,
        query,
        &dimension.index_field,
        &dimension.dimension,
        &[],
    )?
    .into_iter()
    .map(|(label, count)| LabelValue::new(label, count))
    .collect();
    Ok(rank_children(children, top))
}

fn specific_value(
    searcher: &Searcher,
    query: &dyn Query,
    dimension: &DimensionConfig,
    path: &[String],
) -> Result<Option<FacetValue>> {
    let Some((leaf, parent)) = path.split_last() else {
        return Ok(None);
    };
    let count = facet_children(
        searcher,
        query,
        &dimension.index_field,
        &dimension.dimension,
        parent,
    )?
    .into_iter()
    .find(|(label, _)| label == leaf)
    .map(|(_, count)| count)
    .unwrap_or(0);
    Ok((count > 0).then(|| FacetValue::from(count)))
}

struct TantivyCounts<'a> {
    hits: &'a TantivyHits,
}

impl FacetCounts for TantivyCounts<'_> {
    fn top_children(&self, top: usize, dimension: &DimensionConfig) -> Result<Vec<LabelValue>> {
        top_children(&self.hits.searcher, self.hits.query.as_ref(), top, dimension)
    }

    fn specific_value(
        &self,
        dimension: &DimensionConfig,
        path: &[String],
    ) -> Result<Option<FacetValue>> {
        specific_value(&self.hits.searcher, self.hits.query.as_ref(), dimension, path)
    }
}

struct TantivySideways {
    searcher: Searcher,
    query: Box<dyn Query>,
    sideways: HashMap<String, Box<dyn Query>>,
}

impl TantivySideways {
    fn query_for(&self, dimension: &DimensionConfig) -> &dyn Query {
        self.sideways
            .get(&dimension.dimension)
            .unwrap_or(&self.query)
            .as_ref()
    }
}

impl FacetCounts for TantivySideways {
    fn top_children(&self, top: usize, dimension: &DimensionConfig) -> Result<Vec<LabelValue>> {
        top_children(&self.searcher, self.query_for(dimension), top, dimension)
    }

    fn specific_value(
        &self,
        dimension: &DimensionConfig,
        path: &[String],
    ) -> Result<Option<FacetValue>> {
        specific_value(&self.searcher, self.query_for(dimension), dimension, path)
    }
}

impl FacetIndex for TantivyFacetIndex {
    type Hits = TantivyHits;

    fn collect(&self, query: &IndexQuery) -> Result<TantivyHits> {
        Ok(TantivyHits {
            searcher: self.reader.searcher(),
            query: self.to_query(query)?,
        })
    }

    fn facet_counts<'a>(
        &'a self,
        kind: EncodingKind,
        hits: &'a TantivyHits,
    ) -> Result<Option<Box<dyn FacetCounts + 'a>>> {
        match kind {
            EncodingKind::Taxonomy => Ok(Some(Box::new(TantivyCounts { hits }))),
            EncodingKind::Ordinal if self.ordinal_terms(&hits.searcher) => {
                Ok(Some(Box::new(TantivyCounts { hits })))
            }
            _ => Ok(None),
        }
    }

    fn count(&self, query: &IndexQuery) -> Result<u64> {
        let searcher = self.reader.searcher();
        let count = searcher.search(self.to_query(query)?.as_ref(), &Count)?;
        Ok(count as u64)
    }

    fn ordinal_data_available(&self) -> bool {
        self.ordinal_terms(&self.reader.searcher())
    }

    fn has_ordinal_data(&self, dimension: &str) -> bool {
        let term = Term::from_facet(self.ordinal_field, &Facet::from_path([dimension]));
        self.reader
            .searcher()
            .doc_freq(&term)
            .map(|freq| freq > 0)
            .unwrap_or(false)
    }

    fn drill_sideways<'a>(
        &'a self,
        query: &DrillDownQuery,
        dimensions: &[DimensionConfig],
    ) -> Result<Box<dyn FacetCounts + 'a>> {
        let mut sideways = HashMap::new();
        for dimension in dimensions {
            if query.is_drilled(&dimension.dimension) {
                sideways.insert(
                    dimension.dimension.clone(),
                    self.to_query(&query.without(&dimension.dimension))?,
                );
            }
        }
        Ok(Box::new(TantivySideways {
            searcher: self.reader.searcher(),
            query: self.to_query(&query.to_query())?,
            sideways,
        }))
    }
}
