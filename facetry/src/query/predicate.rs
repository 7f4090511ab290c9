use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::facet::{DimensionConfig, EncodingKind};
use crate::field::Capabilities;
use crate::schema::IndexSchema;
use crate::{Error, Result};

/// Caller-facing predicate tree, expressed in schema field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    MatchAll,
    Term {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        generic_field: Option<String>,
        value: Value,
    },
    FacetPath {
        dimension: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        generic_field: Option<String>,
        path: Vec<String>,
    },
    Bool {
        #[serde(default)]
        must: Vec<Predicate>,
        #[serde(default)]
        should: Vec<Predicate>,
        #[serde(default)]
        must_not: Vec<Predicate>,
    },
    DrillDown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base: Option<Box<Predicate>>,
        #[serde(default)]
        use_drill_sideways: bool,
        #[serde(default)]
        dim_path: Vec<DimPath>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimPath {
    pub dimension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_field: Option<String>,
    pub path: Vec<String>,
}

impl DimPath {
    pub fn new<S: Into<String>>(dimension: impl Into<String>, path: impl IntoIterator<Item = S>) -> Self {
        Self {
            dimension: dimension.into(),
            generic_field: None,
            path: path.into_iter().map(Into::into).collect(),
        }
    }
}

impl Predicate {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Term {
            field: field.into(),
            generic_field: None,
            value: value.into(),
        }
    }

    pub fn facet_path<S: Into<String>>(
        dimension: impl Into<String>,
        path: impl IntoIterator<Item = S>,
    ) -> Self {
        Predicate::FacetPath {
            dimension: dimension.into(),
            generic_field: None,
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    pub fn drill_down(base: Option<Predicate>, use_drill_sideways: bool, dim_path: Vec<DimPath>) -> Self {
        Predicate::DrillDown {
            base: base.map(Box::new),
            use_drill_sideways,
            dim_path,
        }
    }

    /// Resolve field names through the schema into an engine-level query.
    pub fn resolve(&self, schema: &IndexSchema) -> Result<IndexQuery> {
        match self {
            Predicate::MatchAll => Ok(IndexQuery::MatchAll),
            Predicate::Term {
                field,
                generic_field,
                value,
            } => resolve_term(schema, generic_field.as_deref(), field, value),
            Predicate::FacetPath {
                dimension,
                generic_field,
                path,
            } => {
                let config = facet_dimension(schema, generic_field.as_deref(), dimension)?;
                check_path(dimension, path)?;
                Ok(IndexQuery::FacetPath {
                    encoding: config.encoding,
                    path: config.index_path(path),
                    dimension: config.dimension,
                })
            }
            Predicate::Bool {
                must,
                should,
                must_not,
            } => Ok(IndexQuery::Bool {
                must: resolve_all(schema, must)?,
                should: resolve_all(schema, should)?,
                must_not: resolve_all(schema, must_not)?,
            }),
            Predicate::DrillDown {
                base,
                use_drill_sideways,
                dim_path,
            } => {
                let base = match base {
                    Some(base) => base.resolve(schema)?,
                    None => IndexQuery::MatchAll,
                };
                let mut clauses: Vec<DrillClause> = Vec::new();
                for entry in dim_path {
                    let config =
                        facet_dimension(schema, entry.generic_field.as_deref(), &entry.dimension)?;
                    check_path(&entry.dimension, &entry.path)?;
                    let path = config.index_path(&entry.path);
                    // paths of the same dimension are OR-ed
                    match clauses.iter_mut().find(|c| c.dimension == config.dimension) {
                        Some(clause) => clause.paths.push(path),
                        None => clauses.push(DrillClause {
                            dimension: config.dimension,
                            encoding: config.encoding,
                            paths: vec![path],
                        }),
                    }
                }
                Ok(IndexQuery::DrillDown(DrillDownQuery {
                    base: Box::new(base),
                    clauses,
                    use_sideways: *use_drill_sideways,
                }))
            }
        }
    }
}

fn resolve_all(schema: &IndexSchema, predicates: &[Predicate]) -> Result<Vec<IndexQuery>> {
    predicates.iter().map(|p| p.resolve(schema)).collect()
}

fn resolve_term(
    schema: &IndexSchema,
    generic: Option<&str>,
    field: &str,
    value: &Value,
) -> Result<IndexQuery> {
    let plan = schema.resolver().resolve(generic, Some(field), None)?;
    if !plan
        .capabilities
        .intersects(Capabilities::INDEXED | Capabilities::POINT)
    {
        return Err(Error::UnsupportedFieldUsage {
            field: field.to_string(),
            capability: Capabilities::INDEXED.describe().to_string(),
        });
    }
    let mut terms = plan.index_terms(value)?;
    match terms.len() {
        0 => Err(Error::InvalidQuery(format!(
            "term query on \"{}\" has no searchable token",
            field
        ))),
        1 => Ok(IndexQuery::Term {
            field: field.to_string(),
            value: terms.remove(0),
        }),
        _ => Ok(IndexQuery::Bool {
            must: terms
                .into_iter()
                .map(|value| IndexQuery::Term {
                    field: field.to_string(),
                    value,
                })
                .collect(),
            should: Vec::new(),
            must_not: Vec::new(),
        }),
    }
}

fn facet_dimension(
    schema: &IndexSchema,
    generic: Option<&str>,
    dimension: &str,
) -> Result<DimensionConfig> {
    schema
        .resolver()
        .resolve_with(generic, Some(dimension), None, Capabilities::FACET)?;
    schema
        .facets()
        .ensure_configured(generic, dimension)?
        .ok_or_else(|| Error::UnsupportedFieldUsage {
            field: dimension.to_string(),
            capability: Capabilities::FACET.describe().to_string(),
        })
}

pub(crate) fn check_path(dimension: &str, path: &[String]) -> Result<()> {
    if path.is_empty() || path.iter().any(|c| c.trim().is_empty()) {
        return Err(Error::InvalidQuery(format!(
            "facet path for \"{}\" must have non-empty components",
            dimension
        )));
    }
    Ok(())
}

/// Query over resolved index fields. Index implementations evaluate this.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexQuery {
    MatchAll,
    Term {
        field: String,
        value: String,
    },
    /// Documents whose path in `dimension` starts with `path`
    FacetPath {
        encoding: EncodingKind,
        dimension: String,
        path: Vec<String>,
    },
    /// All `must`; at least one `should` when `must` is empty; no `must_not`.
    /// An empty clause list matches everything.
    Bool {
        must: Vec<IndexQuery>,
        should: Vec<IndexQuery>,
        must_not: Vec<IndexQuery>,
    },
    DrillDown(DrillDownQuery),
}

impl IndexQuery {
    /// `self AND other`, both as filters.
    pub fn and(self, other: IndexQuery) -> IndexQuery {
        IndexQuery::Bool {
            must: vec![self, other],
            should: Vec::new(),
            must_not: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrillDownQuery {
    pub base: Box<IndexQuery>,
    /// One clause per dimension, in first-mention order
    pub clauses: Vec<DrillClause>,
    pub use_sideways: bool,
}

/// Paths of one dimension, OR-ed together
#[derive(Debug, Clone, PartialEq)]
pub struct DrillClause {
    pub dimension: String,
    pub encoding: EncodingKind,
    pub paths: Vec<Vec<String>>,
}

impl DrillClause {
    pub fn to_query(&self) -> IndexQuery {
        IndexQuery::Bool {
            must: Vec::new(),
            should: self
                .paths
                .iter()
                .map(|path| IndexQuery::FacetPath {
                    encoding: self.encoding,
                    dimension: self.dimension.clone(),
                    path: path.clone(),
                })
                .collect(),
            must_not: Vec::new(),
        }
    }
}

impl DrillDownQuery {
    /// Base query AND every drill clause.
    pub fn to_query(&self) -> IndexQuery {
        self.query_without(None)
    }

    /// Base query AND every drill clause except `dimension`'s.
    pub fn without(&self, dimension: &str) -> IndexQuery {
        self.query_without(Some(dimension))
    }

    fn query_without(&self, skip: Option<&str>) -> IndexQuery {
        let mut must = vec![(*self.base).clone()];
        must.extend(
            self.clauses
                .iter()
                .filter(|c| Some(c.dimension.as_str()) != skip)
                .map(DrillClause::to_query),
        );
        IndexQuery::Bool {
            must,
            should: Vec::new(),
            must_not: Vec::new(),
        }
    }

    pub fn is_drilled(&self, dimension: &str) -> bool {
        self.clauses.iter().any(|c| c.dimension == dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FacetSettings;
    use serde_json::json;

    fn schema() -> IndexSchema {
        IndexSchema::from_yaml(
            r#"
collection: products
fields:
  - name: title
    type: text
    indexed: true
  - name: price
    type: double
    indexed: true
  - name: notes
    type: string
    stored: true
  - name: category
    type: string
    facet: taxonomy
  - name: brand
    type: string
    facet: sorted_set
"#,
            FacetSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_predicates() {
        let predicate: Predicate = serde_json::from_value(json!({
            "type": "drill_down",
            "base": {"type": "term", "field": "title", "value": "shoe"},
            "use_drill_sideways": true,
            "dim_path": [{"dimension": "category", "path": ["A", "X"]}]
        }))
        .unwrap();
        assert_eq!(
            predicate,
            Predicate::drill_down(
                Some(Predicate::term("title", "shoe")),
                true,
                vec![DimPath::new("category", ["A", "X"])]
            )
        );
        let all: Predicate = serde_json::from_value(json!({"type": "match_all"})).unwrap();
        assert_eq!(all, Predicate::MatchAll);
    }

    #[test]
    fn test_text_term_is_tokenized() {
        let query = Predicate::term("title", "Red Shoe").resolve(&schema()).unwrap();
        assert_eq!(
            query,
            IndexQuery::Bool {
                must: vec![
                    IndexQuery::Term { field: "title".into(), value: "red".into() },
                    IndexQuery::Term { field: "title".into(), value: "shoe".into() },
                ],
                should: vec![],
                must_not: vec![],
            }
        );
    }

    #[test]
    fn test_numeric_term() {
        let query = Predicate::term("price", 10).resolve(&schema()).unwrap();
        assert_eq!(
            query,
            IndexQuery::Term { field: "price".into(), value: "10".into() }
        );
    }

    #[test]
    fn test_term_on_stored_only_field() {
        let err = Predicate::term("notes", "x").resolve(&schema()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFieldUsage { .. }));
    }

    #[test]
    fn test_term_on_unknown_field() {
        let err = Predicate::term("nope", "x").resolve(&schema()).unwrap_err();
        assert!(matches!(err, Error::FieldNotFound(_)));
    }

    #[test]
    fn test_facet_path_configures_dimension() {
        let schema = schema();
        let query = Predicate::facet_path("brand", ["Acme", "Pro"])
            .resolve(&schema)
            .unwrap();
        // flat dimension: one joined component
        assert_eq!(
            query,
            IndexQuery::FacetPath {
                encoding: EncodingKind::Ordinal,
                dimension: "brand".into(),
                path: vec!["Acme/Pro".into()],
            }
        );
        assert!(schema.facets().get("brand").is_some());
    }

    #[test]
    fn test_facet_path_on_plain_field() {
        let err = Predicate::facet_path("title", ["a"]).resolve(&schema()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFieldUsage { .. }));
    }

    #[test]
    fn test_drill_down_groups_dimensions() {
        let query = Predicate::drill_down(
            None,
            false,
            vec![
                DimPath::new("category", ["A"]),
                DimPath::new("brand", ["Acme"]),
                DimPath::new("category", ["B"]),
            ],
        )
        .resolve(&schema())
        .unwrap();
        let IndexQuery::DrillDown(drill) = query else {
            panic!("expected a drill-down query");
        };
        assert_eq!(drill.clauses.len(), 2);
        assert_eq!(drill.clauses[0].paths, vec![vec!["A".to_string()], vec!["B".to_string()]]);
        assert!(drill.is_drilled("brand"));

        let IndexQuery::Bool { must, .. } = drill.without("category") else {
            panic!("expected a boolean query");
        };
        assert_eq!(must.len(), 2);
        assert_eq!(must[0], IndexQuery::MatchAll);
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = Predicate::facet_path("category", Vec::<String>::new())
            .resolve(&schema())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }
}
