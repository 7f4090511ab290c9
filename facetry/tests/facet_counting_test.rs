//! End-to-end facet counting over both index implementations.
//!
//! Every scenario runs against the in-memory index and the tantivy index and
//! must produce identical results.

use facetry::config::FacetSettings;
use facetry::facet::{FacetResult, FacetSort};
use facetry::query::DimPath;
use facetry::{
    DocumentBuilder, Error, FacetAggregator, FacetIndex, FacetRequest, FacetRequests, FacetResults,
    IndexSchema, MemoryIndex, Predicate, TantivyFacetIndex,
};
use serde_json::{json, Value};

const SCHEMA: &str = r#"
collection: products
primary_key: id
fields:
  - name: color
    type: string
    indexed: true
    stored: true
  - name: title
    type: text
    indexed: true
  - name: category
    type: string
    facet: taxonomy
  - name: brand
    type: string
    facet: sorted_set
"#;

fn documents() -> Vec<Value> {
    vec![
        json!({"id": "1", "category": "A/X", "brand": "Acme", "color": "red", "title": "Red shoe"}),
        json!({"id": "2", "category": "A/Y", "brand": "Acme", "color": "red", "title": "Red hat"}),
        json!({"id": "3", "category": "B/Z", "brand": "Zeta", "color": "blue", "title": "Blue shoe"}),
    ]
}

fn schema() -> IndexSchema {
    IndexSchema::from_yaml(SCHEMA, FacetSettings::default()).unwrap()
}

fn memory_index(schema: &IndexSchema) -> MemoryIndex {
    let builder = DocumentBuilder::new(schema);
    let mut index = MemoryIndex::new();
    for doc in documents() {
        let Value::Object(map) = doc else { unreachable!() };
        index.add(builder.build(&map).unwrap()).unwrap();
    }
    index
}

fn tantivy_index(schema: &IndexSchema) -> TantivyFacetIndex {
    let builder = DocumentBuilder::new(schema);
    let index = TantivyFacetIndex::create_in_ram(schema.settings()).unwrap();
    for doc in documents() {
        let Value::Object(map) = doc else { unreachable!() };
        index.add_document(&builder.build(&map).unwrap()).unwrap();
    }
    index.commit().unwrap();
    index
}

fn values(result: &FacetResult) -> Vec<(String, i64)> {
    result
        .iter()
        .map(|(label, value)| (label.to_string(), value.as_i64().unwrap()))
        .collect()
}

fn pairs(expected: &[(&str, i64)]) -> Vec<(String, i64)> {
    expected.iter().map(|(l, v)| (l.to_string(), *v)).collect()
}

type Run<'a> = dyn Fn(&Predicate, &FacetRequests) -> facetry::Result<FacetResults> + 'a;

/// Run `check` against a fresh schema and both index implementations.
fn on_both(check: impl Fn(&IndexSchema, &Run<'_>)) {
    let memory_schema = schema();
    let memory = memory_index(&memory_schema);
    check(&memory_schema, &|base, requests| {
        aggregate(&memory_schema, &memory, base, requests)
    });

    let tantivy_schema = schema();
    let tantivy = tantivy_index(&tantivy_schema);
    check(&tantivy_schema, &|base, requests| {
        aggregate(&tantivy_schema, &tantivy, base, requests)
    });
}

fn aggregate<I: FacetIndex>(
    schema: &IndexSchema,
    index: &I,
    base: &Predicate,
    requests: &FacetRequests,
) -> facetry::Result<FacetResults> {
    FacetAggregator::new(schema, index).aggregate(base, requests)
}

#[test]
fn test_top_children_of_taxonomy_dimension() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert("category", FacetRequest::new());
        let results = run(&Predicate::MatchAll, &requests).unwrap();
        assert_eq!(values(results.get("category").unwrap()), pairs(&[("A", 2), ("B", 1)]));
    });
}

#[test]
fn test_ordinal_dimension_counts() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert("brand", FacetRequest::new().with_top(1));
        let results = run(&Predicate::MatchAll, &requests).unwrap();
        assert_eq!(values(results.get("brand").unwrap()), pairs(&[("Acme", 2)]));
    });
}

#[test]
fn test_specific_value_without_top_children() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert(
            "category",
            FacetRequest::new().with_top(0).with_specific_value(["A", "X"]),
        );
        let results = run(&Predicate::MatchAll, &requests).unwrap();
        assert_eq!(values(results.get("category").unwrap()), pairs(&[("A/X", 1)]));
    });
}

#[test]
fn test_missing_specific_value_reports_zero() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert(
            "category",
            FacetRequest::new().with_top(0).with_specific_value(["C"]),
        );
        let results = run(&Predicate::MatchAll, &requests).unwrap();
        assert_eq!(values(results.get("category").unwrap()), pairs(&[("C", 0)]));
    });
}

#[test]
fn test_sub_queries_count_within_base() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert(
            "colors",
            FacetRequest::new()
                .with_query("q1", Predicate::term("color", "red"))
                .with_query("q2", Predicate::term("color", "green")),
        );
        let results = run(&Predicate::MatchAll, &requests).unwrap();
        assert_eq!(values(results.get("colors").unwrap()), pairs(&[("q1", 2), ("q2", 0)]));

        // the prefix filter applies to sub-query labels as well
        let filtered = FacetRequests::from_iter([(
            "colors".to_string(),
            requests.get("colors").unwrap().clone().with_prefix("q1").with_top(0),
        )]);
        let results = run(&Predicate::MatchAll, &filtered).unwrap();
        assert_eq!(values(results.get("colors").unwrap()), pairs(&[("q1", 2)]));

        // a positive top on a name that is not a field still counts the sub-queries
        let with_top = FacetRequests::from_iter([(
            "colors".to_string(),
            requests.get("colors").unwrap().clone().with_top(5),
        )]);
        let results = run(&Predicate::MatchAll, &with_top).unwrap();
        assert_eq!(values(results.get("colors").unwrap()), pairs(&[("q1", 2), ("q2", 0)]));

        let shoes = Predicate::term("title", "shoe");
        let results = run(&shoes, &requests).unwrap();
        assert_eq!(values(results.get("colors").unwrap()), pairs(&[("q1", 1), ("q2", 0)]));
    });
}

#[test]
fn test_prefix_and_sort() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert(
            "brand",
            FacetRequest::new()
                .with_prefix("Z")
                .with_sort(FacetSort::LabelAscending),
        );
        requests.insert("category", FacetRequest::new().with_sort(FacetSort::ValueAscending));
        let results = run(&Predicate::MatchAll, &requests).unwrap();
        assert_eq!(values(results.get("brand").unwrap()), pairs(&[("Zeta", 1)]));
        assert_eq!(values(results.get("category").unwrap()), pairs(&[("B", 1), ("A", 2)]));
    });
}

#[test]
fn test_drill_down_narrows_every_dimension() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert("category", FacetRequest::new());
        requests.insert("brand", FacetRequest::new());
        let drill = Predicate::drill_down(None, false, vec![DimPath::new("brand", ["Zeta"])]);
        let results = run(&drill, &requests).unwrap();
        assert_eq!(values(results.get("category").unwrap()), pairs(&[("B", 1)]));
        assert_eq!(values(results.get("brand").unwrap()), pairs(&[("Zeta", 1)]));
    });
}

#[test]
fn test_drill_sideways_keeps_siblings_of_drilled_dimension() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert("category", FacetRequest::new());
        requests.insert("brand", FacetRequest::new());
        let drill = Predicate::drill_down(None, true, vec![DimPath::new("brand", ["Zeta"])]);
        let results = run(&drill, &requests).unwrap();
        assert_eq!(values(results.get("category").unwrap()), pairs(&[("B", 1)]));
        assert_eq!(
            values(results.get("brand").unwrap()),
            pairs(&[("Acme", 2), ("Zeta", 1)])
        );
    });
}

#[test]
fn test_results_follow_request_order() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert("category", FacetRequest::new());
        requests.insert("brand", FacetRequest::new());
        let results = run(&Predicate::MatchAll, &requests).unwrap();
        let keys: Vec<_> = results.keys().collect();
        assert_eq!(keys, vec!["category", "brand"]);
    });
}

#[test]
fn test_unknown_dimension_fails() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert("nope", FacetRequest::new());
        let err = run(&Predicate::MatchAll, &requests).unwrap_err();
        assert!(matches!(err, Error::FieldNotFound(ref name) if name == "nope"));
    });
}

#[test]
fn test_results_serialize_in_order() {
    on_both(|_, run| {
        let mut requests = FacetRequests::new();
        requests.insert("category", FacetRequest::new());
        let results = run(&Predicate::MatchAll, &requests).unwrap();
        assert_eq!(
            serde_json::to_string(&results).unwrap(),
            r#"{"category":{"A":2,"B":1}}"#
        );
    });
}

#[test]
fn test_requests_from_json() {
    let requests: FacetRequests = serde_json::from_value(json!({
        "category": {"top": 1},
        "colors": {"queries": {"red": {"type": "term", "field": "color", "value": "red"}}}
    }))
    .unwrap();
    on_both(|_, run| {
        let results = run(&Predicate::MatchAll, &requests).unwrap();
        assert_eq!(values(results.get("category").unwrap()), pairs(&[("A", 2)]));
        assert_eq!(values(results.get("colors").unwrap()), pairs(&[("red", 2)]));
    });
}
