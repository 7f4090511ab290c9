use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::ordered::OrderedMap;
use super::request::FacetSort;

/// A facet count, or a summed weight for association facets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetValue {
    Int(i64),
    Float(f64),
}

impl FacetValue {
    pub const ZERO: FacetValue = FacetValue::Int(0);

    /// Negative or NaN values become zero.
    pub fn normalized(self) -> Self {
        match self {
            FacetValue::Int(v) if v < 0 => FacetValue::Int(0),
            FacetValue::Float(v) if v.is_nan() || v < 0.0 => FacetValue::Float(0.0),
            other => other,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            FacetValue::Int(v) => v as f64,
            FacetValue::Float(v) => v,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            FacetValue::Int(v) => Some(v),
            FacetValue::Float(_) => None,
        }
    }

    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FacetValue::Int(a), FacetValue::Int(b)) => a.cmp(b),
            _ => self.as_f64().total_cmp(&other.as_f64()),
        }
    }
}

impl From<u64> for FacetValue {
    fn from(count: u64) -> Self {
        FacetValue::Int(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

impl From<i64> for FacetValue {
    fn from(v: i64) -> Self {
        FacetValue::Int(v)
    }
}

impl From<f64> for FacetValue {
    fn from(v: f64) -> Self {
        FacetValue::Float(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelValue {
    pub label: String,
    pub value: FacetValue,
}

impl LabelValue {
    pub fn new(label: impl Into<String>, value: impl Into<FacetValue>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// label -> value, in display order
pub type FacetResult = OrderedMap<FacetValue>;

/// Collects the entries of one dimension.
#[derive(Debug, Default)]
pub struct FacetResultBuilder {
    entries: Vec<LabelValue>,
    sort: Option<FacetSort>,
    prefix: Option<String>,
}

impl FacetResultBuilder {
    pub fn new(sort: Option<FacetSort>, prefix: Option<String>) -> Self {
        Self {
            entries: Vec::new(),
            sort,
            prefix,
        }
    }

    /// Returns false when the label was filtered out by the prefix.
    pub fn put(&mut self, label: impl Into<String>, value: FacetValue) -> bool {
        let label = label.into();
        if let Some(prefix) = &self.prefix {
            if !label.starts_with(prefix.as_str()) {
                return false;
            }
        }
        self.entries.push(LabelValue { label, value });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(mut self) -> FacetResult {
        if let Some(sort) = self.sort {
            if self.entries.len() > 1 {
                self.entries.sort_by(|a, b| sort.compare(a, b));
            }
        }
        self.entries
            .into_iter()
            .map(|entry| (entry.label, entry.value))
            .collect()
    }
}

impl FacetSort {
    pub fn compare(self, a: &LabelValue, b: &LabelValue) -> Ordering {
        match self {
            FacetSort::LabelAscending => a.label.cmp(&b.label),
            FacetSort::LabelDescending => b.label.cmp(&a.label),
            FacetSort::ValueAscending => a.value.total_cmp(&b.value),
            FacetSort::ValueDescending => b.value.total_cmp(&a.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(result: &FacetResult) -> Vec<(&str, FacetValue)> {
        result.iter().map(|(k, v)| (k, *v)).collect()
    }

    #[test]
    fn test_value_descending() {
        let mut builder = FacetResultBuilder::new(Some(FacetSort::ValueDescending), None);
        builder.put("a", FacetValue::Int(3));
        builder.put("b", FacetValue::Int(5));
        builder.put("c", FacetValue::Int(1));
        let result = builder.build();
        assert_eq!(
            entries(&result),
            vec![
                ("b", FacetValue::Int(5)),
                ("a", FacetValue::Int(3)),
                ("c", FacetValue::Int(1))
            ]
        );
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"b":5,"a":3,"c":1}"#);
    }

    #[test]
    fn test_no_sort_keeps_insertion_order() {
        let mut builder = FacetResultBuilder::new(None, None);
        builder.put("z", FacetValue::Int(1));
        builder.put("a", FacetValue::Int(9));
        let keys: Vec<_> = builder.build().keys().map(str::to_string).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_label_sorts() {
        let mut builder = FacetResultBuilder::new(Some(FacetSort::LabelDescending), None);
        for label in ["b", "c", "a"] {
            builder.put(label, FacetValue::Int(1));
        }
        let keys: Vec<_> = builder.build().keys().map(str::to_string).collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_prefix_filter() {
        let mut builder = FacetResultBuilder::new(None, Some("A".to_string()));
        assert!(builder.put("A/X", FacetValue::Int(1)));
        assert!(!builder.put("B", FacetValue::Int(4)));
        assert!(builder.put("A", FacetValue::Int(2)));
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_prefix_applies_to_every_label() {
        let mut builder = FacetResultBuilder::new(None, Some("A".to_string()));
        assert!(!builder.put("q1", FacetValue::Int(2)));
        assert!(builder.put("A_red", FacetValue::Int(2)));
        assert_eq!(entries(&builder.build()), vec![("A_red", FacetValue::Int(2))]);
    }

    #[test]
    fn test_value_ascending_ties_keep_insertion_order() {
        let mut builder = FacetResultBuilder::new(Some(FacetSort::ValueAscending), None);
        builder.put("y", FacetValue::Int(2));
        builder.put("x", FacetValue::Int(2));
        builder.put("w", FacetValue::Int(1));
        let keys: Vec<_> = builder.build().keys().map(str::to_string).collect();
        assert_eq!(keys, vec!["w", "y", "x"]);
    }

    #[test]
    fn test_normalization() {
        assert_eq!(FacetValue::Int(-3).normalized(), FacetValue::Int(0));
        assert_eq!(FacetValue::Float(f64::NAN).normalized(), FacetValue::Float(0.0));
        assert_eq!(FacetValue::Float(2.5).normalized(), FacetValue::Float(2.5));
    }

    #[test]
    fn test_float_values_serialize_as_numbers() {
        let mut builder = FacetResultBuilder::new(None, None);
        builder.put("gold", FacetValue::Float(1.5));
        assert_eq!(serde_json::to_string(&builder.build()).unwrap(), r#"{"gold":1.5}"#);
    }
}
