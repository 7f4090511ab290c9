use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use super::ordered::OrderedMap;
use crate::query::predicate::check_path;
use crate::query::Predicate;

pub const DEFAULT_TOP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetSort {
    ValueDescending,
    ValueAscending,
    LabelDescending,
    LabelAscending,
}

/// One requested dimension. Built per query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacetRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,

    #[serde(
        default,
        deserialize_with = "deserialize_prefix",
        skip_serializing_if = "Option::is_none"
    )]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<FacetSort>,

    /// Named sub-queries reported as extra values of this dimension
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub queries: OrderedMap<Predicate>,

    /// Label paths always reported, whatever `top` says
    #[serde(
        default,
        deserialize_with = "deserialize_specific_values",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub specific_values: Vec<Vec<String>>,

    /// Field supplying the values when it differs from the dimension name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_field_name: Option<String>,
}

impl FacetRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = normalize_prefix(Some(prefix.into()));
        self
    }

    pub fn with_sort(mut self, sort: FacetSort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, predicate: Predicate) -> Self {
        self.queries.insert(name, predicate);
        self
    }

    pub fn with_specific_value<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        let path: Vec<String> = path.into_iter().map(Into::into).collect();
        if !self.specific_values.contains(&path) {
            self.specific_values.push(path);
        }
        self
    }

    pub fn with_generic_field_name(mut self, name: impl Into<String>) -> Self {
        self.generic_field_name = Some(name.into());
        self
    }

    /// Top-N to fetch, `None` when no general counts are wanted.
    ///
    /// Without queries and specific values the default applies.
    pub fn effective_top(&self) -> Option<usize> {
        match self.top {
            Some(top) => Some(top),
            None if self.queries.is_empty() && self.specific_values.is_empty() => Some(DEFAULT_TOP),
            None => None,
        }
    }

    /// Whether this request reads the dimension's facet data at all.
    pub fn needs_counts(&self) -> bool {
        !self.specific_values.is_empty() || self.effective_top().is_some_and(|top| top > 0)
    }
}

/// dimension name -> request, in caller order
pub type FacetRequests = OrderedMap<FacetRequest>;

fn normalize_prefix(prefix: Option<String>) -> Option<String> {
    prefix.filter(|p| !p.trim().is_empty())
}

fn deserialize_prefix<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(normalize_prefix(Option::<String>::deserialize(deserializer)?))
}

fn deserialize_specific_values<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<Vec<String>>, D::Error> {
    let raw = Vec::<Vec<String>>::deserialize(deserializer)?;
    let mut paths = Vec::with_capacity(raw.len());
    for path in raw {
        check_path("specific_values", &path).map_err(D::Error::custom)?;
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}
