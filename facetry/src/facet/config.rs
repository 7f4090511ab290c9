//! Facet dimension configuration
//!
//! Each dimension is assigned one storage encoding the first time it is
//! requested, and keeps it for the lifetime of the schema instance.

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::FacetSettings;
use crate::field::{FieldPlan, FieldResolver};
use crate::schema::FacetTemplate;
use crate::Result;

pub const TAXONOMY_FIELD: &str = "$facets";
pub const TAXONOMY_INT_FIELD: &str = "$facets$int";
pub const TAXONOMY_FLOAT_FIELD: &str = "$facets$float";

/// Physical representation backing a dimension's counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingKind {
    /// Flat labels in sorted-set doc-values
    Ordinal,
    Taxonomy,
    TaxonomyInt,
    TaxonomyFloat,
}

impl EncodingKind {
    pub const ALL: [EncodingKind; 4] = [
        EncodingKind::Ordinal,
        EncodingKind::Taxonomy,
        EncodingKind::TaxonomyInt,
        EncodingKind::TaxonomyFloat,
    ];

    pub fn from_template(template: FacetTemplate) -> Self {
        match template {
            FacetTemplate::SortedSet => EncodingKind::Ordinal,
            FacetTemplate::Taxonomy => EncodingKind::Taxonomy,
            FacetTemplate::IntAssociation => EncodingKind::TaxonomyInt,
            FacetTemplate::FloatAssociation => EncodingKind::TaxonomyFloat,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EncodingKind::Ordinal => "ordinal",
            EncodingKind::Taxonomy => "taxonomy",
            EncodingKind::TaxonomyInt => "taxonomy_int",
            EncodingKind::TaxonomyFloat => "taxonomy_float",
        }
    }

    /// Index field holding the facet data of this encoding.
    pub fn index_field(self, sorted_set_field: &str) -> String {
        match self {
            EncodingKind::Ordinal => sorted_set_field.to_string(),
            EncodingKind::Taxonomy => TAXONOMY_FIELD.to_string(),
            EncodingKind::TaxonomyInt => TAXONOMY_INT_FIELD.to_string(),
            EncodingKind::TaxonomyFloat => TAXONOMY_FLOAT_FIELD.to_string(),
        }
    }

    pub fn backend(self) -> BackendKinds {
        match self {
            EncodingKind::Ordinal => BackendKinds::ORDINAL,
            EncodingKind::Taxonomy => BackendKinds::TAXONOMY,
            EncodingKind::TaxonomyInt => BackendKinds::TAXONOMY_INT,
            EncodingKind::TaxonomyFloat => BackendKinds::TAXONOMY_FLOAT,
        }
    }

    /// Values carry a weight instead of counting documents.
    pub fn is_weighted(self) -> bool {
        matches!(self, EncodingKind::TaxonomyInt | EncodingKind::TaxonomyFloat)
    }
}

bitflags! {
    /// Counting backends needed by one aggregation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BackendKinds: u8 {
        const ORDINAL = 1;
        const TAXONOMY = 1 << 1;
        const TAXONOMY_INT = 1 << 2;
        const TAXONOMY_FLOAT = 1 << 3;
    }
}

impl BackendKinds {
    pub fn encodings(self) -> impl Iterator<Item = EncodingKind> {
        EncodingKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.backend()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionConfig {
    /// Resolved concrete field name
    pub dimension: String,
    pub encoding: EncodingKind,
    pub index_field: String,
    pub hierarchical: bool,
    pub multi_valued: bool,
    pub separator: String,
}

impl DimensionConfig {
    /// Path as stored in the index: flat dimensions keep the joined label
    /// as their only component.
    pub fn index_path(&self, path: &[String]) -> Vec<String> {
        if self.hierarchical || path.len() <= 1 {
            path.to_vec()
        } else {
            vec![self.label(path)]
        }
    }

    pub fn label(&self, path: &[String]) -> String {
        path.join(self.separator.as_str())
    }
}

/// Records first-write-wins encoding assignments for facet dimensions.
///
/// Every access goes through one mutex. Lock order: this mutex, then the
/// resolver's inferred-plan lock.
#[derive(Debug)]
pub struct FacetsConfigurator {
    resolver: Arc<FieldResolver>,
    settings: FacetSettings,
    dims: Mutex<HashMap<String, DimensionConfig>>,
}

impl FacetsConfigurator {
    pub fn new(resolver: Arc<FieldResolver>, settings: FacetSettings) -> Self {
        Self {
            resolver,
            settings,
            dims: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &FacetSettings {
        &self.settings
    }

    /// Config for `concrete`, assigning it on first use.
    ///
    /// `Ok(None)` means the field has no facet template: the dimension has no
    /// facet data, which callers must not treat as an error.
    pub fn ensure_configured(
        &self,
        generic: Option<&str>,
        concrete: &str,
    ) -> Result<Option<DimensionConfig>> {
        let mut dims = self.dims.lock();
        self.assign_locked(&mut dims, generic, concrete)
    }

    /// Batch variant; one lock acquisition for all dimensions.
    pub fn ensure_all(
        &self,
        dimensions: &[(Option<&str>, &str)],
    ) -> Result<Vec<Option<DimensionConfig>>> {
        let mut dims = self.dims.lock();
        dimensions
            .iter()
            .map(|(generic, concrete)| self.assign_locked(&mut dims, *generic, concrete))
            .collect()
    }

    /// The critical section: resolve the plan, read its template, write one entry.
    fn assign_locked(
        &self,
        dims: &mut HashMap<String, DimensionConfig>,
        generic: Option<&str>,
        concrete: &str,
    ) -> Result<Option<DimensionConfig>> {
        if let Some(existing) = dims.get(concrete) {
            return Ok(Some(existing.clone()));
        }
        let plan = self.resolver.resolve(generic, Some(concrete), None)?;
        let Some(config) = self.config_for(&plan, concrete) else {
            return Ok(None);
        };
        dims.insert(concrete.to_string(), config.clone());
        metrics::counter!(
            "facetry_dimensions_configured_total",
            "encoding" => config.encoding.as_str()
        )
        .increment(1);
        tracing::debug!(
            dimension = %concrete,
            encoding = config.encoding.as_str(),
            "Configured facet dimension"
        );
        Ok(Some(config))
    }

    fn config_for(&self, plan: &FieldPlan, concrete: &str) -> Option<DimensionConfig> {
        let spec = plan.facet.as_ref()?;
        let encoding = EncodingKind::from_template(spec.template);
        Some(DimensionConfig {
            dimension: concrete.to_string(),
            encoding,
            index_field: encoding.index_field(&self.settings.sorted_set_facet_field),
            hierarchical: spec.hierarchical,
            multi_valued: spec.multi_valued,
            separator: self.settings.path_separator.clone(),
        })
    }

    /// Already-assigned config, without assigning.
    pub fn get(&self, concrete: &str) -> Option<DimensionConfig> {
        self.dims.lock().get(concrete).cloned()
    }

    pub fn configured(&self) -> Vec<DimensionConfig> {
        let mut configs: Vec<_> = self.dims.lock().values().cloned().collect();
        configs.sort_by(|a, b| a.dimension.cmp(&b.dimension));
        configs
    }

    pub fn len(&self) -> usize {
        self.dims.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every assignment. Only valid together with a full reindex.
    pub fn reset(&self) {
        self.dims.lock().clear();
    }
}
