use std::sync::Arc;

use crate::config::FacetSettings;
use crate::facet::FacetsConfigurator;
use crate::field::{FieldRegistry, FieldResolver};
use crate::schema::SchemaDefinition;
use crate::Result;

/// One loaded schema version: registry, resolver and facet configuration.
///
/// A reload builds a new instance; callers hold it behind an `Arc` and swap
/// the pointer.
#[derive(Debug)]
pub struct IndexSchema {
    definition: SchemaDefinition,
    registry: Arc<FieldRegistry>,
    resolver: Arc<FieldResolver>,
    facets: FacetsConfigurator,
}

impl IndexSchema {
    pub fn build(definition: SchemaDefinition, settings: FacetSettings) -> Result<Self> {
        let registry = Arc::new(FieldRegistry::build(&definition)?);
        let resolver = Arc::new(FieldResolver::new(registry.clone()));
        let facets = FacetsConfigurator::new(resolver.clone(), settings);
        tracing::debug!(
            collection = %definition.collection,
            fields = definition.fields.len(),
            "Built index schema"
        );
        Ok(Self {
            definition,
            registry,
            resolver,
            facets,
        })
    }

    pub fn from_yaml(yaml: &str, settings: FacetSettings) -> Result<Self> {
        Self::build(serde_yaml::from_str(yaml)?, settings)
    }

    pub fn collection(&self) -> &str {
        &self.definition.collection
    }

    pub fn definition(&self) -> &SchemaDefinition {
        &self.definition
    }

    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &FieldResolver {
        &self.resolver
    }

    pub fn facets(&self) -> &FacetsConfigurator {
        &self.facets
    }

    pub fn settings(&self) -> &FacetSettings {
        self.facets.settings()
    }
}
