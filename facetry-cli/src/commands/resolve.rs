use std::path::Path;

use anyhow::{Context, Result};
use facetry::{Config, IndexSchema};

use super::facets::load_schema;

pub fn run_resolve(
    config: &Config,
    schema_path: &Path,
    generic: Option<&str>,
    field: &str,
    sample: Option<&str>,
) -> Result<()> {
    let schema = load_schema(config, schema_path)?;
    let sample = sample
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("Sample is not valid JSON")?;

    let plan = schema
        .resolver()
        .resolve(generic, Some(field), sample.as_ref())?;
    tracing::debug!(field, plan = %plan.name, "Resolved field");
    println!("{}", serde_json::to_string_pretty(plan.as_ref())?);

    if let Some(dimension) = facet_dimension(&schema, generic, field)? {
        println!("{}", serde_json::to_string_pretty(&dimension)?);
    }
    Ok(())
}

fn facet_dimension(
    schema: &IndexSchema,
    generic: Option<&str>,
    field: &str,
) -> Result<Option<facetry::facet::DimensionConfig>> {
    Ok(schema.facets().ensure_configured(generic, field)?)
}
