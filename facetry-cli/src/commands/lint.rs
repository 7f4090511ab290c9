use std::path::Path;

use anyhow::{Context, Result};
use facetry::SchemaLoader;

/// Lint every schema under `path` and fail when any issue is found
pub fn run_lint(path: &Path) -> Result<()> {
    let schemas = SchemaLoader::new(path)
        .load_all()
        .with_context(|| format!("Failed to load schemas from {:?}", path))?;
    let report = SchemaLoader::lint_all(&schemas);

    let mut collections: Vec<_> = report.keys().collect();
    collections.sort();
    for collection in &collections {
        println!("{}:", collection);
        for issue in &report[*collection] {
            println!("  - {}", issue);
        }
    }

    if report.is_empty() {
        println!("{} schema(s) OK", schemas.len());
        Ok(())
    } else {
        anyhow::bail!("{} schema(s) with issues", report.len())
    }
}
