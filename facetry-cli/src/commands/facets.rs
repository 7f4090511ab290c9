use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use facetry::{
    Config, DocumentBuilder, FacetAggregator, FacetIndex, FacetRequests, IndexSchema, MemoryIndex,
    Predicate, TantivyFacetIndex,
};
use serde_json::{Map, Value};

use crate::Backend;

pub fn load_schema(config: &Config, path: &Path) -> Result<IndexSchema> {
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {:?}", path))?;
    IndexSchema::from_yaml(&yaml, config.facets.clone())
        .with_context(|| format!("Invalid schema {:?}", path))
}

/// Index the documents, aggregate the requests and print the results as JSON
pub fn run_facets(
    config: &Config,
    schema_path: &Path,
    docs_path: &Path,
    request_path: &Path,
    query: Option<&str>,
    backend: Backend,
) -> Result<()> {
    let schema = load_schema(config, schema_path)?;
    let requests: FacetRequests = serde_json::from_str(
        &fs::read_to_string(request_path)
            .with_context(|| format!("Failed to read requests {:?}", request_path))?,
    )
    .context("Invalid facet requests")?;
    let base = match query {
        Some(json) => serde_json::from_str(json).context("Invalid query")?,
        None => Predicate::MatchAll,
    };
    let documents = read_documents(docs_path)?;
    let builder = DocumentBuilder::new(&schema);

    let results = match backend {
        Backend::Memory => {
            let mut index = MemoryIndex::new();
            for (line, source) in &documents {
                let document = builder
                    .build(source)
                    .with_context(|| format!("Document on line {} rejected", line))?;
                index.add(document)?;
            }
            aggregate(&schema, &index, &base, &requests)?
        }
        Backend::Tantivy => {
            let index = TantivyFacetIndex::create_in_ram(&config.facets)?;
            for (line, source) in &documents {
                let document = builder
                    .build(source)
                    .with_context(|| format!("Document on line {} rejected", line))?;
                index.add_document(&document)?;
            }
            index.commit()?;
            aggregate(&schema, &index, &base, &requests)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn aggregate<I: FacetIndex>(
    schema: &IndexSchema,
    index: &I,
    base: &Predicate,
    requests: &FacetRequests,
) -> Result<Value> {
    let started = std::time::Instant::now();
    let results = FacetAggregator::new(schema, index).aggregate(base, requests)?;
    tracing::info!(
        dimensions = results.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Aggregated facets"
    );
    Ok(serde_json::to_value(&results)?)
}

fn read_documents(path: &Path) -> Result<Vec<(usize, Map<String, Value>)>> {
    let file = fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut documents = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("Invalid JSON on line {}", number + 1))?;
        match value {
            Value::Object(map) => documents.push((number + 1, map)),
            _ => anyhow::bail!("Line {} is not a JSON object", number + 1),
        }
    }
    tracing::debug!(count = documents.len(), "Read documents");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_documents_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"category\": \"A\"}}").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "{{\"category\": \"B\"}}").unwrap();

        let documents = read_documents(file.path()).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].0, 3);
    }

    #[test]
    fn test_read_documents_rejects_non_objects() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[1, 2]").unwrap();
        assert!(read_documents(file.path()).is_err());
    }
}
