use crate::field::FieldRegistry;
use crate::schema::SchemaDefinition;
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads schema definitions from a YAML file or a directory of them.
pub struct SchemaLoader {
    path: PathBuf,
}

impl SchemaLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load every schema, keyed by collection name
    pub fn load_all(&self) -> Result<HashMap<String, SchemaDefinition>> {
        let mut schemas = HashMap::new();

        if !self.path.exists() {
            return Err(Error::Schema(format!(
                "Schema path does not exist: {}",
                self.path.display()
            )));
        }

        if self.path.is_file() {
            let schema = self.load_schema(&self.path)?;
            schemas.insert(schema.collection.clone(), schema);
            return Ok(schemas);
        }

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let path = entry.path();

            if !matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            ) {
                continue;
            }

            let schema = self.load_schema(&path)?;
            if schemas.contains_key(&schema.collection) {
                return Err(Error::Schema(format!(
                    "Collection '{}' is defined more than once (in {})",
                    schema.collection,
                    path.display()
                )));
            }
            schemas.insert(schema.collection.clone(), schema);
        }

        Ok(schemas)
    }

    pub fn load_schema(&self, path: &Path) -> Result<SchemaDefinition> {
        let content = fs::read_to_string(path)?;
        let schema: SchemaDefinition = serde_yaml::from_str(&content)?;
        Ok(schema)
    }

    /// Lint a single schema and return a list of human-readable issues (empty = ok)
    pub fn lint_schema(schema: &SchemaDefinition) -> Vec<String> {
        let mut issues = Vec::new();
        if schema.collection.trim().is_empty() {
            issues.push("collection must be set".to_string());
        }
        if schema.fields.is_empty() {
            issues.push("fields should have at least one field defined".to_string());
        }
        for field in &schema.fields {
            if field.facet.is_some() && field.field_type.is_numeric() {
                issues.push(format!(
                    "field '{}' is numeric; facet labels are stored as strings",
                    field.name
                ));
            }
            if field.analyzer.is_some() && field.field_type != crate::schema::FieldType::Text {
                issues.push(format!(
                    "field '{}' has an analyzer but is not a text field",
                    field.name
                ));
            }
        }
        match FieldRegistry::build(schema) {
            Ok(registry) => issues.extend(registry.copy_type_issues()),
            Err(e) => issues.push(e.to_string()),
        }
        issues
    }

    /// Lint all loaded schemas and return map collection -> issues
    pub fn lint_all(schemas: &HashMap<String, SchemaDefinition>) -> HashMap<String, Vec<String>> {
        let mut map = HashMap::new();
        for (name, schema) in schemas {
            let issues = SchemaLoader::lint_schema(schema);
            if !issues.is_empty() {
                map.insert(name.clone(), issues);
            }
        }
        map
    }
}
