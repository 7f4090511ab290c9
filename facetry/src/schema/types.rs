use serde::{Deserialize, Serialize};

/// Declared schema of one collection, as read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub collection: String,
    #[serde(default)]
    pub description: Option<String>,

    /// Field holding the document identifier
    #[serde(default)]
    pub primary_key: Option<String>,

    /// Field holding the opaque record blob
    #[serde(default)]
    pub record_field: Option<String>,

    /// Declared fields. Order matters: wildcard patterns are tried in this order.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Concrete field name, or a wildcard pattern when it contains `*` or `?`
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub stored: bool,
    /// Keep per-document values for sorting (doc-values)
    #[serde(default)]
    pub sort: bool,
    #[serde(default)]
    pub analyzer: Option<String>,

    /// Facet storage template
    #[serde(default)]
    pub facet: Option<FacetTemplate>,
    #[serde(default)]
    pub facet_hierarchical: Option<bool>,
    #[serde(default)]
    pub facet_multivalued: Option<bool>,

    /// Fields receiving a copy of this field's values
    #[serde(default)]
    pub copy_to: Vec<String>,
    /// Fields whose values are copied into this one
    #[serde(default)]
    pub copy_from: Vec<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            indexed: false,
            stored: false,
            sort: false,
            analyzer: None,
            facet: None,
            facet_hierarchical: None,
            facet_multivalued: None,
            copy_to: Vec::new(),
            copy_from: Vec::new(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        is_wildcard_name(&self.name)
    }
}

pub(crate) fn is_wildcard_name(name: &str) -> bool {
    name.contains('*') || name.contains('?')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    String,
    Integer,
    Long,
    Float,
    Double,
    Binary,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::Long | FieldType::Float | FieldType::Double
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Binary => "binary",
        }
    }

    /// Whether values of `source` can be copied into a field of this type.
    pub fn accepts(self, source: FieldType) -> bool {
        match self {
            FieldType::Text | FieldType::String => !matches!(source, FieldType::Binary),
            FieldType::Integer => source == FieldType::Integer,
            FieldType::Long => matches!(source, FieldType::Integer | FieldType::Long),
            FieldType::Float | FieldType::Double => source.is_numeric(),
            FieldType::Binary => source == FieldType::Binary,
        }
    }
}

/// How a facet-capable field stores its facet data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetTemplate {
    /// Hierarchical taxonomy facet
    Taxonomy,
    /// Flat ordinal facet backed by sorted-set doc-values
    SortedSet,
    /// Taxonomy facet carrying an integer weight per value
    IntAssociation,
    /// Taxonomy facet carrying a float weight per value
    FloatAssociation,
}

impl FacetTemplate {
    pub fn default_hierarchical(self) -> bool {
        !matches!(self, FacetTemplate::SortedSet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schema_definition() {
        let yaml = r#"
collection: products
primary_key: id
record_field: $record$
fields:
  - name: title
    type: text
    indexed: true
    stored: true
    analyzer: standard
    copy_to: [all_text]
  - name: category
    type: string
    facet: taxonomy
  - name: "*_tag"
    type: string
    facet: sorted_set
    facet_multivalued: true
"#;
        let schema: SchemaDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.collection, "products");
        assert_eq!(schema.primary_key.as_deref(), Some("id"));
        assert_eq!(schema.record_field.as_deref(), Some("$record$"));
        assert_eq!(schema.fields.len(), 3);

        let title = &schema.fields[0];
        assert_eq!(title.field_type, FieldType::Text);
        assert!(title.indexed && title.stored && !title.sort);
        assert_eq!(title.copy_to, vec!["all_text".to_string()]);
        assert!(!title.is_wildcard());

        assert_eq!(schema.fields[1].facet, Some(FacetTemplate::Taxonomy));
        assert!(schema.fields[2].is_wildcard());
        assert_eq!(schema.fields[2].facet_multivalued, Some(true));
    }

    #[test]
    fn test_parse_association_templates() {
        let yaml = r#"
collection: weights
fields:
  - name: rating
    type: string
    facet: int_association
  - name: score
    type: string
    facet: float_association
"#;
        let schema: SchemaDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.fields[0].facet, Some(FacetTemplate::IntAssociation));
        assert_eq!(schema.fields[1].facet, Some(FacetTemplate::FloatAssociation));
        assert!(schema.primary_key.is_none());
    }

    #[test]
    fn test_unknown_template_is_rejected() {
        let yaml = r#"
collection: bad
fields:
  - name: category
    type: string
    facet: range
"#;
        assert!(serde_yaml::from_str::<SchemaDefinition>(yaml).is_err());
    }

    #[test]
    fn test_copy_type_compatibility() {
        assert!(FieldType::Text.accepts(FieldType::Long));
        assert!(FieldType::Long.accepts(FieldType::Integer));
        assert!(!FieldType::Integer.accepts(FieldType::Text));
        assert!(!FieldType::String.accepts(FieldType::Binary));
    }

    #[test]
    fn test_hierarchical_defaults() {
        assert!(FacetTemplate::Taxonomy.default_hierarchical());
        assert!(!FacetTemplate::SortedSet.default_hierarchical());
    }
}
