use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub const DEFAULT_FILENAME_COLUMN: &str = "Original Filename";

const PRODUCT_FIELDS: &[&str] = &[
    "Product family",
    "Product name",
    "Product variant",
    "Additional comment",
    "Brand",
];

const PAGE_FIELDS: &[&str] = &["Page Title", "Subject", "Version/Date", "Brand"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPreset {
    Product,
    Page,
}

impl SchemaPreset {
    pub fn fields(self) -> Vec<String> {
        let fields = match self {
            SchemaPreset::Product => PRODUCT_FIELDS,
            SchemaPreset::Page => PAGE_FIELDS,
        };
        fields.iter().map(|f| f.to_string()).collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("no metadata fields are configured")]
    NoFields,
    #[error("column names must not be blank")]
    BlankColumn,
    #[error("column is listed more than once: {0}")]
    DuplicateColumn(String),
}

/// Ordered list of metadata columns that make up a filename.
///
/// The order of `fields` is the order tokens appear in the generated name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSchema {
    filename_column: String,
    fields: Vec<String>,
}

impl FieldSchema {
    pub fn new(filename_column: impl Into<String>, fields: Vec<String>) -> Result<Self, SchemaError> {
        let filename_column = filename_column.into().trim().to_string();
        let fields: Vec<String> = fields.into_iter().map(|f| f.trim().to_string()).collect();

        if fields.is_empty() {
            return Err(SchemaError::NoFields);
        }
        if filename_column.is_empty() || fields.iter().any(String::is_empty) {
            return Err(SchemaError::BlankColumn);
        }

        let mut seen = HashSet::new();
        for column in std::iter::once(&filename_column).chain(fields.iter()) {
            if !seen.insert(column.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.clone()));
            }
        }

        Ok(Self {
            filename_column,
            fields,
        })
    }

    pub fn from_preset(preset: SchemaPreset) -> Self {
        Self {
            filename_column: DEFAULT_FILENAME_COLUMN.to_string(),
            fields: preset.fields(),
        }
    }

    pub fn filename_column(&self) -> &str {
        &self.filename_column
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn required_columns(&self) -> Vec<String> {
        std::iter::once(self.filename_column.clone())
            .chain(self.fields.iter().cloned())
            .collect()
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::from_preset(SchemaPreset::Product)
    }
}

pub fn parse_field_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}
