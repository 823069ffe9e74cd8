use crate::schema::FieldSchema;
use calamine::{Data, Reader, Xlsx};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MetadataFormat {
    Csv,
    Xlsx,
    Json,
}

impl MetadataFormat {
    pub fn from_path(path: &Path) -> Result<Self, MetadataError> {
        let ext = path
            .extension()
            .map(|v| v.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "json" => Ok(Self::Json),
            _ => Err(MetadataError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl fmt::Display for MetadataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("CSV"),
            Self::Xlsx => f.write_str("XLSX"),
            Self::Json => f.write_str("JSON"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata file is not valid {format}: {reason}")]
    MalformedFile {
        format: MetadataFormat,
        reason: String,
    },
    #[error(
        "the metadata file must include the following columns: {} (missing: {})",
        .required.join(", "),
        .missing.join(", ")
    )]
    MissingRequiredColumn {
        required: Vec<String>,
        missing: Vec<String>,
    },
    #[error("unsupported metadata file type (expected .csv, .xlsx or .json): {0}")]
    UnsupportedFormat(String),
    #[error("could not read metadata file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One spreadsheet row, with values in schema field order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataRow {
    pub original_name: String,
    pub values: Vec<Option<String>>,
}

impl MetadataRow {
    pub fn new(original_name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            original_name: original_name.into(),
            values,
        }
    }

    pub fn value(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    pub fn field_values(&self, field_count: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        (0..field_count).map(move |i| self.value(i))
    }
}

#[derive(Debug, Clone)]
pub struct MetadataTable {
    schema: FieldSchema,
    rows: Vec<MetadataRow>,
    index: HashMap<String, usize>,
    duplicate_names: Vec<String>,
}

impl MetadataTable {
    pub fn from_rows(schema: FieldSchema, rows: Vec<MetadataRow>) -> Self {
        let mut index = HashMap::with_capacity(rows.len());
        let mut duplicate_names = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            if index.contains_key(&row.original_name) {
                warn!(file = %row.original_name, "duplicate metadata row ignored; first row wins");
                duplicate_names.push(row.original_name.clone());
                continue;
            }
            index.insert(row.original_name.clone(), i);
        }

        Self {
            schema,
            rows,
            index,
            duplicate_names,
        }
    }

    pub fn from_csv_reader<R: Read>(reader: R, schema: &FieldSchema) -> Result<Self, MetadataError> {
        let malformed = |err: csv::Error| MetadataError::MalformedFile {
            format: MetadataFormat::Csv,
            reason: err.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let columns: Vec<String> = reader
            .headers()
            .map_err(malformed)?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(malformed)?;
            records.push(record.iter().map(normalize_cell).collect());
        }

        Self::from_records(&columns, records, schema)
    }

    /// Reads the first worksheet; its first row holds the column names.
    pub fn from_xlsx_slice(input: &[u8], schema: &FieldSchema) -> Result<Self, MetadataError> {
        let malformed = |reason: String| MetadataError::MalformedFile {
            format: MetadataFormat::Xlsx,
            reason,
        };

        let mut workbook: Xlsx<_> =
            Xlsx::new(Cursor::new(input)).map_err(|e| malformed(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| malformed("workbook has no worksheets".to_string()))?
            .map_err(|e| malformed(e.to_string()))?;

        let mut rows = range.rows();
        let columns: Vec<String> = rows
            .next()
            .map(|header| {
                header
                    .iter()
                    .map(|cell| cell.to_string().trim().to_string())
                    .collect()
            })
            .unwrap_or_default();
        let records: Vec<Vec<Option<String>>> = rows
            .map(|row| row.iter().map(xlsx_cell).collect())
            .collect();

        Self::from_records(&columns, records, schema)
    }

    pub fn from_json_slice(input: &[u8], schema: &FieldSchema) -> Result<Self, MetadataError> {
        let malformed = |reason: String| MetadataError::MalformedFile {
            format: MetadataFormat::Json,
            reason,
        };

        let value: Value = serde_json::from_slice(input).map_err(|e| malformed(e.to_string()))?;
        let Value::Array(items) = value else {
            return Err(malformed("expected an array of row objects".to_string()));
        };

        let mut columns: Vec<String> = Vec::new();
        let mut objects = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let Value::Object(map) = item else {
                return Err(malformed(format!("row {} is not an object", i + 1)));
            };
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
            objects.push(map);
        }

        let mut records = Vec::with_capacity(objects.len());
        for (i, object) in objects.iter().enumerate() {
            let record = columns
                .iter()
                .map(|column| json_cell(object.get(column)))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| malformed(format!("row {} has a nested value", i + 1)))?;
            records.push(record);
        }

        Self::from_records(&columns, records, schema)
    }

    fn from_records(
        columns: &[String],
        records: Vec<Vec<Option<String>>>,
        schema: &FieldSchema,
    ) -> Result<Self, MetadataError> {
        let required = schema.required_columns();
        let missing: Vec<String> = required
            .iter()
            .filter(|column| !columns.contains(column))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(MetadataError::MissingRequiredColumn { required, missing });
        }

        let position = |name: &str| columns.iter().position(|c| c == name).unwrap_or(usize::MAX);
        let name_index = position(schema.filename_column());
        let field_indexes: Vec<usize> = schema
            .fields()
            .iter()
            .map(|f| position(f.as_str()))
            .collect();

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let Some(original_name) = cell(&record, name_index).map(|v| v.trim().to_string())
            else {
                continue;
            };
            let values = field_indexes
                .iter()
                .map(|&i| cell(&record, i).map(str::to_string))
                .collect();
            rows.push(MetadataRow::new(original_name, values));
        }

        debug!(rows = rows.len(), "metadata rows loaded");
        Ok(Self::from_rows(schema.clone(), rows))
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn get(&self, original_name: &str) -> Option<&MetadataRow> {
        self.index.get(original_name).map(|&i| &self.rows[i])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Filenames that appeared on more than one row (later rows were ignored).
    pub fn duplicate_names(&self) -> &[String] {
        &self.duplicate_names
    }
}

pub fn load_metadata(path: &Path, schema: &FieldSchema) -> Result<MetadataTable, MetadataError> {
    let format = MetadataFormat::from_path(path)?;
    let bytes = fs::read(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match format {
        MetadataFormat::Csv => MetadataTable::from_csv_reader(bytes.as_slice(), schema),
        MetadataFormat::Xlsx => MetadataTable::from_xlsx_slice(&bytes, schema),
        MetadataFormat::Json => MetadataTable::from_json_slice(&bytes, schema),
    }
}

fn cell(record: &[Option<String>], index: usize) -> Option<&str> {
    record.get(index).and_then(|v| v.as_deref())
}

fn normalize_cell(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn xlsx_cell(value: &Data) -> Option<String> {
    match value {
        Data::Empty => None,
        Data::String(s) => normalize_cell(s),
        other => normalize_cell(&other.to_string()),
    }
}

fn json_cell(value: Option<&Value>) -> Option<Option<String>> {
    match value {
        None | Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(normalize_cell(s)),
        Some(Value::Number(n)) => Some(Some(n.to_string())),
        Some(Value::Bool(b)) => Some(Some(b.to_string())),
        Some(Value::Array(_)) | Some(Value::Object(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSchema, SchemaPreset};
    use rust_xlsxwriter::Workbook;
    use std::io::Write;
    use tempfile::tempdir;

    const PRODUCT_CSV: &str = "\
Original Filename,Product family,Product name,Product variant,Additional comment,Brand
chair.jpg,Lounge,Oslo,,,Muuto
table.png,Dining,70/70,  ,Oak top,Muuto
";

    fn product() -> FieldSchema {
        FieldSchema::from_preset(SchemaPreset::Product)
    }

    #[test]
    fn csv_rows_follow_schema_order_and_blank_cells_are_none() {
        let table = MetadataTable::from_csv_reader(PRODUCT_CSV.as_bytes(), &product())
            .expect("valid csv");
        assert_eq!(table.len(), 2);

        let chair = table.get("chair.jpg").expect("chair row");
        assert_eq!(
            chair.values,
            vec![
                Some("Lounge".to_string()),
                Some("Oslo".to_string()),
                None,
                None,
                Some("Muuto".to_string()),
            ]
        );

        let table_row = table.get("table.png").expect("table row");
        assert_eq!(table_row.value(2), None);
        assert_eq!(table_row.value(3), Some("Oak top"));
    }

    #[test]
    fn csv_missing_brand_column_lists_all_required_columns() {
        let csv = "Original Filename,Product family,Product name,Product variant,Additional comment\n\
                   chair.jpg,Lounge,Oslo,,\n";
        let err = MetadataTable::from_csv_reader(csv.as_bytes(), &product())
            .expect_err("brand column is required");

        match &err {
            MetadataError::MissingRequiredColumn { required, missing } => {
                assert_eq!(required.len(), 6);
                assert_eq!(missing, &vec!["Brand".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("Original Filename, Product family"));
        assert!(message.contains("Brand"));
    }

    #[test]
    fn csv_with_bom_and_extra_columns_is_accepted() {
        let csv = "\u{feff}Original Filename,Notes,Page Title,Subject,Version/Date,Brand\n\
                   guide.pdf,internal,Care Guide,Sofas,2024,Muuto\n";
        let schema = FieldSchema::from_preset(SchemaPreset::Page);
        let table = MetadataTable::from_csv_reader(csv.as_bytes(), &schema).expect("valid csv");
        let row = table.get("guide.pdf").expect("guide row");
        assert_eq!(row.value(0), Some("Care Guide"));
        assert_eq!(row.value(3), Some("Muuto"));
    }

    #[test]
    fn csv_short_rows_are_padded_with_none() {
        let csv = "Original Filename,Page Title,Subject,Version/Date,Brand\nguide.pdf,Care Guide\n";
        let schema = FieldSchema::from_preset(SchemaPreset::Page);
        let table = MetadataTable::from_csv_reader(csv.as_bytes(), &schema).expect("valid csv");
        let row = table.get("guide.pdf").expect("guide row");
        assert_eq!(row.value(0), Some("Care Guide"));
        assert_eq!(row.value(1), None);
    }

    #[test]
    fn invalid_utf8_csv_is_malformed() {
        let mut bytes = b"Original Filename,Page Title,Subject,Version/Date,Brand\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b',', b'\n']);
        let schema = FieldSchema::from_preset(SchemaPreset::Page);
        let err = MetadataTable::from_csv_reader(bytes.as_slice(), &schema)
            .expect_err("invalid utf-8");
        assert!(matches!(err, MetadataError::MalformedFile { format: MetadataFormat::Csv, .. }));
    }

    #[test]
    fn duplicate_rows_keep_the_first_match() {
        let csv = "Original Filename,Product family,Product name,Product variant,Additional comment,Brand\n\
                   chair.jpg,Lounge,Oslo,,,Muuto\n\
                   chair.jpg,Dining,Other,,,Muuto\n";
        let table = MetadataTable::from_csv_reader(csv.as_bytes(), &product()).expect("valid csv");
        assert_eq!(table.get("chair.jpg").and_then(|r| r.value(0)), Some("Lounge"));
        assert_eq!(table.duplicate_names(), &["chair.jpg".to_string()]);
    }

    #[test]
    fn rows_without_filename_are_ignored() {
        let csv = "Original Filename,Product family,Product name,Product variant,Additional comment,Brand\n\
                   ,Lounge,Oslo,,,Muuto\n";
        let table = MetadataTable::from_csv_reader(csv.as_bytes(), &product()).expect("valid csv");
        assert!(table.is_empty());
    }

    #[test]
    fn json_rows_accept_null_and_scalar_values() {
        let json = br#"[
            {"Original Filename": "guide.pdf", "Page Title": "Care Guide", "Subject": null,
             "Version/Date": 2024, "Brand": "Muuto"}
        ]"#;
        let schema = FieldSchema::from_preset(SchemaPreset::Page);
        let table = MetadataTable::from_json_slice(json, &schema).expect("valid json");
        let row = table.get("guide.pdf").expect("guide row");
        assert_eq!(row.value(1), None);
        assert_eq!(row.value(2), Some("2024"));
    }

    #[test]
    fn json_must_be_array_of_flat_objects() {
        let schema = FieldSchema::from_preset(SchemaPreset::Page);

        let err = MetadataTable::from_json_slice(br#"{"a": 1}"#, &schema).expect_err("not array");
        assert!(matches!(err, MetadataError::MalformedFile { format: MetadataFormat::Json, .. }));

        let nested = br#"[{"Original Filename": "a.pdf", "Page Title": ["x"], "Subject": "",
                           "Version/Date": "", "Brand": ""}]"#;
        let err = MetadataTable::from_json_slice(nested, &schema).expect_err("nested value");
        assert!(err.to_string().contains("row 1"));

        let err = MetadataTable::from_json_slice(b"not json", &schema).expect_err("garbage");
        assert!(matches!(err, MetadataError::MalformedFile { .. }));
    }

    #[test]
    fn empty_json_array_reports_missing_columns() {
        let err = MetadataTable::from_json_slice(b"[]", &product()).expect_err("no columns");
        assert!(matches!(err, MetadataError::MissingRequiredColumn { .. }));
    }

    fn workbook(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet
                        .write_string(r as u32, c as u16, *value)
                        .expect("write cell");
                }
            }
        }
        workbook.save_to_buffer().expect("save workbook")
    }

    #[test]
    fn xlsx_rows_are_read_from_first_sheet() {
        let bytes = workbook(&[
            &["Original Filename", "Page Title", "Subject", "Version/Date", "Brand"],
            &["guide.pdf", "Care Guide", "", "  ", "Muuto"],
        ]);
        let schema = FieldSchema::from_preset(SchemaPreset::Page);
        let table = MetadataTable::from_xlsx_slice(&bytes, &schema).expect("valid xlsx");

        let row = table.get("guide.pdf").expect("guide row");
        assert_eq!(row.value(0), Some("Care Guide"));
        assert_eq!(row.value(1), None);
        assert_eq!(row.value(2), None);
        assert_eq!(row.value(3), Some("Muuto"));
    }

    #[test]
    fn xlsx_numeric_cells_use_display_form() {
        let mut book = Workbook::new();
        let sheet = book.add_worksheet();
        for (c, header) in ["Original Filename", "Page Title", "Subject", "Version/Date", "Brand"]
            .iter()
            .enumerate()
        {
            sheet.write_string(0, c as u16, *header).expect("header");
        }
        sheet.write_string(1, 0, "guide.pdf").expect("name");
        sheet.write_number(1, 3, 2024.0).expect("number");
        let bytes = book.save_to_buffer().expect("save workbook");

        let schema = FieldSchema::from_preset(SchemaPreset::Page);
        let table = MetadataTable::from_xlsx_slice(&bytes, &schema).expect("valid xlsx");
        assert_eq!(table.get("guide.pdf").and_then(|r| r.value(2)), Some("2024"));
    }

    #[test]
    fn xlsx_missing_brand_column_lists_all_required_columns() {
        let bytes = workbook(&[
            &[
                "Original Filename",
                "Product family",
                "Product name",
                "Product variant",
                "Additional comment",
            ],
            &["chair.jpg", "Lounge", "Oslo", "", ""],
        ]);
        let err = MetadataTable::from_xlsx_slice(&bytes, &product())
            .expect_err("brand column is required");

        match &err {
            MetadataError::MissingRequiredColumn { required, missing } => {
                assert_eq!(required, &product().required_columns());
                assert_eq!(missing, &vec!["Brand".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_metadata_dispatches_on_extension() {
        let temp = tempdir().expect("tempdir");
        let csv_path = temp.path().join("metadata.CSV");
        let mut file = fs::File::create(&csv_path).expect("create csv");
        file.write_all(PRODUCT_CSV.as_bytes()).expect("write csv");

        let table = load_metadata(&csv_path, &product()).expect("load csv");
        assert_eq!(table.len(), 2);

        let xls_path = temp.path().join("metadata.xls");
        fs::write(&xls_path, b"legacy").expect("write xls");
        let err = load_metadata(&xls_path, &product()).expect_err("unsupported");
        assert!(matches!(err, MetadataError::UnsupportedFormat(_)));

        let xlsx_path = temp.path().join("metadata.xlsx");
        fs::write(&xlsx_path, b"PK").expect("write xlsx");
        let err = load_metadata(&xlsx_path, &product()).expect_err("corrupt workbook");
        assert!(matches!(err, MetadataError::MalformedFile { format: MetadataFormat::Xlsx, .. }));

        let err = load_metadata(&temp.path().join("missing.json"), &product())
            .expect_err("missing file");
        assert!(matches!(err, MetadataError::Io { .. }));
    }
}
