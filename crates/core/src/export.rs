use crate::intake::InputFile;
use crate::planner::RenamePlan;
use crate::schema::FieldSchema;
use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const OVERVIEW_HEADERS: [&str; 2] = ["Original Filename", "New Filename"];

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: usize,
    pub bytes: u64,
}

/// Writes a CSV with one row per file and one blank column per field.
///
/// Columns listed in `defaults` are pre-filled (for example a fixed brand).
pub fn write_template_csv<W: Write>(
    writer: W,
    file_names: &[String],
    schema: &FieldSchema,
    defaults: &BTreeMap<String, String>,
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(schema.required_columns())
        .context("failed to write template header")?;

    for name in file_names {
        let mut record = Vec::with_capacity(schema.fields().len() + 1);
        record.push(name.as_str());
        for field in schema.fields() {
            record.push(defaults.get(field).map(String::as_str).unwrap_or_default());
        }
        csv.write_record(&record)
            .with_context(|| format!("failed to write template row: {}", name))?;
    }

    csv.flush().context("failed to flush template")?;
    Ok(())
}

/// Same layout as [`write_template_csv`], as a single-sheet workbook.
///
/// Blank cells are left unwritten so they read back as empty.
pub fn write_template_xlsx(
    file_names: &[String],
    schema: &FieldSchema,
    defaults: &BTreeMap<String, String>,
) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in schema.required_columns().iter().enumerate() {
        sheet
            .write_string(0, col as u16, header.as_str())
            .context("failed to write template header")?;
    }

    for (index, name) in file_names.iter().enumerate() {
        let row = index as u32 + 1;
        sheet
            .write_string(row, 0, name.as_str())
            .with_context(|| format!("failed to write template row: {}", name))?;
        for (col, field) in schema.fields().iter().enumerate() {
            if let Some(value) = defaults.get(field).filter(|v| !v.is_empty()) {
                sheet
                    .write_string(row, col as u16 + 1, value.as_str())
                    .with_context(|| format!("failed to write template row: {}", name))?;
            }
        }
    }

    workbook
        .save_to_buffer()
        .context("failed to serialize template workbook")
}

/// Writes the template as `.xlsx` when the path says so, CSV otherwise.
pub fn export_template(
    path: &Path,
    file_names: &[String],
    schema: &FieldSchema,
    defaults: &BTreeMap<String, String>,
) -> Result<()> {
    let is_xlsx = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("xlsx"))
        .unwrap_or(false);

    if is_xlsx {
        let bytes = write_template_xlsx(file_names, schema, defaults)?;
        fs::write(path, bytes)
            .with_context(|| format!("could not write template file: {}", path.display()))?;
    } else {
        let file = File::create(path)
            .with_context(|| format!("could not create template file: {}", path.display()))?;
        write_template_csv(BufWriter::new(file), file_names, schema, defaults)?;
    }

    info!(path = %path.display(), files = file_names.len(), "metadata template written");
    Ok(())
}

/// Stores every planned file's bytes, unchanged, under its new name.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    plan: &RenamePlan,
    files: &[InputFile],
) -> Result<ArchiveSummary> {
    let contents: HashMap<&str, &[u8]> = files
        .iter()
        .map(|f| (f.original_name.as_str(), f.content.as_slice()))
        .collect();

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .large_file(true);
    let mut zip = ZipWriter::new(writer);
    let mut summary = ArchiveSummary::default();

    for candidate in &plan.candidates {
        let content = contents
            .get(candidate.original_name.as_str())
            .with_context(|| format!("no content for planned file: {}", candidate.original_name))?;

        zip.start_file(candidate.final_name.as_str(), options)
            .with_context(|| format!("failed to add archive entry: {}", candidate.final_name))?;
        zip.write_all(content)
            .with_context(|| format!("failed to write archive entry: {}", candidate.final_name))?;

        debug!(entry = %candidate.final_name, bytes = content.len(), "archived file");
        summary.entries += 1;
        summary.bytes += content.len() as u64;
    }

    zip.finish().context("failed to finish archive")?;
    Ok(summary)
}

pub fn export_archive(path: &Path, plan: &RenamePlan, files: &[InputFile]) -> Result<ArchiveSummary> {
    let file = File::create(path)
        .with_context(|| format!("could not create archive: {}", path.display()))?;
    let summary = write_archive(BufWriter::new(file), plan, files)?;
    info!(
        path = %path.display(),
        entries = summary.entries,
        bytes = summary.bytes,
        "archive written"
    );
    Ok(summary)
}

/// Writes the `Original Filename,New Filename` overview of a plan.
pub fn write_overview<W: Write>(writer: W, plan: &RenamePlan) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(OVERVIEW_HEADERS)
        .context("failed to write overview header")?;
    for candidate in &plan.candidates {
        csv.write_record([candidate.original_name.as_str(), candidate.final_name.as_str()])
            .context("failed to write overview row")?;
    }
    csv.flush().context("failed to flush overview")?;
    Ok(())
}

pub fn export_overview(path: &Path, plan: &RenamePlan) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("could not create overview file: {}", path.display()))?;
    write_overview(BufWriter::new(file), plan)
}

/// Writes the archive, then the overview, for whichever paths are given.
///
/// The overview only appears once the archive it describes exists.
pub fn export_results(
    plan: &RenamePlan,
    files: &[InputFile],
    archive: Option<&Path>,
    overview: Option<&Path>,
) -> Result<Option<ArchiveSummary>> {
    let summary = archive
        .map(|path| export_archive(path, plan, files))
        .transpose()?;
    if let Some(path) = overview {
        export_overview(path, plan)?;
    }
    Ok(summary)
}
