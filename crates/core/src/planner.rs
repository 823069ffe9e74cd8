use crate::intake::InputFile;
use crate::metadata::MetadataTable;
use crate::sanitize::{
    build_base_name, file_extension, slugify_fields, truncate_base, MAX_BASE_LEN, MIN_BASE_LEN,
};
use crate::schema::FieldSchema;
use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub max_base_len: usize,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            max_base_len: MAX_BASE_LEN,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("more than one input file is named {0}")]
    DuplicateInputName(String),
}

/// Sanitized tokens for one file, ready for name assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamingRequest {
    pub original_name: String,
    pub tokens: Vec<String>,
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameResult {
    pub original_name: String,
    pub final_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameCandidate {
    pub original_name: String,
    pub final_name: String,
    pub tokens: Vec<String>,
    pub disambiguated: bool,
    pub extension_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenameStats {
    pub input_files: usize,
    pub planned: usize,
    pub unmatched: usize,
    pub disambiguated: usize,
    pub extension_only: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub schema: FieldSchema,
    pub candidates: Vec<RenameCandidate>,
    pub unmatched: Vec<String>,
    pub stats: RenameStats,
}

impl RenamePlan {
    pub fn results(&self) -> Vec<RenameResult> {
        self.candidates
            .iter()
            .map(|c| RenameResult {
                original_name: c.original_name.clone(),
                final_name: c.final_name.clone(),
            })
            .collect()
    }
}

pub fn generate_plan(
    files: &[InputFile],
    metadata: &MetadataTable,
    options: &PlanOptions,
) -> Result<RenamePlan> {
    ensure_unique_input_names(files)?;

    let schema = metadata.schema();
    let field_count = schema.fields().len();
    let max_base_len = base_budget(options.max_base_len);

    // Sanitizing is pure; only name assignment below has to stay sequential.
    let requests: Vec<Option<NamingRequest>> = files
        .par_iter()
        .map(|file| {
            metadata.get(&file.original_name).map(|row| NamingRequest {
                original_name: file.original_name.clone(),
                tokens: slugify_fields(row.field_values(field_count)),
                extension: file_extension(&file.original_name),
            })
        })
        .collect();

    let mut stats = RenameStats {
        input_files: files.len(),
        ..RenameStats::default()
    };
    let mut used_names = HashSet::<String>::with_capacity(files.len());
    let mut candidates = Vec::with_capacity(files.len());
    let mut unmatched = Vec::new();

    for (file, request) in files.iter().zip(requests) {
        let Some(request) = request else {
            warn!(file = %file.original_name, "no metadata row for file; skipped");
            stats.unmatched += 1;
            unmatched.push(file.original_name.clone());
            continue;
        };

        let base = build_base_name(&request.tokens, max_base_len);
        let preferred = format!("{}{}", base, request.extension);
        let final_name = resolve_collision(
            &base,
            &request.extension,
            &mut used_names,
            max_base_len,
        );

        let disambiguated = final_name != preferred;
        let extension_only = base.is_empty();
        if disambiguated {
            stats.disambiguated += 1;
        }
        if extension_only {
            stats.extension_only += 1;
            warn!(
                file = %request.original_name,
                name = %final_name,
                "all metadata fields are blank"
            );
        }
        debug!(from = %request.original_name, to = %final_name, "planned rename");

        stats.planned += 1;
        candidates.push(RenameCandidate {
            original_name: request.original_name,
            final_name,
            tokens: request.tokens,
            disambiguated,
            extension_only,
        });
    }

    Ok(RenamePlan {
        schema: schema.clone(),
        candidates,
        unmatched,
        stats,
    })
}

/// Assigns a batch-unique filename to every request, in input order.
pub fn assign_names(requests: &[NamingRequest], max_base_len: usize) -> Vec<RenameResult> {
    let mut used_names = HashSet::<String>::with_capacity(requests.len());
    requests
        .iter()
        .map(|request| RenameResult {
            original_name: request.original_name.clone(),
            final_name: build_unique_filename(
                &request.tokens,
                &request.extension,
                &mut used_names,
                max_base_len,
            ),
        })
        .collect()
}

/// Builds the filename for one file and registers it in `used_names`.
///
/// A name already in the set gets `-1`, `-2`, ... appended to the base, which
/// is shortened as needed so the base never exceeds `max_base_len`. The budget
/// is clamped to `MIN_BASE_LEN..=MAX_BASE_LEN`.
pub fn build_unique_filename(
    tokens: &[String],
    extension: &str,
    used_names: &mut HashSet<String>,
    max_base_len: usize,
) -> String {
    let max_base_len = base_budget(max_base_len);
    let base = build_base_name(tokens, max_base_len);
    resolve_collision(&base, extension, used_names, max_base_len)
}

fn resolve_collision(
    base: &str,
    extension: &str,
    used_names: &mut HashSet<String>,
    max_base_len: usize,
) -> String {
    let mut candidate = format!("{}{}", base, extension);
    let mut n = 1usize;
    while used_names.contains(&candidate) {
        let suffix = format!("-{}", n);
        let head = truncate_base(base, max_base_len.saturating_sub(suffix.len()));
        candidate = format!("{}{}{}", head, suffix, extension);
        n += 1;
    }

    used_names.insert(candidate.clone());
    candidate
}

// Below MIN_BASE_LEN a counter could swallow the whole base.
fn base_budget(max_base_len: usize) -> usize {
    max_base_len.clamp(MIN_BASE_LEN, MAX_BASE_LEN)
}

fn ensure_unique_input_names(files: &[InputFile]) -> Result<(), PlanError> {
    let mut seen = HashSet::<&str>::with_capacity(files.len());
    for file in files {
        if !seen.insert(file.original_name.as_str()) {
            return Err(PlanError::DuplicateInputName(file.original_name.clone()));
        }
    }
    Ok(())
}
