use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "pdf"];

#[derive(Clone)]
pub struct InputFile {
    pub original_name: String,
    pub content: Vec<u8>,
}

impl InputFile {
    pub fn new(original_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            content,
        }
    }
}

impl std::fmt::Debug for InputFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputFile")
            .field("original_name", &self.original_name)
            .field("content_len", &self.content.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct IntakeOptions {
    pub recursive: bool,
    pub include_hidden: bool,
    pub allowed_extensions: Vec<String>,
}

impl Default for IntakeOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            include_hidden: false,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntakeStats {
    pub scanned_files: usize,
    pub accepted: usize,
    pub skipped_extension: usize,
    pub skipped_hidden: usize,
}

#[derive(Debug, Clone)]
pub struct Intake {
    pub files: Vec<InputFile>,
    pub stats: IntakeStats,
}

impl Intake {
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.original_name.clone()).collect()
    }
}

pub fn collect_input_files(root: &Path, options: &IntakeOptions) -> Result<Intake> {
    if !root.is_dir() {
        anyhow::bail!("input folder does not exist: {}", root.display());
    }

    let mut stats = IntakeStats::default();
    let mut paths = Vec::new();

    if options.recursive {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("failed to walk folder: {}", root.display()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            accept_path(entry.path(), options, &mut stats, &mut paths);
        }
    } else {
        for entry in fs::read_dir(root)
            .with_context(|| format!("could not read folder: {}", root.display()))?
        {
            let entry =
                entry.with_context(|| format!("could not read folder entry: {}", root.display()))?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            accept_path(&path, options, &mut stats, &mut paths);
        }
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let original_name = path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .with_context(|| format!("file has no name: {}", path.display()))?;
        let content =
            fs::read(&path).with_context(|| format!("could not read file: {}", path.display()))?;
        debug!(file = %original_name, bytes = content.len(), "accepted input file");
        files.push(InputFile::new(original_name, content));
    }

    Ok(Intake { files, stats })
}

fn accept_path(
    path: &Path,
    options: &IntakeOptions,
    stats: &mut IntakeStats,
    out: &mut Vec<PathBuf>,
) {
    stats.scanned_files += 1;

    if is_hidden(path) && !options.include_hidden {
        stats.skipped_hidden += 1;
        return;
    }

    if has_allowed_extension(path, &options.allowed_extensions) {
        stats.accepted += 1;
        out.push(path.to_path_buf());
    } else {
        stats.skipped_extension += 1;
    }
}

fn has_allowed_extension(path: &Path, allowed: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            allowed
                .iter()
                .any(|a| ext.eq_ignore_ascii_case(a.trim_start_matches('.')))
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
