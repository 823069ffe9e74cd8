use crate::intake::{IntakeOptions, DEFAULT_ALLOWED_EXTENSIONS};
use crate::planner::PlanOptions;
use crate::sanitize::{MAX_BASE_LEN, MIN_BASE_LEN};
use crate::schema::{FieldSchema, SchemaError, SchemaPreset, DEFAULT_FILENAME_COLUMN};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub filename_column: String,
    pub fields: Vec<String>,
    pub allowed_extensions: Vec<String>,
    pub max_base_len: usize,
    pub template_defaults: BTreeMap<String, String>,
    pub recursive_default: bool,
    pub include_hidden_default: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut template_defaults = BTreeMap::new();
        template_defaults.insert("Brand".to_string(), "muuto".to_string());

        Self {
            filename_column: DEFAULT_FILENAME_COLUMN.to_string(),
            fields: SchemaPreset::Product.fields(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            max_base_len: MAX_BASE_LEN,
            template_defaults,
            recursive_default: false,
            include_hidden_default: false,
        }
    }
}

impl AppConfig {
    pub fn schema(&self) -> Result<FieldSchema, SchemaError> {
        FieldSchema::new(self.filename_column.clone(), self.fields.clone())
    }

    pub fn intake_options(&self) -> IntakeOptions {
        IntakeOptions {
            recursive: self.recursive_default,
            include_hidden: self.include_hidden_default,
            allowed_extensions: self.allowed_extensions.clone(),
        }
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            max_base_len: self.max_base_len.clamp(MIN_BASE_LEN, MAX_BASE_LEN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "batch-renamer", "batch-renamer")
        .context("could not determine the OS config directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    load_config_from(&paths.config_path)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read config file: {}", path.display()))?;
    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("could not parse config file: {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let paths = app_paths()?;
    save_config_to(config, &paths.config_path)?;
    Ok(paths.config_path)
}

pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("could not create config directory: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(config).context("could not serialize config")?;
    fs::write(path, body)
        .with_context(|| format!("could not write config file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = tempdir().expect("tempdir");
        let config = load_config_from(&temp.path().join("config.toml")).expect("load");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.template_defaults.get("Brand").map(String::as_str), Some("muuto"));
    }

    #[test]
    fn save_then_load_keeps_custom_fields() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("config.toml");
        let config = AppConfig {
            fields: SchemaPreset::Page.fields(),
            recursive_default: true,
            ..AppConfig::default()
        };

        save_config_to(&config, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.schema().expect("schema").fields(),
            &SchemaPreset::Page.fields()[..]
        );
        assert!(loaded.intake_options().recursive);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_base_len = 300\n").expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.fields, SchemaPreset::Product.fields());
        assert_eq!(config.plan_options().max_base_len, MAX_BASE_LEN);
    }

    #[test]
    fn tiny_max_base_len_is_raised_to_minimum() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_base_len = 1\n").expect("write");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.plan_options().max_base_len, MIN_BASE_LEN);
    }

    #[test]
    fn invalid_toml_is_reported() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "fields = [").expect("write");

        let err = load_config_from(&path).expect_err("invalid");
        assert!(err.to_string().contains("could not parse config file"));
    }
}
