mod config;
mod export;
mod intake;
mod metadata;
mod planner;
mod sanitize;
mod schema;

pub use config::{
    app_paths, load_config, load_config_from, save_config, save_config_to, AppConfig, AppPaths,
};
pub use export::{
    export_archive, export_overview, export_results, export_template, write_archive,
    write_overview,
    write_template_csv, write_template_xlsx, ArchiveSummary,
};
pub use intake::{collect_input_files, InputFile, Intake, IntakeOptions, IntakeStats};
pub use metadata::{load_metadata, MetadataError, MetadataFormat, MetadataRow, MetadataTable};
pub use planner::{
    assign_names, build_unique_filename, generate_plan, NamingRequest, PlanError, PlanOptions,
    RenameCandidate, RenamePlan, RenameResult, RenameStats,
};
pub use sanitize::{
    build_base_name, file_extension, slugify_field, slugify_fields, MAX_BASE_LEN,
    MAX_FILENAME_LEN, MIN_BASE_LEN,
};
pub use schema::{parse_field_list, FieldSchema, SchemaError, SchemaPreset};
