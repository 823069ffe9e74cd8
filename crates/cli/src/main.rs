use anyhow::{Context, Result};
use batch_renamer_core::{
    app_paths, collect_input_files, export_results, export_template,
    generate_plan, load_config, load_metadata, parse_field_list, save_config, AppConfig,
    FieldSchema, Intake, RenamePlan, SchemaPreset, MAX_FILENAME_LEN,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "batch-renamer-cli")]
#[command(about = "Rename images and PDFs from spreadsheet metadata and pack them into a ZIP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a metadata template (.xlsx or .csv, by --out extension) listing the files in a folder
    Template(TemplateArgs),
    /// Plan new names from a filled-in metadata file and optionally write the archive
    Rename(RenameArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    /// Write the default configuration file if none exists
    Init,
}

#[derive(Debug, Args)]
struct SchemaArgs {
    #[arg(long, value_enum)]
    preset: Option<Preset>,
    /// Comma-separated field columns, in the order they appear in the new name
    #[arg(long)]
    fields: Option<String>,
}

#[derive(Debug, Args)]
struct InputArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value_t = false)]
    recursive: bool,
    #[arg(long, default_value_t = false)]
    include_hidden: bool,
}

#[derive(Debug, Args)]
struct TemplateArgs {
    #[command(flatten)]
    input: InputArgs,
    #[command(flatten)]
    schema: SchemaArgs,
    #[arg(long, default_value = "metadata_template.xlsx")]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct RenameArgs {
    #[command(flatten)]
    input: InputArgs,
    #[command(flatten)]
    schema: SchemaArgs,
    #[arg(long)]
    metadata: PathBuf,
    /// Write renamed files into this ZIP; without it nothing is written
    #[arg(long)]
    archive: Option<PathBuf>,
    #[arg(long)]
    overview: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Product,
    Page,
}

impl From<Preset> for SchemaPreset {
    fn from(value: Preset) -> Self {
        match value {
            Preset::Product => SchemaPreset::Product,
            Preset::Page => SchemaPreset::Page,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Template(args) => cmd_template(args),
        Commands::Rename(args) => cmd_rename(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Init => cmd_config_init(),
        },
    }
}

fn cmd_template(args: TemplateArgs) -> Result<()> {
    let config = load_config()?;
    let schema = resolve_schema(&config, &args.schema)?;
    let intake = read_inputs(&config, &args.input)?;

    export_template(&args.out, &intake.file_names(), &schema, &config.template_defaults)?;
    println!("Template written: {}", args.out.display());
    Ok(())
}

fn cmd_rename(args: RenameArgs) -> Result<()> {
    let config = load_config()?;
    let schema = resolve_schema(&config, &args.schema)?;
    let metadata = load_metadata(&args.metadata, &schema)?;
    let intake = read_inputs(&config, &args.input)?;

    let plan = generate_plan(&intake.files, &metadata, &config.plan_options())?;

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Table => {
            print_table(&plan);
        }
    }

    let summary = export_results(
        &plan,
        &intake.files,
        args.archive.as_deref(),
        args.overview.as_deref(),
    )?;

    match (args.archive.as_deref(), summary) {
        (Some(path), Some(summary)) => {
            eprintln!(
                "Files renamed and archived: {} ({} files)",
                path.display(),
                summary.entries
            );
        }
        _ => {
            eprintln!("Dry run: no archive written. Pass --archive <FILE> to write the renamed files.");
        }
    }

    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("Config file: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let paths = app_paths()?;
    if paths.config_path.exists() {
        anyhow::bail!("config file already exists: {}", paths.config_path.display());
    }
    let path = save_config(&AppConfig::default())?;
    println!("Config file written: {}", path.display());
    Ok(())
}

fn resolve_schema(config: &AppConfig, args: &SchemaArgs) -> Result<FieldSchema> {
    let fields = match (&args.fields, args.preset) {
        (Some(list), _) => parse_field_list(list),
        (None, Some(preset)) => SchemaPreset::from(preset).fields(),
        (None, None) => config.fields.clone(),
    };
    FieldSchema::new(config.filename_column.clone(), fields).context("invalid field configuration")
}

fn read_inputs(config: &AppConfig, args: &InputArgs) -> Result<Intake> {
    let mut options = config.intake_options();
    options.recursive |= args.recursive;
    options.include_hidden |= args.include_hidden;

    let intake = collect_input_files(Path::new(&args.input), &options)?;
    info!(
        scanned = intake.stats.scanned_files,
        accepted = intake.stats.accepted,
        skipped_extension = intake.stats.skipped_extension,
        skipped_hidden = intake.stats.skipped_hidden,
        "input files collected"
    );
    Ok(intake)
}

fn print_table(plan: &RenamePlan) {
    println!("Original Filename -> New Filename");
    for candidate in &plan.candidates {
        let mut notes = Vec::new();
        if candidate.disambiguated {
            notes.push("renumbered");
        }
        if candidate.extension_only {
            notes.push("all fields blank");
        }
        if candidate.final_name.chars().count() > MAX_FILENAME_LEN {
            notes.push("over length budget");
        }

        if notes.is_empty() {
            println!("{} -> {}", candidate.original_name, candidate.final_name);
        } else {
            println!(
                "{} -> {} ({})",
                candidate.original_name,
                candidate.final_name,
                notes.join(", ")
            );
        }
    }

    for name in &plan.unmatched {
        println!("{} -> (no metadata row, skipped)", name);
    }

    println!(
        "\nSummary: input={} planned={} unmatched={} renumbered={} blank={}",
        plan.stats.input_files,
        plan.stats.planned,
        plan.stats.unmatched,
        plan.stats.disambiguated,
        plan.stats.extension_only
    );
}
