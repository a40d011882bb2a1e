// ABOUTME: Main entry point for the deckforge program.
// ABOUTME: Provides CLI interface and executes commands from the library.

use clap::{Args, Parser, Subcommand, ValueEnum};
use deckforge::sanitize::validate_safe_filename;
use deckforge::{
    init_logging, render_deck_html, write_html_to_file, Config, ContentAnalyzer,
    GenerateRequest, Orchestrator, TemplateEngine, TemplateSet,
};
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log verbosity (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a slide deck from markdown
    Generate(GenerateArgs),

    /// Print the content analysis of a markdown file as JSON
    Analyze(AnalyzeArgs),

    /// Validate a template set file
    ValidateTemplates(ValidateArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
    Html,
}

#[derive(Args)]
struct GenerateArgs {
    /// Path to the markdown file
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "markdown")]
    format: OutputFormat,

    /// Extra templates (JSON) layered over the built-in set
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Also write each slide to its own file in this directory
    #[arg(long)]
    split_dir: Option<PathBuf>,

    /// Base name for per-slide files
    #[arg(long, default_value = "slide")]
    base_name: String,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Path to the markdown file
    #[arg(short, long)]
    input: PathBuf,
}

#[derive(Args)]
struct ValidateArgs {
    /// Path to the template set JSON file
    #[arg(short, long)]
    templates: PathBuf,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    Ok(config)
}

fn load_templates(path: &Path) -> anyhow::Result<TemplateSet> {
    let raw = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read templates {:?}: {}", path, e))?;
    Ok(TemplateSet::from_json(&raw)?)
}

fn write_output(output: Option<&PathBuf>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
            println!("Output written: {:?}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn generate(config: &Config, args: &GenerateArgs) -> anyhow::Result<()> {
    let raw = fs::read_to_string(&args.input)
        .map_err(|e| anyhow::anyhow!("Failed to read input {:?}: {}", args.input, e))?;

    let mut templates = TemplateSet::builtin();
    if let Some(path) = &args.templates {
        templates.extend(load_templates(path)?);
    }

    let mut orchestrator = Orchestrator::with_templates(config, templates)?.with_progress(
        |progress| log::info!("[{:>3}%] {}", progress.percent, progress.message),
    );
    let output = orchestrator.generate(GenerateRequest::new(raw))?;

    match (args.format, &args.output) {
        (OutputFormat::Html, Some(path)) => {
            write_html_to_file(&render_deck_html(&output), path)?;
            println!("HTML generated successfully: {:?}", path);
        }
        (OutputFormat::Html, None) => write_output(None, &render_deck_html(&output))?,
        (OutputFormat::Markdown, path) => write_output(path.as_ref(), &output.to_markdown())?,
        (OutputFormat::Json, path) => {
            write_output(path.as_ref(), &serde_json::to_string_pretty(&output)?)?
        }
    }

    if let Some(dir) = &args.split_dir {
        let base_name = validate_safe_filename(&args.base_name)?;
        fs::create_dir_all(dir)?;
        for slide in &output.slides {
            let path = dir.join(format!("{}_{:04}.md", base_name, slide.index + 1));
            fs::write(&path, &slide.content)?;
        }
        println!("Wrote {} slide files to {:?}", output.slides.len(), dir);
    }
    Ok(())
}

fn analyze(config: &Config, args: &AnalyzeArgs) -> anyhow::Result<()> {
    let raw = fs::read_to_string(&args.input)
        .map_err(|e| anyhow::anyhow!("Failed to read input {:?}: {}", args.input, e))?;
    let analysis = ContentAnalyzer::new(config.analyzer_config()).analyze(&raw);
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn validate_templates(config: &Config, args: &ValidateArgs) -> anyhow::Result<()> {
    let mut templates = TemplateSet::builtin();
    templates.extend(load_templates(&args.templates)?);
    let engine = TemplateEngine::new(templates, config.template_engine_config())?;
    engine.validate_set()?;
    println!("{} templates are valid", engine.templates().len());
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let result = load_config(&cli).and_then(|config| {
        init_logging(config.log_level);
        match &cli.command {
            Some(Commands::Generate(args)) => generate(&config, args),
            Some(Commands::Analyze(args)) => analyze(&config, args),
            Some(Commands::ValidateTemplates(args)) => validate_templates(&config, args),
            None => {
                println!("No command specified. Use --help for usage information.");
                Ok(())
            }
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
