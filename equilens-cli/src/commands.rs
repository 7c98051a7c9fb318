//! Subcommand handlers.

use anyhow::{Context, Result};
use equilens_core::config::{AnalysisConfig, load_config};
use equilens_core::pipeline::{AnalysisReport, AnalysisRequest, Analyzer};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Analyze a dataset and its confirmed column roles
    Analyze(AnalyzeArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// JSON request file with `dataset` and `roles`, or `-` for stdin
    pub input: PathBuf,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,

    /// Override severity.min_sample_size
    #[arg(long)]
    pub min_sample_size: Option<usize>,

    /// Override disparity.min_subset_size
    #[arg(long)]
    pub min_subset_size: Option<usize>,
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Create a default .equilens/config.toml in the workspace
    Init,
    /// Show the effective configuration
    Show,
}

pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Commands::Analyze(args) => {
            let mut config = effective_config(workspace, config_file)?;
            apply_overrides(&mut config, &args);
            let request = read_request(&args.input)?;
            let report = run_analysis(config, &request)?;
            writeln!(out, "{}", render_report(&report, args.pretty)?)?;
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace, config_file, out),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".equilens");
            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                writeln!(out, "Configuration already exists at {}", config_path.display())?;
                return Ok(());
            }
            std::fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create {}", config_dir.display()))?;
            let toml_str = toml::to_string_pretty(&AnalysisConfig::default())?;
            std::fs::write(&config_path, toml_str)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            writeln!(out, "Created {}", config_path.display())?;
            Ok(())
        }
        ConfigAction::Show => {
            let config = effective_config(workspace, config_file)?;
            config.validate()?;
            let toml_str = toml::to_string_pretty(&config)?;
            writeln!(out, "{}", toml_str)?;
            Ok(())
        }
    }
}

fn effective_config(workspace: &Path, config_file: Option<&Path>) -> Result<AnalysisConfig> {
    load_config(Some(workspace), config_file).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

fn apply_overrides(config: &mut AnalysisConfig, args: &AnalyzeArgs) {
    if let Some(n) = args.min_sample_size {
        config.severity.min_sample_size = n;
    }
    if let Some(n) = args.min_subset_size {
        config.disparity.min_subset_size = n;
    }
}

fn read_request(input: &Path) -> Result<AnalysisRequest> {
    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .lock()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read request from {}", input.display()))?
    };
    parse_request(&raw)
}

fn parse_request(raw: &str) -> Result<AnalysisRequest> {
    AnalysisRequest::from_json(raw).context("Request must be a JSON object with `dataset` and `roles`")
}

fn run_analysis(config: AnalysisConfig, request: &AnalysisRequest) -> Result<AnalysisReport> {
    let analyzer = Analyzer::new(config).context("Invalid configuration")?;
    tracing::info!(
        rows = request.dataset.row_count(),
        columns = request.dataset.column_count(),
        roles = request.roles.len(),
        "Running analysis"
    );
    analyzer.analyze_request(request).context("Analysis failed")
}

fn render_report(report: &AnalysisReport, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    Ok(rendered)
}
