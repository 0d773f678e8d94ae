use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dragnet_scanners::report::ReportFormat;
use dragnet_scanners::{
    exceeds_threshold, render, run_scan, summarize, Finding, ScanPolicy, ScanRequest, Severity,
    DEFAULT_TOOLS,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dragnet")]
#[command(about = "Multi-engine static analysis aggregator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a path or file list with the selected engines
    Scan(ScanArgs),
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Root path to scan (file or directory)
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Report encoding
    #[arg(long, value_enum, default_value_t = OutputFormat::Md)]
    format: OutputFormat,

    /// Comma-separated list of engines to run
    #[arg(long, default_value = "semgrep,detect-secrets,sqlfluff,shellcheck,sql-strict")]
    tools: String,

    /// Disable strict raw .sql checks (enabled by default)
    #[arg(long)]
    no_sql_strict: bool,

    /// Run the semantic-review engine after the pattern engines
    #[arg(long)]
    llm_review: bool,

    /// Pattern-engine rule packs (comma-separated, or 'auto')
    #[arg(long, default_value = "auto")]
    semgrep_config: String,

    /// File listing files to scan, one per line, relative to the root
    #[arg(long)]
    paths_from: Option<PathBuf>,

    /// Policy file (YAML) overriding scan defaults
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Fail (exit 1) when the worst finding reaches this severity
    #[arg(long, value_enum, default_value_t = FailOn::High)]
    fail_on: FailOn,

    /// Write the report to a file instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory for one report per input file
    #[arg(long)]
    per_file_out_dir: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Md,
    Json,
    Sarif,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Md => ReportFormat::Markdown,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Sarif => ReportFormat::Sarif,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FailOn {
    Low,
    Medium,
    High,
    Critical,
}

impl From<FailOn> for Severity {
    fn from(fail_on: FailOn) -> Self {
        match fail_on {
            FailOn::Low => Severity::Low,
            FailOn::Medium => Severity::Medium,
            FailOn::High => Severity::High,
            FailOn::Critical => Severity::Critical,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Scan(args) => run_scan_command(args),
    }
}

fn run_scan_command(args: ScanArgs) -> ExitCode {
    if !args.path.exists() {
        eprintln!(
            "{} scan path does not exist: {}",
            "error:".bright_red().bold(),
            args.path.display()
        );
        return ExitCode::from(2);
    }

    let files = match &args.paths_from {
        Some(list_path) => match read_paths_from(list_path) {
            Ok(files) => Some(files),
            Err(e) => {
                eprintln!(
                    "{} failed to read --paths-from: {e}",
                    "error:".bright_red().bold()
                );
                return ExitCode::from(2);
            }
        },
        None => None,
    };

    let policy = match &args.policy {
        Some(policy_path) => match ScanPolicy::from_yaml_file(policy_path) {
            Ok(policy) => policy,
            Err(e) => {
                eprintln!(
                    "{} failed to read --policy: {e}",
                    "error:".bright_red().bold()
                );
                return ExitCode::from(2);
            }
        },
        None => ScanPolicy::default(),
    };

    let tools = selected_tools(&args);

    let mut request = ScanRequest::new(&args.path)
        .with_tools(tools)
        .with_semgrep_config(&args.semgrep_config)
        .with_policy(policy);
    if let Some(files) = files {
        request = request.with_files(files);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{} failed to start runtime: {e}", "error:".bright_red().bold());
            return ExitCode::from(2);
        }
    };
    let findings = match runtime.block_on(run_scan(&request)) {
        Ok(findings) => findings,
        Err(e) => {
            eprintln!("{} scan failed: {e:#}", "error:".bright_red().bold());
            return ExitCode::from(2);
        }
    };

    let format: ReportFormat = args.format.into();
    let report = match render(&findings, format) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} failed to render report: {e}", "error:".bright_red().bold());
            return ExitCode::from(2);
        }
    };

    if let Some(out_path) = &args.out {
        if let Err(e) = std::fs::write(out_path, &report) {
            eprintln!(
                "{} failed to write {}: {e}",
                "error:".bright_red().bold(),
                out_path.display()
            );
            return ExitCode::from(2);
        }
    } else {
        println!("{report}");
    }

    if let Some(out_dir) = &args.per_file_out_dir {
        if let Err(e) = write_per_file_reports(out_dir, &args, &findings, format) {
            eprintln!(
                "{} failed to write per-file reports: {e}",
                "error:".bright_red().bold()
            );
            return ExitCode::from(2);
        }
    }

    let counts = summarize(&findings);
    eprintln!(
        "{} {} findings (critical: {}, high: {}, medium: {}, low: {})",
        "scan complete:".bright_green(),
        counts.total,
        counts.critical,
        counts.high,
        counts.medium,
        counts.low
    );

    if exceeds_threshold(&findings, args.fail_on.into()) {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn selected_tools(args: &ScanArgs) -> Vec<String> {
    let mut tools: Vec<String> = args
        .tools
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if tools.is_empty() {
        tools = DEFAULT_TOOLS.iter().map(|t| t.to_string()).collect();
    }
    if args.no_sql_strict {
        tools.retain(|t| t != "sql-strict");
    } else if !tools.iter().any(|t| t == "sql-strict") {
        tools.push("sql-strict".to_string());
    }
    if args.llm_review && !tools.iter().any(|t| t == "llm-review") {
        tools.push("llm-review".to_string());
    }
    tools
}

fn read_paths_from(path: &Path) -> Result<Vec<PathBuf>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// One report per input file, so findings can be reviewed next to the file
/// they belong to. Inputs with zero findings still get a report.
fn write_per_file_reports(
    out_dir: &Path,
    args: &ScanArgs,
    findings: &[Finding],
    format: ReportFormat,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;

    let mut by_file: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
    for finding in findings {
        by_file
            .entry(finding.path.clone())
            .or_default()
            .push(finding.clone());
    }

    let mut input_files: Vec<String> = Vec::new();
    if let Some(list_path) = &args.paths_from {
        input_files = read_paths_from(list_path)?
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
    } else if args.path.is_dir() {
        for file in dragnet_scanners::engines::walk_files(&args.path, &ScanPolicy::default()) {
            input_files.push(dragnet_scanners::text::relpath(&file, &args.path));
        }
    } else if args.path.is_file() {
        if let Some(name) = args.path.file_name() {
            input_files.push(name.to_string_lossy().into_owned());
        }
    }
    input_files.sort();
    input_files.dedup();

    let empty: Vec<Finding> = Vec::new();
    let mut written = 0usize;
    for rel in &input_files {
        let file_findings = by_file.get(rel).unwrap_or(&empty);
        let base = Path::new(rel)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| rel.clone());
        let out_path = out_dir.join(format!("{base}_report{}", format.file_extension()));
        std::fs::write(&out_path, render(file_findings, format)?)?;
        written += 1;
    }
    if written > 0 {
        eprintln!("Wrote per-file reports: {written} files");
    }
    Ok(())
}
