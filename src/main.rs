use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use polybind::calc::BindingCalculator;
use polybind::input::{read_escape_table, read_variants_table};
use polybind::model::params::{CalcParams, Metric};
use polybind::report::{QueryResult, ReportInput, write_reports};
use polybind::studies::process_studies;

#[derive(Debug, Parser)]
#[command(
    name = "polybind",
    version,
    about = "Antibody escape calculator for the SARS-CoV-2 receptor binding domain"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge raw per-study escape data into the calculator table.
    Process(ProcessArgs),
    /// Evaluate antibody binding retained after mutating RBD sites.
    Calc(CalcArgs),
}

#[derive(Debug, Args)]
struct ProcessArgs {
    /// Directory of study subdirectories, each holding study.yml and data.csv.
    #[arg(long)]
    data_dir: PathBuf,
    /// Output directory for escape_calculator_data.csv and studies.csv.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct CalcArgs {
    /// Escape table CSV, optionally gzip-compressed.
    #[arg(long)]
    data: PathBuf,
    /// Output directory for reports.
    #[arg(long)]
    out: PathBuf,
    /// Virus the conditions were elicited by, or `all` to keep every condition.
    #[arg(long, default_value = "SARS-CoV-2")]
    virus: String,
    /// Per-site aggregation of mutation escape: sum | mean.
    #[arg(long, default_value = "sum")]
    metric: String,
    /// Use raw rather than max-normalized per-site escape.
    #[arg(long)]
    unnormalized: bool,
    /// Restrict to conditions measured by one lab.
    #[arg(long)]
    lab: Option<String>,
    /// Restrict to conditions that do (true) or do not (false) neutralize Omicron.
    #[arg(long)]
    neutralizes_omicron: Option<bool>,
    /// Exponent scaling how strongly per-site escape ablates binding.
    #[arg(long, default_value_t = 2.0)]
    strength: f64,
    /// Comma-separated mutated sites to evaluate as one set.
    #[arg(long, value_delimiter = ',', conflicts_with = "variants")]
    sites: Option<Vec<u32>>,
    /// CSV of named site sets (columns variant, sites; sites `;`-separated).
    #[arg(long)]
    variants: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("polybind=info")),
        )
        .init();
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cli = Cli::parse();
    match cli.command {
        Command::Process(args) => run_process(&args),
        Command::Calc(args) => run_calc(&args),
    }
}

fn run_process(args: &ProcessArgs) -> Result<(), String> {
    let summary = process_studies(&args.data_dir, &args.out).map_err(|e| e.to_string())?;
    tracing::info!(
        "processed {} studies: {} conditions, {} escape rows",
        summary.n_studies,
        summary.n_conditions,
        summary.n_rows
    );
    Ok(())
}

fn run_calc(args: &CalcArgs) -> Result<(), String> {
    let params = CalcParams {
        eliciting_virus: if args.virus == "all" {
            None
        } else {
            Some(args.virus.clone())
        },
        normalized: !args.unnormalized,
        metric: parse_metric(&args.metric)?,
        lab: args.lab.clone(),
        neutralizes_omicron: args.neutralizes_omicron,
        mutation_escape_strength: args.strength,
    };

    let rows = read_escape_table(&args.data).map_err(|e| e.to_string())?;
    let calculator = BindingCalculator::from_rows(rows, &params).map_err(|e| e.to_string())?;
    tracing::info!(
        "calculator ready: {} conditions, {} sites",
        calculator.n_conditions(),
        calculator.sites().len()
    );

    let mut queries: Vec<QueryResult> = Vec::new();
    let mut per_site = None;
    if let Some(sites) = &args.sites {
        let binding = calculator
            .binding_retained(sites)
            .map_err(|e| e.to_string())?;
        queries.push(QueryResult {
            name: name_for_sites(sites),
            sites: sites.clone(),
            binding_retained: binding,
        });
        per_site = Some(calculator.escape_per_site(sites).map_err(|e| e.to_string())?);
    } else if let Some(path) = &args.variants {
        let variants = read_variants_table(path).map_err(|e| e.to_string())?;
        for variant in &variants {
            let binding = calculator
                .binding_retained(&variant.sites)
                .map_err(|e| e.to_string())?;
            queries.push(QueryResult {
                name: variant.variant.clone(),
                sites: variant.sites.clone(),
                binding_retained: binding,
            });
        }
    } else {
        // No site set requested: report the unmutated per-site escape map.
        per_site = Some(calculator.escape_per_site(&[]).map_err(|e| e.to_string())?);
    }

    let data_path = args.data.display().to_string();
    let input = ReportInput {
        calculator: &calculator,
        params: &params,
        data_path: &data_path,
        queries: &queries,
        per_site: per_site.as_deref(),
    };
    write_reports(&args.out, &input).map_err(|e| e.to_string())?;
    Ok(())
}

fn parse_metric(label: &str) -> Result<Metric, String> {
    match label {
        "sum" => Ok(Metric::Sum),
        "mean" => Ok(Metric::Mean),
        _ => Err("invalid --metric (use sum|mean)".to_string()),
    }
}

fn name_for_sites(sites: &[u32]) -> String {
    sites
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("+")
}
