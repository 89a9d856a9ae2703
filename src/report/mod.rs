//! Report writers for calculator runs: TSV tables plus a JSON run summary.

pub mod json;
pub mod tsv;

use std::path::Path;

use serde::Serialize;

use crate::calc::{BindingCalculator, SiteEscape};
use crate::model::params::CalcParams;

/// One evaluated site set and the binding it leaves intact.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub name: String,
    pub sites: Vec<u32>,
    pub binding_retained: f64,
}

/// Everything the writers need for one run.
pub struct ReportInput<'a> {
    pub calculator: &'a BindingCalculator,
    pub params: &'a CalcParams,
    pub data_path: &'a str,
    pub queries: &'a [QueryResult],
    pub per_site: Option<&'a [SiteEscape]>,
}

pub fn format_f64_6(value: f64) -> String {
    format!("{value:.6}")
}

pub fn write_reports(out_dir: &Path, input: &ReportInput<'_>) -> std::io::Result<()> {
    std::fs::create_dir_all(out_dir)?;
    if !input.queries.is_empty() {
        tsv::write_binding_tsv(&out_dir.join("binding.tsv"), input.queries)?;
    }
    if let Some(per_site) = input.per_site {
        tsv::write_escape_per_site_tsv(&out_dir.join("escape_per_site.tsv"), per_site)?;
    }
    json::write_summary_json(&out_dir.join("summary.json"), input)?;
    tracing::info!("wrote reports to {}", out_dir.display());
    Ok(())
}
