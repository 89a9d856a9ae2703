use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::report::{QueryResult, ReportInput};

/// Serialized shape of `summary.json`.
#[derive(Debug, Serialize)]
struct Summary<'a> {
    tool: &'static str,
    version: &'static str,
    data: &'a str,
    virus: &'a str,
    metric: &'static str,
    normalized: bool,
    lab: Option<&'a str>,
    neutralizes_omicron: Option<bool>,
    mutation_escape_strength: f64,
    n_conditions: usize,
    n_sites: usize,
    site_min: Option<u32>,
    site_max: Option<u32>,
    queries: &'a [QueryResult],
}

pub fn write_summary_json(path: &Path, input: &ReportInput<'_>) -> std::io::Result<()> {
    let calculator = input.calculator;
    let params = input.params;
    let (site_min, site_max) = match calculator.dataset().site_range() {
        Some((lo, hi)) => (Some(lo), Some(hi)),
        None => (None, None),
    };
    let summary = Summary {
        tool: "polybind",
        version: env!("CARGO_PKG_VERSION"),
        data: input.data_path,
        virus: params.eliciting_virus.as_deref().unwrap_or("all"),
        metric: params.metric.label(),
        normalized: params.normalized,
        lab: params.lab.as_deref(),
        neutralizes_omicron: params.neutralizes_omicron,
        mutation_escape_strength: params.mutation_escape_strength,
        n_conditions: calculator.n_conditions(),
        n_sites: calculator.sites().len(),
        site_min,
        site_max,
        queries: input.queries,
    };
    let mut w = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut w, &summary)?;
    writeln!(w)?;
    w.flush()
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/json.rs"]
mod tests;
