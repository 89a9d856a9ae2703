//! Raw study ingestion: per-study `study.yml` + `data.csv` directories are
//! validated and merged into the per-site escape table the calculator reads.

pub mod defs;
pub mod loader;
pub mod merge;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use loader::{ConditionMeta, LoadedStudy, MutationRow, StudyMeta, load_study};
pub use merge::{StudyCitation, build_citations, merge_studies};

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("missing file {0}")]
    MissingFile(String),
    #[error("no study directories under {0}")]
    NoStudies(String),
    #[error("{study}: invalid lab `{lab}`")]
    InvalidLab { study: String, lab: String },
    #[error("{study}: invalid study_year {year}")]
    InvalidYear { study: String, year: i32 },
    #[error("{study}: condition `{condition}`: {msg}")]
    InvalidCondition {
        study: String,
        condition: String,
        msg: String,
    },
    #[error("{path}: missing required columns: {}", .missing.join(", "))]
    MissingColumns { path: String, missing: Vec<String> },
    #[error("{study}: conditions in study.yml do not match data.csv: {}", .differing.join(", "))]
    ConditionMismatch { study: String, differing: Vec<String> },
    #[error("{study}: duplicate row for condition `{condition}` site {site} mutation `{mutation}`")]
    DuplicateMutation {
        study: String,
        condition: String,
        site: u32,
        mutation: String,
    },
    #[error("{study} data.csv row {row}: {msg}")]
    InvalidValue {
        study: String,
        row: usize,
        msg: String,
    },
    #[error("study directory {dir} should start with {prefix}")]
    BadDirectoryName { dir: String, prefix: String },
    #[error("condition `{condition}` appears in both {first} and {second}")]
    DuplicateCondition {
        condition: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Clone)]
pub struct ProcessSummary {
    pub n_studies: usize,
    pub n_conditions: usize,
    pub n_rows: usize,
    pub escape_table: PathBuf,
    pub studies_table: PathBuf,
}

/// Loads every study directory under `data_dir` and writes the merged
/// `escape_calculator_data.csv` and `studies.csv` into `out_dir`.
pub fn process_studies(data_dir: &Path, out_dir: &Path) -> Result<ProcessSummary, StudyError> {
    let mut subdirs: Vec<(String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        subdirs.push((name, entry.path()));
    }
    subdirs.sort();
    if subdirs.is_empty() {
        return Err(StudyError::NoStudies(data_dir.display().to_string()));
    }

    let mut studies = Vec::with_capacity(subdirs.len());
    for (name, path) in &subdirs {
        let study = load_study(path, name)?;
        let prefix = format!(
            "{}_{}_",
            study.meta.study_year, study.meta.study_first_author
        );
        if !name.starts_with(&prefix) {
            return Err(StudyError::BadDirectoryName {
                dir: name.clone(),
                prefix,
            });
        }
        tracing::info!(
            "{}: {} conditions, {} mutation rows",
            name,
            study.meta.conditions.len(),
            study.mutations.len()
        );
        studies.push(study);
    }

    let rows = merge_studies(&studies)?;
    let citations = build_citations(&studies);

    fs::create_dir_all(out_dir)?;
    let escape_table = out_dir.join("escape_calculator_data.csv");
    merge::write_escape_table(&escape_table, &rows)?;
    let studies_table = out_dir.join("studies.csv");
    merge::write_studies_table(&studies_table, &citations)?;

    let n_conditions = rows
        .iter()
        .map(|r| r.condition.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    tracing::info!(
        "wrote {} escape rows for {} conditions to {}",
        rows.len(),
        n_conditions,
        escape_table.display()
    );

    Ok(ProcessSummary {
        n_studies: studies.len(),
        n_conditions,
        n_rows: rows.len(),
        escape_table,
        studies_table,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/studies/process.rs"]
mod tests;
