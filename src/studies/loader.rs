use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::studies::defs::{
    ConditionType, DEFAULT_ELICITING_VIRUS, DEFAULT_NEUTRALIZED_VIRUS, VALID_LABS, valid_year,
};
use crate::studies::StudyError;

const MUTATION_COLUMNS: [&str; 5] = ["condition", "site", "wildtype", "mutation", "mut_escape"];

/// Parsed `study.yml` for one study directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyMeta {
    pub study_title: String,
    pub study_first_author: String,
    pub study_year: i32,
    pub study_journal: String,
    pub study_url: String,
    pub lab: String,
    pub conditions: BTreeMap<String, ConditionMeta>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionMeta {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub subtype: String,
    pub year: i32,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub eliciting_virus: Option<Vec<String>>,
    #[serde(default)]
    pub known_to_neutralize: Option<Vec<(String, f64)>>,
}

impl ConditionMeta {
    pub fn eliciting_viruses(&self) -> Vec<String> {
        match &self.eliciting_virus {
            Some(viruses) => viruses.clone(),
            None => DEFAULT_ELICITING_VIRUS.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn neutralized_viruses(&self) -> Vec<String> {
        match &self.known_to_neutralize {
            Some(pairs) => pairs.iter().map(|(label, _)| label.clone()).collect(),
            None => DEFAULT_NEUTRALIZED_VIRUS.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// One row of a study's `data.csv`: escape for a single amino-acid mutation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MutationRow {
    pub condition: String,
    pub site: u32,
    pub wildtype: String,
    pub mutation: String,
    pub mut_escape: f64,
}

#[derive(Debug, Clone)]
pub struct LoadedStudy {
    pub study: String,
    pub meta: StudyMeta,
    /// Mutation rows with zero-escape measurements already dropped.
    pub mutations: Vec<MutationRow>,
}

/// Reads and validates one study directory (`study.yml` plus `data.csv`).
pub fn load_study(dir: &Path, study: &str) -> Result<LoadedStudy, StudyError> {
    let yml_path = dir.join("study.yml");
    let csv_path = dir.join("data.csv");
    for path in [&yml_path, &csv_path] {
        if !path.is_file() {
            return Err(StudyError::MissingFile(path.display().to_string()));
        }
    }

    let file = File::open(&yml_path)?;
    let meta: StudyMeta = serde_yaml::from_reader(file).map_err(|source| StudyError::Yaml {
        path: yml_path.display().to_string(),
        source,
    })?;
    validate_meta(study, &meta)?;

    let mutations = read_mutations(&csv_path, study)?;

    let meta_conditions: BTreeSet<&str> = meta.conditions.keys().map(String::as_str).collect();
    let data_conditions: BTreeSet<&str> = mutations.iter().map(|m| m.condition.as_str()).collect();
    if meta_conditions != data_conditions {
        let differing: Vec<String> = meta_conditions
            .symmetric_difference(&data_conditions)
            .map(|c| c.to_string())
            .collect();
        return Err(StudyError::ConditionMismatch {
            study: study.to_string(),
            differing,
        });
    }

    let mut seen: BTreeSet<(&str, u32, &str)> = BTreeSet::new();
    for m in &mutations {
        if !seen.insert((m.condition.as_str(), m.site, m.mutation.as_str())) {
            return Err(StudyError::DuplicateMutation {
                study: study.to_string(),
                condition: m.condition.clone(),
                site: m.site,
                mutation: m.mutation.clone(),
            });
        }
    }

    Ok(LoadedStudy {
        study: study.to_string(),
        meta,
        mutations,
    })
}

fn validate_meta(study: &str, meta: &StudyMeta) -> Result<(), StudyError> {
    if !VALID_LABS.contains(&meta.lab.as_str()) {
        return Err(StudyError::InvalidLab {
            study: study.to_string(),
            lab: meta.lab.clone(),
        });
    }
    if !valid_year(meta.study_year) {
        return Err(StudyError::InvalidYear {
            study: study.to_string(),
            year: meta.study_year,
        });
    }
    for (condition, cond) in &meta.conditions {
        validate_condition(cond).map_err(|msg| StudyError::InvalidCondition {
            study: study.to_string(),
            condition: condition.clone(),
            msg,
        })?;
    }
    Ok(())
}

fn validate_condition(cond: &ConditionMeta) -> Result<(), String> {
    let Some(kind) = ConditionType::parse(&cond.condition_type) else {
        return Err(format!("invalid type `{}`", cond.condition_type));
    };
    if !kind.valid_subtypes().contains(&cond.subtype.as_str()) {
        return Err(format!(
            "invalid subtype `{}` for type `{}`",
            cond.subtype, cond.condition_type
        ));
    }
    if !valid_year(cond.year) {
        return Err(format!("invalid year {}", cond.year));
    }
    let viruses = cond.eliciting_viruses();
    let has_cov1 = viruses.iter().any(|v| v.contains("SARS-CoV-1"));
    let has_cov2 = viruses.iter().any(|v| v == "SARS-CoV-2");
    if has_cov1 && has_cov2 {
        return Err("eliciting_virus lists both SARS-CoV-2 and SARS-CoV-1".to_string());
    }
    if !has_cov1 && !has_cov2 {
        return Err("eliciting_virus must include SARS-CoV-2 or SARS-CoV-1".to_string());
    }
    if let Some(pairs) = &cond.known_to_neutralize {
        for (label, ic50) in pairs {
            if label == "any" {
                return Err("known_to_neutralize label `any` is reserved".to_string());
            }
            if !ic50.is_finite() || *ic50 < 0.0 {
                return Err(format!("invalid IC50 {ic50} for `{label}`"));
            }
        }
    }
    Ok(())
}

fn read_mutations(path: &Path, study: &str) -> Result<Vec<MutationRow>, StudyError> {
    let display = path.display().to_string();
    let mut reader = csv::Reader::from_path(path).map_err(|source| StudyError::Csv {
        path: display.clone(),
        source,
    })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| StudyError::Csv {
            path: display.clone(),
            source,
        })?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let missing: Vec<String> = MUTATION_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(StudyError::MissingColumns {
            path: display,
            missing,
        });
    }

    let mut mutations = Vec::new();
    for (idx, record) in reader.deserialize::<MutationRow>().enumerate() {
        let row = record.map_err(|source| StudyError::Csv {
            path: display.clone(),
            source,
        })?;
        if !row.mut_escape.is_finite() || row.mut_escape < 0.0 {
            return Err(StudyError::InvalidValue {
                study: study.to_string(),
                row: idx + 1,
                msg: format!("mut_escape {} is not a finite non-negative number", row.mut_escape),
            });
        }
        if row.condition.is_empty() {
            return Err(StudyError::InvalidValue {
                study: study.to_string(),
                row: idx + 1,
                msg: "empty condition".to_string(),
            });
        }
        // Zero-escape measurements carry no signal and are dropped here, before
        // the condition sets of study.yml and data.csv are compared.
        if row.mut_escape > 0.0 {
            mutations.push(row);
        }
    }
    Ok(mutations)
}

#[cfg(test)]
#[path = "../../tests/src_inline/studies/loader.rs"]
mod tests;
