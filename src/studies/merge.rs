use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::model::escape::EscapeRow;
use crate::model::params::Metric;
use crate::studies::defs::{ConditionType, is_omicron_label};
use crate::studies::loader::LoadedStudy;
use crate::studies::StudyError;

/// One study's citation line for the `studies.csv` report.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyCitation {
    pub study: String,
    pub year: i32,
    pub citation: String,
    pub url: String,
}

/// Merges per-mutation escape from all studies into the per-site calculator table.
///
/// Each condition contributes four row groups: site escape aggregated as the
/// sum and as the mean of its mutation escapes, each both max-normalized to
/// [0, 1] and raw. Antibody cocktails are excluded since their escape is not
/// comparable to single-condition selections.
pub fn merge_studies(studies: &[LoadedStudy]) -> Result<Vec<EscapeRow>, StudyError> {
    let mut owner: HashMap<&str, &str> = HashMap::new();
    for study in studies {
        for condition in study.meta.conditions.keys() {
            if let Some(first) = owner.get(condition.as_str()) {
                return Err(StudyError::DuplicateCondition {
                    condition: condition.clone(),
                    first: (*first).to_string(),
                    second: study.study.clone(),
                });
            }
            owner.insert(condition, &study.study);
        }
    }

    let mut rows = Vec::new();
    for study in studies {
        let mut by_condition: BTreeMap<&str, BTreeMap<u32, (f64, u32)>> = BTreeMap::new();
        for m in &study.mutations {
            let (total, count) = by_condition
                .entry(m.condition.as_str())
                .or_default()
                .entry(m.site)
                .or_insert((0.0, 0));
            *total += m.mut_escape;
            *count += 1;
        }

        for (condition, meta) in &study.meta.conditions {
            if ConditionType::parse(&meta.condition_type) == Some(ConditionType::AntibodyCocktail) {
                continue;
            }
            let Some(sites) = by_condition.get(condition.as_str()) else {
                continue;
            };
            let virus = meta.eliciting_viruses().first().cloned().unwrap_or_default();
            let neutralizes_omicron = meta
                .neutralized_viruses()
                .iter()
                .any(|label| is_omicron_label(label));

            for metric in [Metric::Sum, Metric::Mean] {
                let values: BTreeMap<u32, f64> = sites
                    .iter()
                    .map(|(&site, &(total, count))| {
                        let value = match metric {
                            Metric::Sum => total,
                            Metric::Mean => total / count as f64,
                        };
                        (site, value)
                    })
                    .collect();
                let max = values.values().fold(0.0_f64, |max, &v| if v > max { v } else { max });
                for normalized in [true, false] {
                    for (&site, &value) in &values {
                        let escape = if normalized {
                            if max == 0.0 { 0.0 } else { value / max }
                        } else {
                            value
                        };
                        rows.push(EscapeRow {
                            condition: condition.clone(),
                            virus: virus.clone(),
                            site,
                            escape,
                            normalized: Some(normalized),
                            metric: Some(metric.label().to_string()),
                            lab: Some(study.meta.lab.clone()),
                            neutralizes_omicron: Some(neutralizes_omicron),
                        });
                    }
                }
            }
        }
    }
    Ok(rows)
}

/// Builds one citation per study, disambiguating same author/year/journal
/// groups with `a`, `b`, ... suffixes on the year.
pub fn build_citations(studies: &[LoadedStudy]) -> Vec<StudyCitation> {
    let key = |s: &LoadedStudy| {
        (
            s.meta.study_first_author.clone(),
            s.meta.study_year,
            s.meta.study_journal.clone(),
        )
    };
    let mut counts: HashMap<(String, i32, String), usize> = HashMap::new();
    for study in studies {
        *counts.entry(key(study)).or_insert(0) += 1;
    }

    let mut assigned: HashMap<(String, i32, String), u8> = HashMap::new();
    let mut citations = Vec::with_capacity(studies.len());
    for study in studies {
        let key = key(study);
        let position = assigned.entry(key.clone()).or_insert(0);
        let suffix = if counts[&key] > 1 {
            ((b'a' + *position % 26) as char).to_string()
        } else {
            String::new()
        };
        *position += 1;
        citations.push(StudyCitation {
            study: study.study.clone(),
            year: study.meta.study_year,
            citation: format!(
                "{} et al. {} ({}{})",
                study.meta.study_first_author, study.meta.study_journal, study.meta.study_year, suffix
            ),
            url: study.meta.study_url.clone(),
        });
    }
    citations.sort_by(|a, b| (a.year, &a.citation).cmp(&(b.year, &b.citation)));
    citations
}

pub fn write_escape_table(path: &Path, rows: &[EscapeRow]) -> Result<(), StudyError> {
    let display = path.display().to_string();
    let mut writer = csv::Writer::from_path(path).map_err(|source| StudyError::Csv {
        path: display.clone(),
        source,
    })?;
    for row in rows {
        writer.serialize(row).map_err(|source| StudyError::Csv {
            path: display.clone(),
            source,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_studies_table(path: &Path, citations: &[StudyCitation]) -> Result<(), StudyError> {
    let display = path.display().to_string();
    let mut writer = csv::Writer::from_path(path).map_err(|source| StudyError::Csv {
        path: display.clone(),
        source,
    })?;
    writer
        .write_record(["study", "citation", "url"])
        .map_err(|source| StudyError::Csv {
            path: display.clone(),
            source,
        })?;
    for c in citations {
        writer
            .write_record([&c.study, &c.citation, &c.url])
            .map_err(|source| StudyError::Csv {
                path: display.clone(),
                source,
            })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/studies/merge.rs"]
mod tests;
