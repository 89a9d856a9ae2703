use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use thiserror::Error;

use crate::model::escape::EscapeRow;
use crate::model::params::CalcParams;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("{value} is not a valid value for {param}; valid values are {valid:?}")]
    InvalidParameter {
        param: &'static str,
        value: String,
        valid: Vec<String>,
    },
    #[error("mutation escape strength must be a positive finite number, got {0}")]
    InvalidStrength(f64),
}

/// One scaled measurement: a condition's escape at one site, with the
/// condition-level maximum and the escape scaled by it.
#[derive(Debug, Clone, PartialEq)]
pub struct EscapeRecord {
    pub condition: u32,
    pub virus: String,
    pub site: u32,
    pub escape: f64,
    pub max_escape: f64,
    pub scale_escape: f64,
}

/// The filtered, per-condition-scaled escape data a calculator queries.
///
/// Records are grouped contiguously by condition, conditions in first
/// appearance order and rows in input order within a condition. Nothing
/// mutates the dataset after construction; queries only read it.
#[derive(Debug, Clone, PartialEq)]
pub struct EscapeDataset {
    conditions: Vec<String>,
    records: Vec<EscapeRecord>,
    groups: Vec<Range<usize>>,
    sites: BTreeSet<u32>,
}

impl EscapeDataset {
    /// Filters `rows` by the categorical parameters and scales each surviving
    /// row's escape by its condition's maximum.
    ///
    /// Filters apply in sequence (virus, normalized, metric, lab,
    /// neutralizes_omicron) and each requested value is validated against the
    /// rows surviving the previous filters; a value that no longer occurs
    /// fails with the values that do. `max_escape` is therefore always the
    /// maximum over the rows of the selected variant, never the whole table.
    ///
    /// A condition whose retained rows are all zero gets `scale_escape = 0.0`
    /// for every row: it contributes no escape at any site and always retains
    /// full binding. It still counts as a condition.
    pub fn build(rows: Vec<EscapeRow>, params: &CalcParams) -> Result<Self, DatasetError> {
        let mut rows = rows;
        if let Some(virus) = &params.eliciting_virus {
            rows = filter_category(rows, "virus", virus, |r| Some(r.virus.clone()))?;
        }
        let normalized = params.normalized.to_string();
        rows = filter_category(rows, "normalized", &normalized, |r| {
            r.normalized.map(|b| b.to_string())
        })?;
        rows = filter_category(rows, "metric", params.metric.label(), |r| r.metric.clone())?;
        if let Some(lab) = &params.lab {
            rows = filter_category(rows, "lab", lab, |r| r.lab.clone())?;
        }
        if let Some(neutralizes) = params.neutralizes_omicron {
            let requested = neutralizes.to_string();
            rows = filter_category(rows, "neutralizes_omicron", &requested, |r| {
                r.neutralizes_omicron.map(|b| b.to_string())
            })?;
        }

        // Group rows by condition in first appearance order.
        let n_rows = rows.len();
        let mut condition_ids: HashMap<String, usize> = HashMap::new();
        let mut conditions: Vec<String> = Vec::new();
        let mut grouped: Vec<Vec<(u32, f64, String)>> = Vec::new();
        for row in rows {
            let id = match condition_ids.get(row.condition.as_str()) {
                Some(&id) => id,
                None => {
                    let id = conditions.len();
                    conditions.push(row.condition.clone());
                    condition_ids.insert(row.condition.clone(), id);
                    grouped.push(Vec::new());
                    id
                }
            };
            grouped[id].push((row.site, row.escape, row.virus));
        }

        let mut records = Vec::with_capacity(n_rows);
        let mut groups = Vec::with_capacity(conditions.len());
        let mut sites = BTreeSet::new();
        for (id, group) in grouped.into_iter().enumerate() {
            let mut max_escape = 0.0f64;
            for &(_, escape, _) in &group {
                if escape > max_escape {
                    max_escape = escape;
                }
            }
            let start = records.len();
            for (site, escape, virus) in group {
                let scale_escape = if max_escape == 0.0 {
                    0.0
                } else {
                    escape / max_escape
                };
                sites.insert(site);
                records.push(EscapeRecord {
                    condition: id as u32,
                    virus,
                    site,
                    escape,
                    max_escape,
                    scale_escape,
                });
            }
            groups.push(start..records.len());
        }

        Ok(Self {
            conditions,
            records,
            groups,
            sites,
        })
    }

    /// Condition names, in first appearance order; a record's `condition`
    /// field indexes into this.
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn records(&self) -> &[EscapeRecord] {
        &self.records
    }

    /// Per-condition record ranges, parallel to [`Self::conditions`].
    pub fn groups(&self) -> &[Range<usize>] {
        &self.groups
    }

    /// All sites with escape data; queries may only mutate these.
    pub fn sites(&self) -> &BTreeSet<u32> {
        &self.sites
    }

    pub fn n_conditions(&self) -> usize {
        self.conditions.len()
    }

    pub fn site_range(&self) -> Option<(u32, u32)> {
        match (self.sites.first(), self.sites.last()) {
            (Some(&min), Some(&max)) => Some((min, max)),
            _ => None,
        }
    }
}

/// Keeps the rows whose column value equals `requested`, after checking that
/// `requested` occurs at all among `rows`. Rows where the column is absent
/// never match and never contribute to the valid set.
fn filter_category(
    rows: Vec<EscapeRow>,
    param: &'static str,
    requested: &str,
    value_of: impl Fn(&EscapeRow) -> Option<String>,
) -> Result<Vec<EscapeRow>, DatasetError> {
    let mut valid: BTreeSet<String> = BTreeSet::new();
    for row in &rows {
        if let Some(value) = value_of(row) {
            valid.insert(value);
        }
    }
    if !valid.contains(requested) {
        return Err(DatasetError::InvalidParameter {
            param,
            value: requested.to_string(),
            valid: valid.into_iter().collect(),
        });
    }
    Ok(rows
        .into_iter()
        .filter(|row| value_of(row).as_deref() == Some(requested))
        .collect())
}

#[cfg(test)]
#[path = "../../tests/src_inline/calc/dataset.rs"]
mod tests;
