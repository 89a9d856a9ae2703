use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::calc::dataset::{DatasetError, EscapeDataset};
use crate::model::escape::EscapeRow;
use crate::model::params::CalcParams;

/// A query named sites with no escape data. The offending sites are listed
/// in ascending order; the calculator stays usable for later queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid sites: {sites:?}")]
pub struct InvalidSites {
    pub sites: Vec<u32>,
}

/// Escape signal at one site before and after a mutation set, averaged over
/// conditions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SiteEscape {
    pub site: u32,
    pub original_escape: f64,
    pub retained_escape: f64,
}

/// Computes residual polyclonal antibody binding after site mutations.
///
/// For a mutation set M, each condition retains `Π (1 − scale_escape)` over
/// its mutated sites, raised to the escape-strength exponent; the population
/// answer averages that factor over all conditions. Queries are pure reads of
/// the dataset built at construction, so a shared calculator can serve
/// concurrent callers.
#[derive(Debug, Clone)]
pub struct BindingCalculator {
    dataset: EscapeDataset,
    mutation_escape_strength: f64,
}

impl BindingCalculator {
    /// Builds the filtered, scaled dataset from `rows` and readies it for
    /// queries. Fails when `mutation_escape_strength` is not a positive
    /// finite number or when a categorical filter value does not occur in the
    /// rows surviving the preceding filters.
    pub fn from_rows(rows: Vec<EscapeRow>, params: &CalcParams) -> Result<Self, DatasetError> {
        let strength = params.mutation_escape_strength;
        if !strength.is_finite() || strength <= 0.0 {
            return Err(DatasetError::InvalidStrength(strength));
        }
        let dataset = EscapeDataset::build(rows, params)?;
        Ok(Self {
            dataset,
            mutation_escape_strength: strength,
        })
    }

    pub fn dataset(&self) -> &EscapeDataset {
        &self.dataset
    }

    pub fn sites(&self) -> &BTreeSet<u32> {
        self.dataset.sites()
    }

    pub fn n_conditions(&self) -> usize {
        self.dataset.n_conditions()
    }

    pub fn mutation_escape_strength(&self) -> f64 {
        self.mutation_escape_strength
    }

    /// Fraction of polyclonal binding retained after mutating
    /// `mutated_sites`. An empty set retains exactly 1.0; adding sites never
    /// increases the result.
    pub fn binding_retained(&self, mutated_sites: &[u32]) -> Result<f64, InvalidSites> {
        let mutated = self.check_sites(mutated_sites)?;
        let mut sum = 0.0f64;
        for factor in self.cond_escape_factors(&mutated) {
            sum += factor;
        }
        Ok(sum / self.dataset.n_conditions() as f64)
    }

    /// Escape at every site before and after mutating `mutated_sites`: each
    /// condition's surviving factor is broadcast onto its raw escape values,
    /// then both columns are summed per site and divided by the condition
    /// count. Sites ascend; sites absent from the data never appear.
    pub fn escape_per_site(&self, mutated_sites: &[u32]) -> Result<Vec<SiteEscape>, InvalidSites> {
        let mutated = self.check_sites(mutated_sites)?;
        let records = self.dataset.records();
        let mut per_site: BTreeMap<u32, (f64, f64)> = BTreeMap::new();
        for (group, factor) in self
            .dataset
            .groups()
            .iter()
            .zip(self.cond_escape_factors(&mutated))
        {
            for record in &records[group.clone()] {
                let entry = per_site.entry(record.site).or_insert((0.0, 0.0));
                entry.0 += record.escape;
                entry.1 += factor * record.escape;
            }
        }
        let n_conditions = self.dataset.n_conditions() as f64;
        Ok(per_site
            .into_iter()
            .map(|(site, (original, retained))| SiteEscape {
                site,
                original_escape: original / n_conditions,
                retained_escape: retained / n_conditions,
            })
            .collect())
    }

    fn check_sites(&self, mutated_sites: &[u32]) -> Result<BTreeSet<u32>, InvalidSites> {
        let requested: BTreeSet<u32> = mutated_sites.iter().copied().collect();
        let unknown: Vec<u32> = requested
            .difference(self.dataset.sites())
            .copied()
            .collect();
        if !unknown.is_empty() {
            return Err(InvalidSites { sites: unknown });
        }
        Ok(requested)
    }

    /// `cond_bind_retain(c)^s` for every condition, in condition order.
    fn cond_escape_factors(&self, mutated: &BTreeSet<u32>) -> Vec<f64> {
        let records = self.dataset.records();
        self.dataset
            .groups()
            .iter()
            .map(|group| {
                let mut retain = 1.0f64;
                for record in &records[group.clone()] {
                    if mutated.contains(&record.site) {
                        retain *= 1.0 - record.scale_escape;
                    }
                }
                retain.powf(self.mutation_escape_strength)
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/calc/binding.rs"]
mod tests;
