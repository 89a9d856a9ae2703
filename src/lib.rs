//! Residual polyclonal antibody binding to the SARS-CoV-2 RBD after site
//! mutations, computed from aggregated deep mutational scanning escape data.
//!
//! [`BindingCalculator`] answers two questions about a set of mutated RBD
//! sites: how much antibody binding is retained across the measured
//! conditions, and how much escape each site still mediates once the
//! mutations are in place.

pub mod calc;
pub mod input;
pub mod model;
pub mod report;
pub mod studies;

pub use calc::{BindingCalculator, DatasetError, EscapeDataset, InvalidSites, SiteEscape};
pub use input::{InputError, read_escape_table};
pub use model::params::{CalcParams, Metric};
