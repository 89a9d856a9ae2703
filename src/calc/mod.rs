pub mod binding;
pub mod dataset;

pub use binding::{BindingCalculator, InvalidSites, SiteEscape};
pub use dataset::{DatasetError, EscapeDataset, EscapeRecord};
