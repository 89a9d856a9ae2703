/// Which site-level escape metric to select from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Sum,
    Mean,
}

impl Metric {
    /// The literal `metric` column value for this variant.
    pub fn label(self) -> &'static str {
        match self {
            Metric::Sum => "sum of mutations at site",
            Metric::Mean => "mean of mutations at site",
        }
    }
}

/// Construction parameters for a [`crate::calc::BindingCalculator`].
///
/// The categorical fields select one variant of the escape table; each is
/// validated against the rows surviving the preceding filters, in the order
/// virus, normalized, metric, lab, neutralizes_omicron. `eliciting_virus =
/// None` keeps antibodies elicited by every virus. `mutation_escape_strength`
/// is the exponent applied to each condition's retained-binding product;
/// larger values penalize partial escape more steeply.
#[derive(Debug, Clone)]
pub struct CalcParams {
    pub eliciting_virus: Option<String>,
    pub normalized: bool,
    pub metric: Metric,
    pub lab: Option<String>,
    pub neutralizes_omicron: Option<bool>,
    pub mutation_escape_strength: f64,
}

impl Default for CalcParams {
    fn default() -> Self {
        Self {
            eliciting_virus: Some("SARS-CoV-2".to_string()),
            normalized: true,
            metric: Metric::Sum,
            lab: None,
            neutralizes_omicron: None,
            mutation_escape_strength: 2.0,
        }
    }
}
