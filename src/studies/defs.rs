pub const VALID_LABS: &[&str] = &["Bloom_JD", "Xie_XS"];

/// Assumed when a condition's `eliciting_virus` list is absent.
pub const DEFAULT_ELICITING_VIRUS: &[&str] = &["SARS-CoV-2", "pre-Omicron SARS-CoV-2"];

/// Assumed when a condition's `known_to_neutralize` list is absent.
pub const DEFAULT_NEUTRALIZED_VIRUS: &[&str] = &["Wuhan-Hu-1"];

pub const YEAR_MIN: i32 = 2000;
pub const YEAR_MAX: i32 = 2030;

const ANTIBODY_SUBTYPES: &[&str] = &["class 1", "class 2", "class 3", "class 4"];
const COCKTAIL_SUBTYPES: &[&str] = &["none"];
const SERUM_SUBTYPES: &[&str] = &[
    "convalescent serum",
    "Moderna vaccine serum",
    "Pfizer vaccine serum",
    "B.1.351 convalescent plasma",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    Antibody,
    AntibodyCocktail,
    Serum,
}

impl ConditionType {
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "antibody" => Some(ConditionType::Antibody),
            "antibody cocktail" => Some(ConditionType::AntibodyCocktail),
            "serum" => Some(ConditionType::Serum),
            _ => None,
        }
    }

    pub fn valid_subtypes(self) -> &'static [&'static str] {
        match self {
            ConditionType::Antibody => ANTIBODY_SUBTYPES,
            ConditionType::AntibodyCocktail => COCKTAIL_SUBTYPES,
            ConditionType::Serum => SERUM_SUBTYPES,
        }
    }
}

pub fn valid_year(year: i32) -> bool {
    (YEAR_MIN..=YEAR_MAX).contains(&year)
}

/// Whether a neutralized-virus label names an Omicron-lineage virus.
pub fn is_omicron_label(label: &str) -> bool {
    label.starts_with("BA.") || label.contains("Omicron")
}
