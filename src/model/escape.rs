use serde::{Deserialize, Serialize};

/// One row of the processed escape table.
///
/// `condition` identifies one antibody or serum sample, `site` is an RBD
/// residue position and `escape` the measured escape magnitude at that site
/// under the row's metric/normalization variant. The optional columns exist
/// only so the corresponding filters can be applied; rows from tables that
/// lack them carry `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeRow {
    pub condition: String,
    pub virus: String,
    pub site: u32,
    pub escape: f64,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub normalized: Option<bool>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub lab: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub neutralizes_omicron: Option<bool>,
}

/// Accepts `true`/`false` in any capitalisation plus `1`/`0`. The published
/// reference tables come out of a pandas pipeline that writes `True`/`False`.
fn flexible_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(serde::de::Error::custom(format!(
                "invalid boolean value `{value}`"
            ))),
        },
    }
}
