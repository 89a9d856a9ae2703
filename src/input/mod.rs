use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use thiserror::Error;

use crate::model::escape::EscapeRow;

/// Columns the processed escape table must carry. The optional filter columns
/// (`metric`, `lab`, `neutralizes_omicron`) are not required here; a filter
/// requested against an absent column fails at dataset construction instead.
pub const REQUIRED_COLUMNS: [&str; 5] = ["condition", "virus", "site", "normalized", "escape"];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{path}: missing required columns: {}", .missing.join(", "))]
    MissingColumns { path: String, missing: Vec<String> },
    #[error("{path} row {row}: {msg}")]
    InvalidRow {
        path: String,
        row: usize,
        msg: String,
    },
}

/// Opens `path`, transparently decompressing when the extension is `.gz`.
pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>, InputError> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Reads the processed escape table, validating the header against
/// [`REQUIRED_COLUMNS`] and rejecting rows with an empty condition or a
/// negative or non-finite escape value.
pub fn read_escape_table(path: &Path) -> Result<Vec<EscapeRow>, InputError> {
    let display_path = path.display().to_string();
    let reader = open_maybe_gz(path)?;
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|source| InputError::Csv {
            path: display_path.clone(),
            source,
        })?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(InputError::MissingColumns {
            path: display_path,
            missing,
        });
    }

    let mut rows = Vec::new();
    for (idx, result) in csv_reader.deserialize::<EscapeRow>().enumerate() {
        let row = result.map_err(|source| InputError::Csv {
            path: display_path.clone(),
            source,
        })?;
        let row_no = idx + 1;
        if row.condition.is_empty() {
            return Err(InputError::InvalidRow {
                path: display_path,
                row: row_no,
                msg: "empty condition".to_string(),
            });
        }
        if !row.escape.is_finite() || row.escape < 0.0 {
            return Err(InputError::InvalidRow {
                path: display_path,
                row: row_no,
                msg: format!("escape must be a non-negative number, got {}", row.escape),
            });
        }
        rows.push(row);
    }

    tracing::info!("read {} escape rows from {}", rows.len(), display_path);
    Ok(rows)
}

/// One named mutation set from a variants table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDef {
    pub variant: String,
    pub sites: Vec<u32>,
}

/// Reads a variants table with columns `variant` and `sites`, where `sites`
/// holds a `;`-separated list of residue positions (empty for no mutations).
pub fn read_variants_table(path: &Path) -> Result<Vec<VariantDef>, InputError> {
    let display_path = path.display().to_string();
    let reader = open_maybe_gz(path)?;
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|source| InputError::Csv {
            path: display_path.clone(),
            source,
        })?
        .clone();
    let variant_idx = headers.iter().position(|h| h == "variant");
    let sites_idx = headers.iter().position(|h| h == "sites");
    let (variant_idx, sites_idx) = match (variant_idx, sites_idx) {
        (Some(v), Some(s)) => (v, s),
        _ => {
            let missing = [("variant", variant_idx), ("sites", sites_idx)]
                .iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| name.to_string())
                .collect();
            return Err(InputError::MissingColumns {
                path: display_path,
                missing,
            });
        }
    };

    let mut variants = Vec::new();
    for (idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|source| InputError::Csv {
            path: display_path.clone(),
            source,
        })?;
        let row_no = idx + 1;
        let variant = record.get(variant_idx).unwrap_or("").trim().to_string();
        if variant.is_empty() {
            return Err(InputError::InvalidRow {
                path: display_path,
                row: row_no,
                msg: "empty variant name".to_string(),
            });
        }
        let mut sites = Vec::new();
        for token in record
            .get(sites_idx)
            .unwrap_or("")
            .split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let site = token.parse::<u32>().map_err(|_| InputError::InvalidRow {
                path: display_path.clone(),
                row: row_no,
                msg: format!("invalid site `{token}`"),
            })?;
            sites.push(site);
        }
        variants.push(VariantDef { variant, sites });
    }

    tracing::info!("read {} variants from {}", variants.len(), display_path);
    Ok(variants)
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/table.rs"]
mod tests;
