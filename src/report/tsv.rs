use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::calc::SiteEscape;
use crate::report::{QueryResult, format_f64_6};

pub fn write_binding_tsv(path: &Path, queries: &[QueryResult]) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "{}", ["name", "sites", "binding_retained"].join("\t"))?;
    for query in queries {
        let sites = query
            .sites
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(";");
        writeln!(
            w,
            "{}\t{}\t{}",
            query.name,
            sites,
            format_f64_6(query.binding_retained)
        )?;
    }
    w.flush()
}

pub fn write_escape_per_site_tsv(path: &Path, per_site: &[SiteEscape]) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(
        w,
        "{}",
        ["site", "original_escape", "retained_escape"].join("\t")
    )?;
    for entry in per_site {
        writeln!(
            w,
            "{}\t{}\t{}",
            entry.site,
            format_f64_6(entry.original_escape),
            format_f64_6(entry.retained_escape)
        )?;
    }
    w.flush()
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/tsv.rs"]
mod tests;
