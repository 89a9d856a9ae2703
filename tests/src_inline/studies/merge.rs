use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{build_citations, merge_studies, write_escape_table};
use crate::model::escape::EscapeRow;
use crate::model::params::Metric;
use crate::studies::StudyError;
use crate::studies::loader::{ConditionMeta, LoadedStudy, MutationRow, StudyMeta};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("polybind_merge_test_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn condition(kind: &str, subtype: &str) -> ConditionMeta {
    ConditionMeta {
        condition_type: kind.to_string(),
        subtype: subtype.to_string(),
        year: 2021,
        alias: None,
        eliciting_virus: None,
        known_to_neutralize: None,
    }
}

fn mutation(condition: &str, site: u32, mutation_aa: &str, mut_escape: f64) -> MutationRow {
    MutationRow {
        condition: condition.to_string(),
        site,
        wildtype: "E".to_string(),
        mutation: mutation_aa.to_string(),
        mut_escape,
    }
}

fn study(
    name: &str,
    author: &str,
    year: i32,
    journal: &str,
    conditions: Vec<(&str, ConditionMeta)>,
    mutations: Vec<MutationRow>,
) -> LoadedStudy {
    LoadedStudy {
        study: name.to_string(),
        meta: StudyMeta {
            study_title: format!("{author} {year}"),
            study_first_author: author.to_string(),
            study_year: year,
            study_journal: journal.to_string(),
            study_url: format!("https://example.org/{name}"),
            lab: "Bloom_JD".to_string(),
            conditions: conditions
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            notes: None,
        },
        mutations,
    }
}

#[test]
fn test_merge_aggregates_sum_and_mean() {
    let studies = vec![study(
        "2021_Starr_maps",
        "Starr",
        2021,
        "Nature",
        vec![("mAb-1", condition("antibody", "class 2"))],
        vec![
            mutation("mAb-1", 484, "K", 1.0),
            mutation("mAb-1", 484, "Q", 0.5),
            mutation("mAb-1", 417, "N", 0.75),
        ],
    )];

    let rows = merge_studies(&studies).unwrap();
    // 2 sites x {sum, mean} x {normalized, raw}.
    assert_eq!(rows.len(), 8);
    assert_eq!(
        rows[0],
        EscapeRow {
            condition: "mAb-1".to_string(),
            virus: "SARS-CoV-2".to_string(),
            site: 417,
            escape: 0.5,
            normalized: Some(true),
            metric: Some(Metric::Sum.label().to_string()),
            lab: Some("Bloom_JD".to_string()),
            neutralizes_omicron: Some(false),
        }
    );

    let escape_of = |normalized: bool, metric: Metric, site: u32| {
        rows.iter()
            .find(|r| {
                r.normalized == Some(normalized)
                    && r.metric.as_deref() == Some(metric.label())
                    && r.site == site
            })
            .unwrap()
            .escape
    };
    // Sum at 484 is 1.5 raw, the condition max, so 1.0 normalized.
    assert_eq!(escape_of(false, Metric::Sum, 484), 1.5);
    assert_eq!(escape_of(true, Metric::Sum, 484), 1.0);
    assert_eq!(escape_of(true, Metric::Sum, 417), 0.5);
    // Means: 484 averages to 0.75, matching 417's single mutation.
    assert_eq!(escape_of(false, Metric::Mean, 484), 0.75);
    assert_eq!(escape_of(true, Metric::Mean, 484), 1.0);
    assert_eq!(escape_of(true, Metric::Mean, 417), 1.0);
}

#[test]
fn test_merge_excludes_cocktails() {
    let studies = vec![study(
        "2021_Starr_maps",
        "Starr",
        2021,
        "Nature",
        vec![
            ("mAb-1", condition("antibody", "class 1")),
            ("REGN-mix", condition("antibody cocktail", "none")),
        ],
        vec![
            mutation("mAb-1", 484, "K", 1.0),
            mutation("REGN-mix", 484, "K", 0.5),
        ],
    )];

    let rows = merge_studies(&studies).unwrap();
    let conditions: BTreeSet<&str> = rows.iter().map(|r| r.condition.as_str()).collect();
    assert_eq!(conditions, BTreeSet::from(["mAb-1"]));
}

#[test]
fn test_merge_rejects_duplicate_condition_across_studies() {
    let studies = vec![
        study(
            "2021_Starr_maps",
            "Starr",
            2021,
            "Nature",
            vec![("mAb-1", condition("antibody", "class 1"))],
            vec![mutation("mAb-1", 484, "K", 1.0)],
        ),
        study(
            "2022_Greaney_sera",
            "Greaney",
            2022,
            "Cell",
            vec![("mAb-1", condition("antibody", "class 2"))],
            vec![mutation("mAb-1", 417, "N", 1.0)],
        ),
    ];

    let err = merge_studies(&studies).unwrap_err();
    match err {
        StudyError::DuplicateCondition {
            condition,
            first,
            second,
        } => {
            assert_eq!(condition, "mAb-1");
            assert_eq!(first, "2021_Starr_maps");
            assert_eq!(second, "2022_Greaney_sera");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_merge_derives_virus_and_omicron_flag() {
    let mut cov1 = condition("antibody", "class 3");
    cov1.eliciting_virus = Some(vec!["SARS-CoV-1".to_string()]);
    let mut neutralizer = condition("serum", "convalescent serum");
    neutralizer.known_to_neutralize = Some(vec![("BA.1".to_string(), 0.4)]);

    let studies = vec![study(
        "2021_Starr_maps",
        "Starr",
        2021,
        "Nature",
        vec![("mAb-1", cov1), ("serum-2", neutralizer)],
        vec![
            mutation("mAb-1", 484, "K", 1.0),
            mutation("serum-2", 417, "N", 1.0),
        ],
    )];

    let rows = merge_studies(&studies).unwrap();
    let mab_row = rows.iter().find(|r| r.condition == "mAb-1").unwrap();
    assert_eq!(mab_row.virus, "SARS-CoV-1");
    assert_eq!(mab_row.neutralizes_omicron, Some(false));
    let serum_row = rows.iter().find(|r| r.condition == "serum-2").unwrap();
    assert_eq!(serum_row.virus, "SARS-CoV-2");
    assert_eq!(serum_row.neutralizes_omicron, Some(true));
}

#[test]
fn test_citations_disambiguate_same_author_year() {
    let starr = |name: &str, cond: &str| {
        study(
            name,
            "Starr",
            2021,
            "Nature",
            vec![(cond, condition("antibody", "class 1"))],
            vec![mutation(cond, 484, "K", 1.0)],
        )
    };
    let studies = vec![
        starr("2021_Starr_mabs", "mAb-1"),
        starr("2021_Starr_sera", "serum-2"),
        study(
            "2020_Greaney_maps",
            "Greaney",
            2020,
            "Cell",
            vec![("mAb-3", condition("antibody", "class 2"))],
            vec![mutation("mAb-3", 417, "N", 1.0)],
        ),
    ];

    let citations = build_citations(&studies);
    assert_eq!(citations.len(), 3);
    assert_eq!(citations[0].citation, "Greaney et al. Cell (2020)");
    assert_eq!(citations[1].study, "2021_Starr_mabs");
    assert_eq!(citations[1].citation, "Starr et al. Nature (2021a)");
    assert_eq!(citations[2].citation, "Starr et al. Nature (2021b)");
    assert_eq!(citations[0].url, "https://example.org/2020_Greaney_maps");
}

#[test]
fn test_escape_table_feeds_the_calculator_reader() {
    let studies = vec![study(
        "2021_Starr_maps",
        "Starr",
        2021,
        "Nature",
        vec![("mAb-1", condition("antibody", "class 1"))],
        vec![
            mutation("mAb-1", 484, "K", 1.0),
            mutation("mAb-1", 417, "N", 0.25),
        ],
    )];
    let rows = merge_studies(&studies).unwrap();

    let dir = make_temp_dir();
    let path = dir.join("escape_calculator_data.csv");
    write_escape_table(&path, &rows).unwrap();

    let read_back = crate::input::read_escape_table(&path).unwrap();
    assert_eq!(read_back.len(), rows.len());
    assert_eq!(read_back[0], rows[0]);
}
