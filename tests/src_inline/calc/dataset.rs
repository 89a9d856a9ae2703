use super::{DatasetError, EscapeDataset};
use crate::model::escape::EscapeRow;
use crate::model::params::{CalcParams, Metric};

fn row(condition: &str, site: u32, escape: f64) -> EscapeRow {
    EscapeRow {
        condition: condition.to_string(),
        virus: "SARS-CoV-2".to_string(),
        site,
        escape,
        normalized: Some(true),
        metric: Some(Metric::Sum.label().to_string()),
        lab: Some("Bloom_JD".to_string()),
        neutralizes_omicron: Some(false),
    }
}

#[test]
fn test_build_scales_each_condition_by_its_max() {
    let rows = vec![
        row("X", 1, 1.5),
        row("X", 2, 3.0),
        row("Y", 2, 2.0),
        row("Y", 3, 4.0),
    ];
    let dataset = EscapeDataset::build(rows, &CalcParams::default()).unwrap();

    assert_eq!(dataset.conditions(), ["X".to_string(), "Y".to_string()]);
    assert_eq!(dataset.groups(), [0..2, 2..4]);
    let records = dataset.records();
    assert_eq!(records[0].virus, "SARS-CoV-2");
    assert_eq!(records[0].max_escape, 3.0);
    assert_eq!(records[0].scale_escape, 0.5);
    assert_eq!(records[1].scale_escape, 1.0);
    assert_eq!(records[2].max_escape, 4.0);
    assert_eq!(records[2].scale_escape, 0.5);
    assert_eq!(records[3].escape, 4.0);
    assert_eq!(dataset.n_conditions(), 2);
    assert_eq!(dataset.site_range(), Some((1, 3)));
}

#[test]
fn test_all_zero_condition_scales_to_zero_and_still_counts() {
    let rows = vec![row("X", 1, 0.0), row("X", 2, 0.0), row("Y", 2, 1.0)];
    let dataset = EscapeDataset::build(rows, &CalcParams::default()).unwrap();

    assert_eq!(dataset.n_conditions(), 2);
    let records = dataset.records();
    assert_eq!(records[0].max_escape, 0.0);
    assert_eq!(records[0].scale_escape, 0.0);
    assert_eq!(records[1].scale_escape, 0.0);
}

#[test]
fn test_unknown_virus_lists_valid_values() {
    let mut cov1 = row("Y", 1, 1.0);
    cov1.virus = "SARS-CoV-1".to_string();
    let rows = vec![row("X", 1, 1.0), cov1];

    let params = CalcParams {
        eliciting_virus: Some("MERS-CoV".to_string()),
        ..CalcParams::default()
    };
    let err = EscapeDataset::build(rows, &params).unwrap_err();
    match err {
        DatasetError::InvalidParameter {
            param,
            value,
            valid,
        } => {
            assert_eq!(param, "virus");
            assert_eq!(value, "MERS-CoV");
            assert_eq!(
                valid,
                vec!["SARS-CoV-1".to_string(), "SARS-CoV-2".to_string()]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_filters_validate_against_surviving_rows() {
    let mut xie = row("Y", 1, 1.0);
    xie.virus = "SARS-CoV-1".to_string();
    xie.lab = Some("Xie_XS".to_string());
    let rows = vec![row("X", 1, 1.0), xie];

    // Xie_XS only occurs on SARS-CoV-1 rows, which the virus filter removed.
    let params = CalcParams {
        lab: Some("Xie_XS".to_string()),
        ..CalcParams::default()
    };
    let err = EscapeDataset::build(rows, &params).unwrap_err();
    match err {
        DatasetError::InvalidParameter { param, valid, .. } => {
            assert_eq!(param, "lab");
            assert_eq!(valid, vec!["Bloom_JD".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_metric_filter_selects_variant() {
    let mut mean = row("X", 1, 9.0);
    mean.metric = Some(Metric::Mean.label().to_string());
    let rows = vec![row("X", 1, 2.0), mean];

    let dataset = EscapeDataset::build(rows.clone(), &CalcParams::default()).unwrap();
    assert_eq!(dataset.records().len(), 1);
    assert_eq!(dataset.records()[0].escape, 2.0);
    // The max is taken over the selected variant, not the whole table.
    assert_eq!(dataset.records()[0].max_escape, 2.0);
    assert_eq!(dataset.records()[0].scale_escape, 1.0);

    let params = CalcParams {
        metric: Metric::Mean,
        ..CalcParams::default()
    };
    let dataset = EscapeDataset::build(rows, &params).unwrap();
    assert_eq!(dataset.records()[0].escape, 9.0);
}

#[test]
fn test_normalized_filter_selects_variant() {
    let mut raw = row("X", 1, 7.0);
    raw.normalized = Some(false);
    let rows = vec![row("X", 1, 1.0), raw];

    let params = CalcParams {
        normalized: false,
        ..CalcParams::default()
    };
    let dataset = EscapeDataset::build(rows, &params).unwrap();
    assert_eq!(dataset.records().len(), 1);
    assert_eq!(dataset.records()[0].escape, 7.0);
}

#[test]
fn test_neutralizes_omicron_filter() {
    let mut neut = row("Y", 1, 1.0);
    neut.neutralizes_omicron = Some(true);
    let rows = vec![row("X", 1, 1.0), neut];

    let params = CalcParams {
        neutralizes_omicron: Some(true),
        ..CalcParams::default()
    };
    let dataset = EscapeDataset::build(rows, &params).unwrap();
    assert_eq!(dataset.conditions(), ["Y".to_string()]);
}

#[test]
fn test_filter_on_absent_column_fails_with_empty_valid_set() {
    let mut bare = row("X", 1, 1.0);
    bare.lab = None;

    let params = CalcParams {
        lab: Some("Bloom_JD".to_string()),
        ..CalcParams::default()
    };
    let err = EscapeDataset::build(vec![bare], &params).unwrap_err();
    match err {
        DatasetError::InvalidParameter { param, valid, .. } => {
            assert_eq!(param, "lab");
            assert!(valid.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_no_virus_filter_keeps_every_condition() {
    let mut cov1 = row("Y", 2, 1.0);
    cov1.virus = "SARS-CoV-1".to_string();
    let rows = vec![row("X", 1, 1.0), cov1];

    let params = CalcParams {
        eliciting_virus: None,
        ..CalcParams::default()
    };
    let dataset = EscapeDataset::build(rows, &params).unwrap();
    assert_eq!(dataset.n_conditions(), 2);
    assert_eq!(dataset.records()[0].virus, "SARS-CoV-2");
    assert_eq!(dataset.records()[1].virus, "SARS-CoV-1");
}

#[test]
fn test_invalid_parameter_message_shape() {
    let err = DatasetError::InvalidParameter {
        param: "virus",
        value: "MERS-CoV".to_string(),
        valid: vec!["SARS-CoV-2".to_string()],
    };
    assert_eq!(
        err.to_string(),
        "MERS-CoV is not a valid value for virus; valid values are [\"SARS-CoV-2\"]"
    );
}
