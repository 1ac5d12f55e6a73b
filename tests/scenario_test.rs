use dataportal::aggregate::{group_and_aggregate, AggOperator, AggregationSpec};
use dataportal::chart_spec::{ChannelMapping, ChartKind, ChartSpec};
use dataportal::loader::load;
use dataportal::summary::summarize;
use dataportal::value_counts::value_counts;
use dataportal::window::{head, tail};
use dataportal::{OpenOptions, PortalError};
use std::collections::HashMap;

mod common;

#[test]
fn summary_shape_matches_file() {
    let csv = common::stores_csv(25);
    let ds = common::load_csv(&csv);
    let summary = summarize(&ds);
    assert_eq!(summary.row_count, 25);
    assert_eq!(summary.col_count, 3);
    assert_eq!(summary.column_names, vec!["region", "store", "amount"]);
    // only amount is numeric
    assert_eq!(summary.column_stats.len(), 1);
    assert_eq!(summary.column_stats[0].count, 25);
}

#[test]
fn full_window_round_trips() {
    let ds = common::load_csv(&common::stores_csv(12));
    let n = ds.height();
    let back = tail(&head(&ds, n), n);
    assert!(back.frame().equals_missing(ds.frame()));
}

#[test]
fn value_counts_sum_to_row_count() {
    let ds = common::load_csv(&common::stores_csv(40));
    let counts = value_counts(&ds, "store", 100).unwrap();
    let total: f64 = counts
        .table
        .f64_values(&counts.count_column)
        .unwrap()
        .into_iter()
        .flatten()
        .sum();
    assert_eq!(total as usize, 40);
}

#[test]
fn value_counts_city_scenario() {
    let counts = value_counts(&common::sales(), "city", 2).unwrap();
    assert_eq!(counts.table.column_names(), vec!["city", "count"]);
    assert_eq!(counts.table.text_values("city").unwrap(), vec!["A", "B"]);
    assert_eq!(
        counts.table.f64_values("count").unwrap(),
        vec![Some(2.0), Some(2.0)]
    );
}

#[test]
fn group_count_sums_to_row_count() {
    let ds = common::load_csv(&common::stores_csv(31));
    let spec = AggregationSpec::new(
        vec!["region".into(), "store".into()],
        "amount",
        AggOperator::Count,
    );
    let table = group_and_aggregate(&ds, &spec, "newcol").unwrap().unwrap();
    let total: f64 = table
        .f64_values("newcol")
        .unwrap()
        .into_iter()
        .flatten()
        .sum();
    assert_eq!(total as usize, 31);
}

#[test]
fn group_sum_matches_manual_partition() {
    let csv = common::stores_csv(50);
    let ds = common::load_csv(&csv);

    let mut expected: HashMap<String, i64> = HashMap::new();
    for line in csv.lines().skip(1) {
        let fields: Vec<&str> = line.split(',').collect();
        *expected.entry(fields[0].to_string()).or_default() += fields[2].parse::<i64>().unwrap();
    }

    let spec = AggregationSpec::new(vec!["region".into()], "amount", AggOperator::Sum);
    let table = group_and_aggregate(&ds, &spec, "newcol").unwrap().unwrap();
    let regions = table.text_values("region").unwrap();
    let sums = table.f64_values("newcol").unwrap();
    assert_eq!(regions, vec!["north", "south", "east"]);
    for (region, sum) in regions.iter().zip(sums) {
        assert_eq!(sum, Some(expected[region] as f64), "region {}", region);
    }
}

#[test]
fn city_sum_and_mean() {
    let ds = common::sales();
    let sum = AggregationSpec::new(vec!["city".into()], "sales", AggOperator::Sum);
    let table = group_and_aggregate(&ds, &sum, "newcol").unwrap().unwrap();
    assert_eq!(table.column_names(), vec!["city", "newcol"]);
    assert_eq!(table.text_values("city").unwrap(), vec!["A", "B"]);
    assert_eq!(
        table.f64_values("newcol").unwrap(),
        vec![Some(30.0), Some(70.0)]
    );

    let mean = AggregationSpec::new(vec!["city".into()], "sales", AggOperator::Mean);
    let table = group_and_aggregate(&ds, &mean, "newcol").unwrap().unwrap();
    assert_eq!(
        table.f64_values("newcol").unwrap(),
        vec![Some(15.0), Some(35.0)]
    );
}

#[test]
fn random_bytes_are_a_format_error() {
    // 0xff never appears in UTF-8
    let mut bytes = vec![0xffu8];
    bytes.extend((0..64u32).map(|i| (i * 97 % 251) as u8));
    let err = load(&bytes, "upload.csv", &OpenOptions::default()).unwrap_err();
    assert!(matches!(err, PortalError::Format { .. }), "got {:?}", err);
}

#[test]
fn absent_columns_are_reported_everywhere() {
    let ds = common::sales();

    let err = value_counts(&ds, "region", 3).unwrap_err();
    assert!(matches!(err, PortalError::ColumnNotFound(ref c) if c == "region"));

    let spec = AggregationSpec::new(vec!["region".into()], "sales", AggOperator::Sum);
    let err = group_and_aggregate(&ds, &spec, "newcol").unwrap_err();
    assert!(matches!(err, PortalError::ColumnNotFound(ref c) if c == "region"));

    let spec = AggregationSpec::new(vec!["city".into()], "profit", AggOperator::Sum);
    let err = group_and_aggregate(&ds, &spec, "newcol").unwrap_err();
    assert!(matches!(err, PortalError::ColumnNotFound(ref c) if c == "profit"));

    let table = group_and_aggregate(
        &ds,
        &AggregationSpec::new(vec!["city".into()], "sales", AggOperator::Sum),
        "newcol",
    )
    .unwrap()
    .unwrap();
    let chart = ChartSpec::new(
        ChartKind::Scatter,
        ChannelMapping {
            x: Some("city".into()),
            y: Some("newcol".into()),
            size: Some("weight".into()),
            ..Default::default()
        },
    );
    let err = chart.validate(&table).unwrap_err();
    assert!(matches!(err, PortalError::ColumnNotFound(ref c) if c == "weight"));
}

#[test]
fn empty_grouping_is_a_no_op() {
    let spec = AggregationSpec::new(vec![], "sales", AggOperator::Sum);
    assert!(group_and_aggregate(&common::sales(), &spec, "newcol")
        .unwrap()
        .is_none());
}
