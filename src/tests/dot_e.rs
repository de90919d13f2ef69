use crate::{record::TimeSeriesCode, tests::parse};

#[test]
fn interval_with_missing_slot() {
    // the empty slot advances the clock without emitting a record
    let run = parse(".E LOC 20240101 Z DH06/HG/DIH1/5.0/6.0//8.0\n", true, false);
    assert_eq!(run.records.len(), 3);
    let hours: Vec<u32> = run.records.iter().map(|r| r.obs_time.hour()).collect();
    assert_eq!(hours, vec![6, 7, 9]);
    let values: Vec<f64> = run.records.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![5.0, 6.0, 8.0]);
    assert_eq!(run.records[0].time_series_code, TimeSeriesCode::First);
    assert_eq!(run.records[1].time_series_code, TimeSeriesCode::Subsequent);
    assert_eq!(run.records[2].time_series_code, TimeSeriesCode::Subsequent);
    // the hourly interval rewrites the duration position
    assert_eq!(run.records[0].parameter_code.as_str(), "HGHRZZZ");
    assert!(run.lines[0].contains(" 1001 0 1"));
}

#[test]
fn series_is_evenly_spaced() {
    let run = parse(
        ".E LOC 20240301 Z DH00/HG/DIH6/1.0/2.0/3.0/4.0/5.0\n",
        true,
        false,
    );
    assert_eq!(run.records.len(), 5);
    for pair in run.records.windows(2) {
        let step = pair[1].obs_time.since(&pair[0].obs_time);
        assert_eq!(step.num_hours(), 6);
    }
}

#[test]
fn daily_interval_crosses_months() {
    let run = parse(".E LOC 20240227 Z DH12/HG/DID1/1.0/2.0/3.0/4.0\n", true, false);
    let days: Vec<u32> = run.records.iter().map(|r| r.obs_time.day()).collect();
    assert_eq!(days, vec![27, 28, 29, 1]);
    assert_eq!(run.records[3].obs_time.month(), 3);
    assert_eq!(run.records[0].parameter_code.duration(), 'D');
}

#[test]
fn monthly_interval_uses_calendar_arithmetic() {
    let run = parse(".E LOC 20240131 Z DH12/HG/DIM1/1.0/2.0/3.0\n", true, false);
    let dates: Vec<(u32, u32)> = run
        .records
        .iter()
        .map(|r| (r.obs_time.month(), r.obs_time.day()))
        .collect();
    assert_eq!(dates, vec![(1, 31), (2, 29), (3, 29)]);
}

#[test]
fn minute_interval() {
    let run = parse(".E LOC 20240501 Z DH0600/HG/DIN30/1.0/2.0/3.0\n", true, false);
    let minutes: Vec<u32> = run.records.iter().map(|r| r.obs_time.minute()).collect();
    assert_eq!(minutes, vec![0, 30, 0]);
    assert_eq!(run.records[2].obs_time.hour(), 7);
    // 30 minutes maps onto duration code J
    assert_eq!(run.records[0].parameter_code.duration(), 'J');
}

#[test]
fn interval_redeclared_is_error() {
    let run = parse(".E LOC 20240101 Z DH06/HG/DIH1/5.0/DIH2/6.0\n", true, false);
    // the redeclaration stops the message, keeping earlier records
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.summary.error_count, 1);
}

#[test]
fn value_before_interval_kills_message() {
    let run = parse(".E LOC 20240101 Z DH06/HG/5.0/6.0\n", true, false);
    assert!(run.records.is_empty());
    assert_eq!(run.summary.error_count, 1);
}

#[test]
fn interval_before_parameter_kills_message() {
    let run = parse(".E LOC 20240101 Z DH06/DIH1/HG/5.0\n", true, false);
    assert!(run.records.is_empty());
    assert_eq!(run.summary.error_count, 1);
}

#[test]
fn comment_attaches_to_value() {
    let run = parse(
        ".E LOC 20240101 Z DH06/HG/DIH1/5.0 \"first\"/6.0\n",
        true,
        false,
    );
    assert_eq!(run.records.len(), 2);
    assert_eq!(run.records[0].comment.as_deref(), Some("\"first\""));
    assert!(run.records[1].comment.is_none());
}

#[test]
fn continuation_lines_join_series() {
    let run = parse(
        ".E LOC 20240101 Z DH06/HG/DIH1/5.0/6.0\n.E1 7.0/8.0\n",
        true,
        false,
    );
    assert_eq!(run.records.len(), 4);
    let hours: Vec<u32> = run.records.iter().map(|r| r.obs_time.hour()).collect();
    assert_eq!(hours, vec![6, 7, 8, 9]);
}

#[test]
fn reject_problematic_purges_series() {
    let input = ".E LOC 20240101 Z DH06/HG/DIH1/5.0/DIH2/6.0\n";
    let purged = parse(input, true, true);
    assert!(purged.records.is_empty());
}
