//! The format-1 line contract consumed by downstream loaders.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tests::parse;

static FORMAT_1: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(\w+\s*)(\d{4}-\d{2}-\d{2}) (\d{2}:\d{2}:\d{2})  (\d{4}-\d{2}-\d{2}) (\d{2}:\d{2}:\d{2})  ([A-Z]{3}[A-Z0-9]{3}).([ 0-9.+-]{15}) ([A-Z])([ 0-9.+-]{9})  \d{4} ([01]) ([012])  ((?: |\w){8})  "(.+)"$"#,
    )
    .unwrap()
});

#[test]
fn every_record_matches_the_loader_pattern() {
    let input = "\
.A LOCA 20240501 Z DH12/HG 12.34
.AR SITE8888 20240501 Z DH12/DC202404301845/PC 1.25 \"rain gage\"
.A XYZ 20240615 E DH0330/QY 123.0
.E LOC 20240101 Z DH06/HG/DIH1/5.0/6.0//8.0
.E ELOC 20240101 Z DH06/TA/DIH6/-1.5/M/2.0
.B SOURCE 20240601 Z DH12/HG/QR/PP
LOC1 1.2/3.4/125
LOC2 DM07010700/5.6/7.8/T
.END
";
    let run = parse(input, false, false);
    assert!(run.records.len() >= 12);
    for line in &run.lines {
        assert!(
            FORMAT_1.is_match(line),
            "line violates the format-1 contract: [{}]",
            line
        );
    }
}

#[test]
fn missing_and_trace_values_stay_in_contract() {
    let run = parse(".A LOCA 20240501 Z DH12/HG M/PC T/PP ++\n", true, false);
    assert_eq!(run.records.len(), 3);
    assert_eq!(run.records[0].value, -9999.0);
    assert_eq!(run.records[1].value, 0.001);
    assert_eq!(run.records[2].value, -9999.0);
    for line in &run.lines {
        assert!(FORMAT_1.is_match(line), "[{}]", line);
    }
}
