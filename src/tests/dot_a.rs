use crate::tests::parse;

#[test]
fn trivial_stage_report() {
    let run = parse(".A LOCA 20240501 Z DH12/HG 12.34\n", true, false);
    assert_eq!(run.records.len(), 1);
    assert_eq!(
        run.lines[0],
        "LOCA      2024-05-01 12:00:00  0000-00-00 00:00:00  HGIRZZZ        12.3400 Z   -1.000  0000 0 0            \" \""
    );
    assert_eq!(run.summary.error_count, 0);
    assert_eq!(run.summary.warning_count, 0);
}

#[test]
fn send_code_previous_7am_local() {
    // 03:30 Eastern is before 07:00, so QY lands on the previous day,
    // 07:00 local = 11:00Z during daylight saving
    let run = parse(".A XYZ 20240615 E DH0330/QY 123.0\n", false, false);
    assert_eq!(run.records.len(), 1);
    let record = &run.records[0];
    assert_eq!(record.parameter_code.as_str(), "QRIRZZZ");
    assert_eq!(
        (
            record.obs_time.year(),
            record.obs_time.month(),
            record.obs_time.day(),
            record.obs_time.hour()
        ),
        (2024, 6, 14, 11)
    );
    assert_eq!(record.value, 123.0);
    // the send code expands to a full 7-character code: full display
    assert!(run.lines[0].contains("  QRIRZZZ"));
}

#[test]
fn send_code_previous_7am_legacy_model() {
    let run = parse(".A XYZ 20240615 E DH0330/QY 123.0\n", true, false);
    assert_eq!(run.records.len(), 1);
    let obs = &run.records[0].obs_time;
    assert_eq!((obs.day(), obs.hour()), (14, 11));
}

#[test]
fn send_code_7am_rejects_zulu() {
    let run = parse(".A XYZ 20240615 Z DH0330/QY 123.0\n", true, false);
    assert!(run.records.is_empty());
    assert_eq!(run.summary.error_count, 1);
}

#[test]
fn send_code_7am_rejects_relative() {
    let run = parse(".A XYZ 20240615 E DH0330/DRH-2/QY 123.0\n", true, false);
    assert!(run.records.is_empty());
    assert_eq!(run.summary.error_count, 1);
}

#[test]
fn after_7am_stays_on_same_day() {
    let run = parse(".A XYZ 20240115 ES DH0930/QY 123.0\n", true, false);
    let obs = &run.records[0].obs_time;
    // 09:30 standard Eastern: today 07:00 local = 12:00Z
    assert_eq!((obs.day(), obs.hour()), (15, 12));
}

#[test]
fn multiple_values_share_state() {
    let run = parse(
        ".A LOCA 20240501 Z DH06/HG 1.5/DH12/TA 20.0/PC 1.25\n",
        true,
        false,
    );
    assert_eq!(run.records.len(), 3);
    assert_eq!(run.records[0].obs_time.hour(), 6);
    assert_eq!(run.records[1].obs_time.hour(), 12);
    assert_eq!(run.records[2].obs_time.hour(), 12);
    assert_eq!(run.records[2].parameter_code.pe(), "PC");
}

#[test]
fn si_units_convert_on_emission() {
    let run = parse(".A LOCA 20240501 Z DH12/DUS/HG 1.0\n", true, false);
    assert!((run.records[0].value - 3.2808399).abs() < 1e-9);

    // temperatures use the -1.0 factor rule
    let run = parse(".A LOCA 20240501 Z DH12/DUS/TA 100\n", true, false);
    assert_eq!(run.records[0].value, 212.0);
}

#[test]
fn default_qualifier_applies() {
    let run = parse(".A LOCA 20240501 Z DH12/DQG/HG 1.5/TA 2.0R\n", true, false);
    assert_eq!(run.records[0].qualifier, 'G');
    assert_eq!(run.records[1].qualifier, 'R');
}

#[test]
fn retained_comment_round_trip() {
    let run = parse(
        ".A LOCA 20240501 Z DH12/HG 12.34 \"ice affected gage\"\n",
        true,
        false,
    );
    assert_eq!(
        run.records[0].comment.as_deref(),
        Some("\"ice affected gage\"")
    );
    assert!(run.lines[0].ends_with("\"ice affected gage\""));
}

#[test]
fn creation_time_carries_through() {
    let run = parse(
        ".A LOCA 20240501 Z DC202404301845/DH12/HG 1.5\n",
        true,
        false,
    );
    let create = run.records[0].create_time.as_ref().unwrap();
    assert_eq!(
        (create.month(), create.day(), create.hour(), create.minute()),
        (4, 30, 18, 45)
    );
    assert!(run.lines[0].contains("2024-04-30 18:45:00"));
}

#[test]
fn forecast_without_creation_warns() {
    let run = parse(".A LOCA 20240501 Z DH12/HGIFZ 1.5\n", true, false);
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.summary.warning_count, 1);
}

#[test]
fn unknown_pe_passes_value_through() {
    let run = parse(".A LOCA 20240501 Z DH12/DUS/XX 5.0\n", true, false);
    // warning only, value untransformed even under SI
    assert_eq!(run.summary.warning_count, 1);
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].value, 5.0);
    assert_eq!(run.records[0].parameter_code.as_str(), "XXIRZZZ");
}

#[test]
fn revised_flag_in_output() {
    let run = parse(".AR LOCA 20240501 Z DH12/HG 1.5\n", true, false);
    assert!(run.records[0].revised);
    assert!(run.lines[0].contains(" 0000 1 0 "));
}

#[test]
fn relative_offsets_apply_immediately() {
    let run = parse(".A LOCA 20240501 Z DH12/DRD-1/HG 1.5\n", true, false);
    let obs = &run.records[0].obs_time;
    assert_eq!((obs.day(), obs.hour()), (30, 12));

    let run = parse(".A LOCA 20240501 Z DH12/DRE-1/HG 1.5\n", true, false);
    // end-of-month delta from a non-last day is a value-level error
    assert_eq!(run.records.len(), 0);
    assert_eq!(run.summary.error_count, 1);
}

#[test]
fn bad_date_rejects_message() {
    let run = parse(".A LOCA 20241301 Z DH12/HG 1.5\n", true, false);
    assert!(run.records.is_empty());
    assert_eq!(run.summary.error_count, 1);
}

#[test]
fn reject_problematic_purges_message() {
    // DQX is an invalid qualifier; the earlier HG value is already parsed
    let input = ".A LOCA 20240501 Z DH12/HG 1.5/DQX/TA 2.0\n";
    let kept = parse(input, true, false);
    assert_eq!(kept.records.len(), 1);
    let purged = parse(input, true, true);
    assert_eq!(purged.records.len(), 0);
    assert_eq!(purged.summary.error_count, 1);
}
